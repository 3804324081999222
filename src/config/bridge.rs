use crate::config::settings::BridgeSettings;
use crate::error::{BridgeError, Result};
use std::time::Duration;
use url::{Host, Url};

pub const PROBE_TIMEOUT_ENV: &str = "SERENA_BRIDGE_PROBE_TIMEOUT_MS";
pub const STARTUP_TIMEOUT_ENV: &str = "SERENA_BRIDGE_STARTUP_TIMEOUT_MS";

/// Older names, read only when the current ones are unset
pub const LEGACY_PROBE_TIMEOUT_ENV: &str = "OH_MY_AG_BRIDGE_PROBE_TIMEOUT_MS";
pub const LEGACY_STARTUP_TIMEOUT_ENV: &str = "OH_MY_AG_BRIDGE_STARTUP_TIMEOUT_MS";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:12341/mcp";

/// Values that take precedence over the environment and the settings file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub server_command: Option<String>,
    pub probe_timeout_ms: Option<u64>,
    pub startup_timeout_ms: Option<u64>,
}

/// Program used to launch the backing server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLaunch {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerLaunch {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a shell-style command line into program and arguments
    pub fn from_command_line(command_line: &str) -> Result<Self> {
        let parts = shlex::split(command_line).ok_or_else(|| {
            BridgeError::ConfigError(format!("Failed to parse server command: {command_line}"))
        })?;

        let (program, args) = parts
            .split_first()
            .ok_or_else(|| BridgeError::ConfigError("Empty server command".to_string()))?;

        Ok(Self::new(program.clone(), args.to_vec()))
    }
}

impl Default for ServerLaunch {
    fn default() -> Self {
        let settings = BridgeSettings::default();
        Self::new(settings.server.command, settings.server.args)
    }
}

/// Immutable bridge configuration, resolved once at startup.
///
/// The RPC endpoint has no setter of its own: it is always derived from the
/// base URL so the two can never point at different servers.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    base_url: Url,
    rpc_endpoint: Url,
    pub probe_timeout: Duration,
    pub startup_timeout: Duration,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub launch: ServerLaunch,
}

impl BridgeConfig {
    /// Create a configuration for `base_url` with default timings
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;
        let rpc_endpoint = derive_rpc_endpoint(&base_url);

        Ok(Self {
            base_url,
            rpc_endpoint,
            probe_timeout: Duration::from_millis(2000),
            startup_timeout: Duration::from_millis(120_000),
            poll_interval: Duration::from_secs(1),
            reconnect_delay: Duration::from_secs(1),
            launch: ServerLaunch::default(),
        })
    }

    /// Resolve the configuration: overrides, then environment, then settings
    pub fn resolve<F>(settings: &BridgeSettings, overrides: &ConfigOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = overrides
            .url
            .clone()
            .unwrap_or_else(|| settings.server.url.clone());
        let mut config = Self::new(&url)?;

        config.probe_timeout = resolve_millis(
            overrides.probe_timeout_ms,
            first_env(&env, &[PROBE_TIMEOUT_ENV, LEGACY_PROBE_TIMEOUT_ENV]),
            PROBE_TIMEOUT_ENV,
            settings.timeouts.probe_ms,
        )?;
        config.startup_timeout = resolve_millis(
            overrides.startup_timeout_ms,
            first_env(&env, &[STARTUP_TIMEOUT_ENV, LEGACY_STARTUP_TIMEOUT_ENV]),
            STARTUP_TIMEOUT_ENV,
            settings.timeouts.startup_ms,
        )?;
        config.poll_interval = Duration::from_millis(settings.timeouts.poll_interval_ms);
        config.reconnect_delay = Duration::from_millis(settings.timeouts.reconnect_delay_ms);

        config.launch = match &overrides.server_command {
            Some(command_line) => ServerLaunch::from_command_line(command_line)?,
            None => ServerLaunch::new(settings.server.command.clone(), settings.server.args.clone()),
        };

        Ok(config)
    }

    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_launch(mut self, launch: ServerLaunch) -> Self {
        self.launch = launch;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn rpc_endpoint(&self) -> &Url {
        &self.rpc_endpoint
    }

    /// Host the spawned server binds to
    pub fn bind_host(&self) -> String {
        match self.base_url.host() {
            Some(Host::Ipv6(addr)) => addr.to_string(),
            Some(host) => host.to_string(),
            None => "0.0.0.0".to_string(),
        }
    }

    /// Port the spawned server binds to
    pub fn bind_port(&self) -> u16 {
        self.base_url.port_or_known_default().unwrap_or(12341)
    }

    /// Full argument list for the server launch, transport flags included
    pub fn server_args(&self) -> Vec<String> {
        let mut args = self.launch.args.clone();
        args.extend([
            "--transport".to_string(),
            "streamable-http".to_string(),
            "--host".to_string(),
            self.bind_host(),
            "--port".to_string(),
            self.bind_port().to_string(),
            "--context".to_string(),
            "ide".to_string(),
            "--open-web-dashboard".to_string(),
            "false".to_string(),
        ]);
        args
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(BridgeError::ConfigError(format!(
            "Unsupported server URL scheme '{other}' in {raw}"
        ))),
    }
}

/// Same authority, with a trailing `/sse` path segment swapped for `/mcp`
pub fn derive_rpc_endpoint(base_url: &Url) -> Url {
    let mut endpoint = base_url.clone();
    if let Some(prefix) = base_url.path().strip_suffix("/sse") {
        endpoint.set_path(&format!("{prefix}/mcp"));
    }
    endpoint
}

/// The first of `names` that is set, with its value
fn first_env<F>(env: &F, names: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .find_map(|name| env(name).map(|value| (*name, value)))
}

fn resolve_millis(
    cli_value: Option<u64>,
    env_value: Option<(&'static str, String)>,
    env_name: &str,
    file_value: u64,
) -> Result<Duration> {
    let millis = match (cli_value, env_value) {
        (Some(value), _) => value,
        (None, Some((name, raw))) => raw.trim().parse::<u64>().map_err(|e| {
            BridgeError::ConfigError(format!("Invalid value '{raw}' for {name}: {e}"))
        })?,
        (None, None) => file_value,
    };

    if millis == 0 {
        return Err(BridgeError::ConfigError(format!(
            "{env_name} must be greater than 0"
        )));
    }

    Ok(Duration::from_millis(millis))
}
