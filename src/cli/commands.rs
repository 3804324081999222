
use crate::config::ConfigOverrides;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "serena-bridge")]
#[command(about = "Bridges a stdio JSON-RPC client to a Serena MCP server over HTTP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct CliArgs {
    /// Server base URL (default http://localhost:12341/mcp)
    pub url: Option<String>,

    /// Command used to launch the server when none is running
    #[arg(long)]
    pub server_command: Option<String>,

    /// Liveness probe timeout in milliseconds
    #[arg(long)]
    pub probe_timeout_ms: Option<u64>,

    /// How long to wait for a spawned server, in milliseconds
    #[arg(long)]
    pub startup_timeout_ms: Option<u64>,

    /// Settings file (default ~/.serena-bridge/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip the project config repair step
    #[arg(long)]
    pub no_repair: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            server_command: self.server_command.clone(),
            probe_timeout_ms: self.probe_timeout_ms,
            startup_timeout_ms: self.startup_timeout_ms,
        }
    }
}
