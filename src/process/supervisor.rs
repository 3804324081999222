use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::logging::log_server_output;
use crate::process::probe::HealthProbe;
use crate::process::state::{BridgePhase, BridgeContext};
use chrono::{DateTime, Utc};
use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

/// How the bridge got hold of a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAttachment {
    /// Something was already listening, nothing is owned
    Existing,
    /// The supervisor launched the server and owns the child
    Spawned { pid: Option<u32> },
}

/// Exit report of the spawned server
#[derive(Debug, Clone)]
pub struct ChildExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub timestamp: DateTime<Utc>,
}

impl ChildExit {
    fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            timestamp: Utc::now(),
        }
    }

    fn unknown() -> Self {
        Self {
            code: None,
            signal: None,
            timestamp: Utc::now(),
        }
    }

    /// Fatal error describing this exit
    pub fn into_error(self) -> BridgeError {
        BridgeError::ServerExited { code: self.code }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// The owned server process. The `Child` itself lives in the exit watcher task.
struct ServerChild {
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
    terminated: bool,
    spawned_at: DateTime<Utc>,
}

/// Keeps the backing server reachable.
///
/// Probes first and attaches to whatever is listening. Otherwise it launches
/// the server, relays its stderr, drains its stdout and polls until the
/// server answers or the startup deadline passes.
pub struct ServerSupervisor {
    config: Arc<BridgeConfig>,
    probe: Arc<dyn HealthProbe>,
    context: Arc<BridgeContext>,
    child: Option<ServerChild>,
    exit_rx: Option<mpsc::Receiver<ChildExit>>,
}

impl ServerSupervisor {
    pub fn new(
        config: Arc<BridgeConfig>,
        probe: Arc<dyn HealthProbe>,
        context: Arc<BridgeContext>,
    ) -> Self {
        Self {
            config,
            probe,
            context,
            child: None,
            exit_rx: None,
        }
    }

    pub fn owns_child(&self) -> bool {
        self.child.is_some()
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.pid)
    }

    /// Probe once, attach if alive, otherwise spawn and wait for readiness
    pub async fn ensure_running(&mut self) -> Result<ServerAttachment> {
        self.context.advance(BridgePhase::Probing)?;

        if self.probe.is_alive().await {
            info!(
                "Connected to existing Serena server at {}",
                self.config.base_url()
            );
            self.context.advance(BridgePhase::Attached)?;
            return Ok(ServerAttachment::Existing);
        }

        self.context.advance(BridgePhase::Starting)?;

        let pid = match self.spawn_server() {
            Ok(pid) => pid,
            Err(e) => {
                self.abandon_startup();
                return Err(e);
            }
        };

        if let Err(e) = self.wait_until_ready().await {
            self.abandon_startup();
            return Err(e);
        }

        info!("Serena server is ready!");
        Ok(ServerAttachment::Spawned { pid })
    }

    fn abandon_startup(&self) {
        if let Err(e) = self.context.advance(BridgePhase::Exit) {
            debug!("Phase not advanced after failed startup: {}", e);
        }
    }

    fn spawn_server(&mut self) -> Result<Option<u32>> {
        let launch = &self.config.launch;
        let args = self.config.server_args();

        info!(
            "Starting Serena server on {}:{}...",
            self.config.bind_host(),
            self.config.bind_port()
        );
        debug!("Server command: {} {:?}", launch.program, args);

        let mut command = Command::new(&launch.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            BridgeError::ProcessError(format!(
                "Failed to start Serena server '{}': {e}",
                launch.program
            ))
        })?;

        let pid = child.id();
        debug!("Serena server spawned with PID: {:?}", pid);

        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_relay(stderr);
        }
        if let Some(stdout) = child.stdout.take() {
            spawn_stdout_drain(stdout);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = mpsc::channel(1);
        spawn_exit_watcher(child, kill_rx, exit_tx, Arc::clone(&self.context));

        self.child = Some(ServerChild {
            pid,
            kill_tx: Some(kill_tx),
            terminated: false,
            spawned_at: Utc::now(),
        });
        self.exit_rx = Some(exit_rx);

        Ok(pid)
    }

    async fn wait_until_ready(&mut self) -> Result<()> {
        info!("Waiting for Serena to be ready...");

        let startup_timeout = self.config.startup_timeout;
        let poll_interval = self.config.poll_interval;
        let deadline = Instant::now() + startup_timeout;
        let probe = Arc::clone(&self.probe);

        loop {
            tokio::select! {
                alive = probe.is_alive() => {
                    if alive {
                        return Ok(());
                    }
                }
                exit = recv_exit(&mut self.exit_rx) => {
                    error!("Serena server exited during startup with {}", exit);
                    return Err(exit.into_error());
                }
            }

            if Instant::now() >= deadline {
                error!("Timed out waiting for Serena server to start.");
                return Err(BridgeError::StartupTimeout(format!(
                    "no response from {} within {}ms",
                    self.config.base_url(),
                    startup_timeout.as_millis()
                )));
            }

            let next_probe = std::cmp::min(Instant::now() + poll_interval, deadline);
            tokio::select! {
                _ = sleep_until(next_probe) => {}
                exit = recv_exit(&mut self.exit_rx) => {
                    error!("Serena server exited during startup with {}", exit);
                    return Err(exit.into_error());
                }
            }
        }
    }

    /// Resolves when the owned server exits while the bridge is not shutting
    /// down. Never resolves when no server is owned.
    pub async fn wait_for_unexpected_exit(&mut self) -> ChildExit {
        let exit = recv_exit(&mut self.exit_rx).await;
        if let Some(child) = &self.child {
            let uptime = exit.timestamp - child.spawned_at;
            error!(
                "Serena server exited unexpectedly with {} after {}s",
                exit,
                uptime.num_seconds()
            );
        }
        exit
    }

    /// Ask the owned server to stop with SIGTERM.
    ///
    /// Returns false when there is no owned server or it was already
    /// signalled, so repeated calls never signal twice.
    pub fn terminate(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        if child.terminated {
            return false;
        }
        child.terminated = true;

        info!("Stopping Serena server...");

        if let Some(pid) = child.pid {
            if send_sigterm(pid) {
                debug!("Sent SIGTERM to Serena server {}", pid);
                return true;
            }
            warn!("Could not send SIGTERM to {}, killing instead", pid);
        }

        match child.kill_tx.take() {
            Some(kill_tx) => kill_tx.send(()).is_ok(),
            None => false,
        }
    }
}

async fn recv_exit(exit_rx: &mut Option<mpsc::Receiver<ChildExit>>) -> ChildExit {
    if let Some(rx) = exit_rx.as_mut() {
        if let Some(exit) = rx.recv().await {
            return exit;
        }
    }
    std::future::pending().await
}

fn send_sigterm(pid: u32) -> bool {
    use sysinfo::{Pid, Signal, System};

    let system = System::new_all();
    system
        .process(Pid::from_u32(pid))
        .and_then(|process| process.kill_with(Signal::Term))
        .unwrap_or(false)
}

fn spawn_exit_watcher(
    mut child: Child,
    mut kill_rx: oneshot::Receiver<()>,
    exit_tx: mpsc::Sender<ChildExit>,
    context: Arc<BridgeContext>,
) {
    tokio::spawn(async move {
        let waited = tokio::select! {
            status = child.wait() => Some(status),
            Ok(()) = &mut kill_rx => None,
        };

        let status = match waited {
            Some(status) => status,
            None => {
                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill Serena server: {}", e);
                }
                child.wait().await
            }
        };

        let exit = match status {
            Ok(status) => ChildExit::from_status(status),
            Err(e) => {
                error!("Failed to wait for Serena server exit: {}", e);
                ChildExit::unknown()
            }
        };

        info!("Serena server exited with {}", exit);

        if context.is_shutting_down() {
            debug!("Server exit during shutdown, not escalating");
            return;
        }

        let _ = exit_tx.send(exit).await;
    });
}

fn spawn_stderr_relay<T>(stream: T)
where
    T: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = String::new();

        while let Ok(n) = reader.read_line(&mut line).await {
            if n == 0 {
                break; // EOF
            }

            let trimmed = line.trim_end();
            if !trimmed.is_empty() {
                log_server_output(trimmed);
            }
            line.clear();
        }
    });
}

// Nobody reads the server's stdout; draining it keeps a full pipe from
// blocking the child.
fn spawn_stdout_drain<T>(mut stream: T)
where
    T: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut stream, &mut tokio::io::sink()).await {
            debug!("Stopped draining server stdout: {}", e);
        }
    });
}
