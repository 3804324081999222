use crate::bridge::output::OutputSink;
use crate::bridge::router::MessageRouter;
use crate::bridge::shutdown::{ShutdownCoordinator, ShutdownReason, ShutdownSignals};
use crate::bridge::sse::EventStreamClient;
use crate::config::{BridgeConfig, ConfigRepairer};
use crate::error::Result;
use crate::http::direct_client;
use crate::logging::log_bridge_event;
use crate::process::{
    BridgeContext, BridgePhase, ChildExit, HealthProbe, HttpProbe, ServerAttachment,
    ServerSupervisor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

const FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

enum Startup {
    Finished(Result<ServerAttachment>),
    Interrupted(ShutdownReason),
}

enum Wake {
    Signal(ShutdownReason),
    ServerExited(ChildExit),
    InputClosed(Result<()>),
}

/// Wires the supervisor, event stream, router and shutdown together for one
/// standard I/O peer.
pub struct BridgeRunner {
    config: Arc<BridgeConfig>,
    context: Arc<BridgeContext>,
    client: reqwest::Client,
    probe: Arc<dyn HealthProbe>,
    repairer: Option<ConfigRepairer>,
}

impl BridgeRunner {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        let client = direct_client()?;
        let probe = HttpProbe::new(client.clone(), config.base_url(), config.probe_timeout);
        Ok(Self {
            config: Arc::new(config),
            context: Arc::new(BridgeContext::new()),
            client,
            probe: Arc::new(probe),
            repairer: None,
        })
    }

    pub fn with_probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Repair project configs before the server is probed
    pub fn with_repair(mut self, repairer: ConfigRepairer) -> Self {
        self.repairer = Some(repairer);
        self
    }

    pub fn context(&self) -> Arc<BridgeContext> {
        Arc::clone(&self.context)
    }

    /// Bridge the process's stdin and stdout. Returns the exit status.
    pub async fn run(self) -> i32 {
        self.run_with_io(tokio::io::stdin(), tokio::io::stdout())
            .await
    }

    pub async fn run_with_io<R, W>(self, input: R, output: W) -> i32
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if let Some(repairer) = &self.repairer {
            let report = repairer.run().await;
            if !report.repaired.is_empty() {
                info!("Repaired {} Serena project config(s)", report.repaired.len());
            }
        }

        let mut signals = match ShutdownSignals::install() {
            Ok(signals) => signals,
            Err(e) => {
                error!("Failed to install signal handlers: {}", e);
                return e.exit_code();
            }
        };

        let mut supervisor = ServerSupervisor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.probe),
            Arc::clone(&self.context),
        );
        let coordinator = ShutdownCoordinator::new(Arc::clone(&self.context));

        let startup = tokio::select! {
            result = supervisor.ensure_running() => Startup::Finished(result),
            reason = signals.recv() => Startup::Interrupted(reason),
        };

        let attachment = match startup {
            Startup::Interrupted(reason) => return coordinator.shutdown(&mut supervisor, reason),
            Startup::Finished(Err(e)) => {
                error!("Failed to start Serena: {}", e);
                self.context.begin_shutdown();
                supervisor.terminate();
                return e.exit_code();
            }
            Startup::Finished(Ok(attachment)) => attachment,
        };

        if let Err(e) = self.context.advance(BridgePhase::Ready) {
            error!("Bridge could not enter ready state: {}", e);
            return e.exit_code();
        }
        log_bridge_event("ready", &format!("{attachment:?}"));
        info!(
            "Bridging stdio to {} (rpc: {})",
            self.config.base_url(),
            self.config.rpc_endpoint()
        );

        let (sink, _writer_task) = OutputSink::spawn(output);

        let mut events = EventStreamClient::new(
            self.client.clone(),
            self.config.base_url().clone(),
            sink.clone(),
            self.config.reconnect_delay,
        );
        let event_task = tokio::spawn(async move { events.run().await });

        let router = MessageRouter::new(
            self.client.clone(),
            self.config.rpc_endpoint().clone(),
            sink.clone(),
        );
        let routing = router.run(input);
        tokio::pin!(routing);

        let wake = tokio::select! {
            reason = signals.recv() => Wake::Signal(reason),
            exit = supervisor.wait_for_unexpected_exit() => Wake::ServerExited(exit),
            result = &mut routing => Wake::InputClosed(result),
        };

        let code = match wake {
            Wake::Signal(reason) => coordinator.shutdown(&mut supervisor, reason),
            Wake::InputClosed(result) => {
                if let Err(e) = result {
                    warn!("Stopped reading input: {}", e);
                }
                coordinator.shutdown(&mut supervisor, ShutdownReason::InputClosed)
            }
            Wake::ServerExited(exit) => {
                if let Err(e) = self.context.advance(BridgePhase::Exit) {
                    debug!("Phase not advanced on server exit: {}", e);
                }
                let error = exit.into_error();
                error!("{}", error);
                error.exit_code()
            }
        };

        event_task.abort();
        if tokio::time::timeout(FLUSH_TIMEOUT, sink.flush()).await.is_err() {
            warn!("Timed out flushing output");
        }

        code
    }
}
