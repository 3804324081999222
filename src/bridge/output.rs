use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, warn};

enum OutputCommand {
    Line(String),
    Flush(oneshot::Sender<()>),
}

/// Line-oriented handle to the output channel.
///
/// All writers share a single writer task, so a line is always written
/// whole and in the order it was queued.
#[derive(Clone)]
pub struct OutputSink {
    tx: mpsc::UnboundedSender<OutputCommand>,
}

impl OutputSink {
    /// Start a writer task over `writer`
    pub fn spawn<W>(writer: W) -> (Self, JoinHandle<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(write_lines(writer, rx));
        (Self { tx }, handle)
    }

    /// Queue one line; a trailing newline is added
    pub fn send_line(&self, line: impl Into<String>) -> bool {
        self.tx.send(OutputCommand::Line(line.into())).is_ok()
    }

    /// Serialize `value` compactly and queue it as one line
    pub fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(line) => self.send_line(line),
            Err(e) => {
                error!("Failed to serialize output message: {}", e);
                false
            }
        }
    }

    /// Wait until every line queued before this call has been written
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(OutputCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn write_lines<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<OutputCommand>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        match command {
            OutputCommand::Line(line) => {
                let mut framed = line.into_bytes();
                framed.push(b'\n');
                let written = async {
                    writer.write_all(&framed).await?;
                    writer.flush().await
                };
                if let Err(e) = written.await {
                    warn!("Output channel closed: {}", e);
                    break;
                }
            }
            OutputCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}
