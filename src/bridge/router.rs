use crate::bridge::framing::LineBuffer;
use crate::bridge::jsonrpc::{JsonRpcErrorResponse, parse_message, request_id};
use crate::bridge::output::OutputSink;
use crate::error::Result;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

const READ_BUFFER_SIZE: usize = 8192;

/// Forwards input lines to the RPC endpoint and relays each reply.
///
/// Requests are sent in input order. Replies are written as they complete,
/// so they may reach the output out of order.
pub struct MessageRouter {
    client: reqwest::Client,
    endpoint: Url,
    sink: OutputSink,
}

impl MessageRouter {
    pub fn new(client: reqwest::Client, endpoint: Url, sink: OutputSink) -> Self {
        Self {
            client,
            endpoint,
            sink,
        }
    }

    /// Route messages from `input` until end of file, then wait for the
    /// forwards still in flight.
    pub async fn run<R>(&self, mut input: R) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = LineBuffer::new();
        let mut in_flight = JoinSet::new();
        let mut chunk = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = input.read(&mut chunk).await?;
            if n == 0 {
                break;
            }

            for line in lines.push(&chunk[..n]) {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match parse_message(line) {
                    Ok(message) => {
                        in_flight.spawn(forward(
                            self.client.clone(),
                            self.endpoint.clone(),
                            self.sink.clone(),
                            message,
                        ));
                    }
                    Err(e) => warn!("Failed to parse input message: {}", e),
                }
            }

            while in_flight.try_join_next().is_some() {}
        }

        if !lines.is_empty() {
            debug!(
                "Discarding {} bytes of unterminated input",
                lines.pending().len()
            );
        }

        while in_flight.join_next().await.is_some() {}
        Ok(())
    }
}

async fn forward(client: reqwest::Client, endpoint: Url, sink: OutputSink, message: Value) {
    match post(&client, endpoint, &message).await {
        Ok(body) => {
            if !body.trim().is_empty() {
                sink.send_line(body);
            }
        }
        Err(e) => {
            let detail = error_chain(&e);
            warn!("Request forward failed: {}", detail);
            sink.send_json(&JsonRpcErrorResponse::internal_error(
                request_id(&message),
                &detail,
            ));
        }
    }
}

async fn post(
    client: &reqwest::Client,
    endpoint: Url,
    message: &Value,
) -> std::result::Result<String, reqwest::Error> {
    let payload = message.to_string();

    let response = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, payload.len())
        .body(payload)
        .send()
        .await?;

    response.text().await
}

/// `error` followed by each of its sources, joined with ": "
fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![error.to_string()];
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !parts.iter().any(|part| part.contains(&text)) {
            parts.push(text);
        }
        source = cause.source();
    }
    parts.join(": ")
}
