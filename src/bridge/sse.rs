use crate::bridge::framing::LineBuffer;
use crate::bridge::output::OutputSink;
use crate::error::Result;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

const DEFAULT_EVENT_TYPE: &str = "message";

/// Event types that belong to the transport handshake, never forwarded
const CONTROL_EVENT_TYPES: &[&str] = &["message", "endpoint"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// A repeated `data:` line replaces the pending payload instead of appending
/// to it. Pending fields survive chunk boundaries and reset only when an
/// event is dispatched.
#[derive(Debug, Default)]
pub struct SseParser {
    lines: LineBuffer,
    event_type: Option<String>,
    data: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for raw in self.lines.push(chunk) {
            let line = raw.strip_suffix('\r').unwrap_or(&raw);

            if let Some(value) = line.strip_prefix("event:") {
                self.event_type = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data = Some(value.trim().to_string());
            } else if line.is_empty() {
                match self.data.take() {
                    Some(data) if !data.is_empty() => events.push(SseEvent {
                        event_type: self
                            .event_type
                            .take()
                            .unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
                        data,
                    }),
                    _ => {}
                }
            }
        }

        events
    }
}

/// The message to forward for `event`, if any
pub fn classify(event: &SseEvent) -> Option<Value> {
    if CONTROL_EVENT_TYPES.contains(&event.event_type.as_str()) {
        return None;
    }

    match serde_json::from_str::<Value>(&event.data) {
        Ok(message) => Some(message),
        Err(_) => {
            debug!("Ignoring non-JSON '{}' event", event.event_type);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Streaming,
}

#[derive(Debug)]
enum StreamEnd {
    Closed,
    Rejected(StatusCode),
}

/// Long-lived event stream reader that forwards server messages to the
/// output channel and reconnects after every close or failure.
pub struct EventStreamClient {
    client: reqwest::Client,
    url: Url,
    sink: OutputSink,
    reconnect_delay: Duration,
    state: ConnectionState,
}

impl EventStreamClient {
    pub fn new(
        client: reqwest::Client,
        url: Url,
        sink: OutputSink,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            client,
            url,
            sink,
            reconnect_delay,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Stream until the server rejects the request. Closed or broken streams
    /// are reopened after the fixed delay, without limit.
    pub async fn run(&mut self) {
        loop {
            self.state = ConnectionState::Connecting;

            match self.stream_once().await {
                Ok(StreamEnd::Rejected(status)) => {
                    error!("Event stream connection failed: {}", status);
                    self.state = ConnectionState::Disconnected;
                    return;
                }
                Ok(StreamEnd::Closed) => info!("Event stream closed, reconnecting..."),
                Err(e) => warn!("Event stream error: {}", e),
            }

            self.state = ConnectionState::Disconnected;
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn stream_once(&mut self) -> Result<StreamEnd> {
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Ok(StreamEnd::Rejected(status));
        }

        self.state = ConnectionState::Streaming;
        debug!("Event stream connected to {}", self.url);

        let mut parser = SseParser::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for event in parser.feed(&chunk) {
                if let Some(message) = classify(&event) {
                    self.sink.send_json(&message);
                }
            }
        }

        Ok(StreamEnd::Closed)
    }
}
