use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Liveness check for the backing server
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// True when something answers HTTP at the server URL
    async fn is_alive(&self) -> bool;
}

/// HTTP prober: any response, whatever its status, means the server is up
pub struct HttpProbe {
    client: Client,
    targets: Vec<Url>,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(client: Client, url: &Url, timeout: Duration) -> Self {
        Self {
            client,
            targets: probe_targets(url),
            timeout,
        }
    }

    async fn probe_target(&self, target: &Url) -> bool {
        let request = self.client.get(target.clone()).timeout(self.timeout).send();

        match request.await {
            Ok(response) => {
                debug!("Probe {} answered with {}", target, response.status());
                // Dropping the response closes streaming bodies such as SSE
                drop(response);
                true
            }
            Err(e) => {
                debug!("Probe {} failed: {}", target, e);
                false
            }
        }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn is_alive(&self) -> bool {
        for target in &self.targets {
            if self.probe_target(target).await {
                return true;
            }
        }
        false
    }
}

/// URLs to probe. `localhost` is also tried as `127.0.0.1`, since some hosts
/// resolve the name to `::1` while the server only binds IPv4.
pub fn probe_targets(url: &Url) -> Vec<Url> {
    let mut targets = vec![url.clone()];

    if url.host_str() == Some("localhost") {
        let mut loopback = url.clone();
        if loopback.set_host(Some("127.0.0.1")).is_ok() {
            targets.push(loopback);
        }
    }

    targets
}
