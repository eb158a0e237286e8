//! Relay health probing
//!
//! A single bounded-duration check against `GET {http}/health`. The probe
//! never raises: timeouts, DNS failures, and refused connections all
//! collapse to `false`, giving the warm-up loop a clean boolean signal.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use peersync_core::config::is_local_host;

/// Boolean health check abstraction consumed by the warm-up monitor
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Returns true if the endpoint answered healthily within the bound
    async fn check(&self) -> bool;
}

/// HTTP health prober for the relay's `/health` route
pub struct HttpProber {
    client: reqwest::Client,
    health_url: String,
}

impl HttpProber {
    /// Default per-probe timeout (5 seconds)
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a prober for `health_url` with the default 5 s timeout
    #[must_use]
    pub fn new(health_url: String) -> Self {
        Self::with_timeout(health_url, Self::DEFAULT_TIMEOUT)
    }

    /// Creates a prober with an explicit per-probe timeout
    #[must_use]
    pub fn with_timeout(health_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client, health_url }
    }

    /// The URL this prober targets
    #[must_use]
    pub fn health_url(&self) -> &str {
        &self.health_url
    }
}

#[async_trait]
impl HealthProbe for HttpProber {
    async fn check(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => {
                let healthy = response.status().is_success();
                debug!(url = %self.health_url, status = %response.status(), healthy, "Health probe");
                healthy
            }
            Err(err) => {
                debug!(url = %self.health_url, error = %err, "Health probe failed");
                false
            }
        }
    }
}

/// Pure classification of local/dev endpoints.
///
/// Local endpoints (loopback or private ranges) skip warm-up entirely:
/// a dev relay has no cold start worth polling for.
#[must_use]
pub fn is_local_endpoint(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| is_local_host(h)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_is_local_endpoint() {
        assert!(is_local_endpoint("ws://localhost:3001/ws"));
        assert!(is_local_endpoint("http://127.0.0.1:3001/health"));
        assert!(is_local_endpoint("ws://192.168.1.7:3001/ws"));

        assert!(!is_local_endpoint("wss://sync.example.com/ws"));
        assert!(!is_local_endpoint("not a url"));
    }

    #[tokio::test]
    async fn test_probe_healthy_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let prober = HttpProber::new(format!("{}/health", server.uri()));
        assert!(prober.check().await);
    }

    #[tokio::test]
    async fn test_probe_server_error_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let prober = HttpProber::new(format!("{}/health", server.uri()));
        assert!(!prober.check().await);
    }

    #[tokio::test]
    async fn test_probe_unreachable_is_false_not_error() {
        // Port 9 (discard) is almost certainly refused; either way the
        // probe must return false rather than raise.
        let prober =
            HttpProber::with_timeout("http://127.0.0.1:9/health".to_string(), Duration::from_millis(300));
        assert!(!prober.check().await);
    }

    #[tokio::test]
    async fn test_probe_timeout_is_false() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let prober = HttpProber::with_timeout(
            format!("{}/health", server.uri()),
            Duration::from_millis(100),
        );
        assert!(!prober.check().await);
    }
}
