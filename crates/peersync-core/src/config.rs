//! Configuration module for PeerSync.
//!
//! Provides typed configuration structs with defaults and validation, plus
//! the endpoint derivation rules for the relay control channel and its
//! health probe.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Environment variable overriding the derived signaling endpoint.
pub const SIGNALING_URL_ENV: &str = "PEERSYNC_SIGNALING_URL";

/// Fixed port of the local development relay.
const DEV_SIGNALING_PORT: u16 = 3001;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for PeerSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub transfer: TransferConfig,
    pub warmup: WarmupConfig,
    pub heartbeat: HeartbeatConfig,
    pub conflicts: ConflictsConfig,
    pub logging: LoggingConfig,
}

/// Chunked transfer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Size of each transfer chunk (in KiB).
    pub chunk_size_kib: u64,
    /// Number of recent chunk timings used to smooth the speed estimate.
    pub speed_window: usize,
}

/// Relay warm-up probing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmupConfig {
    /// Per-probe timeout in milliseconds.
    pub probe_timeout_ms: u64,
    /// A first response faster than this means the relay is already warm.
    pub warm_threshold_ms: u64,
    /// Interval between re-probes while warming, in milliseconds.
    pub reprobe_interval_ms: u64,
    /// Total warm-up budget before giving up, in milliseconds.
    pub total_budget_ms: u64,
}

/// Relay heartbeat settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Seconds between ping messages.
    pub interval_secs: u64,
    /// Consecutive missed pongs before the relay link counts as dead.
    pub missed_limit: u32,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictsConfig {
    /// Default conflict strategy: `manual`, `local`, `remote`, or `both`.
    pub default_strategy: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_kib: 1024, // 1 MiB
            speed_window: 8,
        }
    }
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            probe_timeout_ms: 5_000,
            warm_threshold_ms: 2_000,
            reprobe_interval_ms: 3_000,
            total_budget_ms: 90_000,
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            missed_limit: 3,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "manual".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"warmup.total_budget_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.default_strategy`.
const VALID_CONFLICT_STRATEGIES: &[&str] = &["manual", "local", "remote", "both"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.transfer.chunk_size_kib == 0 {
            errors.push(ValidationError {
                field: "transfer.chunk_size_kib".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.transfer.speed_window == 0 {
            errors.push(ValidationError {
                field: "transfer.speed_window".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.warmup.warm_threshold_ms > self.warmup.probe_timeout_ms {
            errors.push(ValidationError {
                field: "warmup.warm_threshold_ms".into(),
                message: "must not exceed probe_timeout_ms".into(),
            });
        }
        if self.warmup.total_budget_ms < self.warmup.reprobe_interval_ms {
            errors.push(ValidationError {
                field: "warmup.total_budget_ms".into(),
                message: "must cover at least one re-probe interval".into(),
            });
        }

        if self.heartbeat.interval_secs == 0 {
            errors.push(ValidationError {
                field: "heartbeat.interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.heartbeat.missed_limit == 0 {
            errors.push(ValidationError {
                field: "heartbeat.missed_limit".into(),
                message: "must be greater than 0".into(),
            });
        }

        if !VALID_CONFLICT_STRATEGIES.contains(&self.conflicts.default_strategy.as_str()) {
            errors.push(ValidationError {
                field: "conflicts.default_strategy".into(),
                message: format!("must be one of {VALID_CONFLICT_STRATEGIES:?}"),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!("must be one of {VALID_LOG_LEVELS:?}"),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// Endpoint derivation
// ---------------------------------------------------------------------------

/// Resolved relay endpoints: the control-channel URL and the HTTP health
/// URL derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Control-channel URL (`ws://` or `wss://`).
    pub signaling_url: String,
    /// Scheme-mirrored HTTP form of the control-channel URL, targeting
    /// the `/health` route.
    pub health_url: String,
}

impl Endpoints {
    /// Resolve the relay endpoints for `host`.
    ///
    /// Precedence:
    /// 1. `PEERSYNC_SIGNALING_URL` environment override
    /// 2. loopback/private host -> local dev relay on port 3001, plain `ws://`
    /// 3. production -> same host, `wss://`, no explicit port (reverse
    ///    proxy assumed)
    ///
    /// # Errors
    /// Returns an error if an override URL is present but unparseable.
    pub fn resolve(host: &str) -> anyhow::Result<Self> {
        if let Ok(override_url) = std::env::var(SIGNALING_URL_ENV) {
            let health_url = derive_health_url(&override_url)?;
            return Ok(Self {
                signaling_url: override_url,
                health_url,
            });
        }

        let signaling_url = if is_local_host(host) {
            format!("ws://{host}:{DEV_SIGNALING_PORT}/ws")
        } else {
            format!("wss://{host}/ws")
        };
        let health_url = derive_health_url(&signaling_url)?;

        Ok(Self {
            signaling_url,
            health_url,
        })
    }
}

/// Derive the HTTP health URL from a control-channel URL.
///
/// Mirrors the scheme (`wss` -> `https`, `ws` -> `http`) and replaces the
/// path with `/health`.
///
/// # Errors
/// Returns an error for unparseable URLs or non-websocket schemes.
pub fn derive_health_url(signaling_url: &str) -> anyhow::Result<String> {
    let mut url = Url::parse(signaling_url)?;

    let scheme = match url.scheme() {
        "ws" => "http",
        "wss" => "https",
        other => anyhow::bail!("unexpected signaling scheme: {other}"),
    };
    url.set_scheme(scheme)
        .map_err(|()| anyhow::anyhow!("cannot map scheme for {signaling_url}"))?;
    url.set_path("/health");

    Ok(url.to_string())
}

/// Pure hostname classification: loopback or RFC 1918 private ranges.
///
/// Used both to pick the dev relay endpoint and to skip warm-up entirely
/// for local endpoints.
#[must_use]
pub fn is_local_host(host: &str) -> bool {
    if host == "localhost" || host == "127.0.0.1" || host == "::1" || host == "[::1]" {
        return true;
    }

    // Private IPv4 ranges: 10/8, 172.16/12, 192.168/16
    let octets: Vec<u8> = host
        .split('.')
        .filter_map(|part| part.parse().ok())
        .collect();
    if octets.len() != 4 {
        return false;
    }

    match octets[0] {
        10 => true,
        127 => true,
        172 => (16..=31).contains(&octets[1]),
        192 => octets[1] == 168,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let mut config = Config::default();
        config.transfer.chunk_size_kib = 0;
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "transfer.chunk_size_kib");
    }

    #[test]
    fn test_validate_rejects_bad_strategy_and_level() {
        let mut config = Config::default();
        config.conflicts.default_strategy = "newest".to_string();
        config.logging.level = "verbose".to_string();
        assert_eq!(config.validate().len(), 2);
    }

    #[test]
    fn test_validate_warm_threshold_bound() {
        let mut config = Config::default();
        config.warmup.warm_threshold_ms = 10_000;
        config.warmup.probe_timeout_ms = 5_000;
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_is_local_host() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_host("10.0.0.5"));
        assert!(is_local_host("172.16.4.1"));
        assert!(is_local_host("172.31.255.1"));
        assert!(is_local_host("192.168.1.20"));

        assert!(!is_local_host("172.32.0.1"));
        assert!(!is_local_host("8.8.8.8"));
        assert!(!is_local_host("example.com"));
    }

    #[test]
    fn test_derive_health_url_mirrors_scheme() {
        assert_eq!(
            derive_health_url("wss://sync.example.com/ws").unwrap(),
            "https://sync.example.com/health"
        );
        assert_eq!(
            derive_health_url("ws://192.168.1.5:3001/ws").unwrap(),
            "http://192.168.1.5:3001/health"
        );
    }

    #[test]
    fn test_derive_health_url_rejects_http() {
        assert!(derive_health_url("https://example.com/ws").is_err());
    }

    #[test]
    fn test_resolve_local_host_uses_dev_port() {
        // Endpoint resolution reads the env override, so only run the
        // derived branches when the override is absent.
        if std::env::var(SIGNALING_URL_ENV).is_ok() {
            return;
        }

        let endpoints = Endpoints::resolve("192.168.1.5").unwrap();
        assert_eq!(endpoints.signaling_url, "ws://192.168.1.5:3001/ws");
        assert_eq!(endpoints.health_url, "http://192.168.1.5:3001/health");
    }

    #[test]
    fn test_resolve_production_host() {
        if std::env::var(SIGNALING_URL_ENV).is_ok() {
            return;
        }

        let endpoints = Endpoints::resolve("sync.example.com").unwrap();
        assert_eq!(endpoints.signaling_url, "wss://sync.example.com/ws");
        assert_eq!(endpoints.health_url, "https://sync.example.com/health");
    }
}
