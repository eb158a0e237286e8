//! Relay warm-up state machine
//!
//! Free-tier relay hosts spin down when idle, so the first connection of
//! the day can take tens of seconds. The [`WarmupMonitor`] polls the
//! health endpoint until the relay answers promptly, giving the
//! connection layer a deterministic go/no-go signal before it attempts
//! the real session.
//!
//! State machine: `Idle -> Checking -> {Warming | Ready | Timeout}`.
//! A first probe answering under the warm threshold goes straight to
//! `Ready` (the relay was already warm, no warming overlay needed);
//! otherwise the monitor re-probes on an interval until success or until
//! the total budget elapses (`Timeout`). Cancellation returns to `Idle`.
//! A monitor built with [`WarmupMonitor::for_endpoint`] reports `Ready`
//! immediately for loopback and private-range endpoints, without probing.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use peersync_core::config::WarmupConfig;

use crate::probe::{is_local_endpoint, HealthProbe};

/// Observable phase of the warm-up flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupState {
    /// Not started, or cancelled
    Idle,
    /// First probe in flight
    Checking,
    /// Relay is cold; polling until it answers
    Warming,
    /// Relay answered promptly; safe to connect
    Ready,
    /// Budget exhausted without a healthy answer
    Timeout,
}

/// Polls a [`HealthProbe`] until the relay is warm
///
/// State changes are published over a `watch` channel so UI layers can
/// render the warming overlay; [`run`](WarmupMonitor::run) also returns
/// the terminal state for callers that just await the outcome.
pub struct WarmupMonitor {
    probe: Arc<dyn HealthProbe>,
    config: WarmupConfig,
    /// Relay endpoint, when known; local endpoints skip warm-up
    endpoint: Option<String>,
    state_tx: watch::Sender<WarmupState>,
    cancel: CancellationToken,
}

impl WarmupMonitor {
    /// Creates a monitor and the receiver observing its state
    #[must_use]
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        config: WarmupConfig,
    ) -> (Self, watch::Receiver<WarmupState>) {
        let (state_tx, state_rx) = watch::channel(WarmupState::Idle);
        let monitor = Self {
            probe,
            config,
            endpoint: None,
            state_tx,
            cancel: CancellationToken::new(),
        };
        (monitor, state_rx)
    }

    /// Creates a monitor that knows which relay endpoint it is warming
    ///
    /// A loopback or private-range endpoint reports `Ready` without
    /// probing; a dev relay has no cold start worth polling for.
    #[must_use]
    pub fn for_endpoint(
        endpoint: &str,
        probe: Arc<dyn HealthProbe>,
        config: WarmupConfig,
    ) -> (Self, watch::Receiver<WarmupState>) {
        let (mut monitor, state_rx) = Self::new(probe, config);
        monitor.endpoint = Some(endpoint.to_string());
        (monitor, state_rx)
    }

    /// Token that cancels the warm-up loop at its next suspension point
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the warm-up flow to a terminal state
    ///
    /// Returns `Ready`, `Timeout`, or `Idle` (cancelled). The monitor is
    /// consumed; a new connection attempt starts a new monitor.
    pub async fn run(self) -> WarmupState {
        if let Some(endpoint) = self.endpoint.as_deref() {
            if is_local_endpoint(endpoint) {
                info!(endpoint, "Local relay endpoint, skipping warm-up");
                return self.finish(WarmupState::Ready);
            }
        }

        let warm_threshold = Duration::from_millis(self.config.warm_threshold_ms);
        let reprobe_interval = Duration::from_millis(self.config.reprobe_interval_ms);
        let total_budget = Duration::from_millis(self.config.total_budget_ms);

        let started = Instant::now();
        self.set_state(WarmupState::Checking);

        // First probe: a prompt answer means the relay was already warm
        // and the warming overlay can be skipped entirely.
        let first_sent = Instant::now();
        let healthy = tokio::select! {
            healthy = self.probe.check() => healthy,
            () = self.cancel.cancelled() => return self.finish(WarmupState::Idle),
        };
        let first_latency = first_sent.elapsed();

        if healthy && first_latency < warm_threshold {
            info!(latency_ms = first_latency.as_millis() as u64, "Relay already warm");
            return self.finish(WarmupState::Ready);
        }

        info!(
            healthy,
            latency_ms = first_latency.as_millis() as u64,
            "Relay cold, entering warm-up polling"
        );
        self.set_state(WarmupState::Warming);

        loop {
            if started.elapsed() >= total_budget {
                warn!(
                    budget_ms = self.config.total_budget_ms,
                    "Warm-up budget exhausted"
                );
                return self.finish(WarmupState::Timeout);
            }

            tokio::select! {
                () = tokio::time::sleep(reprobe_interval) => {}
                () = self.cancel.cancelled() => return self.finish(WarmupState::Idle),
            }

            let healthy = tokio::select! {
                healthy = self.probe.check() => healthy,
                () = self.cancel.cancelled() => return self.finish(WarmupState::Idle),
            };

            if healthy {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Relay warmed up"
                );
                return self.finish(WarmupState::Ready);
            }

            debug!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Relay still cold"
            );
        }
    }

    fn set_state(&self, state: WarmupState) {
        // Receivers may all be dropped; the run loop still completes.
        let _ = self.state_tx.send(state);
    }

    fn finish(self, state: WarmupState) -> WarmupState {
        self.set_state(state);
        state
    }
}
