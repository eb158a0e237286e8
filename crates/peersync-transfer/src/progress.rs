//! Transfer progress reporting
//!
//! Tracks per-file byte counts and derives a smoothed throughput from a
//! trailing window of samples, so a single slow chunk does not whipsaw
//! the displayed rate or the time estimate.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use peersync_core::config::TransferConfig;
use peersync_core::domain::messages::TransferMetadata;
use peersync_core::domain::newtypes::FileId;

/// Lifecycle phase of one file transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Metadata announced, no bytes moved yet
    Preparing,
    /// Chunks are flowing
    Transferring,
    /// All bytes arrived, digest check in progress
    Verifying,
    /// Verified and delivered
    Complete,
    /// Failed; partial content was discarded
    Error,
    /// Cancelled by the user; partial content was discarded
    Cancelled,
}

impl TransferPhase {
    /// Whether the transfer can make no further progress
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error | Self::Cancelled)
    }
}

/// Point-in-time progress report for one file
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    pub file_id: FileId,
    pub file_name: String,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    pub phase: TransferPhase,
    pub bytes_per_second: f64,
    /// Estimated time remaining; `None` while the rate is unknown or
    /// the transfer is terminal
    pub eta: Option<Duration>,
}

/// Accumulates byte counts and rate samples for one transfer
pub struct ProgressTracker {
    file_id: FileId,
    file_name: String,
    total_bytes: u64,
    transferred: u64,
    phase: TransferPhase,
    /// Cumulative byte counts stamped at sample time, newest last
    samples: VecDeque<(Instant, u64)>,
    window: usize,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(metadata: &TransferMetadata, window: usize) -> Self {
        let mut samples = VecDeque::with_capacity(window.max(2));
        samples.push_back((Instant::now(), 0));
        Self {
            file_id: metadata.file_id,
            file_name: metadata.file_name.clone(),
            total_bytes: metadata.total_bytes,
            transferred: 0,
            phase: TransferPhase::Preparing,
            samples,
            window: window.max(2),
        }
    }

    #[must_use]
    pub fn from_config(metadata: &TransferMetadata, config: &TransferConfig) -> Self {
        Self::new(metadata, config.speed_window)
    }

    /// Records `bytes` more transferred content
    pub fn record(&mut self, bytes: u64) {
        self.transferred += bytes;
        self.phase = TransferPhase::Transferring;
        self.samples.push_back((Instant::now(), self.transferred));
        while self.samples.len() > self.window {
            self.samples.pop_front();
        }
    }

    pub fn verifying(&mut self) {
        self.phase = TransferPhase::Verifying;
    }

    pub fn complete(&mut self) {
        self.phase = TransferPhase::Complete;
        self.transferred = self.total_bytes;
    }

    pub fn fail(&mut self) {
        self.phase = TransferPhase::Error;
    }

    pub fn cancel(&mut self) {
        self.phase = TransferPhase::Cancelled;
    }

    #[must_use]
    pub fn phase(&self) -> TransferPhase {
        self.phase
    }

    /// Throughput over the trailing sample window, zero until two
    /// samples exist
    #[must_use]
    pub fn bytes_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        let elapsed = last.0.duration_since(first.0).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        (last.1 - first.1) as f64 / elapsed
    }

    /// Completion percentage in `[0, 100]`
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            if self.phase == TransferPhase::Complete {
                100.0
            } else {
                0.0
            }
        } else {
            (self.transferred as f64 / self.total_bytes as f64) * 100.0
        }
    }

    /// Estimated remaining time, `None` while the rate is unknown
    #[must_use]
    pub fn eta(&self) -> Option<Duration> {
        if self.phase.is_terminal() {
            return None;
        }
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        let remaining = self.total_bytes.saturating_sub(self.transferred);
        Some(Duration::from_secs_f64(remaining as f64 / speed))
    }

    #[must_use]
    pub fn snapshot(&self) -> TransferProgress {
        TransferProgress {
            file_id: self.file_id,
            file_name: self.file_name.clone(),
            total_bytes: self.total_bytes,
            transferred_bytes: self.transferred,
            phase: self.phase,
            bytes_per_second: self.bytes_per_second(),
            eta: self.eta(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peersync_core::domain::newtypes::ContentHash;

    fn metadata(total_bytes: u64) -> TransferMetadata {
        TransferMetadata {
            file_id: FileId::new(),
            file_name: "video.mp4".to_string(),
            total_bytes,
            chunk_size: 4,
            hash: ContentHash::new("a".repeat(64)).unwrap(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_is_zero_before_any_transfer() {
        let tracker = ProgressTracker::new(&metadata(100), 8);
        assert_eq!(tracker.bytes_per_second(), 0.0);
        assert_eq!(tracker.eta(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_and_eta_from_steady_transfer() {
        let mut tracker = ProgressTracker::new(&metadata(100), 8);

        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(1)).await;
            tracker.record(10);
        }

        // 40 bytes over 4 seconds
        assert!((tracker.bytes_per_second() - 10.0).abs() < 0.01);
        // 60 bytes remaining at 10 B/s
        let eta = tracker.eta().unwrap();
        assert!((eta.as_secs_f64() - 6.0).abs() < 0.01);
        assert!((tracker.percent() - 40.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trailing_window_discards_stale_samples() {
        let mut tracker = ProgressTracker::new(&metadata(1000), 3);

        // A slow first second followed by a fast burst; the window only
        // sees the recent rate.
        tokio::time::advance(Duration::from_secs(10)).await;
        tracker.record(1);
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(1)).await;
            tracker.record(100);
        }

        // Window holds the last 3 samples: 200 bytes over 2 seconds.
        assert!((tracker.bytes_per_second() - 100.0).abs() < 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_phases_have_no_eta() {
        let mut tracker = ProgressTracker::new(&metadata(100), 8);
        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.record(10);
        assert!(tracker.eta().is_some());

        tracker.fail();
        assert_eq!(tracker.phase(), TransferPhase::Error);
        assert_eq!(tracker.eta(), None);

        tracker.cancel();
        assert_eq!(tracker.eta(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_pins_progress_to_total() {
        let mut tracker = ProgressTracker::new(&metadata(100), 8);
        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.record(60);

        tracker.verifying();
        assert_eq!(tracker.phase(), TransferPhase::Verifying);

        tracker.complete();
        assert_eq!(tracker.phase(), TransferPhase::Complete);
        assert!((tracker.percent() - 100.0).abs() < f64::EPSILON);
        assert!(tracker.phase().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_byte_file_reports_complete_only_when_done() {
        let mut tracker = ProgressTracker::new(&metadata(0), 8);
        assert_eq!(tracker.percent(), 0.0);
        tracker.complete();
        assert_eq!(tracker.percent(), 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_reflects_current_state() {
        let mut tracker = ProgressTracker::new(&metadata(100), 8);
        tokio::time::advance(Duration::from_secs(2)).await;
        tracker.record(50);

        let snap = tracker.snapshot();
        assert_eq!(snap.transferred_bytes, 50);
        assert_eq!(snap.total_bytes, 100);
        assert_eq!(snap.phase, TransferPhase::Transferring);
        assert_eq!(snap.file_name, "video.mp4");
    }
}
