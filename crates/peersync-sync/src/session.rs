//! Per-config sync session runner
//!
//! Drives one config's sync cycle over the sync message channel: sends
//! `sync-request`, exchanges snapshots via `sync-metadata`, derives the
//! plan, moves file bodies through a [`TransferDriver`], and closes the
//! cycle with `sync-complete`, `sync-conflict`, or `sync-error`.
//!
//! Each config has at most one cycle in flight; a second request while
//! one is `Syncing` is rejected. Distinct configs run fully in
//! parallel. `last_synced_at` advances only after a successful cycle.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{info, warn};

use peersync_core::domain::messages::{SyncMessage, TransferMetadata};
use peersync_core::domain::newtypes::{ConfigId, SyncId};
use peersync_core::domain::plan::{ConflictFile, PlannedTransfer};
use peersync_core::domain::snapshot::{FileSnapshot, SyncConfig, SyncState, SyncStatus};

use crate::diff::compare_snapshots;
use crate::merge::merge_snapshots;
use crate::planner::calculate_sync_plan;
use crate::SyncError;

// ============================================================================
// Ports
// ============================================================================

/// Message-oriented channel carrying [`SyncMessage`] envelopes over the
/// established peer transport
#[async_trait]
pub trait SyncChannel: Send {
    /// Sends one envelope to the peer
    async fn send(&mut self, message: SyncMessage) -> Result<(), SyncError>;

    /// Receives the next envelope; `Ok(None)` means the peer link closed
    async fn recv(&mut self) -> Result<Option<SyncMessage>, SyncError>;
}

/// Moves file bodies for a plan through the chunked transfer engine
#[async_trait]
pub trait TransferDriver: Send {
    /// Reads one planned upload's content and announces it
    async fn describe(&mut self, transfer: &PlannedTransfer)
        -> Result<TransferMetadata, SyncError>;

    /// Streams a described body to the peer
    async fn upload(&mut self, metadata: &TransferMetadata) -> Result<(), SyncError>;

    /// Pulls one planned download's body and stores it under the
    /// transfer's target path
    async fn download(&mut self, transfer: &PlannedTransfer) -> Result<(), SyncError>;
}

/// How one sync cycle ended
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Every planned action ran and the peer acknowledged
    Completed { files_transferred: u32 },
    /// The cycle stopped on unresolved conflicts awaiting the caller
    ConflictsPending(Vec<ConflictFile>),
}

// ============================================================================
// Runner
// ============================================================================

/// Registry of sync configs with their live state, and the cycle driver
pub struct SyncSessionRunner {
    configs: DashMap<ConfigId, SyncConfig>,
    states: DashMap<ConfigId, SyncState>,
}

impl SyncSessionRunner {
    #[must_use]
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
            states: DashMap::new(),
        }
    }

    /// Adds a sync relationship and its initial state
    pub fn register(&self, config: SyncConfig) {
        self.states.insert(config.id, SyncState::new(config.id));
        self.configs.insert(config.id, config);
    }

    /// Removes a sync relationship and its state
    pub fn deregister(&self, config_id: ConfigId) {
        self.configs.remove(&config_id);
        self.states.remove(&config_id);
    }

    #[must_use]
    pub fn config(&self, config_id: ConfigId) -> Option<SyncConfig> {
        self.configs.get(&config_id).map(|c| c.clone())
    }

    #[must_use]
    pub fn state(&self, config_id: ConfigId) -> Option<SyncState> {
        self.states.get(&config_id).map(|s| s.clone())
    }

    /// Runs one sync cycle for `config_id` as the initiating side
    ///
    /// # Errors
    /// Rejects unknown or deactivated configs and configs already
    /// syncing; propagates channel, protocol, and transfer failures
    /// after recording them in the config's [`SyncState`].
    #[tracing::instrument(skip(self, local_snapshot, channel, driver), fields(config_id = %config_id))]
    pub async fn run_cycle<C, D>(
        &self,
        config_id: ConfigId,
        local_snapshot: Vec<FileSnapshot>,
        channel: &mut C,
        driver: &mut D,
    ) -> Result<CycleOutcome, SyncError>
    where
        C: SyncChannel,
        D: TransferDriver,
    {
        let config = self
            .config(config_id)
            .ok_or(SyncError::UnknownConfig(config_id))?;
        if !config.is_active {
            return Err(SyncError::ConfigInactive(config_id));
        }
        self.begin(config_id)?;

        let result = self
            .drive(&config, &local_snapshot, channel, driver)
            .await;
        self.settle(config_id, &local_snapshot, &result);
        result
    }

    /// Answers one peer-initiated envelope as the responding side
    ///
    /// A `sync-request` for a known active config is answered with the
    /// responder's snapshot; anything else is rejected with a
    /// `sync-error` envelope and the session continues.
    ///
    /// # Errors
    /// Propagates channel failures only.
    pub async fn answer_request<C: SyncChannel>(
        &self,
        message: SyncMessage,
        local_snapshot: Vec<FileSnapshot>,
        channel: &mut C,
    ) -> Result<(), SyncError> {
        let sync_id = message.sync_id();
        let config_id = message.config_id();

        let rejection = match &message {
            SyncMessage::SyncRequest { .. } => match self.config(config_id) {
                Some(config) if config.is_active => None,
                Some(_) => Some(format!("config {config_id} is deactivated")),
                None => Some(format!("unknown config {config_id}")),
            },
            other => Some(format!(
                "expected sync-request, got {}",
                envelope_name(other)
            )),
        };

        match rejection {
            Some(reason) => {
                warn!(%config_id, %reason, "Rejecting sync envelope");
                channel
                    .send(SyncMessage::SyncError {
                        sync_id,
                        config_id,
                        reason,
                    })
                    .await
            }
            None => {
                info!(%config_id, files = local_snapshot.len(), "Answering sync request");
                channel
                    .send(SyncMessage::SyncMetadata {
                        sync_id,
                        config_id,
                        snapshot: local_snapshot,
                    })
                    .await
            }
        }
    }

    async fn drive<C, D>(
        &self,
        config: &SyncConfig,
        local_snapshot: &[FileSnapshot],
        channel: &mut C,
        driver: &mut D,
    ) -> Result<CycleOutcome, SyncError>
    where
        C: SyncChannel,
        D: TransferDriver,
    {
        let sync_id = SyncId::new();
        let config_id = config.id;

        channel
            .send(SyncMessage::SyncRequest {
                sync_id,
                config_id,
                direction: config.direction,
            })
            .await?;

        let remote_snapshot = match channel.recv().await? {
            Some(SyncMessage::SyncMetadata {
                sync_id: got,
                snapshot,
                ..
            }) if got == sync_id => snapshot,
            Some(SyncMessage::SyncError { reason, .. }) => {
                return Err(SyncError::Remote(reason));
            }
            Some(other) => {
                let reason = format!("expected sync-metadata, got {}", envelope_name(&other));
                channel
                    .send(SyncMessage::SyncError {
                        sync_id,
                        config_id,
                        reason: reason.clone(),
                    })
                    .await?;
                return Err(SyncError::Protocol(reason));
            }
            None => return Err(SyncError::Channel("peer link closed".to_string())),
        };

        let diff = compare_snapshots(local_snapshot, &remote_snapshot);
        let plan = calculate_sync_plan(&diff, config.direction);

        if !plan.conflicts.is_empty() {
            info!(
                %config_id,
                conflicts = plan.conflicts.len(),
                "Sync cycle stopped on conflicts"
            );
            channel
                .send(SyncMessage::SyncConflict {
                    sync_id,
                    config_id,
                    conflicts: plan.conflicts.clone(),
                })
                .await?;
            return Ok(CycleOutcome::ConflictsPending(plan.conflicts));
        }

        let mut files_transferred = 0u32;
        for transfer in &plan.upload {
            let metadata = driver.describe(transfer).await?;
            channel
                .send(SyncMessage::SyncFile {
                    sync_id,
                    config_id,
                    metadata: metadata.clone(),
                    target_path: transfer.target_path.clone(),
                })
                .await?;
            driver.upload(&metadata).await?;
            files_transferred += 1;
        }
        for transfer in &plan.download {
            driver.download(transfer).await?;
            files_transferred += 1;
        }

        channel
            .send(SyncMessage::SyncComplete {
                sync_id,
                config_id,
                files_transferred,
            })
            .await?;

        info!(%config_id, files_transferred, "Sync cycle complete");
        Ok(CycleOutcome::Completed { files_transferred })
    }

    /// Marks a config `Syncing`, enforcing single flight
    fn begin(&self, config_id: ConfigId) -> Result<(), SyncError> {
        let mut state = self
            .states
            .entry(config_id)
            .or_insert_with(|| SyncState::new(config_id));
        if state.status == SyncStatus::Syncing {
            return Err(SyncError::SyncInFlight(config_id));
        }
        state.status = SyncStatus::Syncing;
        state.error = None;
        Ok(())
    }

    /// Folds a finished cycle's outcome back into config and state
    fn settle(
        &self,
        config_id: ConfigId,
        local_snapshot: &[FileSnapshot],
        result: &Result<CycleOutcome, SyncError>,
    ) {
        let now = Utc::now();

        if let Some(mut state) = self.states.get_mut(&config_id) {
            state.last_checked_at = now;
            match result {
                Ok(CycleOutcome::Completed { .. }) => {
                    state.status = SyncStatus::Synced;
                    state.pending_changes = 0;
                    state.error = None;
                    // Both sides now hold the merged baseline
                    let baseline = merge_snapshots(local_snapshot, &state.remote_snapshot);
                    state.local_snapshot = baseline.clone();
                    state.remote_snapshot = baseline;
                }
                Ok(CycleOutcome::ConflictsPending(conflicts)) => {
                    state.status = SyncStatus::Conflict;
                    state.pending_changes = conflicts.len() as u32;
                    state.local_snapshot = local_snapshot.to_vec();
                }
                Err(SyncError::Channel(reason)) => {
                    state.status = SyncStatus::Offline;
                    state.error = Some(reason.clone());
                }
                Err(err) => {
                    state.status = SyncStatus::Error;
                    state.error = Some(err.to_string());
                }
            }
        }

        if matches!(result, Ok(CycleOutcome::Completed { .. })) {
            if let Some(mut config) = self.configs.get_mut(&config_id) {
                config.record_sync(now);
            }
        }
    }
}

impl Default for SyncSessionRunner {
    fn default() -> Self {
        Self::new()
    }
}

fn envelope_name(message: &SyncMessage) -> &'static str {
    match message {
        SyncMessage::SyncRequest { .. } => "sync-request",
        SyncMessage::SyncMetadata { .. } => "sync-metadata",
        SyncMessage::SyncFile { .. } => "sync-file",
        SyncMessage::SyncComplete { .. } => "sync-complete",
        SyncMessage::SyncConflict { .. } => "sync-conflict",
        SyncMessage::SyncError { .. } => "sync-error",
    }
}

// ============================================================================
// Tests
// ============================================================================
