//! Folder sync reconciliation for PeerSync
//!
//! The reconciliation core is pure functions over snapshot sets: no I/O
//! and no network. [`diff`] partitions the two sides, [`planner`] turns
//! a diff into directional actions and folds in conflict resolutions,
//! and [`merge`] produces the post-sync baseline. [`session`] wraps the
//! pure core in the per-config runner that speaks the sync message
//! channel and enforces single-flight cycles.

pub mod diff;
pub mod merge;
pub mod namer;
pub mod planner;
pub mod session;

use peersync_core::domain::errors::DomainError;
use peersync_core::domain::newtypes::ConfigId;
use peersync_transfer::TransferError;
use thiserror::Error;

/// Errors raised by the sync engine
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("no sync config registered with id {0}")]
    UnknownConfig(ConfigId),

    #[error("sync config {0} is deactivated")]
    ConfigInactive(ConfigId),

    #[error("a sync cycle for config {0} is already in flight")]
    SyncInFlight(ConfigId),

    #[error("sync channel failed: {0}")]
    Channel(String),

    #[error("unexpected sync message: {0}")]
    Protocol(String),

    #[error("peer reported sync failure: {0}")]
    Remote(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
