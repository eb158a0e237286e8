//! Chunked file transfer for PeerSync
//!
//! Files move between peers as ordered [`ChunkData`] frames over an
//! established peer connection. The sender side splits content and
//! announces it with a [`TransferMetadata`] record; the receiver side
//! reassembles frames that may arrive out of order, verifies the result
//! against the announced digest, and tracks progress for the UI layer.
//!
//! [`ChunkData`]: peersync_core::domain::messages::ChunkData
//! [`TransferMetadata`]: peersync_core::domain::messages::TransferMetadata

pub mod progress;
pub mod receiver;
pub mod sender;

use peersync_core::domain::newtypes::{ContentHash, FileId};
use thiserror::Error;

/// Errors raised by the transfer engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("chunk for file {got} arrived on transfer of file {expected}")]
    UnexpectedFile { expected: FileId, got: FileId },

    #[error("chunk {sequence} arrived after the final chunk")]
    ChunkAfterFinal { sequence: u64 },

    #[error("reassembled size {actual} does not match announced size {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("content digest mismatch: expected {expected}, computed {actual}")]
    IntegrityMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    #[error("transfer of file {0} cancelled")]
    Cancelled(FileId),

    #[error("no incoming transfer registered for file {0}")]
    UnknownTransfer(FileId),

    #[error("transfer of file {0} already registered")]
    AlreadyRegistered(FileId),

    #[error("chunk sink failed: {0}")]
    Sink(String),
}
