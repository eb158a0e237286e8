//! Wire message types for the relay and peer channels
//!
//! Both channels use closed tagged enums so an unhandled message type is a
//! compile error, not a runtime surprise. JSON encoding is internally
//! tagged on `type` with kebab-case variant names.
//!
//! - [`SignalingMessage`] rides the relay control channel and never
//!   carries file content.
//! - [`SyncMessage`] rides the established peer transport; `sync-file`
//!   payloads carry only transfer metadata, bodies move through the
//!   chunked transfer engine.

use serde::{Deserialize, Serialize};

use super::newtypes::{ConfigId, ContentHash, FileId, PeerId, RelativePath, SessionId, SyncId};
use super::plan::ConflictFile;
use super::snapshot::{FileSnapshot, SyncDirection};

// ============================================================================
// Peer roster entries
// ============================================================================

/// Broad device classification announced alongside a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

/// One entry in the relay session roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub peer_id: PeerId,
    pub peer_name: String,
    pub device_type: DeviceType,
}

// ============================================================================
// Relay control channel
// ============================================================================

/// Wire record for the relay control channel
///
/// Deserializing a message that lacks a required field for its declared
/// type fails in serde; the signaling client answers such input with an
/// [`SignalingMessage::Error`] envelope without tearing the link down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingMessage {
    /// Open a new session (room); the relay replies with `peer-list`
    SessionCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        network_id: Option<String>,
        peer: PeerInfo,
    },
    /// Join an existing session by id
    SessionJoin {
        session_id: SessionId,
        peer: PeerInfo,
    },
    /// Leave the session; relay broadcasts to remaining members
    SessionLeave {
        session_id: SessionId,
        peer_id: PeerId,
    },
    /// Current roster, sent by the relay on create/join
    PeerList {
        session_id: SessionId,
        peers: Vec<PeerInfo>,
    },
    /// A new member joined, broadcast to existing members
    PeerAnnounce {
        session_id: SessionId,
        peer: PeerInfo,
    },
    /// Transport offer from an initiating peer, relayed to `peer_id`
    Offer {
        peer_id: PeerId,
        data: serde_json::Value,
    },
    /// Transport answer from the recipient, relayed back
    Answer {
        peer_id: PeerId,
        data: serde_json::Value,
    },
    /// Asynchronously exchanged transport candidate
    IceCandidate {
        peer_id: PeerId,
        data: serde_json::Value,
    },
    /// Relay- or peer-reported protocol error
    Error { error: String },
    /// Heartbeat request
    Ping,
    /// Heartbeat response
    Pong,
}

impl SignalingMessage {
    /// The peer a directed negotiation message is addressed to, if any
    #[must_use]
    pub fn target_peer(&self) -> Option<&PeerId> {
        match self {
            Self::Offer { peer_id, .. }
            | Self::Answer { peer_id, .. }
            | Self::IceCandidate { peer_id, .. } => Some(peer_id),
            _ => None,
        }
    }
}

// ============================================================================
// Peer sync channel
// ============================================================================

/// Leading metadata for one chunked transfer
///
/// Declared by the sender before the first chunk so the receiver can
/// verify the reassembled artifact against `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMetadata {
    pub file_id: FileId,
    pub file_name: String,
    pub total_bytes: u64,
    pub chunk_size: u64,
    pub hash: ContentHash,
}

/// Envelope for the sync message channel carried over the peer transport
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SyncMessage {
    /// Ask the peer to start a sync cycle for a config
    SyncRequest {
        sync_id: SyncId,
        config_id: ConfigId,
        direction: SyncDirection,
    },
    /// The sender's current folder snapshot
    SyncMetadata {
        sync_id: SyncId,
        config_id: ConfigId,
        snapshot: Vec<FileSnapshot>,
    },
    /// Announces one file body about to move through the transfer engine
    SyncFile {
        sync_id: SyncId,
        config_id: ConfigId,
        metadata: TransferMetadata,
        /// Where the receiver should store the artifact
        target_path: RelativePath,
    },
    /// The cycle finished successfully
    SyncComplete {
        sync_id: SyncId,
        config_id: ConfigId,
        files_transferred: u32,
    },
    /// Conflicts the initiator must resolve before the cycle can finish
    SyncConflict {
        sync_id: SyncId,
        config_id: ConfigId,
        conflicts: Vec<ConflictFile>,
    },
    /// The cycle failed; the session continues
    SyncError {
        sync_id: SyncId,
        config_id: ConfigId,
        reason: String,
    },
}

impl SyncMessage {
    /// The sync cycle this envelope belongs to
    #[must_use]
    pub fn sync_id(&self) -> SyncId {
        match self {
            Self::SyncRequest { sync_id, .. }
            | Self::SyncMetadata { sync_id, .. }
            | Self::SyncFile { sync_id, .. }
            | Self::SyncComplete { sync_id, .. }
            | Self::SyncConflict { sync_id, .. }
            | Self::SyncError { sync_id, .. } => *sync_id,
        }
    }

    /// The config this envelope belongs to
    #[must_use]
    pub fn config_id(&self) -> ConfigId {
        match self {
            Self::SyncRequest { config_id, .. }
            | Self::SyncMetadata { config_id, .. }
            | Self::SyncFile { config_id, .. }
            | Self::SyncComplete { config_id, .. }
            | Self::SyncConflict { config_id, .. }
            | Self::SyncError { config_id, .. } => *config_id,
        }
    }
}

// ============================================================================
// Chunk wire unit
// ============================================================================

/// Ephemeral wire unit of the chunked transfer engine
///
/// Ownership moves from the sender buffer to the transport to the
/// receiver's reassembly buffer; discarded after reassembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkData {
    pub sequence_number: u64,
    pub file_id: FileId,
    #[serde(with = "serde_bytes_base64")]
    pub data: Vec<u8>,
    pub is_last_chunk: bool,
}

/// Base64 codec for chunk payloads in JSON frames
///
/// Binary transports bypass this by sending `ChunkData` fields in a
/// binary framing; JSON framing needs a text-safe encoding.
mod serde_bytes_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Tests
// ============================================================================
