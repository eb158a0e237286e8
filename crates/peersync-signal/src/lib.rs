//! PeerSync Signal - Relay signaling and peer connections
//!
//! Provides:
//! - [`probe`] - bounded health probe against the relay's HTTP endpoint
//! - [`warmup`] - the cold-start polling state machine gating connections
//! - [`client`] - the relay control-channel session (roster, heartbeat)
//! - [`peer`] - per-peer negotiation state machines with candidate
//!   buffering
//!
//! ## Flow
//!
//! ```text
//! WarmupMonitor ──ready──▶ SignalingClient ──messages──▶ PeerConnectionManager
//!                               │                              │
//!                          relay roster                 per-peer transport
//! ```

pub mod client;
pub mod peer;
pub mod probe;
pub mod warmup;

use thiserror::Error;

/// Errors that can occur in the signaling layer
#[derive(Debug, Error)]
pub enum SignalError {
    /// The control-channel connection could not be established
    #[error("Failed to connect to relay: {0}")]
    ConnectFailed(String),

    /// The control channel failed mid-session
    #[error("Relay transport error: {0}")]
    Transport(String),

    /// An incoming frame could not be decoded as a signaling message
    ///
    /// Recoverable: the client answers with an `error` envelope and keeps
    /// the link alive.
    #[error("Malformed signaling message: {0}")]
    Malformed(String),

    /// An operation required an active session but none is joined
    #[error("Not joined to a relay session")]
    NotInSession,

    /// Transport negotiation with a peer failed
    #[error("Negotiation with peer {peer_id} failed: {reason}")]
    NegotiationFailed { peer_id: String, reason: String },

    /// The bounded negotiation retry budget is exhausted
    #[error("Negotiation retries exhausted for peer {0}")]
    RetriesExhausted(String),

    /// A domain-level error propagated from peersync-core
    #[error("Domain error: {0}")]
    Domain(#[from] peersync_core::domain::errors::DomainError),
}
