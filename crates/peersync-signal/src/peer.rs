//! Peer connection lifecycle
//!
//! Tracks one negotiated data connection per remote peer. The actual
//! media/transport engine lives behind [`PeerTransport`]; this module
//! owns the state machine around it: offer/answer ordering, the
//! buffer-then-flush rule for early candidates, and the bounded retry
//! budget for failed negotiations.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use peersync_core::domain::connection::ConnectionState;
use peersync_core::domain::newtypes::PeerId;

use crate::SignalError;

/// Failed negotiation attempts tolerated before a connection is marked
/// [`ConnectionState::Failed`]
pub const NEGOTIATION_RETRY_LIMIT: u32 = 2;

/// Which local description a negotiation round produces
#[derive(Debug, Clone, Copy)]
enum NegotiationStep {
    Offer,
    Answer,
}

// ============================================================================
// Transport port
// ============================================================================

/// The underlying peer-to-peer transport engine
///
/// Descriptions and candidates are opaque JSON blobs produced and
/// consumed by the engine; this layer relays them through the signaling
/// channel without inspecting their contents.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Produces a local description to open a connection
    async fn create_offer(&self) -> Result<serde_json::Value, SignalError>;

    /// Produces a local description answering a remote offer
    async fn create_answer(&self) -> Result<serde_json::Value, SignalError>;

    /// Applies the remote side's description
    async fn set_remote_description(
        &self,
        description: &serde_json::Value,
    ) -> Result<(), SignalError>;

    /// Applies one remote connectivity candidate
    async fn add_candidate(&self, candidate: &serde_json::Value) -> Result<(), SignalError>;
}

// ============================================================================
// Connection state machine
// ============================================================================

/// One tracked connection to a remote peer
pub struct PeerConnection<T: PeerTransport> {
    peer_id: PeerId,
    transport: T,
    state: ConnectionState,
    /// Set once the remote description has been applied; candidates
    /// arriving earlier are buffered until then.
    remote_description_set: bool,
    pending_candidates: Vec<serde_json::Value>,
    negotiation_attempts: u32,
}

impl<T: PeerTransport> PeerConnection<T> {
    #[must_use]
    pub fn new(peer_id: PeerId, transport: T) -> Self {
        Self {
            peer_id,
            transport,
            state: ConnectionState::Disconnected,
            remote_description_set: false,
            pending_candidates: Vec::new(),
            negotiation_attempts: 0,
        }
    }

    #[must_use]
    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Candidates held back waiting for the remote description
    #[must_use]
    pub fn buffered_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Starts negotiation as the initiating side
    ///
    /// Moves the connection to `Connecting` and returns the offer to
    /// relay to the remote peer. Transient transport failures are
    /// retried within the budget; exhausting it marks the connection
    /// `Failed`.
    ///
    /// # Errors
    /// Returns `SignalError::Domain` on an illegal state transition and
    /// `SignalError::RetriesExhausted` when the budget runs out.
    pub async fn initiate(&mut self) -> Result<serde_json::Value, SignalError> {
        self.transition(ConnectionState::Connecting)?;
        info!(peer_id = %self.peer_id, "Initiating peer connection");
        self.negotiate(NegotiationStep::Offer).await
    }

    /// Accepts a remote offer as the answering side
    ///
    /// Applies the offer, flushes any buffered candidates, and returns
    /// the answer to relay back.
    ///
    /// # Errors
    /// Same failure modes as [`initiate`](Self::initiate).
    pub async fn accept_offer(
        &mut self,
        offer: &serde_json::Value,
    ) -> Result<serde_json::Value, SignalError> {
        self.transition(ConnectionState::Connecting)?;
        info!(peer_id = %self.peer_id, "Answering peer connection offer");
        self.apply_remote_description(offer).await?;
        self.negotiate(NegotiationStep::Answer).await
    }

    /// Accepts the remote answer on the initiating side
    ///
    /// # Errors
    /// Returns `SignalError::NegotiationFailed` if the description or a
    /// buffered candidate is rejected by the transport.
    pub async fn accept_answer(&mut self, answer: &serde_json::Value) -> Result<(), SignalError> {
        self.apply_remote_description(answer).await
    }

    /// Feeds one remote candidate to the connection
    ///
    /// Candidates arriving before the remote description are buffered
    /// and flushed, in arrival order, once the description is applied.
    ///
    /// # Errors
    /// Returns `SignalError::NegotiationFailed` if the transport rejects
    /// the candidate.
    pub async fn add_remote_candidate(
        &mut self,
        candidate: serde_json::Value,
    ) -> Result<(), SignalError> {
        if !self.remote_description_set {
            debug!(
                peer_id = %self.peer_id,
                buffered = self.pending_candidates.len() + 1,
                "Buffering candidate until remote description arrives"
            );
            self.pending_candidates.push(candidate);
            return Ok(());
        }
        self.transport
            .add_candidate(&candidate)
            .await
            .map_err(|e| self.negotiation_error(&e))
    }

    /// Marks the data channel open
    ///
    /// # Errors
    /// Returns `SignalError::Domain` if the connection was not
    /// negotiating.
    pub fn transport_ready(&mut self) -> Result<(), SignalError> {
        self.transition(ConnectionState::Connected)?;
        info!(peer_id = %self.peer_id, "Peer connection established");
        Ok(())
    }

    /// Marks the connection failed; buffered candidates are dropped
    pub fn mark_failed(&mut self) {
        if self.state.can_transition_to(ConnectionState::Failed) {
            self.state = ConnectionState::Failed;
        }
        self.pending_candidates.clear();
        warn!(peer_id = %self.peer_id, "Peer connection failed");
    }

    /// Closes the connection deliberately; buffered candidates are
    /// dropped
    pub fn close(&mut self) {
        if self.state.can_transition_to(ConnectionState::Closed) {
            self.state = ConnectionState::Closed;
        }
        self.pending_candidates.clear();
        debug!(peer_id = %self.peer_id, "Peer connection closed");
    }

    async fn apply_remote_description(
        &mut self,
        description: &serde_json::Value,
    ) -> Result<(), SignalError> {
        self.transport
            .set_remote_description(description)
            .await
            .map_err(|e| self.negotiation_error(&e))?;
        self.remote_description_set = true;

        let buffered = std::mem::take(&mut self.pending_candidates);
        if !buffered.is_empty() {
            debug!(
                peer_id = %self.peer_id,
                count = buffered.len(),
                "Flushing buffered candidates"
            );
        }
        for candidate in &buffered {
            self.transport
                .add_candidate(candidate)
                .await
                .map_err(|e| self.negotiation_error(&e))?;
        }
        Ok(())
    }

    /// Runs one negotiation step with the retry budget applied
    async fn negotiate(&mut self, step: NegotiationStep) -> Result<serde_json::Value, SignalError> {
        loop {
            let attempt = match step {
                NegotiationStep::Offer => self.transport.create_offer().await,
                NegotiationStep::Answer => self.transport.create_answer().await,
            };
            match attempt {
                Ok(description) => return Ok(description),
                Err(err) => {
                    self.negotiation_attempts += 1;
                    if self.negotiation_attempts > NEGOTIATION_RETRY_LIMIT {
                        self.mark_failed();
                        return Err(SignalError::RetriesExhausted(format!(
                            "{}: {err}",
                            self.peer_id
                        )));
                    }
                    warn!(
                        peer_id = %self.peer_id,
                        attempt = self.negotiation_attempts,
                        error = %err,
                        "Negotiation step failed, retrying"
                    );
                }
            }
        }
    }

    fn negotiation_error(&self, err: &SignalError) -> SignalError {
        SignalError::NegotiationFailed {
            peer_id: self.peer_id.to_string(),
            reason: err.to_string(),
        }
    }

    fn transition(&mut self, to: ConnectionState) -> Result<(), SignalError> {
        self.state = self.state.transition(to)?;
        Ok(())
    }
}

// ============================================================================
// Connection registry
// ============================================================================

/// All tracked peer connections, keyed by peer id
///
/// Connections are held behind async mutexes so negotiation steps for
/// different peers proceed independently.
pub struct PeerConnectionManager<T: PeerTransport> {
    connections: DashMap<PeerId, Arc<Mutex<PeerConnection<T>>>>,
}

impl<T: PeerTransport> PeerConnectionManager<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Returns the connection for `peer_id`, creating it with
    /// `transport` if absent
    pub fn ensure(&self, peer_id: PeerId, transport: T) -> Arc<Mutex<PeerConnection<T>>> {
        self.connections
            .entry(peer_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(PeerConnection::new(peer_id, transport))))
            .clone()
    }

    #[must_use]
    pub fn get(&self, peer_id: &PeerId) -> Option<Arc<Mutex<PeerConnection<T>>>> {
        self.connections.get(peer_id).map(|entry| entry.clone())
    }

    /// Drops the connection for a departed peer, releasing any buffered
    /// candidates with it
    pub fn remove(&self, peer_id: &PeerId) -> Option<Arc<Mutex<PeerConnection<T>>>> {
        self.connections.remove(peer_id).map(|(_, conn)| conn)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Snapshot of every connection's current state
    pub async fn states(&self) -> Vec<(PeerId, ConnectionState)> {
        let mut states = Vec::with_capacity(self.connections.len());
        for entry in &self.connections {
            let state = entry.value().lock().await.state();
            states.push((entry.key().clone(), state));
        }
        states
    }
}

impl<T: PeerTransport> Default for PeerConnectionManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
