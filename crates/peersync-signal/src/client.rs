//! Relay control-channel client
//!
//! Maintains one persistent session with the relay: joins or creates a
//! room, keeps the peer roster current, exchanges negotiation messages on
//! behalf of the peer layer, and runs the ping/pong heartbeat that
//! detects a dead relay link independently of any peer transport.
//!
//! The client is a single task owning the transport; callers talk to it
//! through a [`SignalingHandle`] (outbound channel) and observe it
//! through [`SignalingEvent`]s (inbound channel). Roster reads go through
//! a shared map that is swapped atomically on each `peer-list`, so no
//! reader ever observes a half-applied update.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use peersync_core::config::HeartbeatConfig;
use peersync_core::domain::messages::{PeerInfo, SignalingMessage};
use peersync_core::domain::newtypes::{PeerId, SessionId};

use crate::SignalError;

/// Depth of the outbound and event channels
const CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Transport port
// ============================================================================

/// Message-oriented transport carrying [`SignalingMessage`]s
///
/// The production implementation is a websocket
/// ([`WsSignalingTransport`]); tests drive the client over in-memory
/// channels.
#[async_trait]
pub trait SignalingTransport: Send {
    /// Sends one message to the relay
    async fn send(&mut self, message: SignalingMessage) -> Result<(), SignalError>;

    /// Receives the next message
    ///
    /// `Ok(None)` means the link closed. `Err(SignalError::Malformed)` is
    /// recoverable: the frame could not be decoded but the link is alive.
    async fn recv(&mut self) -> Result<Option<SignalingMessage>, SignalError>;
}

/// Websocket transport over tokio-tungstenite, JSON text frames
pub struct WsSignalingTransport {
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

impl WsSignalingTransport {
    /// Connects to the relay control channel at `url` (`ws://`/`wss://`)
    ///
    /// # Errors
    /// Returns `SignalError::ConnectFailed` if the websocket handshake
    /// fails.
    pub async fn connect(url: &str) -> Result<Self, SignalError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| SignalError::ConnectFailed(e.to_string()))?;
        info!(%url, "Connected to relay");
        Ok(Self { stream })
    }
}

#[async_trait]
impl SignalingTransport for WsSignalingTransport {
    async fn send(&mut self, message: SignalingMessage) -> Result<(), SignalError> {
        use futures_util::SinkExt;

        let json = serde_json::to_string(&message)
            .map_err(|e| SignalError::Transport(format!("encode failed: {e}")))?;
        self.stream
            .send(tokio_tungstenite::tungstenite::Message::Text(json.into()))
            .await
            .map_err(|e| SignalError::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<SignalingMessage>, SignalError> {
        use futures_util::StreamExt;
        use tokio_tungstenite::tungstenite::Message;

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map(Some)
                        .map_err(|e| SignalError::Malformed(e.to_string()));
                }
                // Websocket-level control frames are handled by tungstenite
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(SignalError::Transport(e.to_string())),
            }
        }
    }
}

// ============================================================================
// Events and handle
// ============================================================================

/// What the client wants the relay to do on startup
#[derive(Debug, Clone)]
pub enum SessionIntent {
    /// Open a new room; the relay assigns a session id
    Create { network_id: Option<String> },
    /// Join an existing room by id
    Join(SessionId),
}

/// Notifications emitted by the client task
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// The relay acknowledged the session with the current roster
    SessionJoined {
        session_id: SessionId,
        peers: Vec<PeerInfo>,
    },
    /// A new member appeared in the session
    PeerJoined(PeerInfo),
    /// A member left the session
    PeerLeft(PeerId),
    /// A transport offer arrived; `from` is the sending peer
    OfferReceived { from: PeerId, data: serde_json::Value },
    /// A transport answer arrived
    AnswerReceived { from: PeerId, data: serde_json::Value },
    /// A transport candidate arrived
    CandidateReceived { from: PeerId, data: serde_json::Value },
    /// The relay reported a protocol error
    RelayError(String),
    /// The relay link died (closed, failed, or heartbeat missed)
    RelayDisconnected,
}

/// Caller-side handle to a running [`SignalingClient`] task
#[derive(Clone)]
pub struct SignalingHandle {
    outbound_tx: mpsc::Sender<SignalingMessage>,
    roster: Arc<RwLock<HashMap<PeerId, PeerInfo>>>,
    cancel: CancellationToken,
}

impl SignalingHandle {
    /// Queues one message for the relay
    ///
    /// # Errors
    /// Returns `SignalError::Transport` if the client task has exited.
    pub async fn send(&self, message: SignalingMessage) -> Result<(), SignalError> {
        self.outbound_tx
            .send(message)
            .await
            .map_err(|_| SignalError::Transport("signaling task stopped".to_string()))
    }

    /// Atomic snapshot of the current roster
    #[must_use]
    pub fn peers(&self) -> Vec<PeerInfo> {
        self.roster
            .read()
            .map(|roster| roster.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Signals the client task to leave the session and stop
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Client task
// ============================================================================

/// The relay session task
///
/// Owns the transport; consumed by [`run`](SignalingClient::run).
pub struct SignalingClient<T: SignalingTransport> {
    transport: T,
    local_peer: PeerInfo,
    intent: SessionIntent,
    heartbeat: HeartbeatConfig,
    session_id: Option<SessionId>,
    roster: Arc<RwLock<HashMap<PeerId, PeerInfo>>>,
    outbound_rx: mpsc::Receiver<SignalingMessage>,
    events_tx: mpsc::Sender<SignalingEvent>,
    cancel: CancellationToken,
    /// Pings sent since the last pong
    outstanding_pings: u32,
}

impl<T: SignalingTransport> SignalingClient<T> {
    /// Creates a client, its handle, and the event stream
    pub fn new(
        transport: T,
        local_peer: PeerInfo,
        intent: SessionIntent,
        heartbeat: HeartbeatConfig,
    ) -> (Self, SignalingHandle, mpsc::Receiver<SignalingEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let roster = Arc::new(RwLock::new(HashMap::new()));
        let cancel = CancellationToken::new();

        let handle = SignalingHandle {
            outbound_tx,
            roster: roster.clone(),
            cancel: cancel.clone(),
        };

        let client = Self {
            transport,
            local_peer,
            intent,
            heartbeat,
            session_id: None,
            roster,
            outbound_rx,
            events_tx,
            cancel,
            outstanding_pings: 0,
        };

        (client, handle, events_rx)
    }

    /// Runs the session to completion
    ///
    /// Sends the session intent, then loops over outbound requests,
    /// inbound frames, and the heartbeat timer until the link dies or
    /// the handle closes the session.
    ///
    /// # Errors
    /// Returns transport-level failures; a clean close returns `Ok(())`.
    #[tracing::instrument(skip(self), fields(peer_id = %self.local_peer.peer_id))]
    pub async fn run(mut self) -> Result<(), SignalError> {
        let opening = match &self.intent {
            SessionIntent::Create { network_id } => SignalingMessage::SessionCreate {
                network_id: network_id.clone(),
                peer: self.local_peer.clone(),
            },
            SessionIntent::Join(session_id) => SignalingMessage::SessionJoin {
                session_id: session_id.clone(),
                peer: self.local_peer.clone(),
            },
        };
        self.transport.send(opening).await?;

        let mut ping_timer =
            tokio::time::interval(Duration::from_secs(self.heartbeat.interval_secs));
        // The first tick fires immediately; skip it so the first ping
        // waits a full interval after the session opens.
        ping_timer.tick().await;

        loop {
            tokio::select! {
                outbound = self.outbound_rx.recv() => {
                    match outbound {
                        Some(message) => self.transport.send(message).await?,
                        None => {
                            debug!("All handles dropped, leaving session");
                            self.leave().await;
                            return Ok(());
                        }
                    }
                }

                inbound = self.transport.recv() => {
                    match inbound {
                        Ok(Some(message)) => {
                            if let Some(reply) = self.handle_message(message).await {
                                self.transport.send(reply).await?;
                            }
                        }
                        Ok(None) => {
                            info!("Relay closed the control channel");
                            self.emit(SignalingEvent::RelayDisconnected).await;
                            return Ok(());
                        }
                        Err(SignalError::Malformed(reason)) => {
                            warn!(%reason, "Rejecting malformed signaling message");
                            self.transport
                                .send(SignalingMessage::Error { error: reason })
                                .await?;
                        }
                        Err(err) => {
                            self.emit(SignalingEvent::RelayDisconnected).await;
                            return Err(err);
                        }
                    }
                }

                _ = ping_timer.tick() => {
                    if self.outstanding_pings >= self.heartbeat.missed_limit {
                        warn!(
                            missed = self.outstanding_pings,
                            "Heartbeat lost, treating relay link as dead"
                        );
                        self.emit(SignalingEvent::RelayDisconnected).await;
                        return Ok(());
                    }
                    self.outstanding_pings += 1;
                    self.transport.send(SignalingMessage::Ping).await?;
                }

                () = self.cancel.cancelled() => {
                    info!("Session close requested");
                    self.leave().await;
                    return Ok(());
                }
            }
        }
    }

    /// Processes one inbound message; returns an immediate reply, if any
    async fn handle_message(&mut self, message: SignalingMessage) -> Option<SignalingMessage> {
        match message {
            SignalingMessage::PeerList { session_id, peers } => {
                self.session_id = Some(session_id.clone());
                self.replace_roster(&peers);
                info!(%session_id, peers = peers.len(), "Joined relay session");
                self.emit(SignalingEvent::SessionJoined { session_id, peers })
                    .await;
                None
            }
            SignalingMessage::PeerAnnounce { peer, .. } => {
                debug!(peer_id = %peer.peer_id, "Peer joined session");
                if let Ok(mut roster) = self.roster.write() {
                    roster.insert(peer.peer_id.clone(), peer.clone());
                }
                self.emit(SignalingEvent::PeerJoined(peer)).await;
                None
            }
            SignalingMessage::SessionLeave { peer_id, .. } => {
                debug!(%peer_id, "Peer left session");
                if let Ok(mut roster) = self.roster.write() {
                    roster.remove(&peer_id);
                }
                self.emit(SignalingEvent::PeerLeft(peer_id)).await;
                None
            }
            // The relay rewrites `peer_id` to the sender before relaying
            // directed negotiation messages.
            SignalingMessage::Offer { peer_id, data } => {
                self.emit(SignalingEvent::OfferReceived {
                    from: peer_id,
                    data,
                })
                .await;
                None
            }
            SignalingMessage::Answer { peer_id, data } => {
                self.emit(SignalingEvent::AnswerReceived {
                    from: peer_id,
                    data,
                })
                .await;
                None
            }
            SignalingMessage::IceCandidate { peer_id, data } => {
                self.emit(SignalingEvent::CandidateReceived {
                    from: peer_id,
                    data,
                })
                .await;
                None
            }
            SignalingMessage::Error { error } => {
                warn!(%error, "Relay reported an error");
                self.emit(SignalingEvent::RelayError(error)).await;
                None
            }
            SignalingMessage::Ping => Some(SignalingMessage::Pong),
            SignalingMessage::Pong => {
                self.outstanding_pings = 0;
                None
            }
            // Client-to-relay requests arriving here are protocol misuse;
            // reject without tearing the link down.
            SignalingMessage::SessionCreate { .. } | SignalingMessage::SessionJoin { .. } => {
                Some(SignalingMessage::Error {
                    error: "unexpected session message from relay".to_string(),
                })
            }
        }
    }

    /// Swaps the whole roster in one write so readers never see a
    /// half-applied peer-list update.
    fn replace_roster(&self, peers: &[PeerInfo]) {
        let next: HashMap<PeerId, PeerInfo> = peers
            .iter()
            .map(|p| (p.peer_id.clone(), p.clone()))
            .collect();
        if let Ok(mut roster) = self.roster.write() {
            *roster = next;
        }
    }

    async fn leave(&mut self) {
        if let Some(session_id) = self.session_id.clone() {
            let message = SignalingMessage::SessionLeave {
                session_id,
                peer_id: self.local_peer.peer_id.clone(),
            };
            if let Err(err) = self.transport.send(message).await {
                debug!(error = %err, "Leave notification failed (link already down)");
            }
        }
    }

    async fn emit(&self, event: SignalingEvent) {
        // A full or dropped event receiver must not wedge the relay loop.
        let _ = self.events_tx.send(event).await;
    }
}

// ============================================================================
// Tests
// ============================================================================
