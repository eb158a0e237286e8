//! Per-peer connection state machine
//!
//! One state machine instance covers one connection attempt. `Failed` and
//! `Closed` are terminal for the attempt; a fresh attempt starts over at
//! `Disconnected`. The machine never moves backward from `Connected` to
//! `Connecting` without first passing through `Disconnected` or `Closed`.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Lifecycle of one per-peer transport attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// No negotiation in progress
    Disconnected,
    /// An offer has been sent or received
    Connecting,
    /// The transport reported ready
    Connected,
    /// Negotiation or transport failure; terminal for this attempt
    Failed,
    /// Explicit leave or local teardown; terminal for this attempt
    Closed,
}

impl ConnectionState {
    /// Whether this state admits no further transitions
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    /// Whether a transition to `next` is legal
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }

        match (self, next) {
            // Failure and teardown are reachable from any live state
            (_, Self::Failed | Self::Closed) => true,
            (Self::Disconnected, Self::Connecting) => true,
            (Self::Connecting, Self::Connected) => true,
            // Transport dropped; a new attempt may start from here
            (Self::Connecting | Self::Connected, Self::Disconnected) => true,
            _ => false,
        }
    }

    /// Performs a validated transition
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTransition` for illegal moves, e.g.
    /// `Connected -> Connecting` or anything out of a terminal state.
    pub fn transition(self, next: Self) -> Result<Self, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    #[test]
    fn test_happy_path() {
        let state = Disconnected.transition(Connecting).unwrap();
        let state = state.transition(Connected).unwrap();
        assert_eq!(state, Connected);
    }

    #[test]
    fn test_connected_cannot_go_back_to_connecting() {
        assert!(Connected.transition(Connecting).is_err());
    }

    #[test]
    fn test_reconnect_requires_disconnect_first() {
        let state = Connected.transition(Disconnected).unwrap();
        assert!(state.transition(Connecting).is_ok());
    }

    #[test]
    fn test_failed_is_terminal() {
        let state = Connecting.transition(Failed).unwrap();
        assert!(state.is_terminal());
        assert!(state.transition(Connecting).is_err());
        assert!(state.transition(Closed).is_err());
    }

    #[test]
    fn test_closed_is_terminal() {
        let state = Connected.transition(Closed).unwrap();
        assert!(state.transition(Disconnected).is_err());
    }

    #[test]
    fn test_failure_reachable_from_any_live_state() {
        for state in [Disconnected, Connecting, Connected] {
            assert!(state.can_transition_to(Failed));
            assert!(state.can_transition_to(Closed));
        }
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&Disconnected).unwrap();
        assert_eq!(json, "\"disconnected\"");
    }
}
