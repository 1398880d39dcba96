use crate::negotiator::CallState;
use linkcall_core::{JoinLinkError, SessionField, SessionId};
use thiserror::Error;

/// Failures reported by a [`SignalingChannel`](crate::SignalingChannel).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalingError {
    #[error("signaling store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("{field} already set on session {session}")]
    AlreadySet {
        session: SessionId,
        field: SessionField,
    },
}

/// Failures reported by a [`PeerTransport`](crate::PeerTransport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport refused a description or candidate (malformed payload,
    /// wrong signaling state).
    #[error("transport rejected input: {0}")]
    Rejected(String),

    #[error("transport is closed")]
    Closed,

    #[error("peer connection failed before it was established")]
    ConnectionFailed,

    #[error("transport failure: {0}")]
    Internal(String),
}

/// Why a call attempt was abandoned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("signaling store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {0} has no offer yet")]
    CallerNotReady(SessionId),

    /// Internal consistency failure: the state machine tried to write a slot twice.
    #[error("{field} already set on session {session}")]
    AlreadySet {
        session: SessionId,
        field: SessionField,
    },

    #[error(transparent)]
    TransportFailure(#[from] TransportError),

    #[error("a call attempt is already in progress ({0:?})")]
    AttemptInProgress(CallState),

    /// The attempt was hung up or torn down before its flow finished.
    #[error("call attempt was cancelled")]
    AttemptCancelled,

    #[error("negotiation did not complete in time")]
    NegotiationTimedOut,

    #[error("cannot build join link: {0}")]
    InvalidOrigin(#[from] JoinLinkError),

    #[error("negotiator has shut down")]
    EngineClosed,
}

impl From<SignalingError> for NegotiationError {
    fn from(err: SignalingError) -> Self {
        match err {
            SignalingError::StoreUnavailable(reason) => NegotiationError::StoreUnavailable(reason),
            SignalingError::NotFound(id) => NegotiationError::SessionNotFound(id),
            SignalingError::AlreadySet { session, field } => {
                NegotiationError::AlreadySet { session, field }
            }
        }
    }
}
