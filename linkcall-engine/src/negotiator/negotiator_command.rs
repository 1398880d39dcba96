use crate::error::NegotiationError;
use linkcall_core::{JoinLink, SessionId};
use tokio::sync::oneshot;

/// Commands sent to the negotiator loop by a [`NegotiatorHandle`](crate::NegotiatorHandle).
#[derive(Debug)]
pub enum NegotiatorCommand {
    /// Run the caller flow; replies with the join link once the offer is published.
    StartCall {
        reply: oneshot::Sender<Result<JoinLink, NegotiationError>>,
    },

    /// Run the callee flow for an existing session.
    JoinCall {
        session_id: SessionId,
        reply: oneshot::Sender<Result<(), NegotiationError>>,
    },

    /// Tear the current attempt down. Safe in any state.
    Hangup { reply: oneshot::Sender<()> },

    /// Tear down and stop the loop.
    Shutdown,
}
