use crate::error::NegotiationError;
use crate::negotiator::CallState;
use linkcall_core::JoinLink;

/// Notifications for UI and media collaborators.
#[derive(Debug, Clone)]
pub enum NegotiatorEvent {
    StateChanged(CallState),

    /// The caller published its offer; share this link with the callee.
    JoinLinkReady(JoinLink),

    /// The attempt was abandoned and the negotiator is back to `Idle`.
    AttemptFailed(NegotiationError),

    /// The transport reported the link down; the attempt was torn down.
    Disconnected,
}
