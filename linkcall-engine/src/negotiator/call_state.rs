use linkcall_core::NegotiationRole;
use serde::Serialize;

/// Negotiator state for the current call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CallState {
    Idle,
    RoleSelected(NegotiationRole),
    LocalDescriptionReady,
    RemoteDescriptionPending,
    Negotiating,
    Connected,
    /// The negotiator has shut down; terminal.
    Closed,
}

impl CallState {
    /// True while an attempt owns a transport or is being set up.
    pub fn is_active(self) -> bool {
        !matches!(self, CallState::Idle | CallState::Closed)
    }
}
