use serde::{Deserialize, Serialize};

/// Aggregate connection state as reported by the peer transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionPhase {
    Idle,
    Negotiating,
    Connected,
    /// An established link dropped or was closed.
    Disconnected,
    /// The transport gave up on connectivity checks.
    Failed,
}
