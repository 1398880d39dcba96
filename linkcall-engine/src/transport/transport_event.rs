use linkcall_core::{ConnectionPhase, IceCandidate};

/// Events the transport raises for the negotiator loop.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// A local candidate to publish through signaling.
    LocalCandidate(IceCandidate),

    PhaseChanged(ConnectionPhase),
}
