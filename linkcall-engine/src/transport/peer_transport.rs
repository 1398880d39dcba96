use crate::error::TransportError;
use async_trait::async_trait;
use linkcall_core::{ConnectionPhase, IceCandidate, NegotiationRole, SessionDescription};
use std::sync::Arc;

pub type LocalCandidateHandler = Box<dyn Fn(IceCandidate) + Send + Sync>;

pub type PhaseChangeHandler = Box<dyn Fn(ConnectionPhase) + Send + Sync>;

/// The peer-connection subsystem, seen as a producer and consumer of
/// descriptions and candidates.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Caller only, before any remote description is set.
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;

    /// Callee only, after the remote offer is set.
    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    /// Called for every local candidate discovered, possibly after negotiation completes.
    fn on_local_candidate(&self, handler: LocalCandidateHandler);

    /// Called on every phase transition. `Disconnected` fires when an
    /// established link drops.
    fn on_connection_phase_change(&self, handler: PhaseChangeHandler);

    /// Release all resources. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Builds one fresh transport per call attempt.
///
/// Media collaborators hook in here: attach local tracks before returning the
/// transport.
#[async_trait]
pub trait PeerTransportFactory: Send + Sync {
    async fn create(&self, role: NegotiationRole) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
