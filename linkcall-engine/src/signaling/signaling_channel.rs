use crate::error::SignalingError;
use crate::signaling::Subscription;
use async_trait::async_trait;
use linkcall_core::{CallSession, CandidateRecord, NegotiationRole, SessionDescription, SessionId};

/// Invoked with the full session record on subscribe and after every change.
pub type SessionHandler = Box<dyn Fn(CallSession) + Send + Sync>;

/// Invoked once per record appended to a candidate sequence.
pub type CandidateHandler = Box<dyn Fn(CandidateRecord) + Send + Sync>;

/// Shared document store used to exchange descriptions and candidates.
///
/// Any store with create, set-once fields, append-only sub-collections and
/// change subscriptions can back this trait. Delivery may be at-least-once;
/// subscribers must tolerate redelivered records. Handlers must not call back
/// into the store.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Allocate a new, empty session record.
    async fn create_session(&self) -> Result<SessionId, SignalingError>;

    async fn get_session(&self, session_id: &SessionId) -> Result<CallSession, SignalingError>;

    /// Write the offer slot. Fails with `AlreadySet` if an offer exists.
    async fn set_offer(
        &self,
        session_id: &SessionId,
        offer: SessionDescription,
    ) -> Result<(), SignalingError>;

    /// Write the answer slot. Fails with `AlreadySet` if an answer exists.
    async fn set_answer(
        &self,
        session_id: &SessionId,
        answer: SessionDescription,
    ) -> Result<(), SignalingError>;

    /// Append to the candidate sequence published by `role`.
    async fn append_candidate(
        &self,
        session_id: &SessionId,
        role: NegotiationRole,
        record: CandidateRecord,
    ) -> Result<(), SignalingError>;

    /// Deliver the current record now, then every change until unsubscribed.
    async fn subscribe_session(
        &self,
        session_id: &SessionId,
        on_change: SessionHandler,
    ) -> Result<Subscription, SignalingError>;

    /// Deliver every record of `role`'s sequence in append order, including
    /// the ones appended before the subscription.
    async fn subscribe_candidates(
        &self,
        session_id: &SessionId,
        role: NegotiationRole,
        on_added: CandidateHandler,
    ) -> Result<Subscription, SignalingError>;
}
