use linkcall_core::{CallSession, CandidateRecord};

/// Store deliveries forwarded into the negotiator loop.
#[derive(Debug)]
pub(crate) enum SignalEvent {
    SessionChanged(CallSession),
    CandidateAdded(CandidateRecord),
}
