use crate::model::session::SessionField;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the negotiation this participant plays for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NegotiationRole {
    /// Creates the session and publishes the offer.
    Caller,
    /// Joins an existing session and publishes the answer.
    Callee,
}

impl NegotiationRole {
    pub fn opposite(self) -> Self {
        match self {
            NegotiationRole::Caller => NegotiationRole::Callee,
            NegotiationRole::Callee => NegotiationRole::Caller,
        }
    }

    /// The session slot this role writes.
    pub fn published_field(self) -> SessionField {
        match self {
            NegotiationRole::Caller => SessionField::Offer,
            NegotiationRole::Callee => SessionField::Answer,
        }
    }

    /// Name of the candidate sub-collection this role appends to.
    pub fn candidate_collection(self) -> &'static str {
        match self {
            NegotiationRole::Caller => "offerCandidates",
            NegotiationRole::Callee => "answerCandidates",
        }
    }
}

impl fmt::Display for NegotiationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NegotiationRole::Caller => f.write_str("caller"),
            NegotiationRole::Callee => f.write_str("callee"),
        }
    }
}
