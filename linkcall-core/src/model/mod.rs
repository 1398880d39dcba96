mod candidate;
mod description;
mod ice_server;
mod join_link;
mod phase;
mod role;
mod session;

pub use candidate::{CandidateRecord, IceCandidate};
pub use description::{SdpType, SessionDescription};
pub use ice_server::IceServerConfig;
pub use join_link::{JoinLink, JoinLinkError, StartupRole};
pub use phase::ConnectionPhase;
pub use role::NegotiationRole;
pub use session::{CallSession, SessionField, SessionId};
