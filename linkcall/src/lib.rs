pub use linkcall_core::model::{JoinLink, SessionId, StartupRole};

pub mod model {
    pub use linkcall_core::model::*;
}

#[cfg(feature = "engine")]
pub mod engine {
    pub use linkcall_engine::*;
}
