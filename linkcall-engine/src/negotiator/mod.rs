mod attempt_driver;
mod call_state;
mod candidate_queue;
mod negotiator;
mod negotiator_command;
mod negotiator_config;
mod negotiator_event;
mod negotiator_handle;
mod signal_event;

pub use call_state::*;
pub use negotiator::*;
pub use negotiator_command::*;
pub use negotiator_config::*;
pub use negotiator_event::*;
pub use negotiator_handle::*;
