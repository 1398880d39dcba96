mod error;
mod negotiator;
mod signaling;
mod transport;

pub use error::*;
pub use negotiator::*;
pub use signaling::*;
pub use transport::*;
