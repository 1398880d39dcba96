mod memory_channel;
mod signaling_channel;
mod subscription;

pub use memory_channel::*;
pub use signaling_channel::*;
pub use subscription::*;
