pub mod collector;
pub mod host;

pub use collector::{HttpCollector, Transport};
pub use host::{FileHost, HostChannel, MemoryHost, StdoutHost};
