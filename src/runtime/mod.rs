//! Async side of the tracker: where signals come from and who executes the
//! kernel's side effects.

pub mod driver;
pub mod source;

pub use driver::{Driver, DriverStats};
pub use source::{ChannelSource, Pacing, ScriptedSignal, ScriptedSource, SignalSource};
