// Adapters layer: concrete implementations of the domain ports.

pub mod progress;
pub mod storage;

pub use progress::LogProgress;
pub use storage::{DatabasePool, DiscardSink, SqlSink};
