//! Input side of the pipeline: collaborator events, the engine that consumes them,
//! and a replay source for recorded event streams.

pub mod capture_engine;
pub mod replay;
pub mod types;

pub use capture_engine::{CaptureEngine, SegmentOutcome};
pub use replay::{run_capture, CaptureLimits, ReplaySource, StopReason};
pub use types::{CaptureEvent, CaptureStats, ConnectionEndReason, Direction, SegmentDelivery};
