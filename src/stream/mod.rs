//! Media pacing engine.
//!
//! A producer writes raw PCM or I420 bytes into a cache; the engine slices
//! them into fixed-size frames and pushes one frame per tick to a sink.

mod cache;
pub mod clock;
mod engine;
pub mod frame;
pub mod pacer;
pub mod sink;

pub use clock::{FnRemoteClock, RemoteClock};
pub use engine::{MediaSource, Stream};
pub use frame::{AudioFrame, FrameGeometry, MediaFrame, VideoFrame};
pub use pacer::{StreamError, StreamEvent, StreamState};
pub use sink::{MediaSink, SinkError, SinkStatsSnapshot, TrackSink};
