//! groupcall-rtc: join a WebRTC group call and stream raw media into it.
//!
//! Two halves:
//! - [`GroupCall`] negotiates the session: offer, signaling exchange through
//!   a caller callback, remote answer.
//! - [`Stream`] paces raw PCM or I420 bytes into fixed-size frames and
//!   pushes one per tick to a [`MediaSink`], optionally kept in step with a
//!   remote playback clock.
//!
//! ## Features
//!
//! - **Frame pacing**: 10 ms audio frames, video at the configured framerate
//! - **Backpressure**: producer paused/resumed around a high/low water band
//! - **Remote sync**: tick delay shortened or frames held back per remote clock
//! - **webrtc-rs transport**: STUN + TURN, PCMU sample track sink
//! - **ICE-lite answers**: remote description built from the backend transport

pub mod call;
pub mod codec;
pub mod config;
pub mod ice;
pub mod peer;
pub mod sdp;
pub mod signaling;
pub mod stream;

pub use call::{CallError, CallEvent, GroupCall, IncompleteReason, Negotiation, SessionState};
pub use codec::{CodecError, FrameEncoder, MediaKind, PcmuEncoder};
pub use config::{AudioOptions, CallConfig, PacingTuning, StreamOptions, VideoOptions};
pub use ice::IceServerConfig;
pub use peer::{ConnectionState, LocalTrack, PeerTransport, TransportError, TransportFactory};
pub use sdp::{parse_sdp, SdpFields};
pub use signaling::{join_call_callback, JoinCallCallback, JoinCallParams, JoinCallResponse};
pub use stream::{MediaFrame, MediaSink, RemoteClock, SinkError, Stream, StreamError, StreamEvent, StreamState, TrackSink};
