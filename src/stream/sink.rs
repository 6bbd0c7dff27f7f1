//! Frame sinks: where the pacer delivers frames.
//!
//! [`TrackSink`] encodes each frame and writes it as one sample to a shared
//! `TrackLocalStaticSample`, so every peer the track is bound to receives it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use webrtc::api::media_engine::MIME_TYPE_PCMU;
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

use super::frame::{MediaFrame, AUDIO_FRAME_DURATION};
use crate::codec::g711::{PcmuEncoder, PCMU_SAMPLE_RATE};
use crate::codec::{CodecError, FrameEncoder, MediaKind};
use crate::peer::LocalTrack;

/// Failure to deliver one frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("failed to encode frame: {0}")]
    Encode(#[from] CodecError),
    #[error("failed to write sample: {0}")]
    Write(String),
    #[error("{frame} frame pushed to {sink} sink")]
    KindMismatch { frame: MediaKind, sink: MediaKind },
    #[error("sink is closed")]
    Closed,
}

/// Destination for paced frames.
#[async_trait]
pub trait MediaSink: Send + Sync {
    /// Kind of frames this sink accepts
    fn kind(&self) -> MediaKind;

    /// Deliver one frame.
    async fn push(&self, frame: MediaFrame) -> Result<(), SinkError>;

    /// Track handle to add to a peer connection
    fn track(&self) -> LocalTrack;
}

/// Sink statistics
#[derive(Default)]
pub struct SinkStats {
    pub frames_written: AtomicU64,
    pub bytes_written: AtomicU64,
    pub encode_errors: AtomicU64,
    pub write_errors: AtomicU64,
}

/// Statistics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkStatsSnapshot {
    pub frames_written: u64,
    pub bytes_written: u64,
    pub encode_errors: u64,
    pub write_errors: u64,
}

/// Sink writing encoded frames to a webrtc-rs sample track.
pub struct TrackSink {
    kind: MediaKind,
    track: Arc<TrackLocalStaticSample>,
    encoder: Mutex<Box<dyn FrameEncoder>>,
    /// Sample duration reported to the packetizer
    frame_duration: Duration,
    pub stats: Arc<SinkStats>,
}

impl TrackSink {
    /// Create a sink over a fresh track.
    ///
    /// # Arguments
    /// * `kind` - Kind of frames accepted
    /// * `capability` - Codec the encoder produces
    /// * `encoder` - Raw frame to payload encoder
    /// * `frame_duration` - Duration of one frame
    /// * `track_id` / `stream_id` - Track identifiers for the SDP
    pub fn new(
        kind: MediaKind,
        capability: RTCRtpCodecCapability,
        encoder: Box<dyn FrameEncoder>,
        frame_duration: Duration,
        track_id: &str,
        stream_id: &str,
    ) -> Self {
        let track = Arc::new(TrackLocalStaticSample::new(
            capability,
            track_id.to_owned(),
            stream_id.to_owned(),
        ));
        Self {
            kind,
            track,
            encoder: Mutex::new(encoder),
            frame_duration,
            stats: Arc::new(SinkStats::default()),
        }
    }

    /// PCMU audio sink. Expects 8 kHz s16le input.
    pub fn pcmu(track_id: &str, stream_id: &str) -> Self {
        Self::new(
            MediaKind::Audio,
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_PCMU.to_owned(),
                clock_rate: PCMU_SAMPLE_RATE,
                channels: 1,
                sdp_fmtp_line: String::new(),
                rtcp_feedback: vec![],
            },
            Box::new(PcmuEncoder::new()),
            AUDIO_FRAME_DURATION,
            track_id,
            stream_id,
        )
    }

    pub fn rtc_track(&self) -> &Arc<TrackLocalStaticSample> {
        &self.track
    }

    /// Get statistics snapshot
    pub fn get_stats(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            frames_written: self.stats.frames_written.load(Ordering::Relaxed),
            bytes_written: self.stats.bytes_written.load(Ordering::Relaxed),
            encode_errors: self.stats.encode_errors.load(Ordering::Relaxed),
            write_errors: self.stats.write_errors.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl MediaSink for TrackSink {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn push(&self, frame: MediaFrame) -> Result<(), SinkError> {
        if frame.kind() != self.kind {
            return Err(SinkError::KindMismatch {
                frame: frame.kind(),
                sink: self.kind,
            });
        }

        let mut payload = Vec::new();
        let encoded = {
            let mut encoder = self.encoder.lock();
            encoder.encode(&frame, &mut payload)
        };
        if let Err(e) = encoded {
            self.stats.encode_errors.fetch_add(1, Ordering::Relaxed);
            return Err(e.into());
        }

        let len = payload.len() as u64;
        let sample = Sample {
            data: Bytes::from(payload),
            duration: self.frame_duration,
            ..Default::default()
        };
        if let Err(e) = self.track.write_sample(&sample).await {
            self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
            return Err(SinkError::Write(e.to_string()));
        }

        self.stats.frames_written.fetch_add(1, Ordering::Relaxed);
        self.stats.bytes_written.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    fn track(&self) -> LocalTrack {
        LocalTrack::new(self.kind, self.track.clone() as Arc<dyn TrackLocal + Send + Sync>)
    }
}
