//! Stream and call configuration.
//!
//! All structs carry defaults and can be deserialized from JSON with
//! missing fields falling back to those defaults.

use serde::Deserialize;

use crate::codec::MediaKind;
use crate::ice::{google_stun_servers, IceServerConfig};

/// Raw PCM input layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AudioOptions {
    /// Bits per sample (16 for s16le input)
    pub bits_per_sample: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channel_count: u16,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            sample_rate: 65000,
            channel_count: 1,
        }
    }
}

/// Raw I420 input layout
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct VideoOptions {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub framerate: f64,
}

impl Default for VideoOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 360,
            framerate: 24.0,
        }
    }
}

/// Buffer thresholds for the pacer, counted in frames.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PacingTuning {
    /// Frames that must be buffered before playback is considered caught up
    pub lookahead_frames: f64,
    /// Producer is paused above this many buffered frames
    pub high_water_frames: f64,
    /// Producer is resumed below this many buffered frames
    pub low_water_frames: f64,
    /// Tick interval while idle, paused, finished or starved (ms)
    pub idle_interval_ms: u64,
    /// Lower clamp for the tick interval after the lag penalty (ms)
    pub min_interval_ms: u64,
}

impl PacingTuning {
    /// Defaults for the given media kind.
    ///
    /// Audio keeps 50 frames (0.5 s) of lookahead, video half a frame.
    /// The overflow band sits at 50x / 25x the lookahead.
    pub fn for_kind(kind: MediaKind) -> Self {
        let lookahead = match kind {
            MediaKind::Audio => 50.0,
            MediaKind::Video => 0.5,
        };
        Self {
            lookahead_frames: lookahead,
            high_water_frames: lookahead * 50.0,
            low_water_frames: lookahead * 25.0,
            idle_interval_ms: 500,
            min_interval_ms: 1,
        }
    }
}

impl Default for PacingTuning {
    fn default() -> Self {
        Self::for_kind(MediaKind::Audio)
    }
}

/// Pacing engine configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StreamOptions {
    pub audio: AudioOptions,
    /// `Some` turns the engine into a video engine
    pub video: Option<VideoOptions>,
    /// Seconds-equivalent of buffered data (scaled by the sample rate) left
    /// when `AlmostFinished` fires
    pub almost_finished_trigger: f64,
    /// Overrides the per-kind defaults from [`PacingTuning::for_kind`]
    pub tuning: Option<PacingTuning>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            audio: AudioOptions::default(),
            video: None,
            almost_finished_trigger: 20.0,
            tuning: None,
        }
    }
}

impl StreamOptions {
    /// Audio stream with the given PCM layout.
    pub fn audio(audio: AudioOptions) -> Self {
        Self {
            audio,
            ..Default::default()
        }
    }

    /// Video stream with the given picture layout.
    pub fn video(video: VideoOptions) -> Self {
        Self {
            video: Some(video),
            ..Default::default()
        }
    }

    pub fn kind(&self) -> MediaKind {
        if self.video.is_some() {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }

    /// Effective tuning (explicit override or per-kind default).
    pub fn tuning(&self) -> PacingTuning {
        self.tuning.unwrap_or_else(|| PacingTuning::for_kind(self.kind()))
    }
}

/// Session negotiator configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ice_servers: google_stun_servers(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_media_kind() {
        let audio = StreamOptions::default();
        assert_eq!(audio.kind(), MediaKind::Audio);
        assert_eq!(audio.tuning().lookahead_frames, 50.0);
        assert_eq!(audio.tuning().high_water_frames, 2500.0);

        let video = StreamOptions::video(VideoOptions::default());
        assert_eq!(video.kind(), MediaKind::Video);
        assert_eq!(video.tuning().lookahead_frames, 0.5);
        assert_eq!(video.tuning().low_water_frames, 12.5);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{"audio":{"sample_rate":48000},"video":{"width":1280}}"#;
        let opts: StreamOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.audio.sample_rate, 48000);
        assert_eq!(opts.audio.bits_per_sample, 16);
        let video = opts.video.unwrap();
        assert_eq!(video.width, 1280);
        assert_eq!(video.height, 360);
        assert_eq!(opts.almost_finished_trigger, 20.0);
    }
}
