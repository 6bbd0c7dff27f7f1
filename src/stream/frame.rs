//! Frame geometry and the raw frames handed to a sink.

use std::time::Duration;

use super::pacer::StreamError;
use crate::codec::MediaKind;
use crate::config::StreamOptions;

/// Audio frames are always 10 ms long.
pub const AUDIO_FRAME_DURATION: Duration = Duration::from_millis(10);

/// Fixed per-engine frame layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    pub kind: MediaKind,
    /// Bytes consumed from the cache per frame
    pub frame_bytes: usize,
    /// Nominal time between two frames
    pub frame_interval: Duration,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channel_count: u16,
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn from_options(options: &StreamOptions) -> Self {
        let audio = options.audio;
        match options.video {
            Some(video) => Self {
                kind: MediaKind::Video,
                frame_bytes: i420_size(video.width, video.height),
                frame_interval: Duration::from_secs_f64(1.0 / video.framerate.max(f64::EPSILON)),
                sample_rate: audio.sample_rate,
                bits_per_sample: audio.bits_per_sample,
                channel_count: audio.channel_count,
                width: video.width,
                height: video.height,
            },
            None => Self {
                kind: MediaKind::Audio,
                // 10 ms of interleaved samples
                frame_bytes: audio.sample_rate as usize * audio.bits_per_sample as usize / 8 / 100
                    * audio.channel_count as usize,
                frame_interval: AUDIO_FRAME_DURATION,
                sample_rate: audio.sample_rate,
                bits_per_sample: audio.bits_per_sample,
                channel_count: audio.channel_count,
                width: 0,
                height: 0,
            },
        }
    }

    /// Audio frames are carried as 16-bit samples, so their byte size must be
    /// even. Empty frames are never valid.
    pub fn validate(&self) -> Result<(), StreamError> {
        let odd_audio = self.kind == MediaKind::Audio && self.frame_bytes % 2 != 0;
        if self.frame_bytes == 0 || odd_audio {
            return Err(StreamError::InvalidGeometry {
                kind: self.kind,
                frame_bytes: self.frame_bytes,
            });
        }
        Ok(())
    }

    /// Build the sink-facing frame from exactly `frame_bytes` raw bytes.
    pub fn to_frame(&self, raw: &[u8]) -> MediaFrame {
        match self.kind {
            MediaKind::Audio => {
                let samples: Vec<i16> = raw
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect();
                MediaFrame::Audio(AudioFrame {
                    bits_per_sample: self.bits_per_sample,
                    sample_rate: self.sample_rate,
                    channel_count: self.channel_count,
                    number_of_frames: samples.len(),
                    samples,
                })
            }
            MediaKind::Video => MediaFrame::Video(VideoFrame {
                width: self.width,
                height: self.height,
                data: raw.to_vec(),
            }),
        }
    }
}

/// I420/YUV420P buffer size: Y plane plus quarter-size U and V planes
pub fn i420_size(width: u32, height: u32) -> usize {
    let pixels = width as usize * height as usize;
    pixels + pixels / 2
}

/// One block of 16-bit little-endian PCM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub bits_per_sample: u16,
    pub sample_rate: u32,
    pub channel_count: u16,
    /// Number of i16 values in `samples`
    pub number_of_frames: usize,
    /// Interleaved samples
    pub samples: Vec<i16>,
}

/// One planar 4:2:0 picture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// A frame pushed to a [`MediaSink`](super::MediaSink)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaFrame {
    Audio(AudioFrame),
    Video(VideoFrame),
}

impl MediaFrame {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaFrame::Audio(_) => MediaKind::Audio,
            MediaFrame::Video(_) => MediaKind::Video,
        }
    }

    /// Raw bytes as they were taken from the cache.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MediaFrame::Audio(audio) => audio.samples.iter().flat_map(|s| s.to_le_bytes()).collect(),
            MediaFrame::Video(video) => video.data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AudioOptions, VideoOptions};

    #[test]
    fn test_audio_geometry_is_ten_ms() {
        let geometry = FrameGeometry::from_options(&StreamOptions::audio(AudioOptions {
            bits_per_sample: 16,
            sample_rate: 48000,
            channel_count: 2,
        }));
        assert_eq!(geometry.kind, MediaKind::Audio);
        assert_eq!(geometry.frame_bytes, 1920);
        assert_eq!(geometry.frame_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_default_audio_geometry() {
        let geometry = FrameGeometry::from_options(&StreamOptions::default());
        assert_eq!(geometry.frame_bytes, 1300);
    }

    #[test]
    fn test_video_geometry_is_i420() {
        let geometry = FrameGeometry::from_options(&StreamOptions::video(VideoOptions {
            width: 640,
            height: 360,
            framerate: 25.0,
        }));
        assert_eq!(geometry.kind, MediaKind::Video);
        assert_eq!(geometry.frame_bytes, 345_600);
        assert_eq!(geometry.frame_interval.as_millis(), 40);
    }

    #[test]
    fn test_validate_rejects_odd_and_empty_frames() {
        let audio = |sample_rate, channel_count| {
            FrameGeometry::from_options(&StreamOptions::audio(AudioOptions {
                bits_per_sample: 16,
                sample_rate,
                channel_count,
            }))
        };
        assert_eq!(audio(22050, 1).frame_bytes, 441);
        assert!(audio(22050, 1).validate().is_err());
        assert!(audio(22050, 2).validate().is_ok());
        assert!(audio(10, 2).validate().is_err());
        assert!(audio(48000, 2).validate().is_ok());
    }

    #[test]
    fn test_audio_frame_is_little_endian() {
        let geometry = FrameGeometry::from_options(&StreamOptions::default());
        let frame = geometry.to_frame(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]);
        match &frame {
            MediaFrame::Audio(audio) => {
                assert_eq!(audio.samples, vec![1, -1, i16::MIN]);
                assert_eq!(audio.number_of_frames, 3);
            }
            _ => panic!("Expected audio frame"),
        }
        assert_eq!(frame.to_bytes(), vec![0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]);
    }
}
