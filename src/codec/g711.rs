//! G.711 mu-law (PCMU) audio encoder.
//!
//! G.711 is a narrowband audio codec operating at 8 kHz sample rate.
//! Each 8-bit encoded byte represents one 16-bit PCM sample.
//!
//! Payload type: PT 0 (mu-law)

use super::{CodecError, FrameEncoder};
use crate::stream::MediaFrame;

/// Sample rate PCMU is defined for
pub const PCMU_SAMPLE_RATE: u32 = 8000;

/// Encode a single 16-bit signed sample to mu-law byte.
///
/// Standard ITU-T G.711 mu-law encoding algorithm.
#[inline]
pub fn ulaw_encode(sample: i16) -> u8 {
    const BIAS: i32 = 0x84;
    const CLIP: i32 = 32635;

    let sign = if sample < 0 { 0x80 } else { 0x00 };
    let mut sample = (sample as i32).abs().min(CLIP);

    sample += BIAS;

    let exponent = match sample {
        s if s >= 0x4000 => 7,
        s if s >= 0x2000 => 6,
        s if s >= 0x1000 => 5,
        s if s >= 0x0800 => 4,
        s if s >= 0x0400 => 3,
        s if s >= 0x0200 => 2,
        s if s >= 0x0100 => 1,
        _ => 0,
    };

    let mantissa = (sample >> (exponent + 3)) & 0x0F;

    !(sign | (exponent << 4) | mantissa) as u8
}

/// Decode a single mu-law byte to a 16-bit signed sample.
#[inline]
pub fn ulaw_decode(y: u8) -> i16 {
    let y = y as i16;
    let sign: i16 = if y < 0x0080 { -1 } else { 1 };

    let mantissa = !y;
    let exponent = (mantissa >> 4) & 0x7;
    let segment = exponent + 1;
    let mantissa = mantissa & 0xF;

    let step = 4 << segment;

    sign * ((0x0080 << exponent) + step * mantissa + step / 2 - 4 * 33)
}

/// G.711 mu-law encoder for paced audio frames.
///
/// Input must already be 8 kHz; multi-channel frames are mixed down to mono.
/// No resampling is done here.
#[derive(Debug, Default)]
pub struct PcmuEncoder;

impl PcmuEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameEncoder for PcmuEncoder {
    fn encode(&mut self, frame: &MediaFrame, output: &mut Vec<u8>) -> Result<(), CodecError> {
        let audio = match frame {
            MediaFrame::Audio(audio) => audio,
            MediaFrame::Video(_) => return Err(CodecError::InvalidInput),
        };

        if audio.sample_rate != PCMU_SAMPLE_RATE {
            return Err(CodecError::UnsupportedFormat(format!(
                "PCMU needs {} Hz input, got {} Hz",
                PCMU_SAMPLE_RATE, audio.sample_rate
            )));
        }
        if audio.channel_count == 0 {
            return Err(CodecError::InvalidInput);
        }

        let channels = audio.channel_count as usize;
        output.reserve(audio.samples.len() / channels);
        for group in audio.samples.chunks_exact(channels) {
            let mono = group.iter().map(|&s| s as i32).sum::<i32>() / channels as i32;
            output.push(ulaw_encode(mono as i16));
        }

        Ok(())
    }
}
