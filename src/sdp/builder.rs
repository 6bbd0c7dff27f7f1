//! Remote answer generation for the group call backend.
//!
//! The backend is an ICE-lite server that only hands out a transport
//! description; the answer SDP is assembled locally from it.

use std::fmt::Write;

use crate::signaling::Transport;

/// One media source announced in the answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ssrc {
    pub ssrc: u32,
    /// Main audio source
    pub is_main: bool,
    /// FID group for video sources (media ssrc, rtx ssrc)
    pub ssrc_group: Option<Vec<u32>>,
}

impl Ssrc {
    pub fn main(ssrc: u32) -> Self {
        Self {
            ssrc,
            is_main: true,
            ssrc_group: None,
        }
    }

    pub fn group(group: Vec<u32>) -> Option<Self> {
        let ssrc = *group.first()?;
        Some(Self {
            ssrc,
            is_main: false,
            ssrc_group: Some(group),
        })
    }
}

/// Input of a remote description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conference {
    /// Wall-clock session id (ms since the epoch)
    pub session_id: u64,
    pub transport: Transport,
    pub ssrcs: Vec<Ssrc>,
}

/// Turns a conference into remote answer SDP.
pub trait SessionDescriptionBuilder: Send + Sync {
    fn build(&self, conference: &Conference) -> String;
}

/// Opus payload type
const OPUS_PT: u8 = 111;
/// VP8 payload type
const VP8_PT: u8 = 100;
/// RTX payload type for VP8
const RTX_PT: u8 = 101;

/// Answer builder for the ICE-lite conference backend.
///
/// One m-section per [`Ssrc`]: main sources become Opus audio, grouped
/// sources become VP8 video with RTX. All sections are `recvonly` from the
/// remote side's view, share the remote ICE credentials and use
/// `setup:passive`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConferenceSdpBuilder;

impl ConferenceSdpBuilder {
    pub fn new() -> Self {
        Self
    }

    fn push_transport(sdp: &mut String, transport: &Transport) {
        let _ = write!(sdp, "a=ice-ufrag:{}\r\n", transport.ufrag);
        let _ = write!(sdp, "a=ice-pwd:{}\r\n", transport.pwd);
        for fp in &transport.fingerprints {
            let _ = write!(sdp, "a=fingerprint:{} {}\r\n", fp.hash, fp.fingerprint);
        }
        sdp.push_str("a=setup:passive\r\n");
        for c in &transport.candidates {
            let _ = write!(
                sdp,
                "a=candidate:{} {} {} {} {} {} typ {} generation {}\r\n",
                c.foundation, c.component, c.protocol, c.priority, c.ip, c.port, c.candidate_type, c.generation
            );
        }
    }

    fn push_audio(sdp: &mut String, mid: usize, entry: &Ssrc, transport: &Transport) {
        let _ = write!(sdp, "m=audio 1 RTP/SAVPF {}\r\n", OPUS_PT);
        sdp.push_str("c=IN IP4 0.0.0.0\r\n");
        let _ = write!(sdp, "a=mid:{}\r\n", mid);
        Self::push_transport(sdp, transport);
        let _ = write!(sdp, "a=rtpmap:{} opus/48000/2\r\n", OPUS_PT);
        let _ = write!(sdp, "a=fmtp:{} minptime=10; useinbandfec=1\r\n", OPUS_PT);
        sdp.push_str("a=rtcp:1 IN IP4 0.0.0.0\r\n");
        sdp.push_str("a=rtcp-mux\r\n");
        let _ = write!(sdp, "a=rtcp-fb:{} transport-cc\r\n", OPUS_PT);
        sdp.push_str("a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n");
        sdp.push_str("a=recvonly\r\n");
        let _ = write!(sdp, "a=ssrc:{} cname:stream{}\r\n", entry.ssrc, entry.ssrc);
    }

    fn push_video(sdp: &mut String, mid: usize, group: &[u32], transport: &Transport) {
        let _ = write!(sdp, "m=video 1 RTP/SAVPF {} {}\r\n", VP8_PT, RTX_PT);
        sdp.push_str("c=IN IP4 0.0.0.0\r\n");
        let _ = write!(sdp, "a=mid:{}\r\n", mid);
        Self::push_transport(sdp, transport);
        let _ = write!(sdp, "a=rtpmap:{} VP8/90000\r\n", VP8_PT);
        let _ = write!(sdp, "a=rtpmap:{} rtx/90000\r\n", RTX_PT);
        let _ = write!(sdp, "a=fmtp:{} apt={}\r\n", RTX_PT, VP8_PT);
        for fb in ["goog-remb", "transport-cc", "ccm fir", "nack", "nack pli"] {
            let _ = write!(sdp, "a=rtcp-fb:{} {}\r\n", VP8_PT, fb);
        }
        sdp.push_str("a=rtcp:1 IN IP4 0.0.0.0\r\n");
        sdp.push_str("a=rtcp-mux\r\n");
        sdp.push_str("a=recvonly\r\n");

        let ids: Vec<String> = group.iter().map(u32::to_string).collect();
        let _ = write!(sdp, "a=ssrc-group:FID {}\r\n", ids.join(" "));
        for ssrc in group {
            let _ = write!(sdp, "a=ssrc:{} cname:stream{}\r\n", ssrc, group[0]);
        }
    }
}

impl SessionDescriptionBuilder for ConferenceSdpBuilder {
    fn build(&self, conference: &Conference) -> String {
        let mut sdp = String::new();
        let mids: Vec<String> = (0..conference.ssrcs.len()).map(|i| i.to_string()).collect();

        sdp.push_str("v=0\r\n");
        let _ = write!(sdp, "o=- {} 2 IN IP4 0.0.0.0\r\n", conference.session_id);
        sdp.push_str("s=-\r\n");
        sdp.push_str("t=0 0\r\n");
        let _ = write!(sdp, "a=group:BUNDLE {}\r\n", mids.join(" "));
        sdp.push_str("a=ice-lite\r\n");

        for (mid, entry) in conference.ssrcs.iter().enumerate() {
            match entry.ssrc_group.as_deref() {
                Some(group) if !entry.is_main && !group.is_empty() => {
                    Self::push_video(&mut sdp, mid, group, &conference.transport)
                }
                _ => Self::push_audio(&mut sdp, mid, entry, &conference.transport),
            }
        }

        sdp
    }
}
