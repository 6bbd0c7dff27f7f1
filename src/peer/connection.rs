//! Peer transport over a webrtc-rs RTCPeerConnection.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use webrtc::api::API;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

use super::transport::{
    ConnectionState, ConnectionStateHandler, LocalTrack, OfferOptions, PeerTransport, SdpType,
    SessionDescription, TransportError,
};

// Connection states as stored in the atomic
const STATE_NEW: u8 = 0;
const STATE_CHECKING: u8 = 1;
const STATE_CONNECTED: u8 = 2;
const STATE_COMPLETED: u8 = 3;
const STATE_DISCONNECTED: u8 = 4;
const STATE_FAILED: u8 = 5;
const STATE_CLOSED: u8 = 6;

fn map_ice_state(state: RTCIceConnectionState) -> ConnectionState {
    match state {
        RTCIceConnectionState::Checking => ConnectionState::Checking,
        RTCIceConnectionState::Connected => ConnectionState::Connected,
        RTCIceConnectionState::Completed => ConnectionState::Completed,
        RTCIceConnectionState::Disconnected => ConnectionState::Disconnected,
        RTCIceConnectionState::Failed => ConnectionState::Failed,
        RTCIceConnectionState::Closed => ConnectionState::Closed,
        _ => ConnectionState::New,
    }
}

fn encode_state(state: ConnectionState) -> u8 {
    match state {
        ConnectionState::New => STATE_NEW,
        ConnectionState::Checking => STATE_CHECKING,
        ConnectionState::Connected => STATE_CONNECTED,
        ConnectionState::Completed => STATE_COMPLETED,
        ConnectionState::Disconnected => STATE_DISCONNECTED,
        ConnectionState::Failed => STATE_FAILED,
        ConnectionState::Closed => STATE_CLOSED,
    }
}

fn decode_state(state: u8) -> ConnectionState {
    match state {
        STATE_CHECKING => ConnectionState::Checking,
        STATE_CONNECTED => ConnectionState::Connected,
        STATE_COMPLETED => ConnectionState::Completed,
        STATE_DISCONNECTED => ConnectionState::Disconnected,
        STATE_FAILED => ConnectionState::Failed,
        STATE_CLOSED => ConnectionState::Closed,
        _ => ConnectionState::New,
    }
}

/// Single webrtc-rs peer connection
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    /// Last ICE connection state
    state: Arc<AtomicU8>,
}

impl WebRtcTransport {
    /// Create a new peer connection.
    ///
    /// # Arguments
    /// * `api` - Shared WebRTC API instance
    /// * `config` - RTCConfiguration with ICE servers
    pub async fn new(api: &API, config: RTCConfiguration) -> Result<Self, TransportError> {
        let peer_connection = api
            .new_peer_connection(config)
            .await
            .map_err(|e| TransportError::Create(e.to_string()))?;

        let transport = Self {
            peer_connection: Arc::new(peer_connection),
            state: Arc::new(AtomicU8::new(STATE_NEW)),
        };
        transport.on_connection_state_change(Box::new(|_| {}));
        Ok(transport)
    }

    /// Last observed connectivity state
    pub fn state(&self) -> ConnectionState {
        decode_state(self.state.load(Ordering::SeqCst))
    }

    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    async fn ensure_receiver(&self, kind: RTPCodecType) -> Result<(), TransportError> {
        let present = self
            .peer_connection
            .get_transceivers()
            .await
            .iter()
            .any(|t| t.kind() == kind);
        if present {
            return Ok(());
        }

        self.peer_connection
            .add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .map_err(|e| TransportError::Offer(format!("failed to add {:?} transceiver: {}", kind, e)))?;
        Ok(())
    }
}

fn to_rtc_description(
    description: SessionDescription,
    map_err: fn(String) -> TransportError,
) -> Result<RTCSessionDescription, TransportError> {
    let parsed = match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
    };
    parsed.map_err(|e| map_err(format!("invalid SDP: {}", e)))
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), TransportError> {
        let _rtp_sender = self
            .peer_connection
            .add_track(track.rtc_track().clone())
            .await
            .map_err(|e| TransportError::AddTrack(e.to_string()))?;
        Ok(())
    }

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription, TransportError> {
        if options.receive_audio {
            self.ensure_receiver(RTPCodecType::Audio).await?;
        }
        if options.receive_video {
            self.ensure_receiver(RTPCodecType::Video).await?;
        }

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| TransportError::Offer(e.to_string()))?;

        let sdp_type = match offer.sdp_type {
            RTCSdpType::Answer => SdpType::Answer,
            _ => SdpType::Offer,
        };
        Ok(SessionDescription {
            sdp_type,
            sdp: offer.sdp,
        })
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), TransportError> {
        let description = to_rtc_description(description, TransportError::LocalDescription)?;
        self.peer_connection
            .set_local_description(description)
            .await
            .map_err(|e| TransportError::LocalDescription(e.to_string()))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), TransportError> {
        let description = to_rtc_description(description, TransportError::RemoteDescription)?;
        self.peer_connection
            .set_remote_description(description)
            .await
            .map_err(|e| TransportError::RemoteDescription(e.to_string()))
    }

    fn on_connection_state_change(&self, handler: ConnectionStateHandler) {
        let state = self.state.clone();
        self.peer_connection
            .on_ice_connection_state_change(Box::new(move |s: RTCIceConnectionState| {
                let mapped = map_ice_state(s);
                state.store(encode_state(mapped), Ordering::SeqCst);
                handler(mapped);
                Box::pin(async {})
            }));
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| TransportError::Close(e.to_string()))
    }
}
