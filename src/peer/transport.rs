//! Transport engine seam used by the session negotiator.
//!
//! [`WebRtcTransport`](super::WebRtcTransport) is the webrtc-rs backed
//! implementation; tests plug in their own.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use webrtc::track::track_local::TrackLocal;

use crate::codec::MediaKind;

/// Errors reported by the transport engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to create peer connection: {0}")]
    Create(String),
    #[error("failed to add track: {0}")]
    AddTrack(String),
    #[error("failed to create offer: {0}")]
    Offer(String),
    #[error("failed to set local description: {0}")]
    LocalDescription(String),
    #[error("failed to set remote description: {0}")]
    RemoteDescription(String),
    #[error("failed to close peer connection: {0}")]
    Close(String),
}

/// ICE connectivity state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// The remote is gone for good
    pub fn is_hang_up(&self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// SDP text with its role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub sdp_type: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            sdp_type: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Media to request from the remote in the offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferOptions {
    pub receive_audio: bool,
    pub receive_video: bool,
}

/// Outgoing track bound to one media kind
#[derive(Clone)]
pub struct LocalTrack {
    kind: MediaKind,
    track: Arc<dyn TrackLocal + Send + Sync>,
}

impl LocalTrack {
    pub fn new(kind: MediaKind, track: Arc<dyn TrackLocal + Send + Sync>) -> Self {
        Self { kind, track }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn rtc_track(&self) -> &Arc<dyn TrackLocal + Send + Sync> {
        &self.track
    }
}

impl std::fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTrack")
            .field("kind", &self.kind)
            .field("id", &self.track.id())
            .field("stream_id", &self.track.stream_id())
            .finish()
    }
}

/// Connectivity observer
pub type ConnectionStateHandler = Box<dyn Fn(ConnectionState) + Send + Sync>;

/// One peer connection
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), TransportError>;

    async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription, TransportError>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), TransportError>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<(), TransportError>;

    /// Replace the connectivity observer.
    fn on_connection_state_change(&self, handler: ConnectionStateHandler);

    async fn close(&self) -> Result<(), TransportError>;
}

/// Creates a fresh transport per session
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(&self) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
