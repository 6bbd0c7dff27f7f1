//! Transport factory sharing one webrtc-rs API instance.

use std::sync::Arc;

use async_trait::async_trait;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::api::API;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;

use super::connection::WebRtcTransport;
use super::transport::{PeerTransport, TransportError, TransportFactory};
use crate::config::CallConfig;

/// Creates [`WebRtcTransport`]s with the configured ICE servers
pub struct WebRtcTransportFactory {
    /// WebRTC API instance (shared across all transports)
    api: API,
    config: CallConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: CallConfig) -> Result<Self, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| TransportError::Create(format!("failed to register codecs: {}", e)))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| TransportError::Create(format!("failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, config })
    }

    /// Build RTCConfiguration from ICE servers
    fn build_rtc_config(&self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self
                .config
                .ice_servers
                .iter()
                .map(|s| s.to_rtc_ice_server())
                .collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(&self) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = WebRtcTransport::new(&self.api, self.build_rtc_config()).await?;
        log::debug!(
            "peer connection created with {} ICE server(s)",
            self.config.ice_servers.len()
        );
        Ok(Arc::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{OfferOptions, SdpType};
    use crate::sdp::parse_sdp;
    use crate::stream::{MediaSink, TrackSink};

    #[tokio::test]
    async fn test_offer_carries_signaling_fields() {
        let factory = WebRtcTransportFactory::new(CallConfig { ice_servers: vec![] }).unwrap();
        let transport = factory.create().await.unwrap();

        let sink = TrackSink::pcmu("audio", "call");
        transport.add_track(&sink.track()).await.unwrap();

        let offer = transport
            .create_offer(OfferOptions {
                receive_audio: true,
                receive_video: true,
            })
            .await
            .unwrap();
        assert_eq!(offer.sdp_type, SdpType::Offer);
        assert!(offer.sdp.contains("m=audio"));
        assert!(offer.sdp.contains("m=video"));

        let fields = parse_sdp(&offer.sdp);
        assert!(fields.ufrag.is_some());
        assert!(fields.pwd.is_some());
        assert_eq!(fields.hash.as_deref(), Some("sha-256"));
        assert!(fields.fingerprint.is_some());
        assert!(fields.source.is_some());

        transport.set_local_description(offer).await.unwrap();
        transport.close().await.unwrap();
    }
}
