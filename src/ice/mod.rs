//! ICE (Interactive Connectivity Establishment) configuration.
//!
//! Provides helpers for configuring STUN and TURN servers.

use serde::Deserialize;
use webrtc::ice_transport::ice_server::RTCIceServer;

/// ICE server configuration
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    /// Create a STUN-only server config
    pub fn stun(url: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            username: None,
            credential: None,
        }
    }

    /// Create a TURN server config with credentials
    pub fn turn(url: &str, username: &str, credential: &str) -> Self {
        Self {
            urls: vec![url.to_string()],
            username: Some(username.to_string()),
            credential: Some(credential.to_string()),
        }
    }

    /// Convert to webrtc-rs RTCIceServer
    pub(crate) fn to_rtc_ice_server(&self) -> RTCIceServer {
        RTCIceServer {
            urls: self.urls.clone(),
            username: self.username.clone().unwrap_or_default(),
            credential: self.credential.clone().unwrap_or_default(),
            ..Default::default()
        }
    }
}

/// Default Google STUN servers
pub fn google_stun_servers() -> Vec<IceServerConfig> {
    vec![
        IceServerConfig::stun("stun:stun.l.google.com:19302"),
        IceServerConfig::stun("stun:stun1.l.google.com:19302"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_credentials_carry_over() {
        let server = IceServerConfig::turn("turn:turn.example.org:3478", "user", "secret").to_rtc_ice_server();
        assert_eq!(server.urls, vec!["turn:turn.example.org:3478".to_string()]);
        assert_eq!(server.username, "user");
        assert_eq!(server.credential, "secret");
    }

    #[test]
    fn test_stun_has_empty_credentials() {
        let server = IceServerConfig::stun("stun:stun.example.org:3478").to_rtc_ice_server();
        assert!(server.username.is_empty());
        assert!(server.credential.is_empty());
    }
}
