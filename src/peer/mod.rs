//! Peer connection plumbing.

pub mod connection;
pub mod manager;
pub mod transport;

pub use connection::WebRtcTransport;
pub use manager::WebRtcTransportFactory;
pub use transport::{
    ConnectionState, ConnectionStateHandler, LocalTrack, OfferOptions, PeerTransport, SdpType,
    SessionDescription, TransportError, TransportFactory,
};
