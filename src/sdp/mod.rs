//! Session description handling.
//!
//! - `fields`: pull the signaling fields out of our local offer
//! - `builder`: assemble the remote answer from the backend's transport

pub mod builder;
pub mod fields;

pub use builder::{Conference, ConferenceSdpBuilder, SessionDescriptionBuilder, Ssrc};
pub use fields::{parse_sdp, SdpFields};
