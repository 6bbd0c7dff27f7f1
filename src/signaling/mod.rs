//! Signaling exchange with the group call backend.
//!
//! The crate does not talk to the backend itself: the caller supplies a
//! [`JoinCallCallback`] that forwards our offer fields and returns the
//! backend's transport description.

pub mod callback;

pub use callback::*;
