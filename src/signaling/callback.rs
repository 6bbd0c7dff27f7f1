//! Callback-based signaling payloads.
//!
//! Field names serialize in camelCase so the structs can be forwarded to a
//! JSON backend as they are.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// Error type returned by signaling callbacks
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// DTLS role we request from the backend. Always `active`.
pub const SETUP_ACTIVE: &str = "active";

/// Offer fields sent to the backend when joining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCallParams<P> {
    pub ufrag: String,
    pub pwd: String,
    /// Fingerprint hash algorithm
    pub hash: String,
    pub setup: String,
    pub fingerprint: String,
    /// Primary media source id
    pub source: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_group: Option<Vec<u32>>,
    /// Caller parameters, passed through untouched
    pub params: P,
}

/// DTLS fingerprint of the remote transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub hash: String,
    pub fingerprint: String,
}

/// ICE candidate as delivered by the backend. All fields are strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Candidate {
    pub generation: String,
    pub component: String,
    pub protocol: String,
    pub port: String,
    pub ip: String,
    pub foundation: String,
    pub id: String,
    pub priority: String,
    #[serde(rename = "type")]
    pub candidate_type: String,
    pub network: String,
}

/// Remote transport description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transport {
    pub ufrag: String,
    pub pwd: String,
    #[serde(default)]
    pub fingerprints: Vec<Fingerprint>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// Backend answer to a join request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCallResponse {
    #[serde(default)]
    pub transport: Option<Transport>,
}

/// Caller-supplied signaling exchange
pub type JoinCallCallback<P> =
    Arc<dyn Fn(JoinCallParams<P>) -> BoxFuture<'static, Result<JoinCallResponse, BoxError>> + Send + Sync>;

/// Wrap an async closure into a [`JoinCallCallback`].
pub fn join_call_callback<P, F, Fut>(f: F) -> JoinCallCallback<P>
where
    P: 'static,
    F: Fn(JoinCallParams<P>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JoinCallResponse, BoxError>> + Send + 'static,
{
    Arc::new(
        move |params: JoinCallParams<P>| -> BoxFuture<'static, Result<JoinCallResponse, BoxError>> {
            Box::pin(f(params))
        },
    )
}
