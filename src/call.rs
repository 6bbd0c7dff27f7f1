//! Group call session negotiation.
//!
//! [`GroupCall::start`] creates a transport, offers our tracks, hands the
//! offer fields to the caller's signaling callback and applies the answer
//! built from the backend's transport description.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::broadcast;

use crate::codec::MediaKind;
use crate::config::CallConfig;
use crate::peer::{
    ConnectionState, ConnectionStateHandler, LocalTrack, OfferOptions, PeerTransport, SessionDescription,
    TransportError, TransportFactory, WebRtcTransportFactory,
};
use crate::sdp::{parse_sdp, Conference, ConferenceSdpBuilder, SdpFields, SessionDescriptionBuilder, Ssrc};
use crate::signaling::{BoxError, JoinCallCallback, JoinCallParams, SETUP_ACTIVE};

/// Event channel depth per subscriber
const EVENT_CAPACITY: usize = 32;

/// Negotiation errors
#[derive(Error, Debug)]
pub enum CallError {
    #[error("connection already started")]
    AlreadyStarted,
    #[error("join call callback must be set before start()")]
    NoJoinCallback,
    #[error("no transport found")]
    NoTransport,
    #[error("signaling failed: {0}")]
    Signaling(#[source] BoxError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Negotiating,
    Active,
    /// Closed after a failed exchange; start() may be called again
    Closed,
}

/// Why a negotiation stopped without an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncompleteReason {
    /// The transport produced an offer without SDP text
    MissingOfferSdp,
    /// A required signaling field is missing from the offer
    MissingField(&'static str),
}

/// Successful outcome of [`GroupCall::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiation {
    /// Remote description applied
    Established,
    /// Stopped early; the transport stays allocated until close()
    Incomplete(IncompleteReason),
}

/// Notifications from the active session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    ConnectionState(ConnectionState),
    /// Connection closed or failed; sent once per session
    HangUp,
}

/// Required offer fields, all present
struct OfferFields {
    ufrag: String,
    pwd: String,
    hash: String,
    fingerprint: String,
    source: u32,
    source_group: Option<Vec<u32>>,
}

impl OfferFields {
    fn from_sdp(fields: SdpFields) -> Result<Self, IncompleteReason> {
        let missing = IncompleteReason::MissingField;
        Ok(Self {
            ufrag: fields.ufrag.ok_or(missing("ufrag"))?,
            pwd: fields.pwd.ok_or(missing("pwd"))?,
            hash: fields.hash.ok_or(missing("hash"))?,
            fingerprint: fields.fingerprint.ok_or(missing("fingerprint"))?,
            source: fields.source.ok_or(missing("source"))?,
            source_group: fields.source_group,
        })
    }
}

/// One group call session.
///
/// `P` is the caller's parameter bag, forwarded to the join callback as is.
pub struct GroupCall<P> {
    params: P,
    factory: Arc<dyn TransportFactory>,
    builder: Box<dyn SessionDescriptionBuilder>,
    join_call: Option<JoinCallCallback<P>>,
    transport: Option<Arc<dyn PeerTransport>>,
    /// Cleared on close so a dying transport stops reporting
    listening: Arc<AtomicBool>,
    state: SessionState,
    events: broadcast::Sender<CallEvent>,
}

impl<P> GroupCall<P>
where
    P: Clone + Send + 'static,
{
    pub fn new(params: P, factory: Arc<dyn TransportFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            params,
            factory,
            builder: Box::new(ConferenceSdpBuilder::new()),
            join_call: None,
            transport: None,
            listening: Arc::new(AtomicBool::new(false)),
            state: SessionState::Idle,
            events,
        }
    }

    /// Session over webrtc-rs transports.
    pub fn with_config(params: P, config: CallConfig) -> Result<Self, TransportError> {
        let factory = WebRtcTransportFactory::new(config)?;
        Ok(Self::new(params, Arc::new(factory)))
    }

    pub fn set_join_call(&mut self, callback: JoinCallCallback<P>) {
        self.join_call = Some(callback);
    }

    /// Replace the remote answer builder.
    pub fn set_description_builder(&mut self, builder: Box<dyn SessionDescriptionBuilder>) {
        self.builder = builder;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &P {
        &self.params
    }

    pub fn is_started(&self) -> bool {
        self.transport.is_some()
    }

    /// Negotiate a session carrying `tracks`.
    pub async fn start(&mut self, tracks: &[LocalTrack]) -> Result<Negotiation, CallError> {
        if self.transport.is_some() {
            return Err(CallError::AlreadyStarted);
        }
        let join_call = self.join_call.clone().ok_or(CallError::NoJoinCallback)?;

        let transport = self.factory.create().await?;
        let listening = Arc::new(AtomicBool::new(true));
        transport.on_connection_state_change(connection_handler(self.events.clone(), listening.clone()));
        self.transport = Some(transport.clone());
        self.listening = listening;
        self.state = SessionState::Negotiating;
        log::info!("negotiating session with {} track(s)", tracks.len());

        for track in tracks {
            transport.add_track(track).await?;
        }

        let options = OfferOptions {
            receive_audio: true,
            receive_video: tracks.iter().any(|t| t.kind() == MediaKind::Video),
        };
        let offer = transport.create_offer(options).await?;
        let offer_sdp = offer.sdp.clone();
        transport.set_local_description(offer).await?;

        if offer_sdp.trim().is_empty() {
            log::warn!("offer has no SDP, negotiation stopped");
            return Ok(Negotiation::Incomplete(IncompleteReason::MissingOfferSdp));
        }
        let fields = match OfferFields::from_sdp(parse_sdp(&offer_sdp)) {
            Ok(fields) => fields,
            Err(reason) => {
                log::warn!("offer incomplete ({:?}), negotiation stopped", reason);
                return Ok(Negotiation::Incomplete(reason));
            }
        };

        let request = JoinCallParams {
            ufrag: fields.ufrag,
            pwd: fields.pwd,
            hash: fields.hash,
            setup: SETUP_ACTIVE.to_string(),
            fingerprint: fields.fingerprint,
            source: fields.source,
            source_group: fields.source_group.clone(),
            params: self.params.clone(),
        };

        let response = match join_call(request).await {
            Ok(response) => response,
            Err(e) => {
                log::error!("join call failed: {}", e);
                self.shutdown(SessionState::Closed).await;
                return Err(CallError::Signaling(e));
            }
        };
        let Some(remote) = response.transport else {
            log::error!("join call returned no transport");
            self.shutdown(SessionState::Closed).await;
            return Err(CallError::NoTransport);
        };

        let mut ssrcs = vec![Ssrc::main(fields.source)];
        if let Some(group) = fields.source_group.and_then(Ssrc::group) {
            ssrcs.push(group);
        }
        let conference = Conference {
            session_id: session_id(),
            transport: remote,
            ssrcs,
        };
        let answer = self.builder.build(&conference);

        transport
            .set_remote_description(SessionDescription::answer(answer))
            .await?;
        self.state = SessionState::Active;
        log::info!("session {} active", conference.session_id);
        Ok(Negotiation::Established)
    }

    /// Release the transport. Safe to call at any time, any number of times.
    pub async fn close(&mut self) {
        self.shutdown(SessionState::Idle).await;
    }

    async fn shutdown(&mut self, next: SessionState) {
        if let Some(transport) = self.transport.take() {
            self.listening.store(false, Ordering::SeqCst);
            if let Err(e) = transport.close().await {
                log::warn!("{}", e);
            }
            log::info!("session closed");
        }
        self.state = next;
    }
}

/// Milliseconds since the epoch
fn session_id() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn connection_handler(events: broadcast::Sender<CallEvent>, listening: Arc<AtomicBool>) -> ConnectionStateHandler {
    let hung_up = AtomicBool::new(false);
    Box::new(move |state| {
        if !listening.load(Ordering::SeqCst) {
            return;
        }
        log::info!("ICE connection state: {:?}", state);
        let _ = events.send(CallEvent::ConnectionState(state));

        if state.is_hang_up() && !hung_up.swap(true, Ordering::SeqCst) {
            log::warn!("remote hung up");
            let _ = events.send(CallEvent::HangUp);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signaling::{join_call_callback, Fingerprint, JoinCallResponse, Transport};
    use crate::stream::{MediaSink, TrackSink};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const OFFER: &str = "v=0\r\n\
        o=- 1 2 IN IP4 127.0.0.1\r\n\
        s=-\r\n\
        t=0 0\r\n\
        m=audio 9 UDP/TLS/RTP/SAVPF 0\r\n\
        a=ice-ufrag:localufrag\r\n\
        a=ice-pwd:localpwd\r\n\
        a=fingerprint:sha-256 01:02:03\r\n\
        a=setup:actpass\r\n\
        a=ssrc:5555 cname:local\r\n";

    #[derive(Default)]
    struct MockTransport {
        offer_sdp: String,
        tracks: Mutex<Vec<String>>,
        offer_options: Mutex<Option<OfferOptions>>,
        local: Mutex<Option<SessionDescription>>,
        remote: Mutex<Option<SessionDescription>>,
        handler: Mutex<Option<ConnectionStateHandler>>,
        closed: AtomicBool,
    }

    impl MockTransport {
        fn fire(&self, state: ConnectionState) {
            if let Some(handler) = self.handler.lock().as_ref() {
                handler(state);
            }
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PeerTransport for MockTransport {
        async fn add_track(&self, track: &LocalTrack) -> Result<(), TransportError> {
            self.tracks.lock().push(track.id().to_string());
            Ok(())
        }

        async fn create_offer(&self, options: OfferOptions) -> Result<SessionDescription, TransportError> {
            *self.offer_options.lock() = Some(options);
            Ok(SessionDescription::offer(self.offer_sdp.clone()))
        }

        async fn set_local_description(&self, description: SessionDescription) -> Result<(), TransportError> {
            *self.local.lock() = Some(description);
            Ok(())
        }

        async fn set_remote_description(&self, description: SessionDescription) -> Result<(), TransportError> {
            *self.remote.lock() = Some(description);
            Ok(())
        }

        fn on_connection_state_change(&self, handler: ConnectionStateHandler) {
            *self.handler.lock() = Some(handler);
        }

        async fn close(&self) -> Result<(), TransportError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockFactory {
        offer_sdp: String,
        created: Mutex<Vec<Arc<MockTransport>>>,
    }

    impl MockFactory {
        fn new(offer_sdp: &str) -> Arc<Self> {
            Arc::new(Self {
                offer_sdp: offer_sdp.to_string(),
                created: Mutex::new(Vec::new()),
            })
        }

        fn transport(&self, index: usize) -> Arc<MockTransport> {
            self.created.lock()[index].clone()
        }

        fn count(&self) -> usize {
            self.created.lock().len()
        }
    }

    #[async_trait]
    impl TransportFactory for MockFactory {
        async fn create(&self) -> Result<Arc<dyn PeerTransport>, TransportError> {
            let transport = Arc::new(MockTransport {
                offer_sdp: self.offer_sdp.clone(),
                ..Default::default()
            });
            self.created.lock().push(transport.clone());
            Ok(transport)
        }
    }

    fn remote_transport() -> Transport {
        Transport {
            ufrag: "remoteufrag".to_string(),
            pwd: "remotepwd".to_string(),
            fingerprints: vec![Fingerprint {
                hash: "sha-256".to_string(),
                fingerprint: "AA:BB".to_string(),
            }],
            candidates: vec![],
        }
    }

    type Seen = Arc<Mutex<Vec<JoinCallParams<String>>>>;

    fn answering(call: &mut GroupCall<String>, transport: Option<Transport>) -> Seen {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        call.set_join_call(join_call_callback(move |params: JoinCallParams<String>| {
            record.lock().push(params);
            let transport = transport.clone();
            async move { Ok::<_, BoxError>(JoinCallResponse { transport }) }
        }));
        seen
    }

    fn tracks() -> Vec<LocalTrack> {
        vec![TrackSink::pcmu("audio", "call").track()]
    }

    #[tokio::test]
    async fn test_start_establishes_session() {
        let factory = MockFactory::new(OFFER);
        let mut call = GroupCall::new("chat-1".to_string(), factory.clone());
        let seen = answering(&mut call, Some(remote_transport()));

        assert_eq!(call.start(&tracks()).await.unwrap(), Negotiation::Established);
        assert_eq!(call.state(), SessionState::Active);

        let params = seen.lock()[0].clone();
        assert_eq!(params.ufrag, "localufrag");
        assert_eq!(params.pwd, "localpwd");
        assert_eq!(params.hash, "sha-256");
        assert_eq!(params.fingerprint, "01:02:03");
        assert_eq!(params.setup, "active");
        assert_eq!(params.source, 5555);
        assert_eq!(params.source_group, None);
        assert_eq!(params.params, "chat-1");

        let transport = factory.transport(0);
        assert_eq!(*transport.tracks.lock(), vec!["audio".to_string()]);
        assert_eq!(
            *transport.offer_options.lock(),
            Some(OfferOptions {
                receive_audio: true,
                receive_video: false,
            })
        );
        assert_eq!(transport.local.lock().as_ref().unwrap().sdp, OFFER);

        let remote = transport.remote.lock().clone().unwrap();
        assert_eq!(remote.sdp_type, crate::peer::SdpType::Answer);
        assert!(remote.sdp.contains("a=ice-ufrag:remoteufrag\r\n"));
        assert!(remote.sdp.contains("a=ssrc:5555 "));
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let factory = MockFactory::new(OFFER);
        let mut call = GroupCall::new(String::new(), factory.clone());
        answering(&mut call, Some(remote_transport()));
        call.start(&tracks()).await.unwrap();

        let err = call.start(&tracks()).await.unwrap_err();
        assert!(matches!(err, CallError::AlreadyStarted));
        assert_eq!(err.to_string(), "connection already started");
        assert_eq!(factory.count(), 1);
        assert!(!factory.transport(0).is_closed());
        assert_eq!(call.state(), SessionState::Active);
    }

    #[tokio::test]
    async fn test_start_requires_join_callback() {
        let factory = MockFactory::new(OFFER);
        let mut call = GroupCall::new(String::new(), factory.clone());
        let err = call.start(&tracks()).await.unwrap_err();
        assert!(matches!(err, CallError::NoJoinCallback));
        assert_eq!(factory.count(), 0);
        assert_eq!(call.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn test_null_transport_closes() {
        let factory = MockFactory::new(OFFER);
        let mut call = GroupCall::new(String::new(), factory.clone());
        answering(&mut call, None);

        let err = call.start(&tracks()).await.unwrap_err();
        assert!(matches!(err, CallError::NoTransport));
        assert_eq!(err.to_string(), "no transport found");
        assert!(factory.transport(0).is_closed());
        assert_eq!(call.state(), SessionState::Closed);
        assert!(!call.is_started());

        // a new attempt is allowed
        answering(&mut call, Some(remote_transport()));
        assert_eq!(call.start(&tracks()).await.unwrap(), Negotiation::Established);
        assert_eq!(factory.count(), 2);
    }

    #[tokio::test]
    async fn test_signaling_error_closes_and_propagates() {
        let factory = MockFactory::new(OFFER);
        let mut call = GroupCall::new(String::new(), factory.clone());
        call.set_join_call(join_call_callback(|_: JoinCallParams<String>| async {
            Err::<JoinCallResponse, BoxError>("backend unavailable".into())
        }));

        let err = call.start(&tracks()).await.unwrap_err();
        match err {
            CallError::Signaling(source) => assert_eq!(source.to_string(), "backend unavailable"),
            other => panic!("Expected signaling error, got {:?}", other),
        }
        assert!(factory.transport(0).is_closed());
        assert_eq!(call.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_missing_field_stops_silently() {
        let factory = MockFactory::new(&OFFER.replace("a=ice-pwd:localpwd\r\n", ""));
        let mut call = GroupCall::new(String::new(), factory.clone());
        let seen = answering(&mut call, Some(remote_transport()));

        assert_eq!(
            call.start(&tracks()).await.unwrap(),
            Negotiation::Incomplete(IncompleteReason::MissingField("pwd"))
        );
        assert!(seen.lock().is_empty());
        assert!(!factory.transport(0).is_closed());
        assert_eq!(call.state(), SessionState::Negotiating);
        assert!(call.is_started());
    }

    #[tokio::test]
    async fn test_empty_offer_stops_silently() {
        let factory = MockFactory::new("");
        let mut call = GroupCall::new(String::new(), factory.clone());
        let seen = answering(&mut call, Some(remote_transport()));

        assert_eq!(
            call.start(&tracks()).await.unwrap(),
            Negotiation::Incomplete(IncompleteReason::MissingOfferSdp)
        );
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_source_group_is_forwarded() {
        let offer = OFFER.replace("a=ssrc:5555", "a=ssrc-group:FID 7000 7001\r\na=ssrc:5555");
        let factory = MockFactory::new(&offer);
        let mut call = GroupCall::new(String::new(), factory.clone());
        let seen = answering(&mut call, Some(remote_transport()));

        call.start(&tracks()).await.unwrap();
        assert_eq!(seen.lock()[0].source_group, Some(vec![7000, 7001]));
        let remote = factory.transport(0).remote.lock().clone().unwrap();
        assert!(remote.sdp.contains("a=ssrc-group:FID 7000 7001\r\n"));
    }

    #[tokio::test]
    async fn test_connection_states_and_single_hang_up() {
        let factory = MockFactory::new(OFFER);
        let mut call = GroupCall::new(String::new(), factory.clone());
        answering(&mut call, Some(remote_transport()));
        let mut events = call.subscribe();
        call.start(&tracks()).await.unwrap();

        let transport = factory.transport(0);
        transport.fire(ConnectionState::Checking);
        transport.fire(ConnectionState::Failed);
        transport.fire(ConnectionState::Closed);

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                CallEvent::ConnectionState(ConnectionState::Checking),
                CallEvent::ConnectionState(ConnectionState::Failed),
                CallEvent::HangUp,
                CallEvent::ConnectionState(ConnectionState::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_silences_transport() {
        let factory = MockFactory::new(OFFER);
        let mut call = GroupCall::new(String::new(), factory.clone());
        answering(&mut call, Some(remote_transport()));
        call.close().await;
        assert_eq!(call.state(), SessionState::Idle);

        call.start(&tracks()).await.unwrap();
        let mut events = call.subscribe();
        call.close().await;
        call.close().await;
        assert_eq!(call.state(), SessionState::Idle);

        let transport = factory.transport(0);
        assert!(transport.is_closed());
        transport.fire(ConnectionState::Closed);
        assert!(events.try_recv().is_err());

        // transport released, a fresh start is possible
        call.start(&tracks()).await.unwrap();
        assert_eq!(factory.count(), 2);
    }
}
