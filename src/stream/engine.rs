//! Stream handle: drives a [`Pacer`] from two tokio tasks.
//!
//! - Loader: reads the producer into the cache, parked while backpressure
//!   is applied.
//! - Ticker: calls [`Pacer::tick`], pushes the frame to the sink, delivers
//!   events, then sleeps for the delay the tick returned.
//!
//! Every subscriber gets its own unbounded queue, so no event is dropped
//! for a slow reader.
//!
//! Both tasks only hold a weak reference, so dropping the [`Stream`] ends them.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::clock::{RemoteClock, RemoteReading};
use super::frame::FrameGeometry;
use super::pacer::{Backpressure, Pacer, StreamError, StreamEvent, StreamState};
use super::sink::MediaSink;
use crate::codec::MediaKind;
use crate::config::StreamOptions;
use crate::peer::LocalTrack;

/// Producer read size
const READ_CHUNK_SIZE: usize = 64 * 1024;

/// Delay before the first tick
const FIRST_TICK_DELAY: Duration = Duration::from_millis(1);

/// Byte producer accepted by [`Stream::attach_source`]
pub trait MediaSource: AsyncRead + Send + Unpin + 'static {}

impl<T: AsyncRead + Send + Unpin + 'static> MediaSource for T {}

struct Loader {
    generation: u64,
    handle: JoinHandle<()>,
    backpressure: watch::Sender<bool>,
}

struct Inner {
    pacer: Mutex<Pacer>,
    sink: Arc<dyn MediaSink>,
    clock: Mutex<Option<Arc<dyn RemoteClock>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<StreamEvent>>>,
    loader: Mutex<Option<Loader>>,
}

impl Inner {
    fn emit(&self, event: StreamEvent) {
        // Dropped receivers unsubscribe
        self.subscribers
            .lock()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Park or release the producer `generation`. Decisions made for a
    /// producer that was replaced in the meantime are dropped.
    fn apply_backpressure(&self, generation: u64, backpressure: Backpressure) {
        let paused = backpressure == Backpressure::Pause;
        {
            let loader = self.loader.lock();
            match loader.as_ref() {
                Some(loader) if loader.generation == generation => {
                    loader.backpressure.send_replace(paused);
                }
                _ => {
                    log::debug!("dropping backpressure for replaced producer {}", generation);
                    return;
                }
            }
        }
        log::debug!("producer {} {}", generation, if paused { "paused" } else { "resumed" });
        self.emit(StreamEvent::Overflow(paused));
    }

    fn end_of_data(&self, generation: u64) {
        if self.pacer.lock().end_of_data(generation) {
            log::debug!("producer {} finished loading", generation);
        }
    }

    async fn tick(&self) -> Option<Duration> {
        let remote = self
            .clock
            .lock()
            .as_ref()
            .map(|clock| RemoteReading::read(clock.as_ref()));
        let tick = self.pacer.lock().tick(remote)?;

        if let Some(backpressure) = tick.backpressure {
            self.apply_backpressure(tick.generation, backpressure);
        }

        if let Some(frame) = tick.frame {
            if let Err(e) = self.sink.push(frame).await {
                log::warn!("failed to push frame: {}", e);
                self.emit(StreamEvent::SinkError(e));
            }
        }

        for event in tick.events {
            self.emit(event);
        }

        Some(tick.next_delay)
    }

    fn abort_loader(&self) {
        if let Some(loader) = self.loader.lock().take() {
            loader.handle.abort();
        }
    }
}

/// Paced raw media stream feeding one sink.
pub struct Stream {
    inner: Arc<Inner>,
    geometry: FrameGeometry,
    ticker: JoinHandle<()>,
}

impl Stream {
    /// Create an idle stream. Must be called within a tokio runtime.
    pub fn new(options: StreamOptions, sink: Arc<dyn MediaSink>) -> Result<Self, StreamError> {
        let pacer = Pacer::new(&options)?;
        let geometry = *pacer.geometry();
        if sink.kind() != geometry.kind {
            log::warn!("{} stream feeds a {} sink", geometry.kind, sink.kind());
        }

        let inner = Arc::new(Inner {
            pacer: Mutex::new(pacer),
            sink,
            clock: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            loader: Mutex::new(None),
        });
        let ticker = tokio::spawn(run_ticker(Arc::downgrade(&inner)));

        log::info!(
            "{} stream created: {} bytes per frame every {:?}",
            geometry.kind,
            geometry.frame_bytes,
            geometry.frame_interval
        );

        Ok(Self {
            inner,
            geometry,
            ticker,
        })
    }

    /// Create a stream and attach `source` right away.
    pub fn with_source<R: MediaSource>(
        options: StreamOptions,
        sink: Arc<dyn MediaSink>,
        source: R,
    ) -> Result<Self, StreamError> {
        let stream = Self::new(options, sink)?;
        stream.attach_source(source)?;
        Ok(stream)
    }

    /// Subscribe to stream events. Only events sent after this call are seen.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.subscribers.lock().push(tx);
        rx
    }

    /// Replace the producer and restart playback from its first byte.
    pub fn attach_source<R: MediaSource>(&self, source: R) -> Result<(), StreamError> {
        // Pacer and loader switch generation together
        let mut pacer = self.inner.pacer.lock();
        let generation = pacer.attach()?;
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_loader(
            Arc::downgrade(&self.inner),
            generation,
            Box::new(source),
            rx,
        ));

        let previous = self.inner.loader.lock().replace(Loader {
            generation,
            handle,
            backpressure: tx,
        });
        drop(pacer);
        if let Some(previous) = previous {
            previous.handle.abort();
        }

        log::info!("{} stream source {} attached", self.geometry.kind, generation);
        Ok(())
    }

    pub fn set_paused(&self, paused: bool) -> Result<(), StreamError> {
        let event = self.inner.pacer.lock().set_paused(paused)?;
        self.inner.emit(event);
        Ok(())
    }

    /// Flip the pause flag. Returns the new value.
    pub fn toggle_pause(&self) -> Result<bool, StreamError> {
        let event = self.inner.pacer.lock().toggle_pause()?;
        let paused = event == StreamEvent::Pause(true);
        self.inner.emit(event);
        Ok(paused)
    }

    /// Stop producing frames for the current load and notify subscribers.
    pub fn finish(&self) {
        let event = self.inner.pacer.lock().finish();
        self.inner.emit(event);
    }

    /// Finish and shut the stream down for good.
    pub fn stop(&self) {
        let event = self.inner.pacer.lock().stop();
        self.ticker.abort();
        self.inner.abort_loader();
        self.inner.emit(event);
        log::info!("{} stream stopped", self.geometry.kind);
    }

    /// Track to hand to the session negotiator
    pub fn create_track(&self) -> LocalTrack {
        self.inner.sink.track()
    }

    /// Follow a remote playback clock; `None` detaches it.
    pub fn set_remote_clock(&self, clock: Option<Arc<dyn RemoteClock>>) {
        *self.inner.clock.lock() = clock;
    }

    /// Playback position in units of 1e-5 ms.
    pub fn time(&self) -> Option<u64> {
        self.inner.pacer.lock().time()
    }

    pub fn check_lag(&self) -> bool {
        self.inner.pacer.lock().check_lag()
    }

    pub fn state(&self) -> StreamState {
        self.inner.pacer.lock().state()
    }

    pub fn paused(&self) -> bool {
        self.inner.pacer.lock().paused()
    }

    pub fn finished(&self) -> bool {
        self.inner.pacer.lock().finished()
    }

    pub fn stopped(&self) -> bool {
        self.inner.pacer.lock().stopped()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.inner.pacer.lock().buffered_bytes()
    }

    pub fn kind(&self) -> MediaKind {
        self.geometry.kind
    }

    pub fn is_video(&self) -> bool {
        self.geometry.kind == MediaKind::Video
    }

    pub fn frame_bytes(&self) -> usize {
        self.geometry.frame_bytes
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.ticker.abort();
        self.inner.abort_loader();
    }
}

async fn run_ticker(inner: Weak<Inner>) {
    let mut delay = FIRST_TICK_DELAY;
    loop {
        tokio::time::sleep(delay).await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match inner.tick().await {
            Some(next) => delay = next,
            None => break,
        }
    }
}

async fn run_loader(
    inner: Weak<Inner>,
    generation: u64,
    mut source: Box<dyn AsyncRead + Send + Unpin>,
    mut backpressure: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    loop {
        loop {
            let paused = *backpressure.borrow_and_update();
            if !paused {
                break;
            }
            if backpressure.changed().await.is_err() {
                return;
            }
        }

        let read = source.read(&mut buf).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        match read {
            Ok(0) => {
                inner.end_of_data(generation);
                return;
            }
            Ok(n) => {
                if !inner.pacer.lock().push_chunk(generation, &buf[..n]) {
                    return;
                }
            }
            Err(e) => {
                log::warn!("source {} read failed: {}", generation, e);
                inner.emit(StreamEvent::SourceError(e.to_string()));
                inner.end_of_data(generation);
                return;
            }
        }
    }
}
