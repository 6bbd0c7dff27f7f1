//! Frame pacing state machine.
//!
//! Everything here is synchronous: the scheduler task in `engine` feeds
//! producer chunks in, calls [`Pacer::tick`] and acts on the returned
//! [`Tick`]. Keeping timers out of this type makes the pacing rules
//! testable without a runtime.

use std::time::Duration;

use thiserror::Error;

use super::cache::MediaCache;
use super::clock::{RemoteLag, RemoteReading};
use super::frame::{FrameGeometry, MediaFrame};
use super::sink::SinkError;
use crate::codec::MediaKind;
use crate::config::{PacingTuning, StreamOptions};

/// Unit of [`Pacer::time`]: 1e-5 ms per unit
const TIME_UNITS_PER_MS: f64 = 100000.0;

/// Usage errors on the pacing engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("stream is stopped")]
    Stopped,
    /// Frame size the engine cannot slice without losing bytes
    #[error("invalid {kind} frame size: {frame_bytes} bytes")]
    InvalidGeometry { kind: MediaKind, frame_bytes: usize },
}

/// Notifications delivered to stream subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Pause flag changed (new value)
    Pause(bool),
    /// No more frames will be produced for this load
    Finish,
    /// End of data is close; fetch the next source now
    AlmostFinished,
    /// Producer paused (`true`) or resumed (`false`) by backpressure
    Overflow(bool),
    /// A frame could not be pushed; the tick loop keeps running
    SinkError(SinkError),
    /// The producer failed; treated as end of data
    SourceError(String),
}

/// Externally visible engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No producer attached yet
    Idle,
    /// Producer attached, buffer below the lookahead
    Loading,
    Playing,
    Paused,
    /// Producer finished, buffer not yet exhausted
    Draining,
    Finished,
    /// Terminal
    Stopped,
}

/// Producer flow control decided by a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpressure {
    Pause,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Loading,
    Draining { almost_finished_emitted: bool },
    Finished,
    Stopped,
}

/// Result of one tick
#[derive(Debug)]
pub struct Tick {
    /// Producer generation the tick was computed for
    pub generation: u64,
    /// Frame to push to the sink
    pub frame: Option<MediaFrame>,
    /// Producer flow change to apply
    pub backpressure: Option<Backpressure>,
    /// Events to deliver after the frame was pushed
    pub events: Vec<StreamEvent>,
    /// Delay until the next tick
    pub next_delay: Duration,
}

/// Per-stream pacing state
pub struct Pacer {
    geometry: FrameGeometry,
    tuning: PacingTuning,
    almost_finished_trigger: f64,
    cache: MediaCache,
    /// Reused frame assembly buffer
    scratch: Vec<u8>,
    phase: Phase,
    paused: bool,
    source_paused: bool,
    /// Bumped on every attach; chunks from older producers are dropped
    generation: u64,
    played_bytes: u64,
}

impl Pacer {
    pub fn new(options: &StreamOptions) -> Result<Self, StreamError> {
        let geometry = FrameGeometry::from_options(options);
        geometry.validate()?;
        let tuning = options.tuning();
        // Room for the whole overflow band before the ring has to grow
        let initial_capacity =
            (geometry.frame_bytes as f64 * (tuning.high_water_frames + 1.0)).ceil() as usize;

        Ok(Self {
            geometry,
            tuning,
            almost_finished_trigger: options.almost_finished_trigger,
            cache: MediaCache::with_capacity(initial_capacity),
            scratch: vec![0u8; geometry.frame_bytes],
            phase: Phase::Idle,
            paused: false,
            source_paused: false,
            generation: 0,
            played_bytes: 0,
        })
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    /// Start a new load. Returns the generation the producer must tag its
    /// chunks with.
    pub fn attach(&mut self) -> Result<u64, StreamError> {
        if self.phase == Phase::Stopped {
            return Err(StreamError::Stopped);
        }
        self.generation += 1;
        self.cache.clear();
        self.played_bytes = 0;
        self.source_paused = false;
        self.phase = Phase::Loading;
        Ok(self.generation)
    }

    /// Append a producer chunk. Returns false when the chunk was dropped
    /// because its producer is no longer attached.
    pub fn push_chunk(&mut self, generation: u64, data: &[u8]) -> bool {
        if generation != self.generation || self.phase == Phase::Stopped {
            return false;
        }
        self.cache.push(data);
        true
    }

    /// Producer signalled end of data.
    pub fn end_of_data(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        if self.phase == Phase::Loading {
            self.phase = Phase::Draining {
                almost_finished_emitted: false,
            };
        }
        true
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<StreamEvent, StreamError> {
        if self.phase == Phase::Stopped {
            return Err(StreamError::Stopped);
        }
        self.paused = paused;
        Ok(StreamEvent::Pause(paused))
    }

    pub fn toggle_pause(&mut self) -> Result<StreamEvent, StreamError> {
        self.set_paused(!self.paused)
    }

    /// Mark the current load finished. Notifies on every call.
    pub fn finish(&mut self) -> StreamEvent {
        if self.phase != Phase::Stopped {
            self.phase = Phase::Finished;
        }
        StreamEvent::Finish
    }

    /// Finish, then stop for good.
    pub fn stop(&mut self) -> StreamEvent {
        let event = self.finish();
        self.phase = Phase::Stopped;
        event
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    /// True while no frames can be produced: before the first attach, after
    /// finish and after stop.
    pub fn finished(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::Finished | Phase::Stopped)
    }

    pub fn stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }

    pub fn has_source(&self) -> bool {
        self.generation > 0
    }

    pub fn source_paused(&self) -> bool {
        self.source_paused
    }

    pub fn buffered_bytes(&self) -> usize {
        self.cache.len()
    }

    pub fn played_bytes(&self) -> u64 {
        self.played_bytes
    }

    fn finished_loading(&self) -> bool {
        matches!(self.phase, Phase::Draining { .. })
    }

    /// Buffer is below the lookahead while the producer is still loading.
    pub fn check_lag(&self) -> bool {
        if self.finished_loading() {
            return false;
        }
        (self.cache.len() as f64) < self.geometry.frame_bytes as f64 * self.tuning.lookahead_frames
    }

    pub fn state(&self) -> StreamState {
        match self.phase {
            Phase::Idle => StreamState::Idle,
            Phase::Finished => StreamState::Finished,
            Phase::Stopped => StreamState::Stopped,
            _ if self.paused => StreamState::Paused,
            Phase::Draining { .. } => StreamState::Draining,
            Phase::Loading if self.check_lag() => StreamState::Loading,
            Phase::Loading => StreamState::Playing,
        }
    }

    /// Interval between ticks before the remote lag penalty.
    pub fn cadence(&self) -> Duration {
        if self.finished() || self.paused || self.check_lag() || !self.has_source() {
            Duration::from_millis(self.tuning.idle_interval_ms)
        } else {
            self.geometry.frame_interval
        }
    }

    /// Playback position in units of 1e-5 ms, `None` without a producer or
    /// once finished.
    ///
    /// Uses the nominal frame interval rather than the current cadence so the
    /// value never goes backwards while paused or starved.
    pub fn time(&self) -> Option<u64> {
        if !self.has_source() || self.finished() {
            return None;
        }
        let frames = self.played_bytes / self.geometry.frame_bytes.max(1) as u64;
        let interval_ms = self.geometry.frame_interval.as_nanos() as f64 / 1_000_000.0;
        Some((frames as f64 * interval_ms * TIME_UNITS_PER_MS).ceil() as u64)
    }

    fn check_overflow(&mut self) -> Option<Backpressure> {
        if !self.has_source() {
            return None;
        }
        let buffered = self.cache.len() as f64;
        let frame = self.geometry.frame_bytes as f64;

        if buffered > frame * self.tuning.high_water_frames {
            if !self.source_paused {
                self.source_paused = true;
                return Some(Backpressure::Pause);
            }
        } else if buffered < frame * self.tuning.low_water_frames && self.source_paused {
            self.source_paused = false;
            return Some(Backpressure::Resume);
        }
        None
    }

    fn frame_ready(&self) -> bool {
        match self.phase {
            Phase::Loading => self.cache.len() > self.geometry.frame_bytes,
            Phase::Draining { .. } => true,
            _ => false,
        }
    }

    /// Run one pacing step. Returns `None` once stopped.
    pub fn tick(&mut self, remote: Option<RemoteReading>) -> Option<Tick> {
        if self.phase == Phase::Stopped {
            return None;
        }

        let lag = match remote {
            Some(reading) if !self.paused => RemoteLag::evaluate(self.time(), reading),
            _ => RemoteLag::NONE,
        };

        let mut tick = Tick {
            generation: self.generation,
            frame: None,
            backpressure: self.check_overflow(),
            events: Vec::new(),
            next_delay: Duration::ZERO,
        };

        if !self.paused && !lag.lagging && self.frame_ready() && self.cache.take_frame(&mut self.scratch) {
            self.played_bytes += self.geometry.frame_bytes as u64;
            tick.frame = Some(self.geometry.to_frame(&self.scratch));
        }

        if let Phase::Draining {
            almost_finished_emitted,
        } = self.phase
        {
            let remaining = self.cache.len() as f64;
            let frame = self.geometry.frame_bytes as f64;
            let trigger = frame + self.almost_finished_trigger * self.geometry.sample_rate as f64;

            if !almost_finished_emitted && remaining < trigger {
                self.phase = Phase::Draining {
                    almost_finished_emitted: true,
                };
                tick.events.push(StreamEvent::AlmostFinished);
            } else if remaining < frame {
                self.phase = Phase::Finished;
                tick.events.push(StreamEvent::Finish);
            }
        }

        let min_interval = Duration::from_millis(self.tuning.min_interval_ms);
        let cadence = self.cadence();
        tick.next_delay = if lag.penalty_ms > 0.0 {
            let interval_ms = cadence.as_secs_f64() * 1000.0 - lag.penalty_ms;
            Duration::from_secs_f64(interval_ms.max(0.0) / 1000.0).max(min_interval)
        } else {
            cadence.max(min_interval)
        };

        Some(tick)
    }
}
