//! Remote playback clock used to keep local pacing in step with the peer.

use std::sync::Arc;

/// Reports the remote peer's playback position.
///
/// Times use the same unit as [`Stream::time`](super::Stream::time).
pub trait RemoteClock: Send + Sync {
    /// Current remote playback time, if known
    fn remote_time(&self) -> Option<u64>;

    /// Whether the remote says it is behind
    fn is_lagging(&self) -> bool;
}

/// Clock built from two closures.
pub struct FnRemoteClock<T, L> {
    time: T,
    lagging: L,
}

impl<T, L> FnRemoteClock<T, L>
where
    T: Fn() -> Option<u64> + Send + Sync + 'static,
    L: Fn() -> bool + Send + Sync + 'static,
{
    pub fn new(time: T, lagging: L) -> Arc<Self> {
        Arc::new(Self { time, lagging })
    }
}

impl<T, L> RemoteClock for FnRemoteClock<T, L>
where
    T: Fn() -> Option<u64> + Send + Sync,
    L: Fn() -> bool + Send + Sync,
{
    fn remote_time(&self) -> Option<u64> {
        (self.time)()
    }

    fn is_lagging(&self) -> bool {
        (self.lagging)()
    }
}

/// Snapshot of the remote clock taken at the start of a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteReading {
    pub time: Option<u64>,
    pub lagging: bool,
}

impl RemoteReading {
    pub fn read(clock: &dyn RemoteClock) -> Self {
        Self {
            time: clock.remote_time(),
            lagging: clock.is_lagging(),
        }
    }
}

/// Outcome of comparing local and remote playback positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteLag {
    pub lagging: bool,
    /// Milliseconds taken off the next tick interval
    pub penalty_ms: f64,
}

impl RemoteLag {
    pub const NONE: RemoteLag = RemoteLag {
        lagging: false,
        penalty_ms: 0.0,
    };

    /// Compare positions.
    ///
    /// Local ahead of remote: lagging with a penalty of the difference scaled
    /// by 100000. Remote ahead but reporting itself lagging: lagging without
    /// penalty. Anything else, or either time unknown: not lagging.
    pub fn evaluate(local: Option<u64>, remote: RemoteReading) -> Self {
        match (local, remote.time) {
            (Some(local), Some(remote_time)) if local > remote_time => RemoteLag {
                lagging: true,
                penalty_ms: (local - remote_time) as f64 * 100000.0,
            },
            (Some(local), Some(remote_time)) if remote.lagging && remote_time > local => RemoteLag {
                lagging: true,
                penalty_ms: 0.0,
            },
            _ => Self::NONE,
        }
    }
}
