//! Growable byte ring buffer between the producer and the pacer.
//!
//! Chunks are appended in arrival order and consumed from the front one frame
//! at a time, so chunk boundaries never matter to the reader.

use ringbuf::traits::{Consumer, Observer, Producer};
use ringbuf::HeapRb;

/// Ordered byte cache fed by the producer
pub struct MediaCache {
    rb: HeapRb<u8>,
    capacity: usize,
    /// Bytes appended since the last reset
    received: u64,
    /// Bytes handed out since the last reset
    consumed: u64,
}

impl MediaCache {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rb: HeapRb::new(capacity),
            capacity,
            received: 0,
            consumed: 0,
        }
    }

    /// Buffered bytes not yet consumed
    pub fn len(&self) -> usize {
        self.rb.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.rb.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Append one producer chunk, growing the ring if it does not fit.
    pub fn push(&mut self, data: &[u8]) {
        if self.rb.vacant_len() < data.len() {
            self.grow(self.len() + data.len());
        }
        let pushed = self.rb.push_slice(data);
        debug_assert_eq!(pushed, data.len());
        self.received += pushed as u64;
    }

    /// Fill `frame` from the front of the cache.
    ///
    /// Returns false and leaves the cache untouched when fewer than
    /// `frame.len()` bytes are buffered.
    pub fn take_frame(&mut self, frame: &mut [u8]) -> bool {
        if self.len() < frame.len() {
            return false;
        }
        let taken = self.rb.pop_slice(frame);
        self.consumed += taken as u64;
        taken == frame.len()
    }

    /// Drop everything, e.g. when the data source is replaced.
    pub fn clear(&mut self) {
        self.rb.clear();
        self.received = 0;
        self.consumed = 0;
    }

    fn grow(&mut self, min_capacity: usize) {
        let capacity = min_capacity.next_power_of_two().max(self.capacity * 2);
        let mut next = HeapRb::new(capacity);

        let mut pending = vec![0u8; self.len()];
        let moved = self.rb.pop_slice(&mut pending);
        next.push_slice(&pending[..moved]);

        log::debug!("media cache grown {} -> {} bytes", self.capacity, capacity);
        self.rb = next;
        self.capacity = capacity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_span_chunk_boundaries() {
        let mut cache = MediaCache::with_capacity(16);
        cache.push(&[1, 2, 3]);
        cache.push(&[4]);
        cache.push(&[5, 6, 7, 8, 9]);

        let mut frame = [0u8; 4];
        assert!(cache.take_frame(&mut frame));
        assert_eq!(frame, [1, 2, 3, 4]);
        assert!(cache.take_frame(&mut frame));
        assert_eq!(frame, [5, 6, 7, 8]);
        assert_eq!(cache.len(), 1);
        assert!(!cache.take_frame(&mut frame));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_grows_and_keeps_order() {
        let mut cache = MediaCache::with_capacity(4);
        let mut frame = [0u8; 3];
        cache.push(&[0, 1, 2]);
        assert!(cache.take_frame(&mut frame));
        // wraps around the ring before growing
        cache.push(&[3, 4, 5]);
        cache.push(&(6..40).collect::<Vec<u8>>());
        assert!(cache.capacity() >= 37);

        let mut rest = vec![0u8; 37];
        assert!(cache.take_frame(&mut rest));
        assert_eq!(rest, (3..40).collect::<Vec<u8>>());
        assert!(cache.is_empty());
        assert_eq!(cache.received(), 40);
        assert_eq!(cache.consumed(), 40);
    }

    #[test]
    fn test_clear_resets_counters() {
        let mut cache = MediaCache::with_capacity(8);
        cache.push(&[1, 2, 3]);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.received(), 0);
    }
}
