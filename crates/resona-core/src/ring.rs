//! Multi-channel sample ring buffer with producer-wins overflow.
//!
//! Carries raw audio from a node's realtime half to its control half: FFT
//! input framing, scope capture, and the variable-length record node. The
//! realtime side writes, the control side reads; when a write would overflow,
//! the write wins and the read position is pushed forward past the clobbered
//! span. Samples are stored as relaxed `AtomicU32` bit patterns, which makes
//! the cross-thread traffic race-free without locks — a reader overtaken
//! mid-copy sees a mix of old and new samples, which is acceptable for the
//! analysis uses this buffer serves.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Bounded multi-channel SPSC sample buffer.
pub struct RingBuffer {
    channels: Vec<Box<[AtomicU32]>>,
    mask: usize,
    /// Total samples ever written per channel. Producer-owned.
    write_pos: AtomicUsize,
    /// Total samples ever read per channel. Consumer-owned, except that an
    /// overflowing write advances it (producer wins).
    read_pos: AtomicUsize,
}

impl RingBuffer {
    /// Creates a ring with `channels` channels of at least `capacity` samples
    /// each. Capacity is rounded up to a power of two.
    ///
    /// # Panics
    ///
    /// Panics if `channels` or `capacity` is zero.
    pub fn new(channels: usize, capacity: usize) -> Self {
        assert!(channels > 0, "ring buffer needs at least one channel");
        assert!(capacity > 0, "ring buffer capacity must be non-zero");
        let capacity = capacity.next_power_of_two();
        let channels = (0..channels)
            .map(|_| {
                (0..capacity)
                    .map(|_| AtomicU32::new(0))
                    .collect::<Vec<_>>()
                    .into_boxed_slice()
            })
            .collect();
        Self {
            channels,
            mask: capacity - 1,
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
        }
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Samples currently readable.
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Writes one block per channel; `data` must hold one slice per channel,
    /// all the same length.
    ///
    /// If the block does not fit, the oldest queued samples are discarded
    /// first so the write always succeeds. Blocks longer than the whole
    /// capacity keep only their tail.
    pub fn write(&self, data: &[&[f32]]) {
        debug_assert_eq!(data.len(), self.channels.len());
        let len = data.first().map_or(0, |ch| ch.len());
        if len == 0 {
            return;
        }

        let capacity = self.capacity();
        let (data_offset, len) = if len > capacity {
            (len - capacity, capacity)
        } else {
            (0, len)
        };

        let write = self.write_pos.load(Ordering::Relaxed);
        let read = self.read_pos.load(Ordering::Acquire);
        let fill = write.wrapping_sub(read);
        let free = capacity - fill;
        if len > free {
            // Producer wins: skip the reader past the span about to be
            // clobbered.
            let skip = len - free;
            self.read_pos
                .store(read.wrapping_add(skip), Ordering::Release);
        }

        for (channel, samples) in self.channels.iter().zip(data) {
            for (i, &sample) in samples[data_offset..].iter().enumerate() {
                channel[write.wrapping_add(i) & self.mask]
                    .store(sample.to_bits(), Ordering::Relaxed);
            }
        }
        self.write_pos
            .store(write.wrapping_add(len), Ordering::Release);
    }

    /// Reads exactly `out[0].len()` samples per channel and advances.
    ///
    /// Returns `false` without advancing when fewer samples are queued than
    /// requested. Reading fewer samples than are available is fine; the rest
    /// stay queued.
    pub fn read(&self, out: &mut [&mut [f32]]) -> bool {
        debug_assert_eq!(out.len(), self.channels.len());
        let len = out.first().map_or(0, |ch| ch.len());
        if len == 0 {
            return true;
        }
        if len > self.available() {
            return false;
        }

        let read = self.read_pos.load(Ordering::Relaxed);
        for (channel, samples) in self.channels.iter().zip(out.iter_mut()) {
            for (i, sample) in samples.iter_mut().enumerate() {
                *sample = f32::from_bits(
                    channel[read.wrapping_add(i) & self.mask].load(Ordering::Relaxed),
                );
            }
        }
        self.read_pos
            .store(read.wrapping_add(len), Ordering::Release);
        true
    }

    /// Discards everything currently queued.
    pub fn clear(&self) {
        let write = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_mono(ring: &RingBuffer, data: &[f32]) {
        ring.write(&[data]);
    }

    fn read_mono(ring: &RingBuffer, len: usize) -> Option<Vec<f32>> {
        let mut out = vec![0.0; len];
        ring.read(&mut [&mut out[..]]).then_some(out)
    }

    #[test]
    fn test_write_then_read() {
        let ring = RingBuffer::new(1, 8);
        write_mono(&ring, &[1.0, 2.0, 3.0]);
        assert_eq!(ring.available(), 3);
        assert_eq!(read_mono(&ring, 3).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn test_short_read_leaves_remainder() {
        let ring = RingBuffer::new(1, 8);
        write_mono(&ring, &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(read_mono(&ring, 2).unwrap(), vec![1.0, 2.0]);
        assert_eq!(read_mono(&ring, 2).unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_over_read_fails_without_advancing() {
        let ring = RingBuffer::new(1, 8);
        write_mono(&ring, &[1.0, 2.0]);
        assert!(read_mono(&ring, 3).is_none());
        assert_eq!(read_mono(&ring, 2).unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_overflow_clobbers_oldest() {
        let ring = RingBuffer::new(1, 4);
        write_mono(&ring, &[1.0, 2.0, 3.0]);
        write_mono(&ring, &[4.0, 5.0, 6.0]);
        // Capacity 4: samples 1.0 and 2.0 were sacrificed.
        assert_eq!(ring.available(), 4);
        assert_eq!(read_mono(&ring, 4).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_giant_write_keeps_tail() {
        let ring = RingBuffer::new(1, 4);
        let block: Vec<f32> = (0..10).map(|i| i as f32).collect();
        write_mono(&ring, &block);
        assert_eq!(read_mono(&ring, 4).unwrap(), vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_wraparound_indexing() {
        let ring = RingBuffer::new(1, 4);
        for round in 0..20 {
            let base = round as f32 * 10.0;
            write_mono(&ring, &[base, base + 1.0]);
            assert_eq!(read_mono(&ring, 2).unwrap(), vec![base, base + 1.0]);
        }
    }

    #[test]
    fn test_multichannel_stays_aligned() {
        let ring = RingBuffer::new(2, 8);
        ring.write(&[&[1.0, 2.0], &[10.0, 20.0]]);
        let mut left = vec![0.0; 2];
        let mut right = vec![0.0; 2];
        assert!(ring.read(&mut [&mut left[..], &mut right[..]]));
        assert_eq!(left, vec![1.0, 2.0]);
        assert_eq!(right, vec![10.0, 20.0]);
    }

    #[test]
    fn test_clear() {
        let ring = RingBuffer::new(1, 8);
        write_mono(&ring, &[1.0, 2.0, 3.0]);
        ring.clear();
        assert_eq!(ring.available(), 0);
    }
}
