//! Bounded wait-free single-producer/single-consumer queue.
//!
//! The one communication primitive between the control and realtime threads.
//! Used in two patterns:
//!
//! - **drain-to-latest** ([`Consumer::pop_latest`]): schedule handoff and
//!   per-node buffer swaps, where only the most recent element matters;
//! - **drain-each** ([`Consumer::pop`] in a loop): per-node command and event
//!   rings, where every element is consumed.
//!
//! Capacity is rounded up to a power of two so indices wrap by masking. Both
//! endpoints are `Send` and may live on different threads; neither clones.
//! `push` and `pop` are wait-free, never allocate, and never block — a full
//! queue rejects the push and returns the value to the caller.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Creates a queue with room for at least `capacity` elements and returns the
/// two endpoints.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn channel<T: Send>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "spsc capacity must be non-zero");
    let capacity = capacity.next_power_of_two();
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let shared = Arc::new(Shared {
        mask: capacity - 1,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
        slots,
    });
    (
        Producer {
            shared: Arc::clone(&shared),
        },
        Consumer { shared },
    )
}

struct Shared<T> {
    mask: usize,
    /// Next slot to write. Owned by the producer; the consumer only loads it.
    head: AtomicUsize,
    /// Next slot to read. Owned by the consumer; the producer only loads it.
    tail: AtomicUsize,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: a slot is touched by exactly one side at a time. The producer
// writes slot `head` only while `head - tail < capacity` (the slot is empty),
// then publishes with a Release store of `head`; the consumer reads slot
// `tail` only after an Acquire load of `head` shows it was published. Each
// index is mutated by a single thread.
unsafe impl<T: Send> Sync for Shared<T> {}
unsafe impl<T: Send> Send for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // Sole owner at this point; drop whatever is still queued.
        let head = *self.head.get_mut();
        let mut tail = *self.tail.get_mut();
        while tail != head {
            let slot = &mut self.slots[tail & self.mask];
            // SAFETY: slots in tail..head were written and never consumed.
            unsafe { slot.get_mut().assume_init_drop() };
            tail = tail.wrapping_add(1);
        }
    }
}

/// The writing endpoint.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
}

/// The reading endpoint.
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send> Producer<T> {
    /// Enqueues `value`, or hands it back if the queue is full.
    pub fn push(&mut self, value: T) -> Result<(), T> {
        let shared = &*self.shared;
        let head = shared.head.load(Ordering::Relaxed);
        let tail = shared.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) > shared.mask {
            return Err(value);
        }
        let slot = &shared.slots[head & shared.mask];
        // SAFETY: the occupancy check above proves this slot is empty and the
        // consumer will not touch it until `head` is published below.
        unsafe { (*slot.get()).write(value) };
        shared.head.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        let head = self.shared.head.load(Ordering::Relaxed);
        let tail = self.shared.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when a push would fail.
    pub fn is_full(&self) -> bool {
        self.len() > self.shared.mask
    }

    /// Total slot count.
    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }
}

impl<T: Send> Consumer<T> {
    /// Dequeues the oldest element, if any.
    pub fn pop(&mut self) -> Option<T> {
        let shared = &*self.shared;
        let tail = shared.tail.load(Ordering::Relaxed);
        let head = shared.head.load(Ordering::Acquire);
        if tail == head {
            return None;
        }
        let slot = &shared.slots[tail & shared.mask];
        // SAFETY: head != tail proves the slot was published by the producer,
        // and the producer will not reuse it until `tail` advances below.
        let value = unsafe { (*slot.get()).assume_init_read() };
        shared.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Drains the queue and keeps only the newest element.
    ///
    /// The common pattern for handoffs where intermediate values are
    /// superseded (a fresh render schedule, a replacement sample buffer).
    pub fn pop_latest(&mut self) -> Option<T> {
        let mut latest = None;
        while let Some(value) = self.pop() {
            latest = Some(value);
        }
        latest
    }

    /// Number of queued elements.
    pub fn len(&self) -> usize {
        let tail = self.shared.tail.load(Ordering::Relaxed);
        let head = self.shared.head.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_fifo() {
        let (mut tx, mut rx) = channel(4);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        tx.push(3).unwrap();
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
        assert_eq!(rx.pop(), Some(3));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        let (tx, _rx) = channel::<u8>(5);
        assert_eq!(tx.capacity(), 8);
    }

    #[test]
    fn test_push_fails_when_full() {
        let (mut tx, mut rx) = channel(2);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        assert_eq!(tx.push(3), Err(3));
        assert!(tx.is_full());
        // Freeing one slot lets the next push through.
        assert_eq!(rx.pop(), Some(1));
        tx.push(3).unwrap();
        assert_eq!(rx.pop(), Some(2));
        assert_eq!(rx.pop(), Some(3));
    }

    #[test]
    fn test_pop_latest_discards_intermediates() {
        let (mut tx, mut rx) = channel(8);
        for i in 0..5 {
            tx.push(i).unwrap();
        }
        assert_eq!(rx.pop_latest(), Some(4));
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn test_wraps_around_many_times() {
        let (mut tx, mut rx) = channel(4);
        for i in 0..1000u32 {
            tx.push(i).unwrap();
            assert_eq!(rx.pop(), Some(i));
        }
    }

    #[test]
    fn test_drop_releases_queued_values() {
        let value = Arc::new(());
        let (mut tx, rx) = channel(4);
        tx.push(Arc::clone(&value)).unwrap();
        tx.push(Arc::clone(&value)).unwrap();
        assert_eq!(Arc::strong_count(&value), 3);
        drop(tx);
        drop(rx);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn test_cross_thread_stream() {
        let (mut tx, mut rx) = channel(64);
        let producer = std::thread::spawn(move || {
            let mut next = 0u64;
            while next < 10_000 {
                if tx.push(next).is_ok() {
                    next += 1;
                }
            }
        });
        let mut expected = 0u64;
        while expected < 10_000 {
            if let Some(v) = rx.pop() {
                assert_eq!(v, expected);
                expected += 1;
            }
        }
        producer.join().unwrap();
    }
}
