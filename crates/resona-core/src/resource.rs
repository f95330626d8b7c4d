//! Named shared buffers: immutable audio resources and mutable tap buffers.
//!
//! Two disjoint maps keyed by name:
//!
//! - **Immutable resources** — sample data published by the client (wavetables,
//!   one-shots). Insertion is add-only: an existing entry is never replaced,
//!   so a realtime reader holding a handle sees stable data for its whole
//!   lifetime. [`prune`](ResourceMap::prune) drops entries nobody else holds.
//! - **Mutable tap buffers** — block-sized buffers realizing the one-block
//!   feedback delay between a `tapOut` producer and its `tapIn` consumers.
//!   The first request under a name creates a zeroed buffer; later requests
//!   return the same handle so the pair meet.

use std::collections::HashMap;
use std::sync::Arc;

use crate::rt_cell::RtCell;

/// Immutable multi-channel sample data.
#[derive(Debug, Clone, Default)]
pub struct AudioData {
    channels: Vec<Vec<f32>>,
}

impl AudioData {
    /// Wraps per-channel sample vectors.
    pub fn new(channels: Vec<Vec<f32>>) -> Self {
        Self { channels }
    }

    /// Wraps a single channel.
    pub fn from_mono(samples: Vec<f32>) -> Self {
        Self {
            channels: vec![samples],
        }
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Frames in the shortest channel.
    pub fn len(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    /// True when there is no sample data.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples of channel `index`.
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }
}

/// A named block-sized mutable buffer joining a feedback-tap pair.
///
/// Written by the renderer's promotion walk, read by `tapIn` kernels at the
/// top of the block — both on the realtime thread, serialized by block order.
#[derive(Clone)]
pub struct TapBuffer {
    cell: Arc<RtCell<Box<[f32]>>>,
    len: usize,
}

impl TapBuffer {
    fn new(block_size: usize) -> Self {
        Self {
            cell: Arc::new(RtCell::new(vec![0.0; block_size].into_boxed_slice())),
            len: block_size,
        }
    }

    /// Buffer length in samples (one block).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Mutable view of the samples.
    ///
    /// # Safety
    ///
    /// Caller must be the realtime thread executing the active schedule (or a
    /// test holding the only reference); see [`RtCell`].
    pub unsafe fn borrow_mut(&self) -> &mut [f32] {
        // SAFETY: forwarded obligation.
        unsafe { self.cell.borrow_mut() }
    }
}

/// Lending map for immutable resources and feedback-tap buffers.
pub struct ResourceMap {
    buffers: HashMap<String, Arc<AudioData>>,
    taps: HashMap<String, TapBuffer>,
    block_size: usize,
}

impl ResourceMap {
    /// Creates an empty map; tap buffers created through it are
    /// `block_size` samples long.
    pub fn new(block_size: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            taps: HashMap::new(),
            block_size,
        }
    }

    /// Publishes `data` under `name`.
    ///
    /// Add-only: returns `false` and leaves the stored buffer untouched when
    /// the name is already taken.
    pub fn insert(&mut self, name: &str, data: AudioData) -> bool {
        if self.buffers.contains_key(name) {
            return false;
        }
        self.buffers.insert(name.to_string(), Arc::new(data));
        true
    }

    /// Borrows the resource published under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<AudioData>> {
        self.buffers.get(name).cloned()
    }

    /// Removes entries that only the map itself still references, returning
    /// how many were dropped.
    pub fn prune(&mut self) -> usize {
        let before = self.buffers.len();
        self.buffers.retain(|_, data| Arc::strong_count(data) > 1);
        before - self.buffers.len()
    }

    /// Names of all published resources. Values are never exposed this way.
    pub fn keys(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buffers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the tap buffer registered under `name`, creating a zeroed one
    /// on first request.
    pub fn tap(&mut self, name: &str) -> TapBuffer {
        let block_size = self.block_size;
        self.taps
            .entry(name.to_string())
            .or_insert_with(|| TapBuffer::new(block_size))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_add_only() {
        let mut map = ResourceMap::new(64);
        assert!(map.insert("kick", AudioData::from_mono(vec![1.0, 2.0])));
        assert!(!map.insert("kick", AudioData::from_mono(vec![9.0])));
        // The original data survived the rejected overwrite.
        let held = map.get("kick").unwrap();
        assert_eq!(held.channel(0), Some(&[1.0, 2.0][..]));
    }

    #[test]
    fn test_prune_spares_held_handles() {
        let mut map = ResourceMap::new(64);
        map.insert("a", AudioData::from_mono(vec![0.0]));
        map.insert("b", AudioData::from_mono(vec![0.0]));
        let held = map.get("a").unwrap();
        assert_eq!(map.prune(), 1);
        assert_eq!(map.keys(), vec!["a".to_string()]);
        drop(held);
        assert_eq!(map.prune(), 1);
        assert!(map.keys().is_empty());
    }

    #[test]
    fn test_tap_requests_meet_at_one_buffer() {
        let mut map = ResourceMap::new(8);
        let producer_side = map.tap("fb");
        let consumer_side = map.tap("fb");
        // SAFETY: test is the sole accessor.
        (unsafe { producer_side.borrow_mut() })[0] = 0.5;
        assert_eq!(unsafe { consumer_side.borrow_mut() }[0], 0.5);
        assert_eq!(consumer_side.len(), 8);
    }

    #[test]
    fn test_tap_starts_zeroed() {
        let mut map = ResourceMap::new(4);
        let tap = map.tap("t");
        assert!(unsafe { tap.borrow_mut() }.iter().all(|&x| x == 0.0));
    }
}
