//! Lock-free scalar cells for control→realtime parameter handoff.

use std::sync::atomic::{AtomicU32, Ordering};

/// An `f32` stored as atomic bits.
///
/// The standard way a control-thread `set_property` hands a scalar to its
/// realtime kernel: the writer stores, the kernel loads at block start.
/// Orderings are acquire/release so a value published before a schedule swap
/// is visible once the swapped schedule runs.
#[derive(Debug)]
pub struct AtomicF32 {
    bits: AtomicU32,
}

impl AtomicF32 {
    /// Creates a cell holding `value`.
    pub fn new(value: f32) -> Self {
        Self {
            bits: AtomicU32::new(value.to_bits()),
        }
    }

    /// Loads the current value.
    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Stores a new value.
    #[inline]
    pub fn store(&self, value: f32) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

impl Default for AtomicF32 {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_values() {
        let cell = AtomicF32::new(1.5);
        assert_eq!(cell.load(), 1.5);
        cell.store(-0.25);
        assert_eq!(cell.load(), -0.25);
    }

    #[test]
    fn test_preserves_nan_bits() {
        let cell = AtomicF32::new(f32::NAN);
        assert!(cell.load().is_nan());
    }
}
