//! Interior-mutable cell for state owned by the realtime thread.
//!
//! Node kernels and scratch memory are shared between consecutive render
//! schedules through `Arc`, but are only ever *touched* by whichever thread
//! is executing the active schedule — schedules never execute concurrently
//! (handoff is a pointer swap at a block boundary), and the control thread
//! communicates with kernels exclusively through atomics and SPSC queues.
//! `RtCell` encodes that ownership discipline: it is `Sync` so the `Arc`s
//! can cross threads, and hands out `&mut` only through an `unsafe` method
//! whose caller asserts exclusivity.

use std::cell::UnsafeCell;

/// A cell whose contents belong to the realtime thread.
pub struct RtCell<T> {
    inner: UnsafeCell<T>,
}

// SAFETY: RtCell's contract is that all access goes through `borrow_mut`,
// whose callers guarantee a single accessor at a time (the thread executing
// the active schedule, or a test holding the only reference).
unsafe impl<T: Send> Sync for RtCell<T> {}
unsafe impl<T: Send> Send for RtCell<T> {}

impl<T> RtCell<T> {
    /// Wraps `value`.
    pub fn new(value: T) -> Self {
        Self {
            inner: UnsafeCell::new(value),
        }
    }

    /// Returns a mutable reference to the contents.
    ///
    /// # Safety
    ///
    /// The caller must be the sole accessor for the lifetime of the returned
    /// reference: in practice, the renderer between two block boundaries, the
    /// tap-promotion walk at the end of a block, or a test that owns the only
    /// handle.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn borrow_mut(&self) -> &mut T {
        // SAFETY: exclusivity is the caller's obligation, per above.
        unsafe { &mut *self.inner.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_single_owner_access() {
        let cell = Arc::new(RtCell::new(41));
        // SAFETY: only accessor.
        *unsafe { cell.borrow_mut() } += 1;
        assert_eq!(*unsafe { cell.borrow_mut() }, 42);
    }

    #[test]
    fn test_is_sync_and_send() {
        fn assert_bounds<T: Send + Sync>() {}
        assert_bounds::<RtCell<Vec<f32>>>();
    }
}
