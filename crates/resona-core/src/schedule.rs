//! Compiled render schedules.
//!
//! A [`RenderSchedule`] is an immutable snapshot produced by the
//! [`scheduler`](crate::scheduler) on the control thread and executed by the
//! [`RenderProcessor`](crate::RenderProcessor) on the realtime thread. It
//! holds everything a block needs ready-made: per-root op lists in post-order,
//! scratch windows pre-assigned to every node output, strong kernel handles
//! (which is what keeps nodes alive against `gc`), per-root tap-out lists for
//! the promotion walk, and a pre-sized workspace for gathering input/output
//! slices without allocating.

use std::sync::Arc;

use crate::node::{Kernel, NodeId};
use crate::root::RootState;
use crate::rt_cell::RtCell;
use crate::scratch::ScratchBuffer;

/// Where one node input reads from.
pub(crate) enum InputSource {
    /// The scratch window assigned to a child's output channel.
    Buffer(ScratchBuffer),
    /// Permanent silence — the child or its requested output channel was
    /// unavailable at compile time. Keeps input positions stable.
    Silence,
}

/// One node invocation: kernel plus resolved input/output buffers.
pub(crate) struct RenderOp {
    pub(crate) kernel: Kernel,
    pub(crate) inputs: Box<[InputSource]>,
    pub(crate) outputs: Box<[ScratchBuffer]>,
}

/// Everything rendered under one root: its ops in post-order, the scratch
/// window carrying the root's summed subtree signal, and the tap-out kernels
/// reachable from it, in op order.
pub(crate) struct RootSequence {
    pub(crate) root: Arc<RootState>,
    pub(crate) ops: Vec<RenderOp>,
    pub(crate) output: ScratchBuffer,
    pub(crate) taps: Vec<Kernel>,
}

/// Reusable slice-gathering space, sized at compile time to the widest op.
pub(crate) struct OpWorkspace {
    pub(crate) inputs: Vec<&'static [f32]>,
    pub(crate) outputs: Vec<&'static mut [f32]>,
}

/// Immutable compiled snapshot of the graph, shared with the realtime thread
/// via `Arc`.
pub struct RenderSchedule {
    pub(crate) roots: Vec<RootSequence>,
    /// Every node id rendered by this schedule; drives the event pump and gc
    /// bookkeeping.
    pub(crate) participants: Vec<NodeId>,
    pub(crate) workspace: RtCell<OpWorkspace>,
    /// Read-only zero block backing [`InputSource::Silence`].
    zeros: Box<[f32]>,
}

impl RenderSchedule {
    pub(crate) fn new(
        roots: Vec<RootSequence>,
        participants: Vec<NodeId>,
        block_size: usize,
    ) -> Self {
        let max_inputs = roots
            .iter()
            .flat_map(|seq| seq.ops.iter())
            .map(|op| op.inputs.len())
            .max()
            .unwrap_or(0);
        let max_outputs = roots
            .iter()
            .flat_map(|seq| seq.ops.iter())
            .map(|op| op.outputs.len())
            .max()
            .unwrap_or(0);
        Self {
            roots,
            participants,
            workspace: RtCell::new(OpWorkspace {
                inputs: Vec::with_capacity(max_inputs),
                outputs: Vec::with_capacity(max_outputs),
            }),
            zeros: vec![0.0; block_size].into_boxed_slice(),
        }
    }

    /// First `frames` samples of the shared silence block.
    ///
    /// # Safety
    ///
    /// The returned slice must not outlive the schedule (the `'static` is the
    /// same lifetime lie the scratch windows tell, held up by the executing
    /// schedule's `Arc`).
    pub(crate) unsafe fn silence(&self, frames: usize) -> &'static [f32] {
        debug_assert!(frames <= self.zeros.len());
        // SAFETY: never written after construction; bounds checked above.
        unsafe { std::slice::from_raw_parts(self.zeros.as_ptr(), frames) }
    }

    /// Ids of every node this schedule renders, in schedule order.
    pub fn participants(&self) -> &[NodeId] {
        &self.participants
    }

    /// Number of root subsequences (active and fading).
    pub fn num_roots(&self) -> usize {
        self.roots.len()
    }

    /// Op counts per root subsequence, in order. Structural fingerprint used
    /// by tests to show that re-applying an identical batch is a no-op.
    pub fn ops_per_root(&self) -> Vec<usize> {
        self.roots.iter().map(|seq| seq.ops.len()).collect()
    }
}
