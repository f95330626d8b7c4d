//! The node contract: control half, render half, and the render context.
//!
//! A node kind is implemented as **two halves joined by lock-free state**:
//!
//! - the [`ControlNode`] lives in the [`NodeStore`](crate::store::NodeStore)
//!   and runs only on the control thread — property validation, event drain,
//!   reset requests;
//! - the [`DspNode`] kernel is shared into render schedules behind an
//!   [`RtCell`](crate::rt_cell::RtCell) and runs only on the realtime thread,
//!   once per block.
//!
//! A kind's factory builds both halves wired together: scalars cross through
//! [`AtomicF32`](crate::atomic::AtomicF32), buffers and commands through
//! [`spsc`](crate::spsc) rings, sample data through shared-immutable
//! [`AudioData`](crate::resource::AudioData) handles. A kernel that needs
//! commands drains its ring at the top of `process`, which is what makes
//! property writes issued before a schedule rebuild visible by the time the
//! rebuilt schedule runs.

use std::fmt;
use std::sync::Arc;

use crate::error::PropertyError;
use crate::resource::ResourceMap;
use crate::root::RootState;
use crate::rt_cell::RtCell;
use crate::value::Value;

/// Client-assigned node identifier, unique for the lifetime of a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Shared handle to a node's realtime half.
///
/// Cloned into every schedule that renders the node; the store's clone plus
/// the live schedules' clones are exactly what [`Runtime::gc`](crate::Runtime::gc)
/// counts.
pub type Kernel = Arc<RtCell<Box<dyn DspNode>>>;

/// Wraps a DSP kernel into a shareable [`Kernel`] handle.
pub fn make_kernel(dsp: impl DspNode + 'static) -> Kernel {
    let dsp: Box<dyn DspNode> = Box::new(dsp);
    Arc::new(RtCell::new(dsp))
}

/// Everything handed to [`DspNode::process`] for one block.
///
/// Lifetimes: `'a` is the duration of the call; `'b` is the scratch storage
/// behind the output slices (longer-lived, owned by the schedule).
pub struct RenderContext<'a, 'b> {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Samples to produce in this call. Output slices are exactly this long.
    pub frames: usize,
    /// Whether the owning root is active (target gain 1). Fading-out roots
    /// still render but report `false` here.
    pub active: bool,
    /// Host input channels for this block.
    pub host_inputs: &'a [&'a [f32]],
    /// One slice per child edge, in child-list order.
    pub inputs: &'a [&'a [f32]],
    /// One slice per declared output channel.
    pub outputs: &'a mut [&'b mut [f32]],
}

impl RenderContext<'_, '_> {
    /// Number of connected inputs.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Zero-fills every output channel. The standard response to missing
    /// required inputs: the audio callback never fails.
    pub fn zero_outputs(&mut self) {
        for out in self.outputs.iter_mut() {
            out.fill(0.0);
        }
    }
}

/// Control-thread half of a node kind.
pub trait ControlNode: Send {
    /// Validates and applies a property.
    ///
    /// Runs on the control thread; hands values to the kernel through the
    /// kind's own lock-free state. Unknown keys are accepted and ignored —
    /// the store caches every successfully set property for
    /// [`Runtime::snapshot`](crate::Runtime::snapshot) regardless.
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        resources: &mut ResourceMap,
    ) -> Result<(), PropertyError>;

    /// Drains events produced by the kernel since the last pump and emits
    /// each as `(name, payload)`.
    fn process_events(&mut self, emit: &mut dyn FnMut(&str, Value)) {
        let _ = emit;
    }

    /// Requests that kernel state (delay lines, sample readers) be cleared.
    ///
    /// Delivery is a command drained at the kernel's next block start.
    fn reset(&mut self) {}

    /// Declared output channels; the scheduler assigns one scratch buffer
    /// per channel.
    fn num_outputs(&self) -> usize {
        1
    }

    /// True only for the feedback-tap producer kind; the scheduler collects
    /// these per root for the post-block promotion walk.
    fn is_feedback_writer(&self) -> bool {
        false
    }
}

/// Realtime half of a node kind.
///
/// `process` must fill each output channel for exactly `ctx.frames` samples,
/// must not allocate, lock, or block, and must zero its outputs when required
/// inputs are missing.
pub trait DspNode: Send {
    /// Renders one block.
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>);

    /// Publishes a tap-out's accumulated block into its shared buffer.
    /// No-op for every other kind.
    fn promote_tap(&mut self) {}
}

/// A freshly constructed node: both halves, plus root state for root kinds.
pub struct NodeParts {
    /// Control-thread half, stored in the node store.
    pub control: Box<dyn ControlNode>,
    /// Realtime half, shared into schedules.
    pub kernel: Kernel,
    /// Present only for the root kind.
    pub root: Option<Arc<RootState>>,
}

impl NodeParts {
    /// Bundles a control half with a kernel.
    pub fn new(control: impl ControlNode + 'static, dsp: impl DspNode + 'static) -> Self {
        Self {
            control: Box::new(control),
            kernel: make_kernel(dsp),
            root: None,
        }
    }

    /// Attaches root state (root kind only).
    pub fn with_root(mut self, root: Arc<RootState>) -> Self {
        self.root = Some(root);
        self
    }
}
