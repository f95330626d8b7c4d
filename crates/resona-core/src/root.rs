//! The root node kind: a graph's binding to one host output channel.
//!
//! A root owns an output-channel index and a fade envelope. Activation and
//! deactivation (via the `ActivateRoots` instruction) move the *target* gain
//! between 1 and 0; the renderer ramps the *current* gain toward the target
//! at a fixed slope while summing the root's subtree output into the host
//! channel. A root is "still running" while either gain is non-zero — that
//! fade tail is what keeps a deactivated root in the schedule until it falls
//! silent.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::atomic::AtomicF32;
use crate::config::RuntimeConfig;
use crate::error::PropertyError;
use crate::node::{ControlNode, DspNode, NodeParts, RenderContext};
use crate::resource::ResourceMap;
use crate::value::Value;

/// Gain change per sample while fading. A full 0↔1 transition takes 100
/// samples — fast enough to settle within a block at common rates, slow
/// enough to avoid clicks.
pub const GAIN_SLOPE: f32 = 0.01;

/// Shared fade and channel state for one root.
///
/// Written by the control thread (`set_property`, `ActivateRoots`) and the
/// renderer (current gain); read by both. All fields are atomics.
pub struct RootState {
    channel: AtomicUsize,
    target_gain: AtomicF32,
    current_gain: AtomicF32,
}

impl RootState {
    /// Creates state bound to host channel 0, inactive and silent.
    pub fn new() -> Self {
        Self {
            channel: AtomicUsize::new(0),
            target_gain: AtomicF32::new(0.0),
            current_gain: AtomicF32::new(0.0),
        }
    }

    /// Host output channel this root sums into.
    pub fn channel(&self) -> usize {
        self.channel.load(Ordering::Acquire)
    }

    /// Reassigns the host output channel.
    pub fn set_channel(&self, channel: usize) {
        self.channel.store(channel, Ordering::Release);
    }

    /// Marks the root active (target gain 1) or deactivated (target 0).
    pub fn set_active(&self, active: bool) {
        self.target_gain.store(if active { 1.0 } else { 0.0 });
    }

    /// True while the target gain is 1.
    pub fn is_active(&self) -> bool {
        self.target_gain.load() != 0.0
    }

    /// Gain the fade is ramping toward.
    pub fn target_gain(&self) -> f32 {
        self.target_gain.load()
    }

    /// Most recent fade position, updated by the renderer once per block.
    pub fn current_gain(&self) -> f32 {
        self.current_gain.load()
    }

    pub(crate) fn store_current_gain(&self, gain: f32) {
        self.current_gain.store(gain);
    }

    /// True while the root is audible or heading somewhere: target or
    /// current gain non-zero.
    pub fn still_running(&self) -> bool {
        self.target_gain.load() != 0.0 || self.current_gain.load() != 0.0
    }
}

impl Default for RootState {
    fn default() -> Self {
        Self::new()
    }
}

struct RootControl {
    state: Arc<RootState>,
}

impl ControlNode for RootControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "channel" {
            if value.as_number().is_none() {
                return Err(PropertyError::InvalidType);
            }
            let channel = value.as_index().ok_or(PropertyError::InvalidValue)?;
            self.state.set_channel(channel);
        }
        Ok(())
    }
}

/// Kernel: copies the subtree's signal into the root's own scratch buffer.
/// The fade and host-channel sum happen in the renderer.
struct RootDsp;

impl DspNode for RootDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        match ctx.inputs.first() {
            Some(input) => out.copy_from_slice(&input[..ctx.frames]),
            None => out.fill(0.0),
        }
    }
}

/// Factory for the `root` kind.
pub fn factory(_config: &RuntimeConfig) -> NodeParts {
    let state = Arc::new(RootState::new());
    NodeParts::new(
        RootControl {
            state: Arc::clone(&state),
        },
        RootDsp,
    )
    .with_root(state)
}
