//! Realtime block processing.
//!
//! [`RenderProcessor`] is the realtime half of a [`Runtime`](crate::Runtime):
//! move it to the audio thread (or call it inline for offline rendering) and
//! feed it host blocks. Per block it:
//!
//! 1. drains the schedule queue to the latest entry, swapping schedules at
//!    the block boundary and returning superseded ones over the retired
//!    queue so they are dropped on the control thread;
//! 2. zeroes the host output channels (output is overwritten, not summed);
//! 3. executes each live root subsequence in order and sums the root's
//!    subtree output into its host channel under the linear fade;
//! 4. walks each active root's tap-out list and promotes, which is what
//!    gives feedback taps their exact one-block delay.
//!
//! Nothing in this module allocates, locks, or blocks after construction.

use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::root::GAIN_SLOPE;
use crate::schedule::{InputSource, RenderSchedule};
use crate::spsc;
use crate::node::RenderContext;

/// Host input channels beyond this count are ignored.
const MAX_INPUT_CHANNELS: usize = 32;

/// The realtime half: consumes schedules, produces audio.
pub struct RenderProcessor {
    config: RuntimeConfig,
    schedule_rx: spsc::Consumer<Arc<RenderSchedule>>,
    retired_tx: spsc::Producer<Arc<RenderSchedule>>,
    current: Option<Arc<RenderSchedule>>,
}

impl RenderProcessor {
    pub(crate) fn new(
        config: RuntimeConfig,
        schedule_rx: spsc::Consumer<Arc<RenderSchedule>>,
        retired_tx: spsc::Producer<Arc<RenderSchedule>>,
    ) -> Self {
        Self {
            config,
            schedule_rx,
            retired_tx,
            current: None,
        }
    }

    /// Renders `frames` samples into `outputs`, overwriting them completely.
    ///
    /// `inputs` and `outputs` carry one slice per host channel, each at least
    /// `frames` long. Calls larger than the configured block size are
    /// processed in block-size slices with a schedule-swap opportunity at
    /// each boundary; `frames == 0` returns immediately.
    pub fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        for out in outputs.iter_mut() {
            out[..frames].fill(0.0);
        }
        if frames == 0 {
            return;
        }

        let block_size = self.config.block_size;
        let mut offset = 0;
        while offset < frames {
            let chunk = (frames - offset).min(block_size);
            self.swap_to_latest();
            self.render_block(inputs, outputs, offset, chunk);
            offset += chunk;
        }
    }

    /// True once a schedule has been taken. Mostly useful to hosts that want
    /// to idle until the first commit lands.
    pub fn has_schedule(&self) -> bool {
        self.current.is_some()
    }

    fn swap_to_latest(&mut self) {
        while let Some(next) = self.schedule_rx.pop() {
            if let Some(old) = self.current.replace(next) {
                // Dropping on this thread would free memory here; hand the
                // retired schedule back instead. If the return queue is ever
                // full (control thread long gone), dropping is the only
                // remaining option.
                let _ = self.retired_tx.push(old);
            }
        }
    }

    fn render_block(
        &mut self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        offset: usize,
        frames: usize,
    ) {
        let Some(schedule) = self.current.as_ref() else {
            return;
        };

        // Host input views for this chunk.
        let mut host_inputs: [&[f32]; MAX_INPUT_CHANNELS] = [&[]; MAX_INPUT_CHANNELS];
        let num_inputs = inputs.len().min(MAX_INPUT_CHANNELS);
        for (slot, channel) in host_inputs.iter_mut().zip(inputs.iter()) {
            *slot = &channel[offset..offset + frames];
        }
        let host_inputs = &host_inputs[..num_inputs];

        // SAFETY: this thread is executing the active schedule; nothing else
        // touches its workspace, scratch windows, or kernels (RtCell
        // discipline).
        let workspace = unsafe { schedule.workspace.borrow_mut() };

        for sequence in &schedule.roots {
            let root = &sequence.root;
            if !root.still_running() {
                continue;
            }
            let channel = root.channel();
            if channel >= outputs.len() {
                // Out-of-range assignment: skip until the channel is valid.
                continue;
            }
            let active = root.is_active();

            for op in &sequence.ops {
                workspace.inputs.clear();
                for source in op.inputs.iter() {
                    workspace.inputs.push(match source {
                        // SAFETY: scratch windows are disjoint per schedule
                        // and only this thread writes them.
                        InputSource::Buffer(buffer) => unsafe { buffer.as_slice(frames) },
                        InputSource::Silence => unsafe { schedule.silence(frames) },
                    });
                }
                workspace.outputs.clear();
                for buffer in op.outputs.iter() {
                    // SAFETY: as above.
                    workspace.outputs.push(unsafe { buffer.as_mut_slice(frames) });
                }

                let mut ctx = RenderContext {
                    sample_rate: self.config.sample_rate,
                    frames,
                    active,
                    host_inputs,
                    inputs: &workspace.inputs,
                    outputs: &mut workspace.outputs,
                };
                // SAFETY: single accessor, as above.
                unsafe { op.kernel.borrow_mut() }.process(&mut ctx);
            }

            // Sum the root's subtree output into its host channel under the
            // linear fade.
            // SAFETY: as above.
            let source = unsafe { sequence.output.as_slice(frames) };
            let destination = &mut outputs[channel][offset..offset + frames];
            let target = root.target_gain();
            let mut gain = root.current_gain();
            for (out, &sample) in destination.iter_mut().zip(source) {
                gain += (target - gain).clamp(-GAIN_SLOPE, GAIN_SLOPE);
                *out += sample * gain;
            }
            root.store_current_gain(gain);
        }

        // Promotion pass: after every root has rendered, publish each active
        // root's tap-out blocks for the next block's tap-ins. Fading roots do
        // not promote, so a stale writer never clobbers the shared buffer.
        for sequence in &schedule.roots {
            if !sequence.root.is_active() {
                continue;
            }
            for tap in &sequence.taps {
                // SAFETY: single accessor, as above.
                unsafe { tap.borrow_mut() }.promote_tap();
            }
        }
    }
}
