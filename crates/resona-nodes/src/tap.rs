//! Feedback tap pair: `tapIn` (consumer) and `tapOut` (producer).
//!
//! The pair meet at a named block-sized buffer in the resource map. During a
//! block, `tapIn` copies the most recently *promoted* buffer to its output
//! and `tapOut` stashes its input in private storage while passing it
//! through. After every root has rendered, the renderer walks each active
//! root's tap-out list and calls [`DspNode::promote_tap`], publishing the
//! stashed block for the next block's consumers. Process-then-promote is
//! what makes the feedback delay exactly one block — the only legal cycle in
//! the graph.

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::resource::TapBuffer;
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

struct TapControl {
    buffers: spsc::Producer<TapBuffer>,
    feedback_writer: bool,
}

impl ControlNode for TapControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "name" {
            let name = value.as_str().ok_or(PropertyError::InvalidType)?;
            if name.is_empty() {
                return Err(PropertyError::InvalidValue);
            }
            if self.buffers.push(resources.tap(name)).is_err() {
                tracing::warn!("tap buffer queue full; dropping rename");
            }
        }
        Ok(())
    }

    fn is_feedback_writer(&self) -> bool {
        self.feedback_writer
    }
}

// --- tapIn ---

struct TapInDsp {
    buffers: spsc::Consumer<TapBuffer>,
    tap: Option<TapBuffer>,
}

impl DspNode for TapInDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if let Some(tap) = self.buffers.pop_latest() {
            self.tap = Some(tap);
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        match self.tap.as_ref() {
            Some(tap) => {
                // SAFETY: realtime thread, executing schedule; promotion for
                // this block has not run yet, so this reads last block's
                // published data.
                let shared = unsafe { tap.borrow_mut() };
                out.copy_from_slice(&shared[..ctx.frames]);
            }
            None => out.fill(0.0),
        }
    }
}

/// `tapIn` — emits the block the matching `tapOut` published last block;
/// property `name` joins the pair.
pub fn tap_in(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(8);
    NodeParts::new(
        TapControl {
            buffers: tx,
            feedback_writer: false,
        },
        TapInDsp {
            buffers: rx,
            tap: None,
        },
    )
}

// --- tapOut ---

struct TapOutDsp {
    buffers: spsc::Consumer<TapBuffer>,
    tap: Option<TapBuffer>,
    /// Private per-block stash, published only at promotion time so an
    /// in-block `tapIn` of the same name still reads last block's data.
    stash: Box<[f32]>,
    stashed_frames: usize,
}

impl DspNode for TapOutDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if let Some(tap) = self.buffers.pop_latest() {
            self.tap = Some(tap);
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        match ctx.inputs.first() {
            Some(input) => {
                let frames = ctx.frames.min(self.stash.len());
                self.stash[..frames].copy_from_slice(&input[..frames]);
                self.stashed_frames = frames;
                out.copy_from_slice(&input[..ctx.frames]);
            }
            None => {
                self.stashed_frames = 0;
                out.fill(0.0);
            }
        }
    }

    fn promote_tap(&mut self) {
        let Some(tap) = self.tap.as_ref() else {
            return;
        };
        let frames = self.stashed_frames.min(tap.len());
        if frames == 0 {
            return;
        }
        // SAFETY: called from the renderer's promotion walk, after all
        // processing for the block; no concurrent reader.
        let shared = unsafe { tap.borrow_mut() };
        shared[..frames].copy_from_slice(&self.stash[..frames]);
    }
}

/// `tapOut` — passes its input through while stashing it for promotion into
/// the shared tap buffer at end of block; property `name` joins the pair.
pub fn tap_out(config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(8);
    NodeParts::new(
        TapControl {
            buffers: tx,
            feedback_writer: true,
        },
        TapOutDsp {
            buffers: rx,
            tap: None,
            stash: vec![0.0; config.block_size].into_boxed_slice(),
            stashed_frames: 0,
        },
    )
}
