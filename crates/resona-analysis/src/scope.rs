//! Waveform capture for oscilloscope-style display.

use std::sync::Arc;

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RingBuffer, RuntimeConfig, Value};

use crate::payload;

/// Ring capacity in samples; bounds both frame size and backlog.
const SCOPE_RING_CAPACITY: usize = 8192;

struct ScopeControl {
    ring: Arc<RingBuffer>,
    name: String,
    /// Samples per emitted frame. Read only on the control thread, so a
    /// plain field is enough.
    size: usize,
}

impl ControlNode for ScopeControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        match key {
            "size" => {
                if value.as_number().is_none() {
                    return Err(PropertyError::InvalidType);
                }
                let size = value.as_index().ok_or(PropertyError::InvalidValue)?;
                if size == 0 || size > SCOPE_RING_CAPACITY {
                    return Err(PropertyError::InvalidValue);
                }
                self.size = size;
            }
            "name" => {
                self.name = value
                    .as_str()
                    .ok_or(PropertyError::InvalidType)?
                    .to_string();
            }
            _ => {}
        }
        Ok(())
    }

    fn process_events(&mut self, emit: &mut dyn FnMut(&str, Value)) {
        let mut frame = vec![0.0f32; self.size];
        while self.ring.read(&mut [&mut frame[..]]) {
            emit(
                "scope",
                payload(&self.name, [("data", Value::Floats(frame.clone()))]),
            );
        }
    }

    fn reset(&mut self) {
        self.ring.clear();
    }
}

struct ScopeDsp {
    ring: Arc<RingBuffer>,
}

impl DspNode for ScopeDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(input) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        out.copy_from_slice(&input[..ctx.frames]);
        self.ring.write(&[&input[..ctx.frames]]);
    }
}

/// `scope` — passes audio through while capturing it; every full `size`
/// samples (default 512) become one `scope` event carrying the frame.
pub fn scope(_config: &RuntimeConfig) -> NodeParts {
    let ring = Arc::new(RingBuffer::new(1, SCOPE_RING_CAPACITY));
    NodeParts::new(
        ScopeControl {
            ring: Arc::clone(&ring),
            name: String::new(),
            size: 512,
        },
        ScopeDsp { ring },
    )
}
