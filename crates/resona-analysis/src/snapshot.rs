//! Trigger-latched values (`snapshot`) and gate-bounded recordings
//! (`capture`).

use std::sync::Arc;

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RingBuffer, RuntimeConfig, Value, spsc};

use crate::payload;

// --- snapshot ---

struct SnapshotControl {
    values: spsc::Consumer<f32>,
    name: String,
}

impl ControlNode for SnapshotControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "name" {
            self.name = value
                .as_str()
                .ok_or(PropertyError::InvalidType)?
                .to_string();
        }
        Ok(())
    }

    fn process_events(&mut self, emit: &mut dyn FnMut(&str, Value)) {
        while let Some(value) = self.values.pop() {
            emit(
                "snapshot",
                payload(&self.name, [("data", Value::Number(f64::from(value)))]),
            );
        }
    }
}

struct SnapshotDsp {
    values: spsc::Producer<f32>,
    previous_trigger: f32,
}

impl DspNode for SnapshotDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let (Some(trigger), Some(signal)) = (ctx.inputs.first(), ctx.inputs.get(1)) else {
            out.fill(0.0);
            return;
        };
        for n in 0..ctx.frames {
            let t = trigger[n];
            if t != 0.0 && self.previous_trigger == 0.0 {
                let _ = self.values.push(signal[n]);
            }
            self.previous_trigger = t;
            out[n] = signal[n];
        }
    }
}

/// `snapshot` — on each rising edge of input 0, latches the value of input 1
/// and emits it as a `snapshot` event; passes input 1 through.
pub fn snapshot(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(64);
    NodeParts::new(
        SnapshotControl {
            values: rx,
            name: String::new(),
        },
        SnapshotDsp {
            values: tx,
            previous_trigger: 0.0,
        },
    )
}

// --- capture ---

/// Maximum recording length in samples (~1.5 s at 44.1 kHz).
const CAPTURE_RING_CAPACITY: usize = 1 << 16;

struct CaptureControl {
    ring: Arc<RingBuffer>,
    lengths: spsc::Consumer<usize>,
    name: String,
}

impl ControlNode for CaptureControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "name" {
            self.name = value
                .as_str()
                .ok_or(PropertyError::InvalidType)?
                .to_string();
        }
        Ok(())
    }

    fn process_events(&mut self, emit: &mut dyn FnMut(&str, Value)) {
        while let Some(length) = self.lengths.pop() {
            let mut data = vec![0.0f32; length.min(self.ring.available())];
            if !data.is_empty() && !self.ring.read(&mut [&mut data[..]]) {
                continue;
            }
            emit(
                "capture",
                payload(&self.name, [("data", Value::Floats(data))]),
            );
        }
    }

    fn reset(&mut self) {
        self.ring.clear();
        while self.lengths.pop().is_some() {}
    }
}

struct CaptureDsp {
    ring: Arc<RingBuffer>,
    lengths: spsc::Producer<usize>,
    recorded: usize,
    previous_gate: f32,
}

impl DspNode for CaptureDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let (Some(gate), Some(signal)) = (ctx.inputs.first(), ctx.inputs.get(1)) else {
            out.fill(0.0);
            return;
        };
        for n in 0..ctx.frames {
            let g = gate[n];
            if g != 0.0 {
                if self.previous_gate == 0.0 {
                    self.recorded = 0;
                }
                self.ring.write(&[&signal[n..=n]]);
                self.recorded += 1;
            } else if self.previous_gate != 0.0 {
                // Gate fell: hand the finished take to the control half.
                let _ = self.lengths.push(self.recorded.min(CAPTURE_RING_CAPACITY));
                self.recorded = 0;
            }
            self.previous_gate = g;
            out[n] = signal[n];
        }
    }
}

/// `capture` — records input 1 while the gate at input 0 is high; when the
/// gate falls, the take is emitted as a `capture` event (bounded at ~65k
/// samples).
pub fn capture(_config: &RuntimeConfig) -> NodeParts {
    let ring = Arc::new(RingBuffer::new(1, CAPTURE_RING_CAPACITY));
    let (tx, rx) = spsc::channel(16);
    NodeParts::new(
        CaptureControl {
            ring: Arc::clone(&ring),
            lengths: rx,
            name: String::new(),
        },
        CaptureDsp {
            ring,
            lengths: tx,
            recorded: 0,
            previous_gate: 0.0,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_snapshot_latches_on_rising_edges() {
        let mut resources = ResourceMap::new(8);
        let mut parts = snapshot(&RuntimeConfig::default());
        testkit::set(&mut parts, &mut resources, "name", Value::String("sn".into()));

        let trigger = [0.0f32, 1.0, 1.0, 0.0, 1.0];
        let signal = [10.0f32, 20.0, 30.0, 40.0, 50.0];
        let through = testkit::process_mono(&parts, &[&trigger, &signal], 5);
        assert_eq!(through, signal.to_vec());

        let events = testkit::drain_events(&mut parts);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0].1.as_object().unwrap().get("data"),
            Some(&Value::Number(20.0))
        );
        assert_eq!(
            events[1].1.as_object().unwrap().get("data"),
            Some(&Value::Number(50.0))
        );
    }

    #[test]
    fn test_capture_records_gated_span() {
        let mut resources = ResourceMap::new(8);
        let mut parts = capture(&RuntimeConfig::default());
        testkit::set(&mut parts, &mut resources, "name", Value::String("cap".into()));

        let gate = [0.0f32, 1.0, 1.0, 1.0, 0.0, 0.0];
        let signal = [9.0f32, 1.0, 2.0, 3.0, 9.0, 9.0];
        let _ = testkit::process_mono(&parts, &[&gate, &signal], 6);

        let events = testkit::drain_events(&mut parts);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "capture");
        let map = events[0].1.as_object().unwrap();
        assert_eq!(
            map.get("data").and_then(Value::as_floats),
            Some(&[1.0f32, 2.0, 3.0][..])
        );
    }

    #[test]
    fn test_capture_still_open_emits_nothing() {
        let mut parts = capture(&RuntimeConfig::default());
        let gate = [1.0f32; 4];
        let signal = [1.0f32; 4];
        let _ = testkit::process_mono(&parts, &[&gate, &signal], 4);
        assert!(testkit::drain_events(&mut parts).is_empty());
    }
}
