//! Per-block level metering.

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

use crate::payload;

/// One reading per rendered block; sized for several seconds of backlog
/// between pump calls.
const READING_QUEUE_CAPACITY: usize = 256;

#[derive(Clone, Copy)]
struct Reading {
    min: f32,
    max: f32,
}

struct MeterControl {
    readings: spsc::Consumer<Reading>,
    name: String,
}

impl ControlNode for MeterControl {
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
        while let Some(reading) = self.readings.pop() {
            emit(
                "meter",
                payload(
                    &self.name,
                    [
                        ("min", Value::Number(f64::from(reading.min))),
                        ("max", Value::Number(f64::from(reading.max))),
                    ],
                ),
            );
        }
    }
}

struct MeterDsp {
    readings: spsc::Producer<Reading>,
}

impl DspNode for MeterDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(input) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        out.copy_from_slice(&input[..ctx.frames]);

        let mut reading = Reading {
            min: f32::INFINITY,
            max: f32::NEG_INFINITY,
        };
        for &x in &input[..ctx.frames] {
            reading.min = reading.min.min(x);
            reading.max = reading.max.max(x);
        }
        if self.readings.push(reading).is_err() {
            // Pump has fallen far behind; the newest readings matter most,
            // but dropping here is the only realtime-safe option.
        }
    }
}

/// `meter` — passes audio through and emits one `meter` event per block with
/// the block's min and max sample values.
pub fn meter(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(READING_QUEUE_CAPACITY);
    NodeParts::new(
        MeterControl {
            readings: rx,
            name: String::new(),
        },
        MeterDsp { readings: tx },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_meter_emits_block_extrema() {
        let mut resources = ResourceMap::new(8);
        let mut parts = meter(&RuntimeConfig::default());
        testkit::set(&mut parts, &mut resources, "name", Value::String("m1".into()));

        let input = [0.5f32, -0.75, 0.25, 0.0];
        let through = testkit::process_mono(&parts, &[&input], 4);
        assert_eq!(through, input.to_vec());

        let events = testkit::drain_events(&mut parts);
        assert_eq!(events.len(), 1);
        let (name, body) = &events[0];
        assert_eq!(name, "meter");
        let map = body.as_object().unwrap();
        assert_eq!(map.get("source").and_then(Value::as_str), Some("m1"));
        assert_eq!(map.get("min").and_then(Value::as_number), Some(-0.75));
        assert_eq!(map.get("max").and_then(Value::as_number), Some(0.5));
    }

    #[test]
    fn test_meter_one_event_per_block() {
        let mut parts = meter(&RuntimeConfig::default());
        let input = [0.0f32; 8];
        for _ in 0..4 {
            let _ = testkit::process_mono(&parts, &[&input], 8);
        }
        assert_eq!(testkit::drain_events(&mut parts).len(), 4);
        assert!(testkit::drain_events(&mut parts).is_empty());
    }
}
