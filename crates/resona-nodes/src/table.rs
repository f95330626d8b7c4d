//! Wavetable lookup (`table`).

use std::sync::Arc;

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{AudioData, PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

use crate::interp_read;

struct TableControl {
    commands: spsc::Producer<Arc<AudioData>>,
    trash: spsc::Consumer<Arc<AudioData>>,
    name: String,
    pending_error: Option<String>,
    /// Channel count of the loaded table; declared as output count so the
    /// scheduler assigns one scratch buffer per table channel.
    channels: usize,
}

impl ControlNode for TableControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        while self.trash.pop().is_some() {}
        match key {
            "path" => {
                let path = value.as_str().ok_or(PropertyError::InvalidType)?;
                match resources.get(path) {
                    Some(data) => {
                        self.channels = data.num_channels().max(1);
                        if self.commands.push(data).is_err() {
                            tracing::warn!("table command queue full; dropping update");
                        }
                    }
                    None => {
                        self.pending_error =
                            Some(format!("table resource `{path}` is not loaded"));
                    }
                }
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
        while self.trash.pop().is_some() {}
        if let Some(message) = self.pending_error.take() {
            emit(
                "error",
                Value::object([
                    ("source", Value::String(self.name.clone())),
                    ("data", Value::String(message)),
                ]),
            );
        }
    }

    fn num_outputs(&self) -> usize {
        self.channels
    }
}

struct TableDsp {
    commands: spsc::Consumer<Arc<AudioData>>,
    trash: spsc::Producer<Arc<AudioData>>,
    data: Option<Arc<AudioData>>,
}

impl DspNode for TableDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if let Some(data) = self.commands.pop_latest() {
            if let Some(old) = self.data.replace(data) {
                let _ = self.trash.push(old);
            }
        }
        let Some(position) = ctx.inputs.first().copied() else {
            for out in ctx.outputs.iter_mut() {
                out.fill(0.0);
            }
            return;
        };
        let Some(data) = self.data.as_ref() else {
            for out in ctx.outputs.iter_mut() {
                out.fill(0.0);
            }
            return;
        };
        for (channel, out) in ctx.outputs.iter_mut().enumerate() {
            match data.channel(channel) {
                Some(samples) if !samples.is_empty() => {
                    let span = (samples.len() - 1) as f64;
                    for (o, &p) in out.iter_mut().zip(position) {
                        let clamped = f64::from(p).clamp(0.0, 1.0);
                        *o = interp_read(samples, clamped * span);
                    }
                }
                _ => out.fill(0.0),
            }
        }
    }
}

/// `table` — interpolated lookup into the buffer named by `path`; input 0 is
/// a normalized position in `[0, 1]`, and the node declares one output per
/// table channel.
pub fn table(_config: &RuntimeConfig) -> NodeParts {
    let (command_tx, command_rx) = spsc::channel(8);
    let (trash_tx, trash_rx) = spsc::channel(8);
    NodeParts::new(
        TableControl {
            commands: command_tx,
            trash: trash_rx,
            name: String::new(),
            pending_error: None,
            channels: 1,
        },
        TableDsp {
            commands: command_rx,
            trash: trash_tx,
            data: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use resona_core::node::RenderContext;

    #[test]
    fn test_table_interpolates_position() {
        let mut resources = ResourceMap::new(8);
        resources.insert("wave", AudioData::from_mono(vec![0.0, 1.0, 0.0]));
        let mut parts = table(&RuntimeConfig::default());
        crate::testkit::set(&mut parts, &mut resources, "path", Value::String("wave".into()));

        let position = [0.0f32, 0.25, 0.5, 1.0];
        let out = crate::testkit::process_mono(&parts, &[&position], 4);
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.0]);
    }

    #[test]
    fn test_table_declares_channel_outputs() {
        let mut resources = ResourceMap::new(8);
        resources.insert(
            "st",
            AudioData::new(vec![vec![1.0, 1.0], vec![-1.0, -1.0]]),
        );
        let mut parts = table(&RuntimeConfig::default());
        crate::testkit::set(&mut parts, &mut resources, "path", Value::String("st".into()));
        assert_eq!(parts.control.num_outputs(), 2);

        let position = [0.5f32; 2];
        let mut left = [0.0f32; 2];
        let mut right = [0.0f32; 2];
        {
            let inputs: [&[f32]; 1] = [&position];
            let mut outputs: [&mut [f32]; 2] = [&mut left, &mut right];
            let mut ctx = RenderContext {
                sample_rate: 48000.0,
                frames: 2,
                active: true,
                host_inputs: &[],
                inputs: &inputs,
                outputs: &mut outputs,
            };
            // SAFETY: sole kernel handle.
            unsafe { parts.kernel.borrow_mut() }.process(&mut ctx);
        }
        assert_eq!(left, [1.0; 2]);
        assert_eq!(right, [-1.0; 2]);
    }

    #[test]
    fn test_table_without_data_is_silent() {
        let parts = table(&RuntimeConfig::default());
        let position = [0.5f32; 3];
        let out = crate::testkit::process_mono(&parts, &[&position], 3);
        assert_eq!(out, vec![0.0; 3]);
    }
}
