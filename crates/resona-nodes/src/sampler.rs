//! Sample playback kinds: the gated/triggered player (`sample`) and the
//! time-driven segment sequencer (`sampleseq`).
//!
//! Both read shared immutable buffers published through the resource map.
//! Referencing a name that has not been published is not a batch error — the
//! node reports it through the event pump as an `error` event and renders
//! silence until the property is set again.

use std::sync::Arc;

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{AudioData, PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

use crate::interp_read;

const COMMAND_QUEUE_CAPACITY: usize = 16;

const MODE_TRIGGER: u8 = 0;
const MODE_GATE: u8 = 1;
const MODE_LOOP: u8 = 2;

fn error_payload(source: &str, message: String) -> Value {
    Value::object([
        ("source", Value::String(source.to_string())),
        ("data", Value::String(message)),
    ])
}

// --- sample ---

enum SampleCommand {
    Data(Arc<AudioData>),
    Mode(u8),
    Start(usize),
    Stop(usize),
    Reset,
}

struct SampleControl {
    commands: spsc::Producer<SampleCommand>,
    trash: spsc::Consumer<Arc<AudioData>>,
    name: String,
    pending_error: Option<String>,
}

impl SampleControl {
    fn push(&mut self, command: SampleCommand) {
        while self.trash.pop().is_some() {}
        if self.commands.push(command).is_err() {
            tracing::warn!("sample command queue full; dropping update");
        }
    }
}

impl ControlNode for SampleControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        match key {
            "path" => {
                let path = value.as_str().ok_or(PropertyError::InvalidType)?;
                match resources.get(path) {
                    Some(data) => self.push(SampleCommand::Data(data)),
                    None => {
                        self.pending_error =
                            Some(format!("sample resource `{path}` is not loaded"));
                    }
                }
            }
            "mode" => {
                let mode = match value.as_str().ok_or(PropertyError::InvalidType)? {
                    "trigger" => MODE_TRIGGER,
                    "gate" => MODE_GATE,
                    "loop" => MODE_LOOP,
                    _ => return Err(PropertyError::InvalidValue),
                };
                self.push(SampleCommand::Mode(mode));
            }
            "startOffset" => {
                if value.as_number().is_none() {
                    return Err(PropertyError::InvalidType);
                }
                let offset = value.as_index().ok_or(PropertyError::InvalidValue)?;
                self.push(SampleCommand::Start(offset));
            }
            "stopOffset" => {
                if value.as_number().is_none() {
                    return Err(PropertyError::InvalidType);
                }
                let offset = value.as_index().ok_or(PropertyError::InvalidValue)?;
                self.push(SampleCommand::Stop(offset));
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
            emit("error", error_payload(&self.name, message));
        }
    }

    fn reset(&mut self) {
        self.push(SampleCommand::Reset);
    }
}

struct SampleDsp {
    commands: spsc::Consumer<SampleCommand>,
    trash: spsc::Producer<Arc<AudioData>>,
    data: Option<Arc<AudioData>>,
    mode: u8,
    start: usize,
    stop: usize,
    position: f64,
    playing: bool,
    previous_gate: f32,
}

impl SampleDsp {
    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            match command {
                SampleCommand::Data(data) => {
                    if let Some(old) = self.data.replace(data) {
                        let _ = self.trash.push(old);
                    }
                    self.playing = false;
                }
                SampleCommand::Mode(mode) => self.mode = mode,
                SampleCommand::Start(start) => self.start = start,
                SampleCommand::Stop(stop) => self.stop = stop,
                SampleCommand::Reset => {
                    self.playing = false;
                    self.position = 0.0;
                    self.previous_gate = 0.0;
                }
            }
        }
    }
}

impl DspNode for SampleDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        self.drain_commands();
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(gate) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        let rate = ctx.inputs.get(1);
        let Some(data) = self.data.as_ref() else {
            out.fill(0.0);
            return;
        };
        let Some(samples) = data.channel(0) else {
            out.fill(0.0);
            return;
        };
        let end = if self.stop > self.start && self.stop <= samples.len() {
            self.stop
        } else {
            samples.len()
        };
        let start = self.start.min(end);
        let span = &samples[..end];

        for n in 0..ctx.frames {
            let g = gate[n];
            if g != 0.0 && self.previous_gate == 0.0 {
                self.position = start as f64;
                self.playing = true;
            }
            if g == 0.0 && self.previous_gate != 0.0 && self.mode != MODE_TRIGGER {
                self.playing = false;
            }
            self.previous_gate = g;

            if self.playing && self.position >= end as f64 {
                if self.mode == MODE_LOOP && g != 0.0 {
                    self.position = start as f64 + (self.position - end as f64);
                } else {
                    self.playing = false;
                }
            }

            if self.playing {
                out[n] = interp_read(span, self.position);
                let step = rate.map_or(1.0, |r| f64::from(r[n]));
                self.position += step;
            } else {
                out[n] = 0.0;
            }
        }
    }
}

/// `sample` — plays the buffer named by `path` on gate edges at input 0,
/// with an optional playback-rate signal at input 1.
///
/// Properties: `path` (resource name), `mode` (`trigger`, `gate`, `loop`),
/// `startOffset`/`stopOffset` (samples), `name` (event source id).
pub fn sample(_config: &RuntimeConfig) -> NodeParts {
    let (command_tx, command_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    let (trash_tx, trash_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    NodeParts::new(
        SampleControl {
            commands: command_tx,
            trash: trash_rx,
            name: String::new(),
            pending_error: None,
        },
        SampleDsp {
            commands: command_rx,
            trash: trash_tx,
            data: None,
            mode: MODE_TRIGGER,
            start: 0,
            stop: 0,
            position: 0.0,
            playing: false,
            previous_gate: 0.0,
        },
    )
}

// --- sampleseq ---

enum SeqCommand {
    Data(Arc<AudioData>),
    Times(Arc<Vec<f64>>),
}

struct SampleSeqControl {
    commands: spsc::Producer<SeqCommand>,
    trash: spsc::Consumer<Arc<AudioData>>,
    name: String,
    pending_error: Option<String>,
}

impl ControlNode for SampleSeqControl {
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
                        if self.commands.push(SeqCommand::Data(data)).is_err() {
                            tracing::warn!("sampleseq command queue full; dropping update");
                        }
                    }
                    None => {
                        self.pending_error =
                            Some(format!("sample resource `{path}` is not loaded"));
                    }
                }
            }
            "seq" => {
                let items = value.as_array().ok_or(PropertyError::InvalidType)?;
                let mut times = Vec::with_capacity(items.len());
                for item in items {
                    let entry = item.as_object().ok_or(PropertyError::InvalidType)?;
                    let time = entry
                        .get("time")
                        .and_then(Value::as_number)
                        .ok_or(PropertyError::InvalidValue)?;
                    if !time.is_finite() || time < 0.0 {
                        return Err(PropertyError::InvalidValue);
                    }
                    times.push(time);
                }
                times.sort_by(f64::total_cmp);
                if self
                    .commands
                    .push(SeqCommand::Times(Arc::new(times)))
                    .is_err()
                {
                    tracing::warn!("sampleseq command queue full; dropping update");
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
            emit("error", error_payload(&self.name, message));
        }
    }
}

struct SampleSeqDsp {
    commands: spsc::Consumer<SeqCommand>,
    trash: spsc::Producer<Arc<AudioData>>,
    data: Option<Arc<AudioData>>,
    times: Arc<Vec<f64>>,
}

impl DspNode for SampleSeqDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        while let Some(command) = self.commands.pop() {
            match command {
                SeqCommand::Data(data) => {
                    if let Some(old) = self.data.replace(data) {
                        let _ = self.trash.push(old);
                    }
                }
                SeqCommand::Times(times) => self.times = times,
            }
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(time) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        let samples = self.data.as_ref().and_then(|d| d.channel(0));
        let Some(samples) = samples else {
            out.fill(0.0);
            return;
        };
        if self.times.is_empty() {
            out.fill(0.0);
            return;
        }

        let rate = ctx.sample_rate;
        for n in 0..ctx.frames {
            let t = f64::from(time[n]);
            // Latest segment boundary at or before t. The playhead is a pure
            // function of the time input, so scrubbing and seeking just work.
            let mut segment = None;
            for &boundary in self.times.iter() {
                if boundary <= t {
                    segment = Some(boundary);
                } else {
                    break;
                }
            }
            out[n] = match segment {
                Some(boundary) => interp_read(samples, (t - boundary) * rate),
                None => 0.0,
            };
        }
    }
}

/// `sampleseq` — gapless segment playback driven by a transport-time signal
/// (seconds) at input 0: each `seq` entry `{time}` restarts the buffer at
/// that transport time.
pub fn sampleseq(_config: &RuntimeConfig) -> NodeParts {
    let (command_tx, command_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    let (trash_tx, trash_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    NodeParts::new(
        SampleSeqControl {
            commands: command_tx,
            trash: trash_rx,
            name: String::new(),
            pending_error: None,
        },
        SampleSeqDsp {
            commands: command_rx,
            trash: trash_tx,
            data: None,
            times: Arc::new(Vec::new()),
        },
    )
}
