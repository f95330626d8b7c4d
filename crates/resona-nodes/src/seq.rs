//! Sequencer kinds: dense (`seq`) and sparse (`sparseq`).
//!
//! Both hand their sequence data to the kernel over a command ring — sequence
//! arrays can be large, so the control thread ships shared handles instead of
//! writing into kernel state.

use std::sync::Arc;

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

const COMMAND_QUEUE_CAPACITY: usize = 16;

fn warn_full(kind: &str) {
    tracing::warn!(kind, "sequencer command queue full; dropping update");
}

// --- seq (dense) ---

enum SeqCommand {
    Values(Arc<Vec<f32>>),
    Hold(bool),
    Loop(bool),
    Offset(usize),
    Reset,
}

struct SeqControl {
    commands: spsc::Producer<SeqCommand>,
}

impl ControlNode for SeqControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        let command = match key {
            "seq" => {
                let values: Vec<f32> = match value {
                    Value::Floats(data) => data.clone(),
                    Value::Array(items) => items
                        .iter()
                        .map(|item| item.as_number().map(|n| n as f32))
                        .collect::<Option<Vec<f32>>>()
                        .ok_or(PropertyError::InvalidValue)?,
                    _ => return Err(PropertyError::InvalidType),
                };
                SeqCommand::Values(Arc::new(values))
            }
            "hold" => SeqCommand::Hold(value.as_bool().ok_or(PropertyError::InvalidType)?),
            "loop" => SeqCommand::Loop(value.as_bool().ok_or(PropertyError::InvalidType)?),
            "offset" => {
                if value.as_number().is_none() {
                    return Err(PropertyError::InvalidType);
                }
                SeqCommand::Offset(value.as_index().ok_or(PropertyError::InvalidValue)?)
            }
            _ => return Ok(()),
        };
        if self.commands.push(command).is_err() {
            warn_full("seq");
        }
        Ok(())
    }

    fn reset(&mut self) {
        if self.commands.push(SeqCommand::Reset).is_err() {
            warn_full("seq");
        }
    }
}

struct SeqDsp {
    commands: spsc::Consumer<SeqCommand>,
    values: Arc<Vec<f32>>,
    hold: bool,
    looping: bool,
    offset: usize,
    /// Index of the value most recently emitted; `None` until the first
    /// trigger (or after a reset).
    position: Option<usize>,
    current: f32,
    previous_trigger: f32,
    previous_reset: f32,
}

impl SeqDsp {
    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            match command {
                SeqCommand::Values(values) => {
                    self.values = values;
                    self.position = None;
                }
                SeqCommand::Hold(hold) => self.hold = hold,
                SeqCommand::Loop(looping) => self.looping = looping,
                SeqCommand::Offset(offset) => self.offset = offset,
                SeqCommand::Reset => {
                    self.position = None;
                    self.current = 0.0;
                    self.previous_trigger = 0.0;
                    self.previous_reset = 0.0;
                }
            }
        }
    }

    fn advance(&mut self) {
        if self.values.is_empty() {
            self.current = 0.0;
            return;
        }
        let next = match self.position {
            None => self.offset.min(self.values.len() - 1),
            Some(index) => {
                if index + 1 < self.values.len() {
                    index + 1
                } else if self.looping {
                    0
                } else {
                    index
                }
            }
        };
        self.position = Some(next);
        self.current = self.values[next];
    }
}

impl DspNode for SeqDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        self.drain_commands();
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(trigger) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        let reset = ctx.inputs.get(1);
        for n in 0..ctx.frames {
            let r = reset.map_or(0.0, |r| r[n]);
            if r != 0.0 && self.previous_reset == 0.0 {
                self.position = None;
            }
            self.previous_reset = r;

            let t = trigger[n];
            if t != 0.0 && self.previous_trigger == 0.0 {
                self.advance();
            }
            self.previous_trigger = t;

            let gated = t != 0.0 || self.hold;
            out[n] = if gated && self.position.is_some() {
                self.current
            } else {
                0.0
            };
        }
    }
}

/// `seq` — steps through the `seq` value array on rising edges of input 0.
///
/// Properties: `seq` (numbers), `hold` (keep emitting between triggers),
/// `loop` (wrap at the end, default true), `offset` (restart index). A rising
/// edge on input 1 rewinds to the offset; when reset and trigger coincide the
/// reset wins, so that trigger emits the offset value.
pub fn seq(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    NodeParts::new(
        SeqControl { commands: tx },
        SeqDsp {
            commands: rx,
            values: Arc::new(Vec::new()),
            hold: false,
            looping: true,
            offset: 0,
            position: None,
            current: 0.0,
            previous_trigger: 0.0,
            previous_reset: 0.0,
        },
    )
}

// --- sparseq ---

/// One sparse step: emit `value` once the tick counter reaches `time`.
#[derive(Clone, Copy)]
struct SparseStep {
    time: f64,
    value: f32,
}

enum SparseCommand {
    Steps(Arc<Vec<SparseStep>>),
    Reset,
}

struct SparseSeqControl {
    commands: spsc::Producer<SparseCommand>,
}

impl ControlNode for SparseSeqControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key != "seq" {
            return Ok(());
        }
        let items = value.as_array().ok_or(PropertyError::InvalidType)?;
        let mut steps = Vec::with_capacity(items.len());
        for item in items {
            let entry = item.as_object().ok_or(PropertyError::InvalidType)?;
            let time = entry
                .get("time")
                .and_then(Value::as_number)
                .ok_or(PropertyError::InvalidValue)?;
            let step_value = entry
                .get("value")
                .and_then(Value::as_number)
                .ok_or(PropertyError::InvalidValue)?;
            if !time.is_finite() || time < 0.0 {
                return Err(PropertyError::InvalidValue);
            }
            steps.push(SparseStep {
                time,
                value: step_value as f32,
            });
        }
        steps.sort_by(|a, b| a.time.total_cmp(&b.time));
        if self
            .commands
            .push(SparseCommand::Steps(Arc::new(steps)))
            .is_err()
        {
            warn_full("sparseq");
        }
        Ok(())
    }

    fn reset(&mut self) {
        if self.commands.push(SparseCommand::Reset).is_err() {
            warn_full("sparseq");
        }
    }
}

struct SparseSeqDsp {
    commands: spsc::Consumer<SparseCommand>,
    steps: Arc<Vec<SparseStep>>,
    /// Ticks counted so far; -1 until the first clock edge.
    tick: i64,
    previous_clock: f32,
    previous_reset: f32,
}

impl SparseSeqDsp {
    fn value_at_tick(&self) -> f32 {
        let tick = self.tick;
        if tick < 0 {
            return 0.0;
        }
        let mut value = 0.0;
        for step in self.steps.iter() {
            if step.time <= tick as f64 {
                value = step.value;
            } else {
                break;
            }
        }
        value
    }
}

impl DspNode for SparseSeqDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        while let Some(command) = self.commands.pop() {
            match command {
                SparseCommand::Steps(steps) => self.steps = steps,
                SparseCommand::Reset => {
                    self.tick = -1;
                    self.previous_clock = 0.0;
                    self.previous_reset = 0.0;
                }
            }
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(clock) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        let reset = ctx.inputs.get(1);
        for n in 0..ctx.frames {
            let r = reset.map_or(0.0, |r| r[n]);
            let c = clock[n];
            let reset_edge = r != 0.0 && self.previous_reset == 0.0;
            let clock_edge = c != 0.0 && self.previous_clock == 0.0;
            if reset_edge {
                // A coincident clock edge is swallowed: this sample plays
                // from tick zero.
                self.tick = 0;
            } else if clock_edge {
                self.tick += 1;
            }
            self.previous_reset = r;
            self.previous_clock = c;
            out[n] = self.value_at_tick();
        }
    }
}

/// `sparseq` — sparse sequencer over `(time, value)` steps.
///
/// Input 0 is a clock: each rising edge advances the tick counter (the first
/// edge lands on tick 0). Input 1 is a reset: a rising edge rewinds to tick
/// 0, swallowing any coincident clock edge. The output is the value of the
/// latest step whose `time` is at or before the current tick, and 0 before
/// the first edge.
pub fn sparseq(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    NodeParts::new(
        SparseSeqControl { commands: tx },
        SparseSeqDsp {
            commands: rx,
            steps: Arc::new(Vec::new()),
            tick: -1,
            previous_clock: 0.0,
            previous_reset: 0.0,
        },
    )
}
