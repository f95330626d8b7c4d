//! Delay kinds: interpolated variable delay with feedback (`delay`), fixed
//! sample delay (`sdelay`), and the unit delay (`z`).
//!
//! Delay storage is allocated on the control thread when the `size` property
//! arrives and shipped to the kernel over the command ring; displaced buffers
//! travel back over a trash ring so deallocation also happens off the
//! realtime thread.

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

const COMMAND_QUEUE_CAPACITY: usize = 8;

enum DelayCommand {
    Buffer(Box<[f32]>),
    Clear,
}

fn decode_size(value: &Value) -> Result<usize, PropertyError> {
    if value.as_number().is_none() {
        return Err(PropertyError::InvalidType);
    }
    value.as_index().ok_or(PropertyError::InvalidValue)
}

// --- delay ---

struct DelayControl {
    commands: spsc::Producer<DelayCommand>,
    trash: spsc::Consumer<Box<[f32]>>,
}

impl DelayControl {
    fn drain_trash(&mut self) {
        while self.trash.pop().is_some() {}
    }
}

impl ControlNode for DelayControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        self.drain_trash();
        if key == "size" {
            let size = decode_size(value)?.max(1).next_power_of_two();
            let buffer = vec![0.0f32; size].into_boxed_slice();
            if self.commands.push(DelayCommand::Buffer(buffer)).is_err() {
                tracing::warn!("delay command queue full; dropping resize");
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.drain_trash();
        if self.commands.push(DelayCommand::Clear).is_err() {
            tracing::warn!("delay command queue full; dropping clear");
        }
    }
}

struct DelayDsp {
    commands: spsc::Consumer<DelayCommand>,
    trash: spsc::Producer<Box<[f32]>>,
    buffer: Box<[f32]>,
    write: usize,
}

impl DelayDsp {
    fn drain_commands(&mut self) {
        while let Some(command) = self.commands.pop() {
            match command {
                DelayCommand::Buffer(buffer) => {
                    let old = std::mem::replace(&mut self.buffer, buffer);
                    self.write = 0;
                    // Last resort if the control half is gone: drop here.
                    let _ = self.trash.push(old);
                }
                DelayCommand::Clear => {
                    self.buffer.fill(0.0);
                    self.write = 0;
                }
            }
        }
    }

    /// Interpolated read `delay` samples behind the write head, where the
    /// current input stands in for a delay of zero.
    #[inline]
    fn read(&self, x: f32, delay: f32) -> f32 {
        let capacity = self.buffer.len();
        let mask = capacity - 1;
        let clamped = delay.clamp(0.0, (capacity - 1) as f32);
        let int = clamped as usize;
        let frac = clamped - int as f32;
        let newer = if int == 0 {
            x
        } else {
            self.buffer[(self.write + capacity - int) & mask]
        };
        let older = self.buffer[(self.write + capacity - int - 1) & mask];
        newer * (1.0 - frac) + older * frac
    }
}

impl DspNode for DelayDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        self.drain_commands();
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let (Some(signal), Some(length)) = (ctx.inputs.first(), ctx.inputs.get(1)) else {
            out.fill(0.0);
            return;
        };
        let feedback = ctx.inputs.get(2);
        if self.buffer.is_empty() {
            out.copy_from_slice(&signal[..ctx.frames]);
            return;
        }
        let mask = self.buffer.len() - 1;
        for n in 0..ctx.frames {
            let x = signal[n];
            let y = self.read(x, length[n]);
            let fb = feedback.map_or(0.0, |f| f[n]);
            self.buffer[self.write] = crate::flush_denormal(x + fb * y);
            self.write = (self.write + 1) & mask;
            out[n] = y;
        }
    }
}

/// `delay` — variable-length interpolated delay with feedback.
///
/// Property `size` sets the maximum delay in samples (rounded up to a power
/// of two, default 16384). Inputs: signal, delay length in samples, optional
/// feedback gain.
pub fn delay(_config: &RuntimeConfig) -> NodeParts {
    let (command_tx, command_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    let (trash_tx, trash_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    NodeParts::new(
        DelayControl {
            commands: command_tx,
            trash: trash_rx,
        },
        DelayDsp {
            commands: command_rx,
            trash: trash_tx,
            buffer: vec![0.0; 16384].into_boxed_slice(),
            write: 0,
        },
    )
}

// --- sdelay ---

struct SampleDelayControl {
    commands: spsc::Producer<DelayCommand>,
    trash: spsc::Consumer<Box<[f32]>>,
}

impl ControlNode for SampleDelayControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        while self.trash.pop().is_some() {}
        if key == "size" {
            let size = decode_size(value)?;
            let buffer = vec![0.0f32; size].into_boxed_slice();
            if self.commands.push(DelayCommand::Buffer(buffer)).is_err() {
                tracing::warn!("sdelay command queue full; dropping resize");
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        while self.trash.pop().is_some() {}
        if self.commands.push(DelayCommand::Clear).is_err() {
            tracing::warn!("sdelay command queue full; dropping clear");
        }
    }
}

struct SampleDelayDsp {
    commands: spsc::Consumer<DelayCommand>,
    trash: spsc::Producer<Box<[f32]>>,
    buffer: Box<[f32]>,
    cursor: usize,
}

impl DspNode for SampleDelayDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        while let Some(command) = self.commands.pop() {
            match command {
                DelayCommand::Buffer(buffer) => {
                    let old = std::mem::replace(&mut self.buffer, buffer);
                    self.cursor = 0;
                    let _ = self.trash.push(old);
                }
                DelayCommand::Clear => {
                    self.buffer.fill(0.0);
                    self.cursor = 0;
                }
            }
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(signal) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        if self.buffer.is_empty() {
            out.copy_from_slice(&signal[..ctx.frames]);
            return;
        }
        let len = self.buffer.len();
        for n in 0..ctx.frames {
            let x = signal[n];
            out[n] = self.buffer[self.cursor];
            self.buffer[self.cursor] = x;
            self.cursor = (self.cursor + 1) % len;
        }
    }
}

/// `sdelay` — fixed delay of exactly `size` samples, no interpolation.
pub fn sdelay(_config: &RuntimeConfig) -> NodeParts {
    let (command_tx, command_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    let (trash_tx, trash_rx) = spsc::channel(COMMAND_QUEUE_CAPACITY);
    NodeParts::new(
        SampleDelayControl {
            commands: command_tx,
            trash: trash_rx,
        },
        SampleDelayDsp {
            commands: command_rx,
            trash: trash_tx,
            buffer: Box::new([]),
            cursor: 0,
        },
    )
}

// --- z ---

struct UnitDelayControl {
    clear: spsc::Producer<()>,
}

impl ControlNode for UnitDelayControl {
    fn set_property(
        &mut self,
        _key: &str,
        _value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        Ok(())
    }

    fn reset(&mut self) {
        let _ = self.clear.push(());
    }
}

struct UnitDelayDsp {
    clear: spsc::Consumer<()>,
    state: f32,
}

impl DspNode for UnitDelayDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if self.clear.pop_latest().is_some() {
            self.state = 0.0;
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(signal) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        for (o, &x) in out.iter_mut().zip(*signal) {
            *o = self.state;
            self.state = x;
        }
    }
}

/// `z` — single-sample delay.
pub fn z(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(4);
    NodeParts::new(
        UnitDelayControl { clear: tx },
        UnitDelayDsp {
            clear: rx,
            state: 0.0,
        },
    )
}
