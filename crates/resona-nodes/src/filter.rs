//! Filter kinds: one-pole smoother (`pole`), raw-coefficient biquad
//! (`biquad`), and the state variable filter (`svf`).

use std::f32::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

use crate::flush_denormal;

struct ClearingControl {
    clear: spsc::Producer<()>,
}

impl ControlNode for ClearingControl {
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

// --- pole ---

struct PoleDsp {
    clear: spsc::Consumer<()>,
    state: f32,
}

impl DspNode for PoleDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if self.clear.pop_latest().is_some() {
            self.state = 0.0;
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let (Some(pole), Some(signal)) = (ctx.inputs.first(), ctx.inputs.get(1)) else {
            out.fill(0.0);
            return;
        };
        for n in 0..ctx.frames {
            let p = pole[n];
            self.state = flush_denormal(p * self.state + (1.0 - p) * signal[n]);
            out[n] = self.state;
        }
    }
}

/// `pole` — one-pole smoother `y = p·y + (1−p)·x`; inputs (p, x).
pub fn pole(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(4);
    NodeParts::new(
        ClearingControl { clear: tx },
        PoleDsp {
            clear: rx,
            state: 0.0,
        },
    )
}

// --- biquad ---

struct BiquadDsp {
    clear: spsc::Consumer<()>,
    s1: f32,
    s2: f32,
}

impl DspNode for BiquadDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if self.clear.pop_latest().is_some() {
            self.s1 = 0.0;
            self.s2 = 0.0;
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        if ctx.inputs.len() < 6 {
            out.fill(0.0);
            return;
        }
        let (b0, b1, b2) = (ctx.inputs[0], ctx.inputs[1], ctx.inputs[2]);
        let (a1, a2) = (ctx.inputs[3], ctx.inputs[4]);
        let signal = ctx.inputs[5];
        // Transposed direct form II.
        for n in 0..ctx.frames {
            let x = signal[n];
            let y = b0[n] * x + self.s1;
            self.s1 = flush_denormal(b1[n] * x - a1[n] * y + self.s2);
            self.s2 = flush_denormal(b2[n] * x - a2[n] * y);
            out[n] = y;
        }
    }
}

/// `biquad` — second-order IIR with raw signal-rate coefficients; inputs
/// (b0, b1, b2, a1, a2, x).
pub fn biquad(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(4);
    NodeParts::new(
        ClearingControl { clear: tx },
        BiquadDsp {
            clear: rx,
            s1: 0.0,
            s2: 0.0,
        },
    )
}

// --- svf ---

const SVF_LOWPASS: u8 = 0;
const SVF_HIGHPASS: u8 = 1;
const SVF_BANDPASS: u8 = 2;
const SVF_NOTCH: u8 = 3;

struct SvfControl {
    mode: Arc<AtomicU8>,
    clear: spsc::Producer<()>,
}

impl ControlNode for SvfControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "mode" {
            let mode = match value.as_str().ok_or(PropertyError::InvalidType)? {
                "lowpass" => SVF_LOWPASS,
                "highpass" => SVF_HIGHPASS,
                "bandpass" => SVF_BANDPASS,
                "notch" => SVF_NOTCH,
                _ => return Err(PropertyError::InvalidValue),
            };
            self.mode.store(mode, Ordering::Release);
        }
        Ok(())
    }

    fn reset(&mut self) {
        let _ = self.clear.push(());
    }
}

struct SvfDsp {
    mode: Arc<AtomicU8>,
    clear: spsc::Consumer<()>,
    ic1eq: f32,
    ic2eq: f32,
    // Cached coefficients, recomputed when (fc, q) move.
    g: f32,
    k: f32,
    cached_fc: f32,
    cached_q: f32,
}

impl SvfDsp {
    #[inline]
    fn update_coefficients(&mut self, fc: f32, q: f32, sample_rate: f32) {
        if fc == self.cached_fc && q == self.cached_q {
            return;
        }
        self.cached_fc = fc;
        self.cached_q = q;
        let fc = fc.clamp(10.0, sample_rate * 0.49);
        self.g = (PI * fc / sample_rate).tan();
        self.k = 1.0 / q.clamp(0.25, 40.0);
    }
}

impl DspNode for SvfDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if self.clear.pop_latest().is_some() {
            self.ic1eq = 0.0;
            self.ic2eq = 0.0;
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        if ctx.inputs.len() < 3 {
            out.fill(0.0);
            return;
        }
        let (fc, q, signal) = (ctx.inputs[0], ctx.inputs[1], ctx.inputs[2]);
        let mode = self.mode.load(Ordering::Acquire);
        let sample_rate = ctx.sample_rate as f32;
        for n in 0..ctx.frames {
            self.update_coefficients(fc[n], q[n], sample_rate);
            let x = signal[n];
            let v3 = x - self.ic2eq;
            let v1 = (self.g * v3 + self.ic1eq) / (1.0 + self.g * (self.g + self.k));
            let v2 = self.ic2eq + self.g * v1;
            self.ic1eq = flush_denormal(2.0 * v1 - self.ic1eq);
            self.ic2eq = flush_denormal(2.0 * v2 - self.ic2eq);

            let lp = v2;
            let bp = v1;
            let hp = x - self.k * v1 - v2;
            out[n] = match mode {
                SVF_HIGHPASS => hp,
                SVF_BANDPASS => bp,
                SVF_NOTCH => lp + hp,
                _ => lp,
            };
        }
    }
}

/// `svf` — state variable filter; inputs (cutoff Hz, Q, x), property `mode`
/// selecting `lowpass` (default), `highpass`, `bandpass`, or `notch`.
pub fn svf(_config: &RuntimeConfig) -> NodeParts {
    let mode = Arc::new(AtomicU8::new(SVF_LOWPASS));
    let (tx, rx) = spsc::channel(4);
    NodeParts::new(
        SvfControl {
            mode: Arc::clone(&mode),
            clear: tx,
        },
        SvfDsp {
            mode,
            clear: rx,
            ic1eq: 0.0,
            ic2eq: 0.0,
            g: 0.0,
            k: 0.0,
            cached_fc: f32::NAN,
            cached_q: f32::NAN,
        },
    )
}
