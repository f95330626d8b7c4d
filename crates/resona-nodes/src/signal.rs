//! Control-signal kinds: counters, gates, phase, noise, and the metronome.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use resona_core::atomic::AtomicF32;
use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

struct Stateless;

impl ControlNode for Stateless {
    fn set_property(
        &mut self,
        _key: &str,
        _value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        Ok(())
    }
}

// --- counter ---

struct CounterDsp {
    count: f32,
}

impl DspNode for CounterDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(gate) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        for (o, &g) in out.iter_mut().zip(*gate) {
            if g != 0.0 {
                *o = self.count;
                self.count += 1.0;
            } else {
                self.count = 0.0;
                *o = 0.0;
            }
        }
    }
}

/// `counter` — counts consecutive high gate samples, starting at 0; a low
/// gate resets the count.
pub fn counter(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(Stateless, CounterDsp { count: 0.0 })
}

// --- accum ---

struct AccumDsp {
    sum: f32,
}

impl DspNode for AccumDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(signal) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        let reset = ctx.inputs.get(1);
        for n in 0..ctx.frames {
            if let Some(r) = reset
                && r[n] != 0.0
            {
                self.sum = 0.0;
            }
            self.sum += signal[n];
            out[n] = self.sum;
        }
    }
}

/// `accum` — running sum of input 0; a non-zero sample on input 1 clears the
/// sum before accumulating.
pub fn accum(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(Stateless, AccumDsp { sum: 0.0 })
}

// --- latch ---

struct LatchDsp {
    held: f32,
    previous_gate: f32,
}

impl DspNode for LatchDsp {
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
            if t != 0.0 && self.previous_gate == 0.0 {
                self.held = signal[n];
            }
            self.previous_gate = t;
            out[n] = self.held;
        }
    }
}

/// `latch` — sample-and-hold: a rising edge on input 0 captures input 1.
pub fn latch(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(
        Stateless,
        LatchDsp {
            held: 0.0,
            previous_gate: 0.0,
        },
    )
}

// --- maxhold ---

struct MaxHoldDsp {
    max: f32,
    started: bool,
    previous_reset: f32,
}

impl DspNode for MaxHoldDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(signal) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        let reset = ctx.inputs.get(1);
        for n in 0..ctx.frames {
            let x = signal[n];
            let r = reset.map_or(0.0, |r| r[n]);
            if (r != 0.0 && self.previous_reset == 0.0) || !self.started {
                self.max = x;
                self.started = true;
            } else {
                self.max = self.max.max(x);
            }
            self.previous_reset = r;
            out[n] = self.max;
        }
    }
}

/// `maxhold` — running maximum of input 0; a rising edge on input 1 restarts
/// the hold from the current sample.
pub fn maxhold(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(
        Stateless,
        MaxHoldDsp {
            max: 0.0,
            started: false,
            previous_reset: 0.0,
        },
    )
}

// --- once ---

struct OnceControl {
    armed: Arc<AtomicBool>,
}

impl ControlNode for OnceControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "arm" {
            let arm = value.as_bool().ok_or(PropertyError::InvalidType)?;
            self.armed.store(arm, Ordering::Release);
        }
        Ok(())
    }
}

struct OnceDsp {
    armed: Arc<AtomicBool>,
    passing: bool,
    previous_gate: f32,
}

impl DspNode for OnceDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(gate) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        for (o, &g) in out.iter_mut().zip(*gate) {
            if g != 0.0 && self.previous_gate == 0.0 && self.armed.swap(false, Ordering::AcqRel)
            {
                self.passing = true;
            }
            if g == 0.0 {
                self.passing = false;
            }
            self.previous_gate = g;
            *o = if self.passing { g } else { 0.0 };
        }
    }
}

/// `once` — passes the first gate pulse after arming (`arm: true`), then
/// stays silent until re-armed.
pub fn once(_config: &RuntimeConfig) -> NodeParts {
    let armed = Arc::new(AtomicBool::new(false));
    NodeParts::new(
        OnceControl {
            armed: Arc::clone(&armed),
        },
        OnceDsp {
            armed,
            passing: false,
            previous_gate: 0.0,
        },
    )
}

// --- phasor ---

struct PhasorDsp {
    phase: f64,
}

impl DspNode for PhasorDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(freq) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        let rate = ctx.sample_rate;
        for (o, &f) in out.iter_mut().zip(*freq) {
            *o = self.phase as f32;
            self.phase += f64::from(f) / rate;
            self.phase -= self.phase.floor();
        }
    }
}

/// `phasor` — a 0..1 ramp at the frequency given by input 0.
pub fn phasor(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(Stateless, PhasorDsp { phase: 0.0 })
}

// --- noise ---

struct NoiseControl {
    seeds: spsc::Producer<u32>,
}

impl ControlNode for NoiseControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "seed" {
            if value.as_number().is_none() {
                return Err(PropertyError::InvalidType);
            }
            let seed = value.as_index().ok_or(PropertyError::InvalidValue)? as u32;
            if self.seeds.push(seed.max(1)).is_err() {
                tracing::warn!("noise seed queue full; dropping reseed");
            }
        }
        Ok(())
    }
}

struct NoiseDsp {
    seeds: spsc::Consumer<u32>,
    state: u32,
}

impl NoiseDsp {
    #[inline]
    fn next(&mut self) -> f32 {
        // xorshift32; cheap, allocation-free, good enough for audio noise.
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl DspNode for NoiseDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if let Some(seed) = self.seeds.pop_latest() {
            self.state = seed;
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        for o in out.iter_mut() {
            *o = self.next();
        }
    }
}

/// `noise` — uniform white noise in [-1, 1); the `seed` property reseeds the
/// generator.
pub fn noise(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(8);
    NodeParts::new(
        NoiseControl { seeds: tx },
        NoiseDsp {
            seeds: rx,
            state: 0x9e3779b9,
        },
    )
}

// --- metro ---

struct MetroControl {
    interval_ms: Arc<AtomicF32>,
}

impl ControlNode for MetroControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "interval" {
            let interval = value.as_number().ok_or(PropertyError::InvalidType)?;
            if !interval.is_finite() || interval <= 0.0 {
                return Err(PropertyError::InvalidValue);
            }
            self.interval_ms.store(interval as f32);
        }
        Ok(())
    }
}

struct MetroDsp {
    interval_ms: Arc<AtomicF32>,
    until_next: f64,
}

impl DspNode for MetroDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let period = (f64::from(self.interval_ms.load()) * 1e-3 * ctx.sample_rate).max(1.0);
        for o in out.iter_mut() {
            if self.until_next <= 0.0 {
                *o = 1.0;
                self.until_next += period;
            } else {
                *o = 0.0;
            }
            self.until_next -= 1.0;
        }
    }
}

/// `metro` — a single-sample pulse every `interval` milliseconds (default
/// 500), starting on the first rendered sample.
pub fn metro(_config: &RuntimeConfig) -> NodeParts {
    let interval_ms = Arc::new(AtomicF32::new(500.0));
    NodeParts::new(
        MetroControl {
            interval_ms: Arc::clone(&interval_ms),
        },
        MetroDsp {
            interval_ms,
            until_next: 0.0,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit;

    #[test]
    fn test_counter_counts_highs_and_resets() {
        let parts = counter(&RuntimeConfig::default());
        let gate = [1.0f32, 1.0, 1.0, 0.0, 1.0, 1.0];
        let out = testkit::process_mono(&parts, &[&gate], 6);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_accum_sums_and_resets() {
        let parts = accum(&RuntimeConfig::default());
        let x = [1.0f32, 1.0, 1.0, 1.0];
        let reset = [0.0f32, 0.0, 1.0, 0.0];
        let out = testkit::process_mono(&parts, &[&x, &reset], 4);
        assert_eq!(out, vec![1.0, 2.0, 1.0, 2.0]);
    }

    #[test]
    fn test_latch_captures_on_rising_edge() {
        let parts = latch(&RuntimeConfig::default());
        let trigger = [0.0f32, 1.0, 1.0, 0.0, 1.0];
        let signal = [5.0f32, 6.0, 7.0, 8.0, 9.0];
        let out = testkit::process_mono(&parts, &[&trigger, &signal], 5);
        assert_eq!(out, vec![0.0, 6.0, 6.0, 6.0, 9.0]);
    }

    #[test]
    fn test_maxhold_tracks_and_restarts() {
        let parts = maxhold(&RuntimeConfig::default());
        let x = [0.5f32, 2.0, 1.0, 0.25, 0.5];
        let reset = [0.0f32, 0.0, 0.0, 1.0, 0.0];
        let out = testkit::process_mono(&parts, &[&x, &reset], 5);
        assert_eq!(out, vec![0.5, 2.0, 2.0, 0.25, 0.5]);
    }

    #[test]
    fn test_once_passes_single_pulse() {
        let mut resources = ResourceMap::new(8);
        let mut parts = once(&RuntimeConfig::default());
        testkit::set(&mut parts, &mut resources, "arm", Value::Bool(true));
        let gate = [0.0f32, 1.0, 1.0, 0.0, 1.0, 1.0];
        let out = testkit::process_mono(&parts, &[&gate], 6);
        assert_eq!(out, vec![0.0, 1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_phasor_ramps_and_wraps() {
        let parts = phasor(&RuntimeConfig::default());
        let freq = [12000.0f32; 6];
        let out = testkit::process_mono(&parts, &[&freq], 6);
        // 12 kHz at 48 kHz: steps of 0.25, wrapping after 1.0.
        let expected = [0.0, 0.25, 0.5, 0.75, 0.0, 0.25];
        for (o, e) in out.iter().zip(expected) {
            assert!((o - e).abs() < 1e-6, "expected {e}, got {o}");
        }
    }

    #[test]
    fn test_noise_is_bounded_and_seedable() {
        let mut resources = ResourceMap::new(8);
        let mut parts = noise(&RuntimeConfig::default());
        testkit::set(&mut parts, &mut resources, "seed", Value::Number(7.0));
        let a = testkit::process_mono(&parts, &[], 64);
        assert!(a.iter().all(|x| (-1.0..=1.0).contains(x)));
        assert!(a.iter().any(|&x| x != 0.0));

        // Same seed reproduces the stream.
        testkit::set(&mut parts, &mut resources, "seed", Value::Number(7.0));
        let b = testkit::process_mono(&parts, &[], 64);
        assert_eq!(a, b);
    }

    #[test]
    fn test_metro_pulse_cadence() {
        let mut resources = ResourceMap::new(8);
        let mut parts = metro(&RuntimeConfig::default());
        // 1 ms at 48 kHz = 48 samples.
        testkit::set(&mut parts, &mut resources, "interval", Value::Number(1.0));
        let out = testkit::process_mono(&parts, &[], 96);
        let pulses: Vec<usize> = out
            .iter()
            .enumerate()
            .filter(|&(_, &x)| x == 1.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(pulses, vec![0, 48]);
    }
}
