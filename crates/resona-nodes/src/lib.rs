//! Built-in DSP node kinds for the resona engine.
//!
//! Every kind here is a factory (`fn(&RuntimeConfig) -> NodeParts`) producing
//! the two halves of the node contract: a control half that validates
//! properties and hands state across the thread boundary, and a realtime
//! kernel that renders blocks. Register them individually with
//! [`Runtime::register_node_kind`](resona_core::Runtime::register_node_kind),
//! or all at once through `resona-registry`.
//!
//! Kind vocabulary by module:
//!
//! - [`math`] — `in`, `sr`, `const`, unary/binary operators, n-ary `add`/`mul`
//! - [`signal`] — `counter`, `accum`, `latch`, `maxhold`, `once`, `phasor`,
//!   `noise`, `metro`
//! - [`seq`] — `seq` (dense), `sparseq` (sparse)
//! - [`delay`] — `delay`, `sdelay`, `z`
//! - [`filter`] — `pole`, `biquad`, `svf`
//! - [`envelope`] — `adsr`
//! - [`sampler`] — `sample`, `sampleseq`
//! - [`table`] — `table`
//! - [`tap`] — `tapIn`, `tapOut`

pub mod delay;
pub mod envelope;
pub mod filter;
pub mod math;
pub mod sampler;
pub mod seq;
pub mod signal;
pub mod table;
pub mod tap;

/// Flushes denormal magnitudes to zero so feedback paths cannot degenerate
/// into denormal processing.
#[inline]
pub(crate) fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Linear interpolation into a sample buffer at a fractional position.
/// Positions outside the buffer read as silence.
#[inline]
pub(crate) fn interp_read(data: &[f32], position: f64) -> f32 {
    if data.is_empty() || position < 0.0 {
        return 0.0;
    }
    let base = position.floor();
    let frac = (position - base) as f32;
    let index = base as usize;
    if index + 1 < data.len() {
        data[index] * (1.0 - frac) + data[index + 1] * frac
    } else if index < data.len() {
        data[index]
    } else {
        0.0
    }
}

#[cfg(test)]
pub(crate) mod testkit {
    //! Shared harness for driving node halves directly.

    use resona_core::node::{NodeParts, RenderContext};
    use resona_core::{ResourceMap, Value};

    /// Processes one block through a single-output kernel.
    pub fn process_mono(parts: &NodeParts, inputs: &[&[f32]], frames: usize) -> Vec<f32> {
        process_mono_at(parts, inputs, frames, 48000.0)
    }

    /// As [`process_mono`], with an explicit sample rate.
    pub fn process_mono_at(
        parts: &NodeParts,
        inputs: &[&[f32]],
        frames: usize,
        sample_rate: f64,
    ) -> Vec<f32> {
        let mut out = vec![0.0f32; frames];
        let mut outputs: [&mut [f32]; 1] = [&mut out[..]];
        let mut ctx = RenderContext {
            sample_rate,
            frames,
            active: true,
            host_inputs: &[],
            inputs,
            outputs: &mut outputs,
        };
        // SAFETY: the test owns the only kernel handle.
        unsafe { parts.kernel.borrow_mut() }.process(&mut ctx);
        out
    }

    /// Sets a property, panicking on rejection.
    pub fn set(parts: &mut NodeParts, resources: &mut ResourceMap, key: &str, value: Value) {
        parts
            .control
            .set_property(key, &value, resources)
            .unwrap_or_else(|e| panic!("set_property({key}) failed: {e}"));
    }

    /// Drains events into a vec of `(name, payload)`.
    pub fn drain_events(parts: &mut NodeParts) -> Vec<(String, Value)> {
        let mut events = Vec::new();
        parts
            .control
            .process_events(&mut |name, payload| events.push((name.to_string(), payload)));
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interp_read() {
        let data = [0.0, 1.0, 2.0];
        assert_eq!(interp_read(&data, 0.5), 0.5);
        assert_eq!(interp_read(&data, 1.0), 1.0);
        assert_eq!(interp_read(&data, 2.0), 2.0);
        assert_eq!(interp_read(&data, 2.7), 2.0, "tail clamps to last sample");
        assert_eq!(interp_read(&data, 5.0), 0.0);
        assert_eq!(interp_read(&data, -0.1), 0.0);
        assert_eq!(interp_read(&[], 0.0), 0.0);
    }

    #[test]
    fn test_flush_denormal() {
        assert_eq!(flush_denormal(1e-25), 0.0);
        assert_eq!(flush_denormal(1e-10), 1e-10);
        assert_eq!(flush_denormal(-1e-25), 0.0);
    }
}
