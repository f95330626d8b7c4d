//! Spectral analysis.
//!
//! The kernel frames its input through a sample ring; the control half pulls
//! complete frames, applies a Hann window, runs the FFT, and emits the
//! positive-frequency spectrum as `fft` events. All FFT work happens on the
//! control thread — the realtime side only copies samples.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft as RustFft, FftPlanner};

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RingBuffer, RuntimeConfig, Value};

use crate::payload;

const FFT_RING_CAPACITY: usize = 16384;
const MAX_FFT_SIZE: usize = 8192;
const DEFAULT_FFT_SIZE: usize = 1024;

struct FftControl {
    ring: Arc<RingBuffer>,
    name: String,
    size: usize,
    planner: FftPlanner<f32>,
    plan: Arc<dyn RustFft<f32>>,
    window: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
}

impl FftControl {
    fn replan(&mut self, size: usize) {
        self.size = size;
        self.plan = self.planner.plan_fft_forward(size);
        self.window = hann(size);
        self.frame = vec![0.0; size];
        self.spectrum = vec![Complex::new(0.0, 0.0); size];
    }
}

fn hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}

impl ControlNode for FftControl {
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
                if size < 2 || size > MAX_FFT_SIZE || !size.is_power_of_two() {
                    return Err(PropertyError::InvalidValue);
                }
                if size != self.size {
                    self.replan(size);
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
        loop {
            {
                let frame = &mut self.frame[..];
                if !self.ring.read(&mut [frame]) {
                    break;
                }
            }
            for (bin, (&sample, &w)) in self
                .spectrum
                .iter_mut()
                .zip(self.frame.iter().zip(&self.window))
            {
                *bin = Complex::new(sample * w, 0.0);
            }
            self.plan.process(&mut self.spectrum);

            // Positive frequencies only: DC through Nyquist.
            let bins = self.size / 2 + 1;
            let real: Vec<f32> = self.spectrum[..bins].iter().map(|c| c.re).collect();
            let imag: Vec<f32> = self.spectrum[..bins].iter().map(|c| c.im).collect();
            emit(
                "fft",
                payload(
                    &self.name,
                    [
                        ("real", Value::Floats(real)),
                        ("imag", Value::Floats(imag)),
                    ],
                ),
            );
        }
    }

    fn reset(&mut self) {
        self.ring.clear();
    }
}

struct FftDsp {
    ring: Arc<RingBuffer>,
}

impl DspNode for FftDsp {
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

/// `fft` — passes audio through while framing it for spectral analysis;
/// every `size` samples (default 1024, power of two) become one `fft` event
/// with Hann-windowed `real`/`imag` spectra up to Nyquist.
pub fn fft(_config: &RuntimeConfig) -> NodeParts {
    let ring = Arc::new(RingBuffer::new(1, FFT_RING_CAPACITY));
    let mut planner = FftPlanner::new();
    let plan = planner.plan_fft_forward(DEFAULT_FFT_SIZE);
    NodeParts::new(
        FftControl {
            ring: Arc::clone(&ring),
            name: String::new(),
            size: DEFAULT_FFT_SIZE,
            planner,
            plan,
            window: hann(DEFAULT_FFT_SIZE),
            frame: vec![0.0; DEFAULT_FFT_SIZE],
            spectrum: vec![Complex::new(0.0, 0.0); DEFAULT_FFT_SIZE],
        },
        FftDsp { ring },
    )
}
