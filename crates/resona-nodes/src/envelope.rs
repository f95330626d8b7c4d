//! ADSR envelope generator.

use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value, spsc};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

struct AdsrControl {
    clear: spsc::Producer<()>,
}

impl ControlNode for AdsrControl {
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

struct AdsrDsp {
    clear: spsc::Consumer<()>,
    stage: Stage,
    level: f32,
    previous_gate: f32,
}

impl AdsrDsp {
    /// Per-sample slope for a linear segment covering `span` level units in
    /// `seconds`.
    #[inline]
    fn slope(span: f32, seconds: f32, sample_rate: f32) -> f32 {
        let samples = (seconds.max(0.0) * sample_rate).max(1.0);
        span / samples
    }
}

impl DspNode for AdsrDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        if self.clear.pop_latest().is_some() {
            self.stage = Stage::Idle;
            self.level = 0.0;
            self.previous_gate = 0.0;
        }
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        if ctx.inputs.len() < 5 {
            out.fill(0.0);
            return;
        }
        let (attack, decay, sustain, release) = (
            ctx.inputs[0],
            ctx.inputs[1],
            ctx.inputs[2],
            ctx.inputs[3],
        );
        let gate = ctx.inputs[4];
        let sample_rate = ctx.sample_rate as f32;

        for n in 0..ctx.frames {
            let g = gate[n];
            if g != 0.0 && self.previous_gate == 0.0 {
                self.stage = Stage::Attack;
            } else if g == 0.0 && self.previous_gate != 0.0 {
                self.stage = Stage::Release;
            }
            self.previous_gate = g;

            let s = sustain[n].clamp(0.0, 1.0);
            match self.stage {
                Stage::Idle => self.level = 0.0,
                Stage::Attack => {
                    self.level += Self::slope(1.0, attack[n], sample_rate);
                    if self.level >= 1.0 {
                        self.level = 1.0;
                        self.stage = Stage::Decay;
                    }
                }
                Stage::Decay => {
                    self.level -= Self::slope(1.0 - s, decay[n], sample_rate);
                    if self.level <= s {
                        self.level = s;
                        self.stage = Stage::Sustain;
                    }
                }
                Stage::Sustain => self.level = s,
                Stage::Release => {
                    self.level -= Self::slope(1.0, release[n], sample_rate);
                    if self.level <= 0.0 {
                        self.level = 0.0;
                        self.stage = Stage::Idle;
                    }
                }
            }
            out[n] = self.level;
        }
    }
}

/// `adsr` — linear attack/decay/sustain/release envelope; inputs
/// (attack s, decay s, sustain level, release s, gate). A rising gate starts
/// the attack from the current level; a falling gate releases.
pub fn adsr(_config: &RuntimeConfig) -> NodeParts {
    let (tx, rx) = spsc::channel(4);
    NodeParts::new(
        AdsrControl { clear: tx },
        AdsrDsp {
            clear: rx,
            stage: Stage::Idle,
            level: 0.0,
            previous_gate: 0.0,
        },
    )
}
