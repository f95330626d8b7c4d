//! Arithmetic kinds: host input, sample rate, constants, and the operator
//! templates.
//!
//! The operator set is three generic kernels — unary, binary, and n-ary
//! reducing — monomorphized per operator at factory time. A binary operator
//! with fewer than two inputs produces silence (missing required inputs zero
//! the output); the n-ary reducers treat a single input as identity.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use resona_core::atomic::AtomicF32;
use resona_core::node::{ControlNode, DspNode, NodeParts, RenderContext};
use resona_core::{PropertyError, ResourceMap, RuntimeConfig, Value};

/// Control half for kinds without validated properties.
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

// --- in ---

struct InControl {
    channel: Arc<AtomicUsize>,
}

impl ControlNode for InControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "channel" {
            if value.as_number().is_none() {
                return Err(PropertyError::InvalidType);
            }
            let channel = value.as_index().ok_or(PropertyError::InvalidValue)?;
            self.channel.store(channel, Ordering::Release);
        }
        Ok(())
    }
}

struct InDsp {
    channel: Arc<AtomicUsize>,
}

impl DspNode for InDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        // With a child connected this is a pass-through; without one it taps
        // the configured host input channel.
        if let Some(input) = ctx.inputs.first() {
            out.copy_from_slice(&input[..ctx.frames]);
            return;
        }
        let channel = self.channel.load(Ordering::Acquire);
        match ctx.host_inputs.get(channel) {
            Some(host) => out.copy_from_slice(&host[..ctx.frames]),
            None => out.fill(0.0),
        }
    }
}

/// `in` — identity pass-through, or a host input channel when unconnected.
pub fn input(_config: &RuntimeConfig) -> NodeParts {
    let channel = Arc::new(AtomicUsize::new(0));
    NodeParts::new(
        InControl {
            channel: Arc::clone(&channel),
        },
        InDsp { channel },
    )
}

// --- sr ---

struct SampleRateDsp;

impl DspNode for SampleRateDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let rate = ctx.sample_rate as f32;
        for out in ctx.outputs.iter_mut() {
            out.fill(rate);
        }
    }
}

/// `sr` — emits the engine sample rate as a constant signal.
pub fn sample_rate(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(Stateless, SampleRateDsp)
}

// --- const ---

struct ConstControl {
    value: Arc<AtomicF32>,
}

impl ControlNode for ConstControl {
    fn set_property(
        &mut self,
        key: &str,
        value: &Value,
        _resources: &mut ResourceMap,
    ) -> Result<(), PropertyError> {
        if key == "value" {
            let number = value.as_number().ok_or(PropertyError::InvalidType)?;
            if !number.is_finite() {
                return Err(PropertyError::InvalidValue);
            }
            self.value.store(number as f32);
        }
        Ok(())
    }
}

struct ConstDsp {
    value: Arc<AtomicF32>,
}

impl DspNode for ConstDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let level = self.value.load();
        for out in ctx.outputs.iter_mut() {
            out.fill(level);
        }
    }
}

/// `const` — emits the `value` property as a constant signal.
pub fn constant(_config: &RuntimeConfig) -> NodeParts {
    let value = Arc::new(AtomicF32::new(0.0));
    NodeParts::new(
        ConstControl {
            value: Arc::clone(&value),
        },
        ConstDsp { value },
    )
}

// --- Operator templates ---

struct UnaryDsp {
    op: fn(f32) -> f32,
}

impl DspNode for UnaryDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(input) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        for (o, &x) in out.iter_mut().zip(*input) {
            *o = (self.op)(x);
        }
    }
}

struct BinaryDsp {
    op: fn(f32, f32) -> f32,
}

impl DspNode for BinaryDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let (Some(lhs), Some(rhs)) = (ctx.inputs.first(), ctx.inputs.get(1)) else {
            out.fill(0.0);
            return;
        };
        for ((o, &a), &b) in out.iter_mut().zip(*lhs).zip(*rhs) {
            *o = (self.op)(a, b);
        }
    }
}

struct NaryDsp {
    op: fn(f32, f32) -> f32,
}

impl DspNode for NaryDsp {
    fn process(&mut self, ctx: &mut RenderContext<'_, '_>) {
        let Some(out) = ctx.outputs.first_mut() else {
            return;
        };
        let Some(first) = ctx.inputs.first() else {
            out.fill(0.0);
            return;
        };
        out.copy_from_slice(&first[..ctx.frames]);
        for input in &ctx.inputs[1..] {
            for (o, &x) in out.iter_mut().zip(*input) {
                *o = (self.op)(*o, x);
            }
        }
    }
}

macro_rules! unary_kinds {
    ($($factory:ident, $op:expr;)*) => {
        $(
            /// Unary operator kind.
            pub fn $factory(_config: &RuntimeConfig) -> NodeParts {
                NodeParts::new(Stateless, UnaryDsp { op: $op })
            }
        )*
    };
}

macro_rules! binary_kinds {
    ($($factory:ident, $op:expr;)*) => {
        $(
            /// Binary operator kind.
            pub fn $factory(_config: &RuntimeConfig) -> NodeParts {
                NodeParts::new(Stateless, BinaryDsp { op: $op })
            }
        )*
    };
}

unary_kinds! {
    sin, f32::sin;
    cos, f32::cos;
    tan, f32::tan;
    tanh, f32::tanh;
    ln, f32::ln;
    log, f32::log10;
    log2, f32::log2;
    ceil, f32::ceil;
    floor, f32::floor;
    sqrt, f32::sqrt;
    exp, f32::exp;
    abs, f32::abs;
}

binary_kinds! {
    sub, |a, b| a - b;
    div, |a, b| a / b;
    pow, f32::powf;
    modulo, |a, b| a % b;
    min, f32::min;
    max, f32::max;
    le, |a, b| f32::from(a <= b);
    lt, |a, b| f32::from(a < b);
    ge, |a, b| f32::from(a >= b);
    gt, |a, b| f32::from(a > b);
    eq, |a, b| f32::from(a == b);
    and, |a, b| f32::from(a != 0.0 && b != 0.0);
    or, |a, b| f32::from(a != 0.0 || b != 0.0);
}

/// `add` — n-ary reducing sum.
pub fn add(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(Stateless, NaryDsp { op: |a, b| a + b })
}

/// `mul` — n-ary reducing product.
pub fn mul(_config: &RuntimeConfig) -> NodeParts {
    NodeParts::new(Stateless, NaryDsp { op: |a, b| a * b })
}
