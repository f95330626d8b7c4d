//! Kind registry for the resona engine.
//!
//! Collects every built-in node kind — math, signal, sequencing, delay,
//! filter, envelope, sampling, feedback taps, analyzers — into one table and
//! registers them against a [`Runtime`]. The `root` kind is registered by
//! the runtime itself.
//!
//! # Example
//!
//! ```rust
//! use resona_core::{Runtime, RuntimeConfig};
//!
//! let (mut runtime, _processor) = Runtime::new(RuntimeConfig::default());
//! resona_registry::register_defaults(&mut runtime).unwrap();
//! assert!(resona_registry::kinds().iter().any(|k| k.name == "mul"));
//! ```

use resona_core::{NodeFactory, Runtime, RuntimeError};

/// Category of a node kind, for discovery and UI grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindCategory {
    /// Signal sources and host input bindings.
    Source,
    /// Pointwise arithmetic and comparisons.
    Math,
    /// Counters, gates, and control-rate utilities.
    Signal,
    /// Step and sparse sequencers.
    Sequence,
    /// Delay lines.
    Delay,
    /// IIR filters.
    Filter,
    /// Envelope generators.
    Envelope,
    /// Sample playback and tables.
    Sampler,
    /// Feedback tap routing.
    Routing,
    /// Meters, scopes, and spectral analyzers.
    Analysis,
}

/// One registrable node kind.
pub struct KindDescriptor {
    /// Wire name used by `CreateNode`.
    pub name: &'static str,
    /// Factory producing both node halves.
    pub factory: NodeFactory,
    /// Grouping for discovery.
    pub category: KindCategory,
}

/// Every built-in kind, in registration order.
pub fn kinds() -> &'static [KindDescriptor] {
    use KindCategory as C;
    use resona_analysis as analysis;
    use resona_nodes::{delay, envelope, filter, math, sampler, seq, signal, table, tap};

    static KINDS: &[KindDescriptor] = &[
        // Sources
        KindDescriptor { name: "in", factory: math::input, category: C::Source },
        KindDescriptor { name: "sr", factory: math::sample_rate, category: C::Source },
        KindDescriptor { name: "const", factory: math::constant, category: C::Source },
        KindDescriptor { name: "noise", factory: signal::noise, category: C::Source },
        KindDescriptor { name: "phasor", factory: signal::phasor, category: C::Source },
        KindDescriptor { name: "metro", factory: signal::metro, category: C::Source },
        // Math
        KindDescriptor { name: "add", factory: math::add, category: C::Math },
        KindDescriptor { name: "mul", factory: math::mul, category: C::Math },
        KindDescriptor { name: "sub", factory: math::sub, category: C::Math },
        KindDescriptor { name: "div", factory: math::div, category: C::Math },
        KindDescriptor { name: "pow", factory: math::pow, category: C::Math },
        KindDescriptor { name: "mod", factory: math::modulo, category: C::Math },
        KindDescriptor { name: "min", factory: math::min, category: C::Math },
        KindDescriptor { name: "max", factory: math::max, category: C::Math },
        KindDescriptor { name: "le", factory: math::le, category: C::Math },
        KindDescriptor { name: "lt", factory: math::lt, category: C::Math },
        KindDescriptor { name: "ge", factory: math::ge, category: C::Math },
        KindDescriptor { name: "gt", factory: math::gt, category: C::Math },
        KindDescriptor { name: "eq", factory: math::eq, category: C::Math },
        KindDescriptor { name: "and", factory: math::and, category: C::Math },
        KindDescriptor { name: "or", factory: math::or, category: C::Math },
        KindDescriptor { name: "sin", factory: math::sin, category: C::Math },
        KindDescriptor { name: "cos", factory: math::cos, category: C::Math },
        KindDescriptor { name: "tan", factory: math::tan, category: C::Math },
        KindDescriptor { name: "tanh", factory: math::tanh, category: C::Math },
        KindDescriptor { name: "ln", factory: math::ln, category: C::Math },
        KindDescriptor { name: "log", factory: math::log, category: C::Math },
        KindDescriptor { name: "log2", factory: math::log2, category: C::Math },
        KindDescriptor { name: "ceil", factory: math::ceil, category: C::Math },
        KindDescriptor { name: "floor", factory: math::floor, category: C::Math },
        KindDescriptor { name: "sqrt", factory: math::sqrt, category: C::Math },
        KindDescriptor { name: "exp", factory: math::exp, category: C::Math },
        KindDescriptor { name: "abs", factory: math::abs, category: C::Math },
        // Signal utilities
        KindDescriptor { name: "counter", factory: signal::counter, category: C::Signal },
        KindDescriptor { name: "accum", factory: signal::accum, category: C::Signal },
        KindDescriptor { name: "latch", factory: signal::latch, category: C::Signal },
        KindDescriptor { name: "maxhold", factory: signal::maxhold, category: C::Signal },
        KindDescriptor { name: "once", factory: signal::once, category: C::Signal },
        // Sequencers
        KindDescriptor { name: "seq", factory: seq::seq, category: C::Sequence },
        KindDescriptor { name: "sparseq", factory: seq::sparseq, category: C::Sequence },
        // Delays
        KindDescriptor { name: "delay", factory: delay::delay, category: C::Delay },
        KindDescriptor { name: "sdelay", factory: delay::sdelay, category: C::Delay },
        KindDescriptor { name: "z", factory: delay::z, category: C::Delay },
        // Filters
        KindDescriptor { name: "pole", factory: filter::pole, category: C::Filter },
        KindDescriptor { name: "biquad", factory: filter::biquad, category: C::Filter },
        KindDescriptor { name: "svf", factory: filter::svf, category: C::Filter },
        // Envelopes
        KindDescriptor { name: "adsr", factory: envelope::adsr, category: C::Envelope },
        // Samplers
        KindDescriptor { name: "sample", factory: sampler::sample, category: C::Sampler },
        KindDescriptor { name: "sampleseq", factory: sampler::sampleseq, category: C::Sampler },
        KindDescriptor { name: "table", factory: table::table, category: C::Sampler },
        // Feedback taps
        KindDescriptor { name: "tapIn", factory: tap::tap_in, category: C::Routing },
        KindDescriptor { name: "tapOut", factory: tap::tap_out, category: C::Routing },
        // Analyzers
        KindDescriptor { name: "meter", factory: analysis::meter, category: C::Analysis },
        KindDescriptor { name: "scope", factory: analysis::scope, category: C::Analysis },
        KindDescriptor { name: "snapshot", factory: analysis::snapshot, category: C::Analysis },
        KindDescriptor { name: "capture", factory: analysis::capture, category: C::Analysis },
        KindDescriptor { name: "fft", factory: analysis::fft, category: C::Analysis },
    ];
    KINDS
}

/// Registers every built-in kind into `runtime`.
///
/// # Errors
///
/// [`RuntimeError::NodeTypeAlreadyExists`] if any name is already taken —
/// register custom kinds after the defaults, or pick distinct names.
pub fn register_defaults(runtime: &mut Runtime) -> Result<(), RuntimeError> {
    for kind in kinds() {
        runtime.register_node_kind(kind.name, kind.factory)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use resona_core::RuntimeConfig;

    #[test]
    fn test_register_defaults_is_complete() {
        let (mut runtime, _processor) = Runtime::new(RuntimeConfig::default());
        register_defaults(&mut runtime).unwrap();
        // Registering twice collides.
        assert!(register_defaults(&mut runtime).is_err());
    }

    #[test]
    fn test_kind_names_are_unique() {
        let mut names: Vec<&str> = kinds().iter().map(|k| k.name).collect();
        let before = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), before);
        assert!(!names.contains(&"root"), "root is registered by the runtime");
    }
}
