//! Analyzer node kinds for the resona engine.
//!
//! Analyzers render as pass-throughs (or silence) on the realtime thread
//! while shipping measurements to their control halves over lock-free rings;
//! the event pump turns those into client events. Every payload is an object
//! carrying at least `source` — the node's `name` property — plus the
//! analyzer's data.
//!
//! - [`meter`] — per-block min/max, emitted as `meter` events
//! - [`scope`] — captured waveform frames, emitted as `scope` events
//! - [`snapshot`] — trigger-latched values, emitted as `snapshot` events
//! - [`capture`] — gate-bounded variable-length recordings, `capture` events
//! - [`fft`] — windowed spectra, emitted as `fft` events

mod fft;
mod meter;
mod scope;
mod snapshot;

pub use fft::fft;
pub use meter::meter;
pub use scope::scope;
pub use snapshot::{capture, snapshot};

use resona_core::Value;

/// Builds an event payload with the common `source` field.
pub(crate) fn payload<const N: usize>(source: &str, rest: [(&str, Value); N]) -> Value {
    let mut map = std::collections::BTreeMap::new();
    map.insert("source".to_string(), Value::String(source.to_string()));
    for (key, value) in rest {
        map.insert(key.to_string(), value);
    }
    Value::Object(map)
}
