//! CLI subcommands.

pub mod play;
pub mod render;

use std::path::Path;

use resona_core::{RenderProcessor, Runtime, RuntimeConfig};

use crate::{batch, wav};

/// Builds a runtime with the default kinds, loads `name=path` sample specs
/// into the shared resource map, and applies the batch file.
pub fn prepare(
    batch_path: &Path,
    samples: &[String],
    config: RuntimeConfig,
) -> anyhow::Result<(Runtime, RenderProcessor)> {
    let (mut runtime, processor) = Runtime::new(config);
    resona_registry::register_defaults(&mut runtime)
        .map_err(|e| anyhow::anyhow!("registering builtin kinds: {e}"))?;

    for spec in samples {
        let (name, path) = batch::parse_sample_spec(spec)?;
        let (data, sample_rate) = wav::read_wav(path.as_ref())?;
        if sample_rate as f64 != config.sample_rate {
            tracing::warn!(
                name,
                file_rate = sample_rate,
                engine_rate = config.sample_rate,
                "sample rate mismatch; playing unresampled"
            );
        }
        if !runtime.add_shared_resource(&name, data) {
            tracing::warn!(name, "shared resource name already taken; keeping first");
        }
    }

    let wire = batch::load(batch_path)?;
    runtime
        .apply_wire(&wire)
        .map_err(|e| anyhow::anyhow!("applying batch (code {}): {e}", e.code()))?;
    Ok((runtime, processor))
}

/// Forwards queued node events to the log.
pub fn pump_events(runtime: &mut Runtime) {
    runtime.process_queued_events(&mut |name, payload| {
        if name == "error" {
            tracing::error!(event = name, ?payload, "node error");
        } else {
            tracing::debug!(event = name, ?payload, "node event");
        }
    });
}
