//! Live playback through cpal.
//!
//! The render processor moves into the audio callback — the genuine
//! control/realtime split: the runtime stays on this thread applying nothing
//! further, pumping node events while the stream runs.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use resona_core::RuntimeConfig;

/// Arguments for `resona play`.
#[derive(Args)]
pub struct PlayArgs {
    /// Instruction batch (JSON, array of tagged tuples)
    #[arg(long)]
    pub batch: PathBuf,

    /// Shared samples to load, as name=path (repeatable)
    #[arg(long = "sample")]
    pub samples: Vec<String>,

    /// Seconds to keep the stream open
    #[arg(long, default_value_t = 10.0)]
    pub duration: f64,

    /// Samples per engine block
    #[arg(long, default_value_t = 512)]
    pub block_size: usize,
}

/// Builds the cpal stream and plays the batch live.
pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device available"))?;
    let device_config = device.default_output_config()?;
    anyhow::ensure!(
        device_config.sample_format() == cpal::SampleFormat::F32,
        "unsupported sample format: {:?}",
        device_config.sample_format()
    );

    let stream_config: cpal::StreamConfig = device_config.into();
    let channels = stream_config.channels as usize;
    let sample_rate = f64::from(stream_config.sample_rate);
    let config = RuntimeConfig::new(sample_rate, args.block_size);

    let (mut runtime, mut processor) = super::prepare(&args.batch, &args.samples, config)?;
    tracing::info!(
        sample_rate,
        channels,
        device = device.name().unwrap_or_default(),
        "starting stream"
    );

    // Planar scratch for the callback; grown outside the realtime path on
    // the first (shorter) callbacks if the device uses odd buffer sizes.
    let mut planar: Vec<Vec<f32>> = vec![Vec::new(); channels];

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels.max(1);
            for channel in &mut planar {
                if channel.len() < frames {
                    channel.resize(frames, 0.0);
                }
            }
            {
                let mut out_refs: Vec<&mut [f32]> = planar
                    .iter_mut()
                    .map(|ch| &mut ch[..frames])
                    .collect();
                processor.process(&[], &mut out_refs, frames);
            }
            for (frame, slot) in data.chunks_mut(channels.max(1)).enumerate() {
                for (channel, sample) in slot.iter_mut().enumerate() {
                    *sample = planar[channel][frame];
                }
            }
        },
        |err| tracing::error!(%err, "stream error"),
        None,
    )?;
    stream.play()?;

    let deadline = std::time::Instant::now() + Duration::from_secs_f64(args.duration.max(0.0));
    while std::time::Instant::now() < deadline {
        super::pump_events(&mut runtime);
        std::thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
    Ok(())
}
