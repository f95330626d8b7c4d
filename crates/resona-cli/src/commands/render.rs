//! Offline rendering to a WAV file.

use std::path::PathBuf;

use clap::Args;
use resona_core::RuntimeConfig;

use crate::wav;

/// Arguments for `resona render`.
#[derive(Args)]
pub struct RenderArgs {
    /// Instruction batch (JSON, array of tagged tuples)
    #[arg(long)]
    pub batch: PathBuf,

    /// Output WAV path
    #[arg(long, short)]
    pub out: PathBuf,

    /// Seconds of audio to render
    #[arg(long, default_value_t = 2.0)]
    pub duration: f64,

    /// Optional input WAV fed to `in` nodes
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Shared samples to load, as name=path (repeatable)
    #[arg(long = "sample")]
    pub samples: Vec<String>,

    /// Engine sample rate in Hz
    #[arg(long, default_value_t = 44100.0)]
    pub sample_rate: f64,

    /// Samples per block
    #[arg(long, default_value_t = 512)]
    pub block_size: usize,

    /// Output channel count
    #[arg(long, default_value_t = 2)]
    pub channels: usize,
}

/// Renders the batch offline and writes a WAV file.
pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    anyhow::ensure!(args.channels > 0, "need at least one output channel");
    let config = RuntimeConfig::new(args.sample_rate, args.block_size);
    let (mut runtime, mut processor) = super::prepare(&args.batch, &args.samples, config)?;

    let input = match &args.input {
        Some(path) => {
            let (data, rate) = wav::read_wav(path)?;
            if f64::from(rate) != args.sample_rate {
                tracing::warn!(file_rate = rate, "input sample rate mismatch");
            }
            Some(data)
        }
        None => None,
    };
    let input_channels = input.as_ref().map_or(0, |d| d.num_channels());

    let total_frames = (args.duration * args.sample_rate) as usize;
    let block = args.block_size;
    let mut rendered: Vec<Vec<f32>> = vec![Vec::with_capacity(total_frames); args.channels];
    let mut block_out: Vec<Vec<f32>> = vec![vec![0.0; block]; args.channels];
    let mut block_in: Vec<Vec<f32>> = vec![vec![0.0; block]; input_channels];

    let mut offset = 0usize;
    while offset < total_frames {
        let frames = block.min(total_frames - offset);

        if let Some(data) = &input {
            for (channel, buffer) in block_in.iter_mut().enumerate() {
                let source = data.channel(channel).unwrap_or(&[]);
                for (i, slot) in buffer[..frames].iter_mut().enumerate() {
                    *slot = source.get(offset + i).copied().unwrap_or(0.0);
                }
            }
        }

        {
            let in_refs: Vec<&[f32]> = block_in.iter().map(|ch| &ch[..frames]).collect();
            let mut out_refs: Vec<&mut [f32]> = block_out
                .iter_mut()
                .map(|ch| &mut ch[..frames])
                .collect();
            processor.process(&in_refs, &mut out_refs, frames);
        }

        for (channel, buffer) in rendered.iter_mut().enumerate() {
            buffer.extend_from_slice(&block_out[channel][..frames]);
        }

        super::pump_events(&mut runtime);
        offset += frames;
    }

    wav::write_wav(&args.out, &rendered, args.sample_rate as u32)?;
    tracing::info!(
        frames = total_frames,
        channels = args.channels,
        out = %args.out.display(),
        "render complete"
    );
    Ok(())
}
