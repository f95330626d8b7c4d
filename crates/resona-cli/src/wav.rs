//! WAV file helpers over `hound`.

use std::path::Path;

use anyhow::Context;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use resona_core::AudioData;

/// Reads a WAV file into per-channel sample data plus its sample rate.
pub fn read_wav(path: &Path) -> anyhow::Result<(AudioData, u32)> {
    let mut reader =
        WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .with_context(|| format!("decoding {}", path.display()))?,
        SampleFormat::Int => {
            let scale = 1.0f32 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 * scale))
                .collect::<Result<_, _>>()
                .with_context(|| format!("decoding {}", path.display()))?
        }
    };

    let frames = interleaved.len() / channels.max(1);
    let mut planar = vec![Vec::with_capacity(frames); channels.max(1)];
    for (i, &sample) in interleaved.iter().enumerate() {
        planar[i % channels.max(1)].push(sample);
    }
    Ok((AudioData::new(planar), spec.sample_rate))
}

/// Writes planar float channels as a 32-bit float WAV.
pub fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) -> anyhow::Result<()> {
    anyhow::ensure!(!channels.is_empty(), "no channels to write");
    let spec = WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer =
        WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
    for frame in 0..frames {
        for channel in channels {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;
    Ok(())
}
