//! WAV file loading and clip preparation.

use hound::WavReader;
use mae_core::{AudioBuffer, MaeError, MaeResult};
use std::path::Path;
use tracing::debug;

use crate::resample::Resampler;

/// Load a WAV file and return an AudioBuffer.
pub fn load_wav(path: impl AsRef<Path>) -> MaeResult<AudioBuffer> {
    let path = path.as_ref();
    let reader = WavReader::open(path)
        .map_err(|e| MaeError::Audio(format!("Failed to open WAV {}: {}", path.display(), e)))?;

    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(MaeError::Audio(format!(
            "Некорректный WAV: channels=0 ({})",
            path.display()
        )));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| MaeError::Audio(format!("Failed to read samples: {}", e)))?,
        hound::SampleFormat::Int => {
            let scale = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| MaeError::Audio(format!("Failed to read samples: {}", e)))?
        }
    };

    debug!(
        "load_wav: {} ({} Hz, {} ch, {} samples)",
        path.display(),
        spec.sample_rate,
        spec.channels,
        samples.len()
    );

    Ok(AudioBuffer::new(
        samples,
        spec.sample_rate as usize,
        spec.channels as usize,
    ))
}

/// Convert multi-channel audio to mono by averaging channels.
pub fn to_mono(buffer: &AudioBuffer) -> AudioBuffer {
    if buffer.channels == 1 {
        return buffer.clone();
    }

    let mono_samples: Vec<f32> = buffer
        .samples
        .chunks(buffer.channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    AudioBuffer::new(mono_samples, buffer.sample_rate, 1)
}

/// Load a WAV file as mono samples at `sample_rate`.
pub fn load_clip(path: impl AsRef<Path>, sample_rate: usize) -> MaeResult<Vec<f32>> {
    let buffer = to_mono(&load_wav(path)?);
    let buffer = Resampler::new(sample_rate).resample(&buffer)?;
    Ok(buffer.samples)
}

/// Zero-pad or trim `samples` to exactly `len` samples.
pub fn fit_length(mut samples: Vec<f32>, len: usize) -> Vec<f32> {
    samples.resize(len, 0.0);
    samples
}
