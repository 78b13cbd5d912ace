//! Audio resampling.

use mae_core::{AudioBuffer, MaeError, MaeResult};
use rubato::{FftFixedInOut, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler for converting mono buffers to the model sample rate.
#[derive(Debug, Clone, Copy)]
pub struct Resampler {
    target_sample_rate: usize,
}

impl Resampler {
    /// Create a new resampler with target sample rate.
    pub fn new(target_sample_rate: usize) -> Self {
        Self { target_sample_rate }
    }

    /// Resample audio buffer to target sample rate.
    pub fn resample(&self, buffer: &AudioBuffer) -> MaeResult<AudioBuffer> {
        if buffer.sample_rate == self.target_sample_rate {
            return Ok(buffer.clone());
        }

        if buffer.channels != 1 {
            return Err(MaeError::Audio(
                "Resampling requires mono audio. Use to_mono() first.".to_string(),
            ));
        }

        let mut resampler = FftFixedInOut::<f32>::new(
            buffer.sample_rate,
            self.target_sample_rate,
            1024,
            1,
        )
        .map_err(|e| MaeError::Audio(format!("Failed to create resampler: {}", e)))?;

        // FftFixedInOut может скорректировать размер чанка под отношение частот.
        let chunk_in = resampler.input_frames_next();
        let ratio = self.target_sample_rate as f64 / buffer.sample_rate as f64;
        let expected_len = (buffer.samples.len() as f64 * ratio).round() as usize;

        let mut output = Vec::with_capacity(expected_len + resampler.output_frames_max());
        for chunk in buffer.samples.chunks(chunk_in) {
            let mut input = chunk.to_vec();
            input.resize(chunk_in, 0.0);
            let input = vec![input];
            let out = resampler
                .process(&input, None)
                .map_err(|e| MaeError::Audio(format!("Resampling failed: {}", e)))?;
            output.extend_from_slice(&out[0]);
        }
        output.truncate(expected_len);

        debug!(
            "resample: {} Hz -> {} Hz, {} -> {} samples",
            buffer.sample_rate,
            self.target_sample_rate,
            buffer.samples.len(),
            output.len()
        );

        Ok(AudioBuffer::new(output, self.target_sample_rate, 1))
    }
}

impl Default for Resampler {
    fn default() -> Self {
        Self::new(16000)
    }
}
