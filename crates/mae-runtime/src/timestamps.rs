//! Per-token timestamps in milliseconds.

use candle_core::{Device, Tensor};
use mae_core::{MaeError, MaeResult, WaveformBatch};

/// Distance between consecutive token timestamps.
pub fn step_ms(num_samples: usize, sample_rate: usize, num_tokens: usize) -> f64 {
    num_samples as f64 / sample_rate as f64 / num_tokens as f64 * 1000.0
}

/// Timestamps [n_sounds, num_tokens]: `step_ms * i`, the same for every clip.
///
/// Returns the tensor together with `step_ms`.
pub fn timestamps(
    batch: &WaveformBatch,
    num_tokens: usize,
    device: &Device,
) -> MaeResult<(Tensor, f64)> {
    if num_tokens == 0 {
        return Err(MaeError::Inference(
            "cannot timestamp an empty token sequence".to_string(),
        ));
    }

    let step = step_ms(batch.num_samples(), batch.sample_rate(), num_tokens);
    let row: Vec<f32> = (0..num_tokens).map(|i| (step * i as f64) as f32).collect();
    let ts = Tensor::from_vec(row, (1, num_tokens), device)?
        .repeat((batch.len(), 1))?;
    Ok((ts, step))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_uniform_steps() {
        let batch = WaveformBatch::new(vec![vec![0.0; 32000]; 2], 16000).unwrap();
        let (ts, step) = timestamps(&batch, 13, &Device::Cpu).unwrap();

        assert_eq!(ts.dims(), &[2, 13]);
        // Шаг в f64 точный: длительность / число токенов.
        assert_eq!(step, 2.0 / 13.0 * 1000.0);
        assert_eq!(step, step_ms(32000, 16000, 13));

        let rows = ts.to_vec2::<f32>().unwrap();
        assert_eq!(rows[0], rows[1]);
        assert_eq!(rows[0][0], 0.0);
        for (i, v) in rows[0].iter().enumerate() {
            assert_eq!(*v, (step * i as f64) as f32);
        }
        // После каста в f32 разности совпадают с шагом до точности f32.
        for w in rows[0].windows(2) {
            assert!(((w[1] - w[0]) as f64 - step).abs() < 1e-3);
        }
    }

    #[test]
    fn test_timestamps_reject_empty() {
        let batch = WaveformBatch::single(vec![0.0; 160], 16000).unwrap();
        assert!(timestamps(&batch, 0, &Device::Cpu).is_err());
    }
}
