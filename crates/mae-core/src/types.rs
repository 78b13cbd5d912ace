//! Общие типы данных пайплайна эмбеддингов.
//!
//! Все сущности живут в пределах одного вызова: батч аудио на входе,
//! лог-mel спектрограмма, последовательность токенов и временные метки на выходе.

use candle_core::Tensor;

use crate::error::{MaeError, MaeResult};

// ---------------------------------------------------------------------------
// Аудио-буфер
// ---------------------------------------------------------------------------

/// Буфер необработанного аудио (как он прочитан из файла).
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Аудио-сэмплы (нормализованы к [-1.0, 1.0]), каналы чередуются.
    pub samples: Vec<f32>,

    /// Частота дискретизации в Гц.
    pub sample_rate: usize,

    /// Количество каналов.
    pub channels: usize,
}

impl AudioBuffer {
    /// Создать новый буфер аудио.
    pub fn new(samples: Vec<f32>, sample_rate: usize, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Количество сэмплов на канал.
    pub fn num_samples(&self) -> usize {
        self.samples.len() / self.channels
    }
}

// ---------------------------------------------------------------------------
// Батч аудио
// ---------------------------------------------------------------------------

/// Батч моно-клипов одинаковой длины.
///
/// Конструктор проверяет предусловия: батч непустой, клипы непустые и одной
/// длины. Клипы разной длины отклоняются, т.к. временные метки вычисляются по
/// общей длительности батча.
#[derive(Debug, Clone)]
pub struct WaveformBatch {
    clips: Vec<Vec<f32>>,
    sample_rate: usize,
}

impl WaveformBatch {
    /// Создать батч из клипов (сэмплы нормализованы к [-1.0, 1.0]).
    pub fn new(clips: Vec<Vec<f32>>, sample_rate: usize) -> MaeResult<Self> {
        if sample_rate == 0 {
            return Err(MaeError::Audio("sample_rate must be positive".to_string()));
        }
        let Some(first) = clips.first() else {
            return Err(MaeError::Audio("empty batch".to_string()));
        };
        let num_samples = first.len();
        if num_samples == 0 {
            return Err(MaeError::Audio("zero-length audio".to_string()));
        }
        if let Some((idx, clip)) = clips
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != num_samples)
        {
            return Err(MaeError::Audio(format!(
                "mixed-length batch: clip 0 has {} samples, clip {} has {}",
                num_samples,
                idx,
                clip.len()
            )));
        }
        Ok(Self { clips, sample_rate })
    }

    /// Батч из одного клипа.
    pub fn single(samples: Vec<f32>, sample_rate: usize) -> MaeResult<Self> {
        Self::new(vec![samples], sample_rate)
    }

    /// Клипы батча.
    pub fn clips(&self) -> &[Vec<f32>] {
        &self.clips
    }

    /// Количество клипов (`n_sounds`).
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Всегда `false`: пустой батч не проходит конструктор.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    /// Количество сэмплов в каждом клипе.
    pub fn num_samples(&self) -> usize {
        self.clips[0].len()
    }

    /// Частота дискретизации в Гц.
    pub fn sample_rate(&self) -> usize {
        self.sample_rate
    }

    /// Длительность клипа в миллисекундах.
    pub fn duration_ms(&self) -> f64 {
        self.num_samples() as f64 / self.sample_rate as f64 * 1000.0
    }
}

// ---------------------------------------------------------------------------
// Результаты
// ---------------------------------------------------------------------------

/// Scene-level embeddings: one time-pooled vector per clip.
#[derive(Debug, Clone)]
pub struct SceneEmbeddings {
    /// Tensor of shape [n_sounds, feature_dim].
    pub embeddings: Tensor,
}

impl SceneEmbeddings {
    /// Rows as plain vectors, one per clip.
    pub fn to_vec2(&self) -> MaeResult<Vec<Vec<f32>>> {
        Ok(self.embeddings.to_vec2::<f32>()?)
    }
}

/// Timestamp-level embeddings: one vector per output token plus its time.
#[derive(Debug, Clone)]
pub struct TimestampEmbeddings {
    /// Tensor of shape [n_sounds, n_timestamps, feature_dim].
    pub embeddings: Tensor,

    /// Tensor of shape [n_sounds, n_timestamps], milliseconds.
    pub timestamps: Tensor,

    /// Distance between consecutive timestamps in milliseconds.
    pub step_ms: f64,
}

impl TimestampEmbeddings {
    /// Number of output tokens per clip.
    pub fn num_timestamps(&self) -> MaeResult<usize> {
        Ok(self.embeddings.dim(1)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_rejects_mixed_lengths() {
        let err = WaveformBatch::new(vec![vec![0.0; 10], vec![0.0; 11]], 16000).unwrap_err();
        assert!(matches!(err, MaeError::Audio(_)));
    }

    #[test]
    fn test_batch_rejects_empty() {
        assert!(WaveformBatch::new(Vec::new(), 16000).is_err());
        assert!(WaveformBatch::new(vec![Vec::new()], 16000).is_err());
        assert!(WaveformBatch::new(vec![vec![0.0; 4]], 0).is_err());
    }

    #[test]
    fn test_batch_duration() {
        let batch = WaveformBatch::new(vec![vec![0.5; 32000], vec![-0.5; 32000]], 16000).unwrap();
        assert_eq!(batch.len(), 2);
        assert!((batch.duration_ms() - 2000.0).abs() < 1e-9);
    }
}
