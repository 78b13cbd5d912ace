//! Конфигурационные структуры: DSP-параметры спектрограммы и геометрия энкодера.

use serde::{Deserialize, Serialize};

/// Конфигурация mel-спектрограммы.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramConfig {
    /// Целевая частота дискретизации в Гц.
    pub sample_rate: usize,

    /// Размер окна FFT.
    pub n_fft: usize,

    /// Длина окна для STFT.
    pub win_length: usize,

    /// Шаг между фреймами.
    pub hop_length: usize,

    /// Количество mel-бинов.
    pub n_mels: usize,

    /// Минимальная частота для mel-фильтра.
    pub f_min: f32,

    /// Максимальная частота для mel-фильтра.
    pub f_max: f32,

    /// Оконная функция STFT.
    #[serde(default)]
    pub window: WindowFunction,

    /// Шкала mel-фильтров.
    #[serde(default)]
    pub mel_scale: MelScale,

    /// Центрирование STFT (reflect-паддинг по n_fft/2 с обеих сторон).
    #[serde(default = "default_center")]
    pub center: bool,
}

fn default_center() -> bool {
    true
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self::msm_mae()
    }
}

impl SpectrogramConfig {
    /// Параметры, на которых обучались чекпоинты MSM-MAE (80 mel, 16 кГц, hop 10 мс).
    pub fn msm_mae() -> Self {
        Self {
            sample_rate: 16000,
            n_fft: 400,
            win_length: 400,
            hop_length: 160,
            n_mels: 80,
            f_min: 50.0,
            f_max: 8000.0,
            window: WindowFunction::Hann,
            mel_scale: MelScale::Slaney,
            center: true,
        }
    }

    /// Number of STFT frames produced for `num_samples` input samples.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if self.center {
            num_samples / self.hop_length + 1
        } else if num_samples < self.n_fft {
            0
        } else {
            (num_samples - self.n_fft) / self.hop_length + 1
        }
    }

    /// Number of FFT bins kept after the real FFT.
    pub fn n_freqs(&self) -> usize {
        self.n_fft / 2 + 1
    }
}

/// Оконная функция STFT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowFunction {
    /// Периодическое окно Ханна (scipy `get_window("hann", fftbins=True)`).
    #[default]
    Hann,
    /// Периодическое окно Хэмминга.
    Hamming,
}

/// Шкала mel-фильтров.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MelScale {
    /// Slaney: линейная ниже 1000 Гц, логарифмическая выше (librosa, `htk=False`).
    #[default]
    Slaney,
    /// HTK: полностью логарифмическая шкала.
    Htk,
}

/// Область, по которой считаются статистики нормализации лог-mel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationScope {
    /// Одно среднее и одно стандартное отклонение на весь батч.
    #[default]
    Batch,
    /// Отдельные статистики для каждого клипа.
    Clip,
}

/// How the segmenter pads the frame axis up to a whole number of windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddingPolicy {
    /// Always pad by `unit - frames % unit`, appending a full window of zeros
    /// when the frame count is already a multiple of the window length.
    #[default]
    AlwaysPad,
    /// Pad only up to the next multiple of the window length.
    Minimal,
}

impl PaddingPolicy {
    /// Number of zero frames appended after `cur_frames`.
    pub fn pad_frames(self, cur_frames: usize, unit_frames: usize) -> usize {
        let rem = cur_frames % unit_frames;
        match self {
            PaddingPolicy::AlwaysPad => unit_frames - rem,
            PaddingPolicy::Minimal if rem == 0 => 0,
            PaddingPolicy::Minimal => unit_frames - rem,
        }
    }
}

/// Patch-grid geometry reported by a backbone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderGeometry {
    /// Input window size as `[mel_bins, frames]`.
    pub input_size: [usize; 2],

    /// Patch size as `[freq, time]`.
    pub patch_size: [usize; 2],

    /// Width of every output token.
    pub embed_dim: usize,

    /// Whether the encoder prepends a `[CLS]` token to its output.
    pub has_cls_token: bool,
}

impl EncoderGeometry {
    /// Patch grid `(freq_tokens, time_tokens)` of one window.
    pub fn grid_size(&self) -> (usize, usize) {
        (
            self.input_size[0] / self.patch_size[0],
            self.input_size[1] / self.patch_size[1],
        )
    }

    /// Frequency tokens per window.
    pub fn patch_freq(&self) -> usize {
        self.grid_size().0
    }

    /// Time tokens per window.
    pub fn time_tokens(&self) -> usize {
        self.grid_size().1
    }

    /// Window length in spectrogram frames.
    pub fn unit_frames(&self) -> usize {
        self.input_size[1]
    }

    /// Number of patch tokens per window, excluding `[CLS]`.
    pub fn num_patches(&self) -> usize {
        let (f, t) = self.grid_size();
        f * t
    }

    /// Width of one reassembled time step: `patch_freq * embed_dim`.
    pub fn feature_dim(&self) -> usize {
        self.patch_freq() * self.embed_dim
    }
}
