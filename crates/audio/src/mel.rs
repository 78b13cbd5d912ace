//! Mel-спектрограмма мощности для батча клипов.
//!
//! Соответствует фронтенду, на котором обучались чекпоинты MSM-MAE:
//! периодическое окно Ханна, `center=True` с reflect-паддингом, спектр мощности
//! (|X|^2), mel-фильтры librosa (Slaney, площадная нормализация).
//! Логарифм и нормализация выполняются рантаймом, а не здесь.

use candle_core::{Device, Tensor};
use mae_core::{
    MaeError, MaeResult, MelScale, SpectrogramConfig, SpectrogramTransform, WaveformBatch,
    WindowFunction,
};
use rustfft::{FftPlanner, num_complex::Complex};
use std::f32::consts::PI;

/// Mel-экстрактор мощности, реализующий [`SpectrogramTransform`].
#[derive(Debug, Clone)]
pub struct MelSpectrogramExtractor {
    config: SpectrogramConfig,
    window: Vec<f32>,
    mel_filters: Vec<Vec<f32>>,
}

impl MelSpectrogramExtractor {
    /// Создать mel-экстрактор с фильтрами, сгенерированными по конфигурации.
    pub fn new(config: SpectrogramConfig) -> MaeResult<Self> {
        if config.n_fft == 0 || config.hop_length == 0 || config.n_mels == 0 {
            return Err(MaeError::Config(
                "n_fft, hop_length и n_mels должны быть положительными".to_string(),
            ));
        }
        if config.win_length == 0 || config.win_length > config.n_fft {
            return Err(MaeError::Config(format!(
                "win_length={} должен быть в диапазоне 1..={}",
                config.win_length, config.n_fft
            )));
        }
        if !(config.f_min >= 0.0 && config.f_min < config.f_max) {
            return Err(MaeError::Config(format!(
                "Некорректный диапазон частот: f_min={}, f_max={}",
                config.f_min, config.f_max
            )));
        }

        let window = stft_window(config.window, config.win_length, config.n_fft);
        let mel_filters = create_mel_filterbank(
            config.n_mels,
            config.n_fft,
            config.sample_rate as f32,
            config.f_min,
            config.f_max,
            config.mel_scale,
        );

        Ok(Self {
            config,
            window,
            mel_filters,
        })
    }

    /// Конфигурация экстрактора.
    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// Mel-спектр мощности одного клипа, плоский массив в порядке [n_mels][n_frames].
    pub fn power_mel(&self, samples: &[f32]) -> Vec<f32> {
        let spectrogram = self.stft(samples);
        let num_frames = spectrogram.len();
        let n_mels = self.config.n_mels;

        let mut out = vec![0.0_f32; n_mels * num_frames];
        for (t, frame) in spectrogram.iter().enumerate() {
            for (m, filter) in self.mel_filters.iter().enumerate() {
                out[m * num_frames + t] = frame.iter().zip(filter.iter()).map(|(s, f)| s * f).sum();
            }
        }
        out
    }

    /// Compute Short-Time Fourier Transform with POWER spectrum (magnitude^2).
    fn stft(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let n_fft = self.config.n_fft;
        let hop_length = self.config.hop_length;
        let num_frames = self.config.num_frames(samples.len());
        let pad = if self.config.center {
            (n_fft / 2) as isize
        } else {
            0
        };

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        let n = samples.len() as isize;
        let mut spectrogram = Vec::with_capacity(num_frames);
        let mut buffer = vec![Complex::new(0.0_f32, 0.0); n_fft];

        for frame_idx in 0..num_frames {
            // center=True: окно центрируется на позиции frame_idx * hop_length.
            let start = frame_idx as isize * hop_length as isize - pad;

            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = reflect_index(start + i as isize, n);
                let sample = idx.map_or(0.0, |j| samples[j] * self.window[i]);
                *slot = Complex::new(sample, 0.0);
            }

            fft.process(&mut buffer);

            let power: Vec<f32> = buffer
                .iter()
                .take(self.config.n_freqs())
                .map(|c| c.re * c.re + c.im * c.im)
                .collect();

            spectrogram.push(power);
        }

        spectrogram
    }
}

impl SpectrogramTransform for MelSpectrogramExtractor {
    fn power_spectrogram(&self, batch: &WaveformBatch, device: &Device) -> MaeResult<Tensor> {
        if batch.sample_rate() != self.config.sample_rate {
            return Err(MaeError::Audio(format!(
                "Частота дискретизации {} Гц, ожидалось {} Гц",
                batch.sample_rate(),
                self.config.sample_rate
            )));
        }

        let n_mels = self.config.n_mels;
        let num_frames = self.config.num_frames(batch.num_samples());
        if num_frames == 0 {
            return Err(MaeError::Audio(format!(
                "Клип из {} сэмплов короче окна FFT ({})",
                batch.num_samples(),
                self.config.n_fft
            )));
        }

        let mut flat = Vec::with_capacity(batch.len() * n_mels * num_frames);
        for clip in batch.clips() {
            flat.extend(self.power_mel(clip));
        }

        Ok(Tensor::from_vec(
            flat,
            (batch.len(), n_mels, num_frames),
            device,
        )?)
    }

    fn n_mels(&self) -> usize {
        self.config.n_mels
    }
}

/// Reflect an out-of-range index back into `0..n` (torch `pad_mode="reflect"`).
///
/// Returns `None` when the signal is too short for a single reflection.
fn reflect_index(idx: isize, n: isize) -> Option<usize> {
    let mut idx = idx;
    if idx < 0 {
        idx = -idx;
    }
    if idx >= n {
        idx = 2 * n - idx - 2;
    }
    (idx >= 0 && idx < n).then_some(idx as usize)
}

/// Periodic analysis window of `win_length`, zero-padded to `n_fft` around the center.
fn stft_window(kind: WindowFunction, win_length: usize, n_fft: usize) -> Vec<f32> {
    let (a0, a1) = match kind {
        WindowFunction::Hann => (0.5, 0.5),
        WindowFunction::Hamming => (0.54, 0.46),
    };
    let offset = (n_fft - win_length) / 2;
    let mut window = vec![0.0_f32; n_fft];
    for n in 0..win_length {
        window[offset + n] = a0 - a1 * (2.0 * PI * n as f32 / win_length as f32).cos();
    }
    window
}

/// Convert frequency to Slaney Mel scale.
/// Slaney uses linear below 1000 Hz, log above.
fn hz_to_mel_slaney(hz: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f32).ln() / 27.0;

    if hz >= min_log_hz {
        min_log_mel + ((hz / min_log_hz).ln() / logstep)
    } else {
        hz / f_sp
    }
}

/// Convert Slaney Mel scale to frequency.
fn mel_to_hz_slaney(mel: f32) -> f32 {
    let f_sp = 200.0 / 3.0;
    let min_log_hz = 1000.0;
    let min_log_mel = min_log_hz / f_sp;
    let logstep = (6.4f32).ln() / 27.0;

    if mel >= min_log_mel {
        min_log_hz * (logstep * (mel - min_log_mel)).exp()
    } else {
        f_sp * mel
    }
}

fn hz_to_mel_htk(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz_htk(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank with Slaney area normalization, shape [n_mels][n_fft/2 + 1].
fn create_mel_filterbank(
    n_mels: usize,
    n_fft: usize,
    sample_rate: f32,
    f_min: f32,
    f_max: f32,
    scale: MelScale,
) -> Vec<Vec<f32>> {
    let (hz_to_mel, mel_to_hz): (fn(f32) -> f32, fn(f32) -> f32) = match scale {
        MelScale::Slaney => (hz_to_mel_slaney, mel_to_hz_slaney),
        MelScale::Htk => (hz_to_mel_htk, mel_to_hz_htk),
    };
    let n_freqs = n_fft / 2 + 1;

    let fft_freqs: Vec<f32> = (0..n_freqs)
        .map(|i| i as f32 * sample_rate / n_fft as f32)
        .collect();

    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    let hz_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + i as f32 * (mel_max - mel_min) / (n_mels + 1) as f32))
        .collect();

    let mut filterbank = vec![vec![0.0_f32; n_freqs]; n_mels];
    for (m, filter) in filterbank.iter_mut().enumerate() {
        let f_left = hz_points[m];
        let f_center = hz_points[m + 1];
        let f_right = hz_points[m + 2];
        let enorm = 2.0 / (f_right - f_left);

        for (k, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - f_left) / (f_center - f_left);
            let upper = (f_right - freq) / (f_right - f_center);
            filter[k] = enorm * lower.min(upper).max(0.0);
        }
    }

    filterbank
}
