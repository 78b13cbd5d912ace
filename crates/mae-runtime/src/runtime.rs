//! MSM-MAE runtime: waveform batch → scene or timestamp embeddings.

use audio::MelSpectrogramExtractor;
use candle_core::{Device, Tensor};
use mae_core::{
    EncoderGeometry, MaeBackbone, MaeError, MaeResult, SceneEmbeddings, SpectrogramTransform,
    TimestampEmbeddings, WaveformBatch,
};
use mae_encoder::MaeEncoder;
use std::path::Path;
use tracing::{debug, info};

use crate::adapter::encode_window;
use crate::config::RuntimeConfig;
use crate::features;
use crate::reassemble::{pad_token_count, reassemble};
use crate::segment::segment;
use crate::timestamps::timestamps;

/// Embedding runtime.
///
/// Combines:
/// 1. Waveform → normalized log-mel (spectrogram transform)
/// 2. Log-mel → fixed-width windows
/// 3. Window → tokens (backbone), regrouped per time step
/// 4. Windows → one token sequence per clip, padded tail removed
///
/// The backbone is only read during inference, so one runtime can be shared
/// between threads.
pub struct RuntimeMae {
    config: RuntimeConfig,
    backbone: Box<dyn MaeBackbone>,
    spectrogram: Box<dyn SpectrogramTransform>,
    device: Device,
}

impl std::fmt::Debug for RuntimeMae {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeMae")
            .field("config", &self.config)
            .field("geometry", &self.backbone.geometry())
            .field("device", &self.device)
            .finish()
    }
}

impl RuntimeMae {
    /// Create a runtime from explicit collaborators.
    pub fn new(
        config: RuntimeConfig,
        backbone: Box<dyn MaeBackbone>,
        spectrogram: Box<dyn SpectrogramTransform>,
        device: Device,
    ) -> MaeResult<Self> {
        let geometry = backbone.geometry();
        if spectrogram.n_mels() != geometry.input_size[0] {
            return Err(MaeError::Config(format!(
                "Спектрограмма даёт {} mel-бинов, а энкодер ожидает {}",
                spectrogram.n_mels(),
                geometry.input_size[0]
            )));
        }
        if geometry.patch_freq() == 0 || geometry.time_tokens() == 0 {
            return Err(MaeError::Config(format!(
                "Пустая сетка патчей: {:?}",
                geometry
            )));
        }

        Ok(Self {
            config,
            backbone,
            spectrogram,
            device,
        })
    }

    /// Load config, encoder weights and mel front-end from a model directory.
    pub fn from_model_dir(model_dir: impl AsRef<Path>, device: &Device) -> MaeResult<Self> {
        let model_dir = model_dir.as_ref();
        let (config, source) = RuntimeConfig::from_model_dir(model_dir)?;
        let weights = config
            .weights
            .clone()
            .ok_or_else(|| MaeError::Model("Не найден файл весов энкодера".to_string()))?;

        info!("Config: {:?} ({:?})", model_dir, source);
        info!(
            "Creating model: mae_vit_base_patch{}x{}",
            config.encoder.patch_size[0], config.encoder.patch_size[1]
        );

        let encoder = MaeEncoder::from_safetensors(config.encoder.clone(), &weights, device)?;
        let spectrogram = MelSpectrogramExtractor::new(config.spectrogram.clone())?;

        info!("Model input size: {:?}", config.encoder.input_size);
        info!("Using weights: {}", weights.display());
        info!("Has [CLS] token?: {}", encoder.has_cls_token());

        Self::new(
            config,
            Box::new(encoder),
            Box::new(spectrogram),
            device.clone(),
        )
    }

    /// Waveform batch → log-mel [B, 1, n_mels, frames].
    pub fn to_feature(&self, batch: &WaveformBatch) -> MaeResult<Tensor> {
        let expected = self.config.spectrogram.sample_rate;
        if batch.sample_rate() != expected {
            return Err(MaeError::Audio(format!(
                "Batch sample rate {} Hz, runtime expects {} Hz",
                batch.sample_rate(),
                expected
            )));
        }
        let power = self.spectrogram.power_spectrogram(batch, &self.device)?;
        features::to_feature(&power)
    }

    /// Standardize log-mel with the configured normalization scope.
    pub fn normalize_batch(&self, x: &Tensor) -> MaeResult<Tensor> {
        features::normalize_batch(x, self.config.normalization)
    }

    /// Waveform batch → normalized log-mel.
    pub fn to_normalized_spec(&self, batch: &WaveformBatch) -> MaeResult<Tensor> {
        let x = self.to_feature(batch)?;
        self.normalize_batch(&x)
    }

    /// Normalized log-mel [B, 1, n_mels, frames] → tokens [B, T, F*D].
    pub fn encode_lms(&self, lms: &Tensor) -> MaeResult<Tensor> {
        let geometry = self.backbone.geometry();
        let unit_frames = geometry.unit_frames();

        let seg = segment(lms, unit_frames, self.config.padding)?;
        let encoded = seg
            .windows
            .iter()
            .map(|w| encode_window(self.backbone.as_ref(), w))
            .collect::<MaeResult<Vec<_>>>()?;

        let out = reassemble(&encoded, seg.pad_frames, seg.unit_frames)?;

        debug!(
            "encode_lms: frames={}, pad={}, windows={}, trimmed={}, tokens={}",
            seg.cur_frames,
            seg.pad_frames,
            seg.num_windows(),
            pad_token_count(geometry.time_tokens(), seg.pad_frames, unit_frames),
            out.dim(1)?
        );
        Ok(out)
    }

    /// Waveform batch → tokens [B, T, F*D].
    pub fn encode(&self, batch: &WaveformBatch) -> MaeResult<Tensor> {
        let x = self.to_normalized_spec(batch)?;
        self.encode_lms(&x)
    }

    /// One time-averaged embedding per clip: [B, F*D].
    pub fn get_scene_embeddings(&self, batch: &WaveformBatch) -> MaeResult<SceneEmbeddings> {
        let x = self.encode(batch)?;
        Ok(SceneEmbeddings {
            embeddings: x.mean(1)?,
        })
    }

    /// Per-token embeddings [B, T, F*D] with timestamps [B, T] in ms.
    pub fn get_timestamp_embeddings(
        &self,
        batch: &WaveformBatch,
    ) -> MaeResult<TimestampEmbeddings> {
        let embeddings = self.encode(batch)?;
        let (timestamps, step_ms) = timestamps(batch, embeddings.dim(1)?, &self.device)?;
        Ok(TimestampEmbeddings {
            embeddings,
            timestamps,
            step_ms,
        })
    }

    /// Width of a scene embedding.
    pub fn scene_embedding_size(&self) -> usize {
        self.backbone.geometry().feature_dim()
    }

    /// Width of a timestamp embedding.
    pub fn timestamp_embedding_size(&self) -> usize {
        self.backbone.geometry().feature_dim()
    }

    /// Backbone geometry.
    pub fn geometry(&self) -> EncoderGeometry {
        self.backbone.geometry()
    }

    /// Get the configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Expected input sample rate.
    pub fn sample_rate(&self) -> usize {
        self.config.spectrogram.sample_rate
    }

    /// Compute device.
    pub fn device(&self) -> &Device {
        &self.device
    }
}
