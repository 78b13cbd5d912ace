//! Runtime configuration: DSP, encoder geometry and pipeline policies.

use mae_core::{
    MaeError, MaeResult, ModelVariant, NormalizationScope, PaddingPolicy, SpectrogramConfig,
    model_files,
};
use mae_encoder::MaeEncoderConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Имя файла конфигурации в директории модели.
pub const CONFIG_FILE: &str = "config.json";

/// Where a [`RuntimeConfig`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// `config.json` in the model directory.
    File,
    /// Built-in defaults.
    Defaults,
}

/// Full configuration of [`crate::RuntimeMae`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Mel spectrogram parameters.
    pub spectrogram: SpectrogramConfig,

    /// Encoder architecture and geometry.
    pub encoder: MaeEncoderConfig,

    /// Scope of log-mel normalization statistics.
    pub normalization: NormalizationScope,

    /// Padding of the frame axis before windowing.
    pub padding: PaddingPolicy,

    /// Path to the encoder weights.
    pub weights: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            spectrogram: SpectrogramConfig::msm_mae(),
            encoder: MaeEncoderConfig::default(),
            normalization: NormalizationScope::default(),
            padding: PaddingPolicy::default(),
            weights: None,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file. Missing sections use defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> MaeResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Build configuration for a model directory.
    ///
    /// 1. `config.json` if present, defaults otherwise
    /// 2. input/patch sizes from a directory name like `80x208p16x16_run`
    /// 3. weights from `model.safetensors` or the latest `checkpoint-<N>.safetensors`
    pub fn from_model_dir(model_dir: impl AsRef<Path>) -> MaeResult<(Self, ConfigSource)> {
        let model_dir = model_dir.as_ref();
        if !model_dir.is_dir() {
            return Err(MaeError::Model(format!(
                "Директория модели не найдена: {}",
                model_dir.display()
            )));
        }

        let config_path = model_dir.join(CONFIG_FILE);
        let (mut config, source) = if config_path.exists() {
            (Self::from_json_file(&config_path)?, ConfigSource::File)
        } else {
            (Self::default(), ConfigSource::Defaults)
        };

        if let Some(variant) = ModelVariant::from_dir(model_dir) {
            info!("Вариант модели из имени папки: {} ({})", variant, variant.architecture());
            config.apply_variant(&variant);
        } else {
            debug!(
                "Имя папки {} не задаёт геометрию, используется {:?}/{:?}",
                model_dir.display(),
                config.encoder.input_size,
                config.encoder.patch_size
            );
        }

        if config.weights.is_none() {
            config.weights = Some(model_files::resolve_checkpoint(model_dir)?);
        } else if let Some(w) = config.weights.as_mut().filter(|w| w.is_relative()) {
            *w = model_dir.join(&*w);
        }

        config.validate()?;
        Ok((config, source))
    }

    /// Override the window geometry with a parsed model variant.
    pub fn apply_variant(&mut self, variant: &ModelVariant) {
        self.encoder.input_size = variant.input_size;
        self.encoder.patch_size = variant.patch_size;
    }

    /// Check that the spectrogram and encoder agree.
    pub fn validate(&self) -> MaeResult<()> {
        self.encoder.validate()?;
        if self.spectrogram.n_mels != self.encoder.input_size[0] {
            return Err(MaeError::Config(format!(
                "n_mels = {} не совпадает с высотой входа энкодера {}",
                self.spectrogram.n_mels, self.encoder.input_size[0]
            )));
        }
        if self.spectrogram.hop_length == 0 || self.spectrogram.n_fft == 0 {
            return Err(MaeError::Config(
                "hop_length and n_fft must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_model_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("msm-mae-cfg-{}", std::process::id()))
            .join(name);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_default_is_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.padding, PaddingPolicy::AlwaysPad);
        assert_eq!(config.normalization, NormalizationScope::Batch);
    }

    #[test]
    fn test_partial_json() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"padding": "minimal", "normalization": "clip"}"#).unwrap();
        assert_eq!(config.padding, PaddingPolicy::Minimal);
        assert_eq!(config.normalization, NormalizationScope::Clip);
        assert_eq!(config.spectrogram, SpectrogramConfig::msm_mae());
    }

    #[test]
    fn test_mel_mismatch_rejected() {
        let mut config = RuntimeConfig::default();
        config.spectrogram.n_mels = 64;
        assert!(matches!(config.validate(), Err(MaeError::Config(_))));
    }

    #[test]
    fn test_from_model_dir_uses_folder_name() {
        let dir = temp_model_dir("80x512p16x8_test");
        std::fs::write(dir.join("checkpoint-3.safetensors"), b"").unwrap();
        std::fs::write(dir.join("checkpoint-12.safetensors"), b"").unwrap();

        let (config, source) = RuntimeConfig::from_model_dir(&dir).unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config.encoder.input_size, [80, 512]);
        assert_eq!(config.encoder.patch_size, [16, 8]);
        assert_eq!(
            config.weights.unwrap().file_name().unwrap(),
            "checkpoint-12.safetensors"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_from_model_dir_reads_config_file() {
        let dir = temp_model_dir("custom");
        std::fs::write(
            dir.join(CONFIG_FILE),
            r#"{"padding": "minimal", "weights": "enc.safetensors", "encoder": {"depth": 6}}"#,
        )
        .unwrap();

        let (config, source) = RuntimeConfig::from_model_dir(&dir).unwrap();
        assert_eq!(source, ConfigSource::File);
        assert_eq!(config.padding, PaddingPolicy::Minimal);
        assert_eq!(config.encoder.depth, 6);
        assert_eq!(config.weights.unwrap(), dir.join("enc.safetensors"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
