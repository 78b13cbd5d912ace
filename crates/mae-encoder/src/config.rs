//! Configuration for the MAE ViT encoder.

use mae_core::{EncoderGeometry, MaeError, MaeResult, ModelVariant};
use serde::{Deserialize, Serialize};

/// Configuration for the MAE ViT encoder.
///
/// Defaults match `mae_vit_base_patch16x16` trained on `80x208` windows.
/// Missing fields in JSON fall back to these defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaeEncoderConfig {
    /// Input window `[mel_bins, frames]`.
    pub input_size: [usize; 2],

    /// Patch size `[freq, time]`.
    pub patch_size: [usize; 2],

    /// Token width.
    pub embed_dim: usize,

    /// Number of transformer blocks.
    pub depth: usize,

    /// Number of attention heads.
    pub num_heads: usize,

    /// MLP hidden size as a multiple of `embed_dim`.
    pub mlp_ratio: f64,

    /// Layer normalization epsilon.
    pub layer_norm_eps: f64,

    /// Whether the encoder prepends a learnable `[CLS]` token.
    pub use_cls_token: bool,
}

impl Default for MaeEncoderConfig {
    fn default() -> Self {
        Self::vit_base([80, 208], [16, 16])
    }
}

impl MaeEncoderConfig {
    /// ViT-Base encoder (768-d, 12 blocks, 12 heads) for the given geometry.
    pub fn vit_base(input_size: [usize; 2], patch_size: [usize; 2]) -> Self {
        Self {
            input_size,
            patch_size,
            embed_dim: 768,
            depth: 12,
            num_heads: 12,
            mlp_ratio: 4.0,
            layer_norm_eps: 1e-6,
            use_cls_token: true,
        }
    }

    /// ViT-Base config for a variant parsed from a model directory name.
    pub fn from_variant(variant: &ModelVariant) -> Self {
        Self::vit_base(variant.input_size, variant.patch_size)
    }

    /// Check that the geometry is consistent.
    pub fn validate(&self) -> MaeResult<()> {
        let [h, w] = self.input_size;
        let [pf, pt] = self.patch_size;
        if pf == 0 || pt == 0 || h % pf != 0 || w % pt != 0 {
            return Err(MaeError::Config(format!(
                "input_size {:?} не делится на patch_size {:?}",
                self.input_size, self.patch_size
            )));
        }
        if self.num_heads == 0 || self.embed_dim % self.num_heads != 0 {
            return Err(MaeError::Config(format!(
                "embed_dim {} не делится на num_heads {}",
                self.embed_dim, self.num_heads
            )));
        }
        // 2-D sin-cos: по embed_dim/2 на ось, каждая половина = [sin | cos].
        if self.embed_dim % 4 != 0 {
            return Err(MaeError::Config(format!(
                "embed_dim {} must be divisible by 4",
                self.embed_dim
            )));
        }
        Ok(())
    }

    /// Head dimension.
    pub fn head_dim(&self) -> usize {
        self.embed_dim / self.num_heads
    }

    /// MLP hidden size.
    pub fn mlp_hidden_dim(&self) -> usize {
        (self.embed_dim as f64 * self.mlp_ratio) as usize
    }

    /// Patch grid `(freq, time)`.
    pub fn grid_size(&self) -> (usize, usize) {
        self.geometry().grid_size()
    }

    /// Number of patch tokens per window.
    pub fn num_patches(&self) -> usize {
        self.geometry().num_patches()
    }

    /// Geometry reported to the runtime.
    pub fn geometry(&self) -> EncoderGeometry {
        EncoderGeometry {
            input_size: self.input_size,
            patch_size: self.patch_size,
            embed_dim: self.embed_dim,
            has_cls_token: self.use_cls_token,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MaeEncoderConfig::default();
        assert_eq!(config.embed_dim, 768);
        assert_eq!(config.depth, 12);
        assert_eq!(config.head_dim(), 64);
        assert_eq!(config.mlp_hidden_dim(), 3072);
        assert_eq!(config.grid_size(), (5, 13));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_variant() {
        let variant = ModelVariant::parse("80x512p16x8").unwrap();
        let config = MaeEncoderConfig::from_variant(&variant);
        assert_eq!(config.grid_size(), (5, 64));
        assert_eq!(config.num_patches(), 320);
    }

    #[test]
    fn test_validate_rejects_bad_geometry() {
        let config = MaeEncoderConfig::vit_base([80, 200], [16, 16]);
        assert!(matches!(config.validate(), Err(MaeError::Config(_))));

        let mut config = MaeEncoderConfig::default();
        config.num_heads = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json() {
        let config: MaeEncoderConfig =
            serde_json::from_str(r#"{"depth": 2, "use_cls_token": false}"#).unwrap();
        assert_eq!(config.depth, 2);
        assert!(!config.use_cls_token);
        assert_eq!(config.input_size, [80, 208]);
    }
}
