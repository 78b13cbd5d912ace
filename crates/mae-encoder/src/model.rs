//! MAE ViT encoder model.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use mae_core::{EncoderGeometry, EncoderOutput, MaeBackbone, MaeError, MaeResult};
use std::path::Path;
use tracing::{debug, info};

use crate::config::MaeEncoderConfig;
use crate::layers::{Block, LayerNorm, PatchEmbed};
use crate::masking::{self, Masked};
use crate::position::SinCosPositionEmbedding;

const PATCH_WEIGHT: &str = "patch_embed.proj.weight";

/// MAE ViT encoder.
///
/// 1. Patch embedding of the `[B, 1, mel, frames]` window
/// 2. Fixed 2-D sin-cos positions
/// 3. Random masking (skipped for `mask_ratio == 0`)
/// 4. Optional `[CLS]` token (plus its zero position) prepended
/// 5. Transformer blocks and the final `norm`
#[derive(Debug, Clone)]
pub struct MaeEncoder {
    config: MaeEncoderConfig,
    patch_embed: PatchEmbed,
    pos_embed: SinCosPositionEmbedding,
    cls_token: Option<Tensor>,
    blocks: Vec<Block>,
    norm: LayerNorm,
    dtype: DType,
}

impl MaeEncoder {
    /// Create a new encoder from VarBuilder.
    pub fn new(
        config: MaeEncoderConfig,
        vb: VarBuilder,
        device: &Device,
        dtype: DType,
    ) -> MaeResult<Self> {
        config.validate()?;

        let patch_embed = PatchEmbed::new(&config, vb.pp("patch_embed"))?;
        let (grid_freq, grid_time) = config.grid_size();
        let pos_embed = SinCosPositionEmbedding::new(
            config.embed_dim,
            grid_freq,
            grid_time,
            config.use_cls_token,
            device,
            dtype,
        )?;

        let cls_token = if config.use_cls_token {
            Some(vb.get((1, 1, config.embed_dim), "cls_token")?)
        } else {
            None
        };

        let mut blocks = Vec::with_capacity(config.depth);
        for i in 0..config.depth {
            blocks.push(Block::new(&config, vb.pp(format!("blocks.{}", i)))?);
        }
        let norm = LayerNorm::new(config.embed_dim, config.layer_norm_eps, vb.pp("norm"))?;

        Ok(Self {
            config,
            patch_embed,
            pos_embed,
            cls_token,
            blocks,
            norm,
            dtype,
        })
    }

    /// Load encoder from a safetensors checkpoint.
    ///
    /// Weights may live at the root or under `model.`. The `[CLS]` token is
    /// enabled iff the checkpoint contains `cls_token`, overriding the config.
    pub fn from_safetensors(
        mut config: MaeEncoderConfig,
        path: impl AsRef<Path>,
        device: &Device,
    ) -> MaeResult<Self> {
        let path = path.as_ref();

        // CPU: F32 (BF16 matmul на CPU не поддерживается), GPU: BF16.
        let dtype = if device.is_metal() || device.is_cuda() {
            DType::BF16
        } else {
            DType::F32
        };

        let root = unsafe { VarBuilder::from_mmaped_safetensors(&[path], dtype, device)? };
        let vb = if root.contains_tensor(PATCH_WEIGHT) {
            root
        } else if root.contains_tensor(&format!("model.{PATCH_WEIGHT}")) {
            root.pp("model")
        } else {
            return Err(MaeError::Model(format!(
                "{} не похож на чекпоинт MAE: нет {}",
                path.display(),
                PATCH_WEIGHT
            )));
        };

        let has_cls = vb.contains_tensor("cls_token");
        if has_cls != config.use_cls_token {
            debug!(
                "use_cls_token {} -> {} (по содержимому чекпоинта)",
                config.use_cls_token, has_cls
            );
        }
        config.use_cls_token = has_cls;

        info!(
            "MaeEncoder: {:?}/{:?}, depth {}, dtype {:?}, [CLS] {}",
            config.input_size, config.patch_size, config.depth, dtype, has_cls
        );
        Self::new(config, vb, device, dtype)
    }

    /// Encode a window of shape [B, 1, mel, frames].
    ///
    /// Returns tokens [B, (1 +) kept, D] in the model dtype.
    pub fn forward_encoder(&self, x: &Tensor, mask_ratio: f32) -> MaeResult<EncoderOutput> {
        if !(0.0..1.0).contains(&mask_ratio) {
            return Err(MaeError::Inference(format!(
                "mask_ratio must be in [0, 1), got {mask_ratio}"
            )));
        }

        let x = x.to_dtype(self.dtype)?;
        let x = self.patch_embed.forward(&x)?;
        let x = x.broadcast_add(&self.pos_embed.patches()?)?;

        let Masked {
            tokens: mut x,
            mask,
            ids_restore,
        } = if mask_ratio > 0.0 {
            masking::random_masking(&x, mask_ratio)?
        } else {
            masking::no_masking(&x)?
        };

        if let (Some(cls), Some(cls_pos)) = (&self.cls_token, self.pos_embed.cls()?) {
            let batch = x.dim(0)?;
            let cls = cls.broadcast_add(&cls_pos)?;
            let cls = cls
                .broadcast_as((batch, 1, self.config.embed_dim))?
                .contiguous()?;
            x = Tensor::cat(&[&cls, &x], 1)?;
        }

        for block in &self.blocks {
            x = block.forward(&x)?;
        }
        let tokens = self.norm.forward(&x)?;

        if mae_core::debug::enabled() {
            let stats = tokens.to_dtype(DType::F32)?;
            let mean = stats.mean_all()?.to_scalar::<f32>()?;
            let absmax = stats.abs()?.max_all()?.to_scalar::<f32>()?;
            debug!(
                "MaeEncoder: tokens {:?}, mask_ratio {}, mean {:.4}, absmax {:.4}",
                tokens.dims(),
                mask_ratio,
                mean,
                absmax
            );
        }

        Ok(EncoderOutput {
            tokens,
            mask,
            ids_restore,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &MaeEncoderConfig {
        &self.config
    }

    /// Weight dtype.
    pub fn dtype(&self) -> DType {
        self.dtype
    }
}

impl MaeBackbone for MaeEncoder {
    fn encode(&self, window: &Tensor, mask_ratio: f32) -> MaeResult<EncoderOutput> {
        self.forward_encoder(window, mask_ratio)
    }

    fn geometry(&self) -> EncoderGeometry {
        self.config.geometry()
    }
}
