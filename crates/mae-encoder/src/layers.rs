//! Neural network layers for the MAE ViT encoder.
//!
//! Weight names follow the timm / MAE checkpoint layout:
//! - `patch_embed.proj`: non-overlapping patch projection
//! - `blocks.{i}.norm1`, `blocks.{i}.attn.{qkv,proj}`
//! - `blocks.{i}.norm2`, `blocks.{i}.mlp.{fc1,fc2}`
//! - pre-norm residual blocks

use candle_core::{DType, D, Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder, linear};

use crate::config::MaeEncoderConfig;

/// LayerNorm layer with learnable weight and bias.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    /// Create a new LayerNorm layer.
    pub fn new(hidden_size: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        let weight = vb.get((hidden_size,), "weight")?;
        let bias = vb.get((hidden_size,), "bias")?;
        Ok(Self { weight, bias, eps })
    }

    /// Apply LayerNorm over the last dimension.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        // Статистики в float32, затем каст обратно (важно для BF16 на GPU).
        let input_dtype = x.dtype();
        let x_f32 = x.to_dtype(DType::F32)?;

        let mean = x_f32.mean_keepdim(D::Minus1)?;
        let x_centered = x_f32.broadcast_sub(&mean)?;
        let variance = x_centered.sqr()?.mean_keepdim(D::Minus1)?;
        let x_normed = x_centered.broadcast_div(&(variance + self.eps)?.sqrt()?)?;
        let x_normed = x_normed.to_dtype(input_dtype)?;

        let w = self.weight.to_dtype(input_dtype)?;
        let b = self.bias.to_dtype(input_dtype)?;
        x_normed.broadcast_mul(&w)?.broadcast_add(&b)
    }
}

/// Patch embedding: `[B, 1, H, W]` → `[B, (H/pf)*(W/pt), D]`.
///
/// Equivalent to `Conv2d(1, D, kernel = stride = patch)` followed by
/// `flatten(2).transpose(1, 2)`, written as reshape + linear so that
/// rectangular patches work.
#[derive(Debug, Clone)]
pub struct PatchEmbed {
    proj: Linear,
    patch_size: [usize; 2],
    grid_size: (usize, usize),
}

impl PatchEmbed {
    /// Load `proj.weight` `[D, 1, pf, pt]` and `proj.bias` `[D]`.
    pub fn new(config: &MaeEncoderConfig, vb: VarBuilder) -> Result<Self> {
        let [pf, pt] = config.patch_size;
        let d = config.embed_dim;
        let vb = vb.pp("proj");

        let weight = vb.get((d, 1, pf, pt), "weight")?.reshape((d, pf * pt))?;
        let bias = vb.get(d, "bias")?;

        Ok(Self {
            proj: Linear::new(weight, Some(bias)),
            patch_size: config.patch_size,
            grid_size: config.grid_size(),
        })
    }

    /// Forward pass.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, c, h, w) = x.dims4()?;
        let [pf, pt] = self.patch_size;
        let (gf, gt) = self.grid_size;
        if c != 1 || h != gf * pf || w != gt * pt {
            return Err(candle_core::Error::Msg(format!(
                "PatchEmbed expects [B, 1, {}, {}], got {:?}",
                gf * pf,
                gt * pt,
                x.dims()
            )));
        }

        // [B, 1, H, W] -> [B, gf, pf, gt, pt] -> [B, gf, gt, pf, pt]
        let x = x
            .reshape((b, gf, pf, gt, pt))?
            .permute((0, 1, 3, 2, 4))?
            .contiguous()?
            .reshape((b, gf * gt, pf * pt))?;
        self.proj.forward(&x)
    }
}

/// Multi-head self-attention with a fused qkv projection.
#[derive(Debug, Clone)]
pub struct Attention {
    qkv: Linear,
    proj: Linear,
    num_heads: usize,
    head_dim: usize,
}

impl Attention {
    /// Create a new attention layer.
    pub fn new(config: &MaeEncoderConfig, vb: VarBuilder) -> Result<Self> {
        let dim = config.embed_dim;
        let qkv = linear(dim, dim * 3, vb.pp("qkv"))?;
        let proj = linear(dim, dim, vb.pp("proj"))?;

        Ok(Self {
            qkv,
            proj,
            num_heads: config.num_heads,
            head_dim: config.head_dim(),
        })
    }

    /// Forward pass.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (b, n, c) = x.dims3()?;

        // [B, N, 3C] -> [3, B, H, N, hd]
        let qkv = self
            .qkv
            .forward(x)?
            .reshape((b, n, 3, self.num_heads, self.head_dim))?
            .permute((2, 0, 3, 1, 4))?;
        let q = qkv.get(0)?.contiguous()?;
        let k = qkv.get(1)?.contiguous()?;
        let v = qkv.get(2)?.contiguous()?;

        let scale = (self.head_dim as f64).sqrt();
        let attn = (q.matmul(&k.transpose(2, 3)?)? / scale)?;

        let attn_f32 = attn.to_dtype(DType::F32)?;
        let attn = candle_nn::ops::softmax_last_dim(&attn_f32)?.to_dtype(attn.dtype())?;

        let out = attn
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((b, n, c))?;
        self.proj.forward(&out)
    }
}

/// MLP: fc1 -> GELU -> fc2.
#[derive(Debug, Clone)]
pub struct Mlp {
    fc1: Linear,
    fc2: Linear,
}

impl Mlp {
    /// Create a new MLP.
    pub fn new(config: &MaeEncoderConfig, vb: VarBuilder) -> Result<Self> {
        let hidden = config.mlp_hidden_dim();
        let fc1 = linear(config.embed_dim, hidden, vb.pp("fc1"))?;
        let fc2 = linear(hidden, config.embed_dim, vb.pp("fc2"))?;
        Ok(Self { fc1, fc2 })
    }

    /// Forward pass.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let hidden = self.fc1.forward(x)?.gelu_erf()?;
        self.fc2.forward(&hidden)
    }
}

/// Pre-norm transformer block.
///
/// - x + attn(norm1(x))
/// - x + mlp(norm2(x))
#[derive(Debug, Clone)]
pub struct Block {
    norm1: LayerNorm,
    attn: Attention,
    norm2: LayerNorm,
    mlp: Mlp,
}

impl Block {
    /// Create a new block.
    pub fn new(config: &MaeEncoderConfig, vb: VarBuilder) -> Result<Self> {
        let eps = config.layer_norm_eps;
        Ok(Self {
            norm1: LayerNorm::new(config.embed_dim, eps, vb.pp("norm1"))?,
            attn: Attention::new(config, vb.pp("attn"))?,
            norm2: LayerNorm::new(config.embed_dim, eps, vb.pp("norm2"))?,
            mlp: Mlp::new(config, vb.pp("mlp"))?,
        })
    }

    /// Forward pass with residual connections.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let h = self.attn.forward(&self.norm1.forward(x)?)?;
        let x = (x + h)?;
        let h = self.mlp.forward(&self.norm2.forward(&x)?)?;
        x + h
    }
}
