//! # mae-encoder
//!
//! MAE ViT encoder for MSM-MAE (Masked Spectrogram Modeling).
//!
//! The encoder treats a log-mel window `[1, mel_bins, frames]` as a one-channel
//! image:
//! - non-overlapping patch embedding (`patch_embed.proj`)
//! - fixed 2-D sin-cos positional table, optional learnable `[CLS]` token
//! - pre-norm transformer blocks with fused qkv attention
//! - per-sample random masking (skipped for `mask_ratio == 0`)
//!
//! [`MaeEncoder`] implements [`mae_core::MaeBackbone`], so the runtime can use
//! it as a trait object.

pub mod config;
pub mod layers;
pub mod masking;
pub mod model;
pub mod position;

pub use config::MaeEncoderConfig;
pub use model::MaeEncoder;
