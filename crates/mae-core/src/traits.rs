//! Capability traits for the two collaborators of the embedding runtime.
//!
//! The runtime never depends on a concrete encoder or DSP implementation:
//! backbone variants (different patch sizes, with or without `[CLS]`) and
//! spectrogram front-ends are chosen at construction time and passed in as
//! trait objects.

use candle_core::{Device, Tensor};

use crate::config::EncoderGeometry;
use crate::error::MaeResult;
use crate::types::WaveformBatch;

/// Output of one backbone encode call.
#[derive(Debug, Clone)]
pub struct EncoderOutput {
    /// Tokens of shape [batch, (1 +) kept_patches, embed_dim].
    ///
    /// When the backbone reports a `[CLS]` token it is the first token.
    pub tokens: Tensor,

    /// Binary mask [batch, num_patches]: 0 is kept, 1 is removed.
    pub mask: Tensor,

    /// Indices [batch, num_patches] that restore the original patch order.
    pub ids_restore: Tensor,
}

/// Transformer encoder that turns one fixed-width spectrogram window into tokens.
///
/// Implementations must be read-only during inference so one loaded model
/// can serve concurrent calls.
pub trait MaeBackbone: Send + Sync {
    /// Encode a window of shape [batch, 1, mel_bins, unit_frames].
    ///
    /// `mask_ratio` is the fraction of patches to drop; `0.0` keeps all of them
    /// in their original (freq-major, time-minor) order.
    fn encode(&self, window: &Tensor, mask_ratio: f32) -> MaeResult<EncoderOutput>;

    /// Patch grid and token width.
    fn geometry(&self) -> EncoderGeometry;

    /// Whether [`EncoderOutput::tokens`] starts with a `[CLS]` token.
    fn has_cls_token(&self) -> bool {
        self.geometry().has_cls_token
    }
}

/// Front-end that turns a waveform batch into a power mel spectrogram.
pub trait SpectrogramTransform: Send + Sync {
    /// Power mel spectrogram of shape [n_sounds, n_mels, n_frames].
    fn power_spectrogram(&self, batch: &WaveformBatch, device: &Device) -> MaeResult<Tensor>;

    /// Number of mel bins in the output.
    fn n_mels(&self) -> usize;
}
