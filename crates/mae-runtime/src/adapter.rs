//! Per-window encoding: backbone call, `[CLS]` removal and the
//! `(freq, time)` → `(time, freq × dim)` regrouping of tokens.

use candle_core::{DType, Tensor};
use mae_core::{MaeBackbone, MaeError, MaeResult};

/// Regroup tokens [B, F*T, D] (freq-major, time-minor) into [B, T, F*D].
///
/// Token `f * T + t` lands at row `t`, columns `f*D .. (f+1)*D`.
pub fn tokens_to_time_major(tokens: &Tensor, patch_freq: usize, embed_dim: usize) -> MaeResult<Tensor> {
    let (b, n, d) = tokens.dims3()?;
    if d != embed_dim || patch_freq == 0 || n % patch_freq != 0 {
        return Err(MaeError::Config(format!(
            "Токены {:?} не раскладываются в сетку {} x ? x {}",
            tokens.dims(),
            patch_freq,
            embed_dim
        )));
    }
    let time_tokens = n / patch_freq;

    Ok(tokens
        .reshape((b, patch_freq, time_tokens, d))?
        .permute((0, 2, 1, 3))?
        .contiguous()?
        .reshape((b, time_tokens, patch_freq * d))?)
}

/// Encode one window [B, 1, n_mels, unit_frames] into [B, time_tokens, F*D] (f32).
pub fn encode_window(backbone: &dyn MaeBackbone, window: &Tensor) -> MaeResult<Tensor> {
    let geometry = backbone.geometry();
    let out = backbone.encode(window, 0.0)?;

    let tokens = if backbone.has_cls_token() {
        let n = out.tokens.dim(1)?;
        out.tokens.narrow(1, 1, n.saturating_sub(1))?
    } else {
        out.tokens
    };

    let tokens = tokens.to_dtype(DType::F32)?;
    tokens_to_time_major(&tokens, geometry.patch_freq(), geometry.embed_dim)
}
