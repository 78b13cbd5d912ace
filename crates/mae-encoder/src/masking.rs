//! Per-sample random masking of patch tokens.

use candle_core::{DType, Result, Tensor};

/// Result of masking a token sequence.
#[derive(Debug, Clone)]
pub struct Masked {
    /// Kept tokens [N, len_keep, D].
    pub tokens: Tensor,
    /// Binary mask [N, L] in original order: 0 is kept, 1 is removed.
    pub mask: Tensor,
    /// Indices [N, L] that undo the shuffle.
    pub ids_restore: Tensor,
}

/// Number of tokens kept out of `len` for `mask_ratio`.
pub fn len_keep(len: usize, mask_ratio: f32) -> usize {
    (len as f64 * (1.0 - mask_ratio as f64)) as usize
}

/// Keep every token in order: zero mask and identity restore indices.
pub fn no_masking(x: &Tensor) -> Result<Masked> {
    let (n, l, _) = x.dims3()?;
    let device = x.device();
    let ids_restore = Tensor::arange(0u32, l as u32, device)?
        .unsqueeze(0)?
        .broadcast_as((n, l))?
        .contiguous()?;
    let mask = Tensor::zeros((n, l), DType::F32, device)?;
    Ok(Masked {
        tokens: x.clone(),
        mask,
        ids_restore,
    })
}

/// Shuffle tokens by argsort of uniform noise and keep the first `len_keep`.
pub fn random_masking(x: &Tensor, mask_ratio: f32) -> Result<Masked> {
    let (n, l, d) = x.dims3()?;
    let device = x.device();
    let keep = len_keep(l, mask_ratio);

    let noise = Tensor::rand(0f32, 1f32, (n, l), device)?;
    // Маленький шум: оставляем, большой: удаляем.
    let ids_shuffle = noise.arg_sort_last_dim(true)?;
    let ids_restore = ids_shuffle.arg_sort_last_dim(true)?;

    let ids_keep = ids_shuffle.narrow(1, 0, keep)?.contiguous()?;
    let gather_idx = ids_keep
        .unsqueeze(2)?
        .broadcast_as((n, keep, d))?
        .contiguous()?;
    let tokens = x.contiguous()?.gather(&gather_idx, 1)?;

    let kept = Tensor::zeros((n, keep), DType::F32, device)?;
    let removed = Tensor::ones((n, l - keep), DType::F32, device)?;
    let mask = Tensor::cat(&[&kept, &removed], 1)?.gather(&ids_restore, 1)?;

    Ok(Masked {
        tokens,
        mask,
        ids_restore,
    })
}
