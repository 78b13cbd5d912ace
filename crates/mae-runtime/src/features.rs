//! Log-mel features and their normalization.

use candle_core::{D, Tensor};
use mae_core::{MaeResult, NormalizationScope};
use tracing::warn;

/// Power mel [B, n_mels, frames] -> log-mel [B, 1, n_mels, frames].
///
/// `f32::EPSILON` is added before the log so silent bins stay finite.
pub fn to_feature(power_mel: &Tensor) -> MaeResult<Tensor> {
    let x = (power_mel + f32::EPSILON as f64)?.log()?;
    Ok(x.unsqueeze(1)?)
}

/// Standardize `x` with statistics over the chosen scope.
///
/// The standard deviation is the unbiased (N - 1) estimator. A zero or
/// non-finite sigma is logged and then divided by anyway, so constant input
/// yields non-finite output.
pub fn normalize_batch(x: &Tensor, scope: NormalizationScope) -> MaeResult<Tensor> {
    match scope {
        NormalizationScope::Batch => {
            let flat = x.flatten_all()?;
            let mu = flat.mean_keepdim(0)?;
            let sigma = flat.var_keepdim(0)?.sqrt()?;
            check_sigma(&sigma.to_vec1::<f32>()?);
            Ok(x.broadcast_sub(&mu.squeeze(0)?)?
                .broadcast_div(&sigma.squeeze(0)?)?)
        }
        NormalizationScope::Clip => {
            let dims = x.dims().to_vec();
            let flat = x.flatten_from(1)?;
            let mu = flat.mean_keepdim(D::Minus1)?;
            let sigma = flat.var_keepdim(D::Minus1)?.sqrt()?;
            check_sigma(&sigma.flatten_all()?.to_vec1::<f32>()?);
            let normed = flat.broadcast_sub(&mu)?.broadcast_div(&sigma)?;
            Ok(normed.reshape(dims)?)
        }
    }
}

fn check_sigma(sigmas: &[f32]) {
    for (i, s) in sigmas.iter().enumerate() {
        if !(s.is_finite() && *s > 0.0) {
            warn!(
                "normalize_batch: sigma[{}] = {} (constant or silent input), output will be non-finite",
                i, s
            );
        }
    }
}
