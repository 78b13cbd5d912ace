//! Concatenation of per-window token sequences and removal of the padded tail.

use candle_core::Tensor;
use mae_core::{MaeError, MaeResult};

/// Output tokens attributable to `pad_frames` of padding.
pub fn pad_token_count(tokens_per_window: usize, pad_frames: usize, unit_frames: usize) -> usize {
    tokens_per_window * pad_frames / unit_frames
}

/// Concatenate windows [B, T_w, F*D] along time and drop the pad-induced tail.
pub fn reassemble(windows: &[Tensor], pad_frames: usize, unit_frames: usize) -> MaeResult<Tensor> {
    let Some(first) = windows.first() else {
        return Err(MaeError::Inference("no windows to reassemble".to_string()));
    };
    let tokens_per_window = first.dim(1)?;

    let x = Tensor::cat(windows, 1)?;
    let total = x.dim(1)?;
    let pad_tokens = pad_token_count(tokens_per_window, pad_frames, unit_frames);
    if pad_tokens >= total {
        return Err(MaeError::Inference(format!(
            "padding covers all {} tokens ({} to trim)",
            total, pad_tokens
        )));
    }

    if pad_tokens > 0 {
        Ok(x.narrow(1, 0, total - pad_tokens)?)
    } else {
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn window(start: f32, tokens: usize) -> Tensor {
        Tensor::arange(start, start + tokens as f32, &Device::Cpu)
            .unwrap()
            .reshape((1, tokens, 1))
            .unwrap()
    }

    #[test]
    fn test_pad_token_count() {
        assert_eq!(pad_token_count(13, 7, 208), 0);
        assert_eq!(pad_token_count(13, 16, 208), 1);
        assert_eq!(pad_token_count(13, 208, 208), 13);
        assert_eq!(pad_token_count(13, 207, 208), 12);
    }

    #[test]
    fn test_concatenation_keeps_window_order() {
        let windows = vec![window(0.0, 4), window(4.0, 4)];
        let x = reassemble(&windows, 0, 8).unwrap();
        let v = x.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(v, vec![0., 1., 2., 3., 4., 5., 6., 7.]);
    }

    #[test]
    fn test_trims_padded_tail() {
        // 4 токена на окно из 8 кадров, паддинг 5 кадров -> 2 токена.
        let windows = vec![window(0.0, 4), window(4.0, 4)];
        let x = reassemble(&windows, 5, 8).unwrap();
        let v = x.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(v, vec![0., 1., 2., 3., 4., 5.]);
    }

    #[test]
    fn test_errors() {
        assert!(reassemble(&[], 0, 8).is_err());
        assert!(reassemble(&[window(0.0, 4)], 8, 8).is_err());
    }
}
