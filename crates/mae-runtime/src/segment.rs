//! Fixed-width window segmentation of a log-mel batch along the frame axis.

use candle_core::{D, Tensor};
use mae_core::{MaeError, MaeResult, PaddingPolicy};

/// Windows cut from one spectrogram batch, plus padding bookkeeping.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Windows [B, 1, n_mels, unit_frames], left to right, non-overlapping.
    pub windows: Vec<Tensor>,
    /// Zero frames appended after the last real frame.
    pub pad_frames: usize,
    /// Window length in frames.
    pub unit_frames: usize,
    /// Frame count before padding.
    pub cur_frames: usize,
}

impl Segmentation {
    /// Number of windows.
    pub fn num_windows(&self) -> usize {
        self.windows.len()
    }
}

/// Pad `lms` [B, 1, n_mels, frames] on the trailing edge and cut it into windows.
pub fn segment(lms: &Tensor, unit_frames: usize, policy: PaddingPolicy) -> MaeResult<Segmentation> {
    if unit_frames == 0 {
        return Err(MaeError::Config("unit_frames must be positive".to_string()));
    }
    let cur_frames = lms.dim(D::Minus1)?;
    if cur_frames == 0 {
        return Err(MaeError::Audio("spectrogram has no frames".to_string()));
    }

    let pad_frames = policy.pad_frames(cur_frames, unit_frames);
    let padded = if pad_frames > 0 {
        lms.pad_with_zeros(D::Minus1, 0, pad_frames)?
    } else {
        lms.clone()
    };

    let total = cur_frames + pad_frames;
    let windows = (0..total / unit_frames)
        .map(|i| padded.narrow(D::Minus1, i * unit_frames, unit_frames))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Segmentation {
        windows,
        pad_frames,
        unit_frames,
        cur_frames,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};

    fn ramp(frames: usize) -> Tensor {
        Tensor::arange(1f32, frames as f32 + 1.0, &Device::Cpu)
            .unwrap()
            .reshape((1, 1, 1, frames))
            .unwrap()
    }

    #[test]
    fn test_segment_pads_partial_window() {
        let seg = segment(&ramp(10), 4, PaddingPolicy::AlwaysPad).unwrap();
        assert_eq!(seg.num_windows(), 3);
        assert_eq!(seg.pad_frames, 2);
        assert_eq!(seg.cur_frames, 10);

        let last = seg.windows[2].flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(last, vec![9.0, 10.0, 0.0, 0.0]);
        let first = seg.windows[0].flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert_eq!(first, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_exact_multiple_always_pad_adds_window() {
        let seg = segment(&ramp(8), 4, PaddingPolicy::AlwaysPad).unwrap();
        assert_eq!(seg.num_windows(), 3);
        assert_eq!(seg.pad_frames, 4);
        let last = seg.windows[2].flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(last.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_exact_multiple_minimal() {
        let seg = segment(&ramp(8), 4, PaddingPolicy::Minimal).unwrap();
        assert_eq!(seg.num_windows(), 2);
        assert_eq!(seg.pad_frames, 0);
    }

    #[test]
    fn test_window_shape_keeps_batch_and_mels() {
        let lms = Tensor::zeros((2, 1, 80, 201), DType::F32, &Device::Cpu).unwrap();
        let seg = segment(&lms, 208, PaddingPolicy::AlwaysPad).unwrap();
        assert_eq!(seg.num_windows(), 1);
        assert_eq!(seg.pad_frames, 7);
        assert_eq!(seg.windows[0].dims(), &[2, 1, 80, 208]);
    }

    #[test]
    fn test_empty_input_rejected() {
        let lms = Tensor::zeros((1, 1, 80, 0), DType::F32, &Device::Cpu).unwrap();
        assert!(segment(&lms, 208, PaddingPolicy::AlwaysPad).is_err());
        assert!(segment(&ramp(3), 0, PaddingPolicy::AlwaysPad).is_err());
    }
}
