//! Fixed 2-D sin-cos positional table for the patch grid.

use candle_core::{DType, Device, Result, Tensor};

/// 1-D sin-cos encoding of `positions` into `dim` channels: `[sin | cos]`.
fn sincos_1d(dim: usize, positions: impl Iterator<Item = usize>) -> Vec<Vec<f32>> {
    let half = dim / 2;
    let omega: Vec<f64> = (0..half)
        .map(|i| 1.0 / 10000f64.powf(i as f64 / half as f64))
        .collect();

    positions
        .map(|pos| {
            let mut row = Vec::with_capacity(dim);
            row.extend(omega.iter().map(|w| (pos as f64 * w).sin() as f32));
            row.extend(omega.iter().map(|w| (pos as f64 * w).cos() as f32));
            row
        })
        .collect()
}

/// Fixed 2-D sin-cos positional embedding.
///
/// Rows follow the patch order `(freq, time)` row-major. The first half of
/// each row encodes the time (column) index, the second half the frequency
/// (row) index. With `[CLS]`, row 0 is all zeros.
#[derive(Debug, Clone)]
pub struct SinCosPositionEmbedding {
    embedding: Tensor,
    has_cls_token: bool,
}

impl SinCosPositionEmbedding {
    /// Build the table for a `grid_freq x grid_time` patch grid.
    pub fn new(
        embed_dim: usize,
        grid_freq: usize,
        grid_time: usize,
        has_cls_token: bool,
        device: &Device,
        dtype: DType,
    ) -> Result<Self> {
        if embed_dim % 4 != 0 {
            return Err(candle_core::Error::Msg(format!(
                "SinCosPositionEmbedding needs embed_dim divisible by 4, got {embed_dim}"
            )));
        }

        let half = embed_dim / 2;
        let emb_time = sincos_1d(half, 0..grid_time);
        let emb_freq = sincos_1d(half, 0..grid_freq);

        let rows = grid_freq * grid_time + usize::from(has_cls_token);
        let mut data = Vec::with_capacity(rows * embed_dim);
        if has_cls_token {
            data.extend(std::iter::repeat_n(0.0f32, embed_dim));
        }
        for f in 0..grid_freq {
            for t in 0..grid_time {
                data.extend_from_slice(&emb_time[t]);
                data.extend_from_slice(&emb_freq[f]);
            }
        }

        let embedding = Tensor::from_vec(data, (1, rows, embed_dim), device)?.to_dtype(dtype)?;
        Ok(Self {
            embedding,
            has_cls_token,
        })
    }

    /// Positions of the patch tokens: [1, num_patches, embed_dim].
    pub fn patches(&self) -> Result<Tensor> {
        if self.has_cls_token {
            let rows = self.embedding.dim(1)?;
            self.embedding.narrow(1, 1, rows - 1)
        } else {
            Ok(self.embedding.clone())
        }
    }

    /// Position of the `[CLS]` token: [1, 1, embed_dim].
    pub fn cls(&self) -> Result<Option<Tensor>> {
        if self.has_cls_token {
            Ok(Some(self.embedding.narrow(1, 0, 1)?))
        } else {
            Ok(None)
        }
    }

    /// The whole table: [1, (1 +) num_patches, embed_dim].
    pub fn table(&self) -> &Tensor {
        &self.embedding
    }
}
