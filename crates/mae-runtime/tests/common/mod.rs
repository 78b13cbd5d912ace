//! Deterministic backbone for runtime tests.
//!
//! Every patch token carries `[patch mean, freq index, time index]`, so the
//! position of each token after reassembly can be checked exactly.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use audio::MelSpectrogramExtractor;
use candle_core::{DType, Device, Tensor};
use mae_core::{
    EncoderGeometry, EncoderOutput, MaeBackbone, MaeResult, PaddingPolicy, SpectrogramConfig,
};
use mae_runtime::{RuntimeConfig, RuntimeMae};

pub const PROBE_DIM: usize = 3;
pub const CLS_VALUE: f32 = 1.0e6;

pub struct ProbeBackbone {
    geometry: EncoderGeometry,
    calls: Arc<AtomicUsize>,
}

impl ProbeBackbone {
    pub fn new(has_cls_token: bool) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backbone = Self {
            geometry: EncoderGeometry {
                input_size: [80, 208],
                patch_size: [16, 16],
                embed_dim: PROBE_DIM,
                has_cls_token,
            },
            calls: calls.clone(),
        };
        (backbone, calls)
    }
}

impl MaeBackbone for ProbeBackbone {
    fn encode(&self, window: &Tensor, _mask_ratio: f32) -> MaeResult<EncoderOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (b, _, h, w) = window.dims4()?;
        let [pf, pt] = self.geometry.patch_size;
        let (gf, gt) = (h / pf, w / pt);
        let device = window.device();

        let means = window
            .reshape((b, gf, pf, gt, pt))?
            .permute((0, 1, 3, 2, 4))?
            .contiguous()?
            .reshape((b, gf * gt, pf * pt))?
            .mean_keepdim(2)?;

        let mut index = Vec::with_capacity(gf * gt * 2);
        for f in 0..gf {
            for t in 0..gt {
                index.push(f as f32);
                index.push(t as f32);
            }
        }
        let index = Tensor::from_vec(index, (1, gf * gt, 2), device)?
            .broadcast_as((b, gf * gt, 2))?
            .contiguous()?;

        let mut tokens = Tensor::cat(&[&means, &index], 2)?;
        if self.geometry.has_cls_token {
            let cls = Tensor::full(CLS_VALUE, (b, 1, PROBE_DIM), device)?;
            tokens = Tensor::cat(&[&cls, &tokens], 1)?;
        }

        Ok(EncoderOutput {
            tokens,
            mask: Tensor::zeros((b, gf * gt), DType::F32, device)?,
            ids_restore: Tensor::arange(0u32, (gf * gt) as u32, device)?
                .unsqueeze(0)?
                .repeat((b, 1))?,
        })
    }

    fn geometry(&self) -> EncoderGeometry {
        self.geometry
    }
}

pub fn probe_runtime(has_cls_token: bool, padding: PaddingPolicy) -> (RuntimeMae, Arc<AtomicUsize>) {
    let (backbone, calls) = ProbeBackbone::new(has_cls_token);
    let config = RuntimeConfig {
        padding,
        ..RuntimeConfig::default()
    };
    let spectrogram = MelSpectrogramExtractor::new(SpectrogramConfig::msm_mae()).unwrap();
    let runtime = RuntimeMae::new(
        config,
        Box::new(backbone),
        Box::new(spectrogram),
        Device::Cpu,
    )
    .unwrap();
    (runtime, calls)
}

/// Log-mel stand-in [b, 1, 80, frames] whose value at frame `i` is `i + 1`.
pub fn time_ramp(batch: usize, frames: usize) -> Tensor {
    Tensor::arange(1f32, frames as f32 + 1.0, &Device::Cpu)
        .unwrap()
        .reshape((1, 1, 1, frames))
        .unwrap()
        .broadcast_as((batch, 1, 80, frames))
        .unwrap()
        .contiguous()
        .unwrap()
}

/// Two-tone test signal, different per clip so batch rows differ.
pub fn test_signal(num_samples: usize, clip: usize) -> Vec<f32> {
    let f0 = 220.0 * (clip + 1) as f32;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / 16000.0;
            0.3 * (2.0 * std::f32::consts::PI * f0 * t).sin()
                + 0.1 * (2.0 * std::f32::consts::PI * 3.1 * f0 * t).sin()
        })
        .collect()
}
