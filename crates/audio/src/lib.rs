//! # audio
//!
//! Audio front-end for MSM-MAE.
//!
//! This crate handles:
//! - WAV file loading and mono down-mix
//! - Audio resampling to the model sample rate (16kHz)
//! - Power mel spectrogram extraction for whole batches

pub mod loader;
pub mod mel;
pub mod resample;

pub use loader::{fit_length, load_clip, load_wav, to_mono};
pub use mel::MelSpectrogramExtractor;
pub use resample::Resampler;
