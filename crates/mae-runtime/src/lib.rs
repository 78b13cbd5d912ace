//! # mae-runtime
//!
//! Windowed encoding runtime for MSM-MAE audio embeddings.
//!
//! The spectrogram of a clip is cut into fixed-width windows, each window is
//! encoded by the backbone, per-window token grids are regrouped per time
//! step and concatenated, and tokens produced by padding are trimmed.

pub mod adapter;
pub mod config;
pub mod features;
pub mod reassemble;
mod runtime;
pub mod segment;
pub mod timestamps;

pub use config::{ConfigSource, RuntimeConfig};
pub use runtime::RuntimeMae;
