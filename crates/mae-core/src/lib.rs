//! # mae-core
//!
//! Базовые типы, трейты и определения ошибок для MSM-MAE.
//!
//! Этот крейт предоставляет фундаментальные абстракции для всех остальных
//! крейтов в workspace:
//!
//! - Общие типы данных (`WaveformBatch`, `SceneEmbeddings`, `TimestampEmbeddings`)
//! - DSP-конфигурация и геометрия энкодера
//! - Унифицированная обработка ошибок через `MaeError`
//! - Трейты [`MaeBackbone`] и [`SpectrogramTransform`]: возможности, которые
//!   использует рантайм
//! - Разбор имени варианта модели [`ModelVariant`]

pub mod config;
pub mod debug;
pub mod error;
pub mod model_files;
pub mod model_registry;
pub mod traits;
pub mod types;

pub use config::{
    EncoderGeometry, MelScale, NormalizationScope, PaddingPolicy, SpectrogramConfig,
    WindowFunction,
};
pub use error::{MaeError, MaeResult};
pub use model_registry::ModelVariant;
pub use traits::{EncoderOutput, MaeBackbone, SpectrogramTransform};
pub use types::{AudioBuffer, SceneEmbeddings, TimestampEmbeddings, WaveformBatch};
