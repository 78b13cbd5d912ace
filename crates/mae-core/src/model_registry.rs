//! Варианты моделей MSM-MAE, закодированные в имени директории чекпоинта.
//!
//! Чекпоинты раскладываются по папкам вида `80x208p16x16` или
//! `80x208p16x16_fusion`: размер входа `[mel, frames]`, размер патча
//! `[freq, time]` и необязательная опция после второго `p`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::{MaeError, MaeResult};

/// Геометрия модели, извлечённая из имени папки.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVariant {
    /// Размер входного окна `[mel_bins, frames]`.
    pub input_size: [usize; 2],
    /// Размер патча `[freq, time]`.
    pub patch_size: [usize; 2],
    /// Необязательная опция модели (третья часть после `p`), пустая по умолчанию.
    pub option: String,
}

impl ModelVariant {
    /// Разобрать имя вида `80x208p16x16[pOPT][_suffix]`.
    pub fn parse(name: &str) -> MaeResult<Self> {
        let head = name.split('_').next().unwrap_or_default();
        let parts: Vec<&str> = head.split('p').collect();
        if parts.len() < 2 {
            return Err(MaeError::Config(format!(
                "Имя модели '{name}' не соответствует шаблону <F>x<T>p<PF>x<PT>"
            )));
        }
        let input_size = parse_pair(parts[0], name)?;
        let patch_size = parse_pair(parts[1], name)?;
        if patch_size[0] == 0 || patch_size[1] == 0 {
            return Err(MaeError::Config(format!(
                "Нулевой размер патча в имени модели '{name}'"
            )));
        }
        let option = parts.get(2).map(|s| s.to_string()).unwrap_or_default();

        Ok(Self {
            input_size,
            patch_size,
            option,
        })
    }

    /// Разобрать имя директории модели, если оно соответствует шаблону.
    pub fn from_dir(model_dir: impl AsRef<Path>) -> Option<Self> {
        let name = model_dir.as_ref().file_name()?.to_str()?;
        Self::parse(name).ok()
    }

    /// Имя архитектуры энкодера, например `mae_vit_base_patch16x16`.
    pub fn architecture(&self) -> String {
        format!(
            "mae_vit_base_patch{}x{}",
            self.patch_size[0], self.patch_size[1]
        )
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}p{}x{}",
            self.input_size[0], self.input_size[1], self.patch_size[0], self.patch_size[1]
        )?;
        if !self.option.is_empty() {
            write!(f, "p{}", self.option)?;
        }
        Ok(())
    }
}

fn parse_pair(s: &str, name: &str) -> MaeResult<[usize; 2]> {
    let values: Vec<usize> = s
        .split('x')
        .map(|v| v.parse::<usize>())
        .collect::<Result<_, _>>()
        .map_err(|e| MaeError::Config(format!("Некорректное число в '{name}': {e}")))?;
    match values.as_slice() {
        [a, b] => Ok([*a, *b]),
        _ => Err(MaeError::Config(format!(
            "Ожидалась пара <A>x<B> в '{name}', получено '{s}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let v = ModelVariant::parse("80x208p16x16").unwrap();
        assert_eq!(v.input_size, [80, 208]);
        assert_eq!(v.patch_size, [16, 16]);
        assert!(v.option.is_empty());
        assert_eq!(v.architecture(), "mae_vit_base_patch16x16");
        assert_eq!(v.to_string(), "80x208p16x16");
    }

    #[test]
    fn test_parse_with_suffix_and_option() {
        let v = ModelVariant::parse("80x512p16x8pabc_run2").unwrap();
        assert_eq!(v.input_size, [80, 512]);
        assert_eq!(v.patch_size, [16, 8]);
        assert_eq!(v.option, "abc");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ModelVariant::parse("checkpoints").is_err());
        assert!(ModelVariant::parse("80x208p16").is_err());
        assert!(ModelVariant::parse("80x208p0x16").is_err());
    }

    #[test]
    fn test_from_dir() {
        let v = ModelVariant::from_dir("/models/80x208p16x16_mae").unwrap();
        assert_eq!(v.input_size, [80, 208]);
        assert!(ModelVariant::from_dir("/models/latest").is_none());
    }
}
