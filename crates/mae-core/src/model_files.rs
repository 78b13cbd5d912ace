//! Утилиты для поиска файлов модели на диске.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{MaeError, MaeResult};

/// Имя файла весов, которое проверяется первым.
pub const DEFAULT_WEIGHTS_FILE: &str = "model.safetensors";

/// Найти файл весов энкодера в директории модели.
///
/// Поддерживает:
/// - `model.safetensors` (сконвертированный чекпоинт)
/// - `checkpoint-<N>.safetensors`: берётся чекпоинт с максимальным номером эпохи
pub fn resolve_checkpoint(model_dir: impl AsRef<Path>) -> MaeResult<PathBuf> {
    let model_dir = model_dir.as_ref();

    let single = model_dir.join(DEFAULT_WEIGHTS_FILE);
    if single.exists() {
        debug!("Веса: {}", single.display());
        return Ok(single);
    }

    let mut best: Option<(u64, PathBuf)> = None;
    for entry in std::fs::read_dir(model_dir)? {
        let entry = entry?;
        let p = entry.path();
        if !p.is_file() {
            continue;
        }
        let Some(name) = p.file_name().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(epoch) = checkpoint_epoch(name) else {
            continue;
        };
        if best.as_ref().is_none_or(|(e, _)| epoch > *e) {
            best = Some((epoch, p));
        }
    }

    let Some((epoch, path)) = best else {
        return Err(MaeError::Model(format!(
            "В директории модели не найден ни {}, ни checkpoint-*.safetensors: {}",
            DEFAULT_WEIGHTS_FILE,
            model_dir.display()
        )));
    };
    debug!("Выбран чекпоинт эпохи {}: {}", epoch, path.display());
    Ok(path)
}

/// Номер эпохи из имени `checkpoint-<N>.safetensors`.
fn checkpoint_epoch(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("checkpoint-")?
        .strip_suffix(".safetensors")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_epoch() {
        assert_eq!(checkpoint_epoch("checkpoint-99.safetensors"), Some(99));
        assert_eq!(checkpoint_epoch("checkpoint-99.pth"), None);
        assert_eq!(checkpoint_epoch("model.safetensors"), None);
    }

    #[test]
    fn test_resolve_picks_latest_epoch() {
        let dir = std::env::temp_dir().join(format!("msm-mae-ckpt-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["checkpoint-9.safetensors", "checkpoint-99.safetensors", "notes.txt"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let found = resolve_checkpoint(&dir).unwrap();
        assert_eq!(found.file_name().unwrap(), "checkpoint-99.safetensors");

        std::fs::write(dir.join(DEFAULT_WEIGHTS_FILE), b"").unwrap();
        let found = resolve_checkpoint(&dir).unwrap();
        assert_eq!(found.file_name().unwrap(), DEFAULT_WEIGHTS_FILE);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_resolve_without_weights_fails() {
        let dir = std::env::temp_dir().join(format!("msm-mae-noweights-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("checkpoint-3.pth"), b"").unwrap();

        let err = resolve_checkpoint(&dir).unwrap_err();
        assert!(matches!(err, MaeError::Model(_)));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
