//!
//! CLI для извлечения аудио-эмбеддингов MSM-MAE (scene / timestamp).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use audio::{fit_length, load_clip};
use mae_core::{ModelVariant, WaveformBatch, model_files};
use mae_runtime::{ConfigSource, RuntimeConfig, RuntimeMae};

/// Какие эмбеддинги считать.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum EmbedMode {
    /// Один вектор на клип (среднее по времени)
    Scene,
    /// Вектор на каждый временной шаг + метки времени в мс
    Timestamp,
}

#[derive(Parser)]
#[command(name = "msm-mae")]
#[command(author, version, about = "MSM-MAE: audio embeddings from a masked spectrogram autoencoder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute embeddings for one or more WAV files
    Embed {
        /// Path to the model directory (e.g. models/80x208p16x16)
        #[arg(long)]
        model: PathBuf,

        /// WAV files; all of them form one batch
        #[arg(long, num_args = 1.., required = true)]
        audio: Vec<PathBuf>,

        /// Device to use (cpu, metal, cuda)
        #[arg(long, default_value = "cpu")]
        device: String,

        /// scene: один вектор на файл; timestamp: вектор на каждый токен
        #[arg(long, value_enum, default_value = "scene")]
        mode: EmbedMode,

        /// Дополнить короткие файлы нулями до самого длинного.
        ///
        /// Без флага файлы разной длины отклоняются: метки времени общие на батч.
        #[arg(long, default_value_t = false)]
        pad_to_longest: bool,

        /// Сохранить JSON в файл вместо stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run a simple test to verify the setup
    Test {
        /// Device to use (cpu, metal, cuda)
        #[arg(long, default_value = "cpu")]
        device: String,
    },

    /// Работа с локальными моделями (поиск/проверка файлов)
    Models {
        #[command(subcommand)]
        command: ModelsCommands,
    },
}

#[derive(Subcommand)]
enum ModelsCommands {
    /// Показать модели в директории (по умолчанию ./models)
    List {
        /// Директория, в которой лежат подпапки с моделями
        #[arg(long, default_value = "models")]
        root: PathBuf,
    },

    /// Проверить конкретную директорию модели и вывести, что найдено
    Check {
        /// Путь к директории модели
        #[arg(long)]
        model: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Embed {
            model,
            audio,
            device,
            mode,
            pad_to_longest,
            out,
        } => run_embed(&model, &audio, &device, mode, pad_to_longest, out),

        Commands::Test { device } => {
            eprintln!("🧪 MSM-MAE - Setup Test");
            eprintln!("=======================");
            eprintln!("Testing {} device...", device);

            let device = create_device(&device)?;
            let a = candle_core::Tensor::randn(0f32, 1f32, (2, 3), &device)?;
            let b = candle_core::Tensor::randn(0f32, 1f32, (3, 4), &device)?;
            let c = a.matmul(&b)?;
            println!("✅ Test passed. Output shape: {:?}", c.dims());
            Ok(())
        }

        Commands::Models { command } => match command {
            ModelsCommands::List { root } => run_models_list(root),
            ModelsCommands::Check { model } => run_models_check(model),
        },
    }
}

// ---------------------------------------------------------------------------
// Эмбеддинги
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct EmbedReport {
    model: String,
    mode: EmbedMode,
    embedding_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    step_ms: Option<f64>,
    clips: Vec<ClipEmbedding>,
}

#[derive(Debug, Serialize)]
struct ClipEmbedding {
    file: String,
    num_samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<Vec<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamps: Option<Vec<f32>>,
}

/// Load WAV files as one batch at `sample_rate`.
fn load_batch(paths: &[PathBuf], sample_rate: usize, pad_to_longest: bool) -> Result<(WaveformBatch, Vec<usize>)> {
    let mut clips = Vec::with_capacity(paths.len());
    for path in paths {
        let samples = load_clip(path, sample_rate)
            .with_context(|| format!("Не удалось загрузить {}", path.display()))?;
        info!("{}: {} samples", path.display(), samples.len());
        clips.push(samples);
    }
    let lengths: Vec<usize> = clips.iter().map(Vec::len).collect();

    if pad_to_longest {
        let longest = lengths.iter().copied().max().unwrap_or(0);
        clips = clips.into_iter().map(|c| fit_length(c, longest)).collect();
    }

    let batch = WaveformBatch::new(clips, sample_rate)
        .context("Файлы разной длины: используйте --pad-to-longest или отдельные вызовы")?;
    Ok((batch, lengths))
}

fn run_embed(
    model_dir: &Path,
    audio: &[PathBuf],
    device: &str,
    mode: EmbedMode,
    pad_to_longest: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let start = Instant::now();
    let device = create_device(device)?;

    eprintln!("🧠 Loading MSM-MAE model from {}...", model_dir.display());
    let runtime = RuntimeMae::from_model_dir(model_dir, &device)
        .with_context(|| format!("Не удалось загрузить модель {}", model_dir.display()))?;
    eprintln!("   Model loaded in {:.2}s", start.elapsed().as_secs_f32());

    let (batch, lengths) = load_batch(audio, runtime.sample_rate(), pad_to_longest)?;
    eprintln!(
        "🎯 Embedding {} clip(s), {:.2}s each...",
        batch.len(),
        batch.duration_ms() / 1000.0
    );
    let embed_start = Instant::now();

    let names = audio.iter().map(|p| p.display().to_string());
    let report = match mode {
        EmbedMode::Scene => {
            let scene = runtime.get_scene_embeddings(&batch)?;
            let rows = scene.to_vec2()?;
            EmbedReport {
                model: model_dir.display().to_string(),
                mode,
                embedding_size: runtime.scene_embedding_size(),
                step_ms: None,
                clips: names
                    .zip(lengths)
                    .zip(rows)
                    .map(|((file, num_samples), row)| ClipEmbedding {
                        file,
                        num_samples,
                        embedding: Some(row),
                        embeddings: None,
                        timestamps: None,
                    })
                    .collect(),
            }
        }
        EmbedMode::Timestamp => {
            let result = runtime.get_timestamp_embeddings(&batch)?;
            let embeddings = result.embeddings.to_vec3::<f32>()?;
            let timestamps = result.timestamps.to_vec2::<f32>()?;
            EmbedReport {
                model: model_dir.display().to_string(),
                mode,
                embedding_size: runtime.timestamp_embedding_size(),
                step_ms: Some(result.step_ms),
                clips: names
                    .zip(lengths)
                    .zip(embeddings.into_iter().zip(timestamps))
                    .map(|((file, num_samples), (emb, ts))| ClipEmbedding {
                        file,
                        num_samples,
                        embedding: None,
                        embeddings: Some(emb),
                        timestamps: Some(ts),
                    })
                    .collect(),
            }
        }
    };
    eprintln!(
        "⏱️  Embedding time: {:.2}s",
        embed_start.elapsed().as_secs_f32()
    );

    let json = serde_json::to_string(&report)?;
    match out {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(&path, json.as_bytes())?;
            eprintln!("💾 Saved embeddings to: {}", path.display());
        }
        None => println!("{json}"),
    }

    eprintln!("⏱️  Total time: {:.2}s", start.elapsed().as_secs_f32());
    Ok(())
}

// ---------------------------------------------------------------------------
// Модели
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ModelInspection {
    model_dir: PathBuf,
    variant: Option<ModelVariant>,
    has_config: bool,
    checkpoint: Option<PathBuf>,
    checkpoint_error: Option<String>,
}

impl ModelInspection {
    fn is_ready(&self) -> bool {
        self.checkpoint.is_some()
    }
}

fn inspect_model_dir(model_dir: &Path) -> ModelInspection {
    let (checkpoint, checkpoint_error) = match model_files::resolve_checkpoint(model_dir) {
        Ok(p) => (Some(p), None),
        Err(e) => (None, Some(e.to_string())),
    };

    ModelInspection {
        model_dir: model_dir.to_path_buf(),
        variant: ModelVariant::from_dir(model_dir),
        has_config: model_dir.join(mae_runtime::config::CONFIG_FILE).exists(),
        checkpoint,
        checkpoint_error,
    }
}

fn fmt_mib(bytes: u64) -> String {
    format!("{:.1} MiB", (bytes as f64) / (1024.0 * 1024.0))
}

fn run_models_list(root: PathBuf) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("Директория не найдена: {}", root.display());
    }

    let mut model_dirs: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(&root).with_context(|| {
        format!(
            "Не удалось прочитать директорию моделей: {}",
            root.display()
        )
    })? {
        let p = entry?.path();
        if p.is_dir() {
            model_dirs.push(p);
        }
    }
    model_dirs.sort();

    if model_dirs.is_empty() {
        println!(
            "В директории {} не найдено подпапок с моделями.",
            root.display()
        );
        return Ok(());
    }

    println!("Найдено моделей: {}", model_dirs.len());
    for dir in model_dirs {
        let insp = inspect_model_dir(&dir);
        let name = dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("<unknown>");
        let status = if insp.is_ready() { "OK" } else { "PARTIAL" };
        let variant = insp
            .variant
            .as_ref()
            .map(|v| v.architecture())
            .unwrap_or_else(|| "-".to_string());
        let ckpt = insp
            .checkpoint
            .as_ref()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
            .unwrap_or("-");

        println!("{name}: {status} ({variant}, weights: {ckpt})");
    }

    Ok(())
}

fn run_models_check(model_dir: PathBuf) -> Result<()> {
    if !model_dir.is_dir() {
        anyhow::bail!("Директория модели не найдена: {}", model_dir.display());
    }

    let insp = inspect_model_dir(&model_dir);

    println!("Модель: {}", insp.model_dir.display());
    match &insp.variant {
        Some(v) => println!(
            "- вариант: {} ({}, input {:?}, patch {:?})",
            v,
            v.architecture(),
            v.input_size,
            v.patch_size
        ),
        None => println!("- вариант: имя папки не в формате <F>x<T>p<PF>x<PT>, геометрия из config.json/по умолчанию"),
    }
    println!(
        "- config.json: {}",
        if insp.has_config { "OK" } else { "MISSING (будут использованы значения по умолчанию)" }
    );

    match &insp.checkpoint {
        Some(p) => {
            let size = std::fs::metadata(p)
                .with_context(|| format!("Не удалось получить metadata: {}", p.display()))?
                .len();
            println!("- weights: OK ({}, {})", p.display(), fmt_mib(size));
        }
        None => {
            println!("- weights: MISSING");
            if let Some(e) = &insp.checkpoint_error {
                println!("  причина: {e}");
            }
        }
    }

    if !insp.is_ready() {
        anyhow::bail!("Модель не готова для embed (см. вывод выше).");
    }

    let (config, source) = RuntimeConfig::from_model_dir(&model_dir)
        .with_context(|| format!("Некорректная конфигурация {}", model_dir.display()))?;
    let geometry = config.encoder.geometry();
    println!();
    println!(
        "Конфигурация ({}):",
        match source {
            ConfigSource::File => "config.json",
            ConfigSource::Defaults => "defaults",
        }
    );
    println!(
        "- spectrogram: {} Hz, n_fft {}, hop {}, {} mel ({}-{} Hz)",
        config.spectrogram.sample_rate,
        config.spectrogram.n_fft,
        config.spectrogram.hop_length,
        config.spectrogram.n_mels,
        config.spectrogram.f_min,
        config.spectrogram.f_max
    );
    println!(
        "- encoder: {:?} / {:?}, dim {}, depth {}, grid {:?}",
        config.encoder.input_size,
        config.encoder.patch_size,
        config.encoder.embed_dim,
        config.encoder.depth,
        geometry.grid_size()
    );
    println!(
        "- padding: {:?}, normalization: {:?}",
        config.padding, config.normalization
    );
    println!("- embedding size: {}", geometry.feature_dim());

    Ok(())
}

fn create_device(device: &str) -> Result<candle_core::Device> {
    match device {
        "metal" => {
            // candle может panic при инициализации Metal (например, если устройство недоступно).
            // Панику ловим, а hook временно глушим, чтобы не засорять stderr.
            let prev_hook = std::panic::take_hook();
            std::panic::set_hook(Box::new(|_| {}));
            let res = std::panic::catch_unwind(|| candle_core::Device::new_metal(0));
            std::panic::set_hook(prev_hook);

            match res {
                Ok(Ok(dev)) => Ok(dev),
                Ok(Err(e)) => Err(e.into()),
                Err(_) => Err(anyhow::anyhow!(
                    "Инициализация Metal недоступна в этом окружении. Попробуйте --device cpu."
                )),
            }
        }
        "cuda" => Ok(candle_core::Device::new_cuda(0)?),
        "cpu" => Ok(candle_core::Device::Cpu),
        other => anyhow::bail!("Неизвестное устройство: {other} (ожидалось cpu, metal или cuda)"),
    }
}
