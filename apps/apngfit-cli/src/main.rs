mod args;

use std::{
    env,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{bail, Result};
use apngfit_bus::{EventBus, LocalBus};
use apngfit_encoder::ApngEncoder;
use apngfit_ops::{init_tracing, suggest_filename, write_artifact, AttemptLog};
use apngfit_pipeline::{ArtifactPipeline, EncodeSettings, FrameLibrary, SourceFile};
use apngfit_raster::ImageRasterizer;
use apngfit_types::{
    config::ApngFitConfig,
    events::{EventPayload, PipelineEvent},
};
use args::Args;
use clap::Parser;
use futures::{stream::BoxStream, StreamExt};
use tracing::{info, warn};

const CONFIG_ENV: &str = "APNGFIT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "apngfit.toml";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let config_path = config_path(&args);
    let mut config = load_config(&config_path);
    args.apply(&mut config);
    config.validate()?;
    init_tracing(&config.ops)?;

    if args.save_config {
        config.to_file(&config_path)?;
        info!("Saved settings to {}", config_path.display());
    }

    let bus = LocalBus::default();
    let progress = tokio::spawn(report_progress(bus.subscribe()));
    let attempts = AttemptLog::new();
    let pipeline = ArtifactPipeline::new(
        ApngEncoder::new(),
        ImageRasterizer::new(),
        bus,
        attempts.clone(),
    );
    let settings = EncodeSettings::from_config(&config);

    let mut sources = Vec::new();
    for path in &args.inputs {
        match SourceFile::from_path(path) {
            Ok(source) => sources.push(source),
            Err(err) => warn!("Skipping {}: {err}", path.display()),
        }
    }

    let mut library = FrameLibrary::new(config.timing.frame_count, config.timing.duration_sec);
    let report = pipeline
        .ingest(&mut library, sources, config.raster.aspect, &settings)
        .await;
    for (name, reason) in &report.rejected {
        warn!("Rejected {name}: {reason}");
    }
    if library.is_empty() {
        bail!("no usable input images");
    }
    if let Some(frames) = args.frames {
        library.set_frame_count(frames);
    }
    info!(
        "{} frames loaded; encoding {} sequence entries",
        library.len(),
        library.effective_target()
    );

    let outcome = pipeline.produce_from_library(&library, &settings).await?;
    drop(pipeline);
    progress.await.ok();

    if let Some(path) = &args.report {
        attempts.write_report(path).await?;
    }

    let size_kb = outcome.size_bytes as f64 / 1024.0;
    let limit_kb = outcome.size_limit as f64 / 1024.0;
    if outcome.met_budget {
        let path = write_output(&output_path(&args, &config, &library), &outcome.bytes)?;
        println!(
            "{}: {size_kb:.1} KB (limit {limit_kb:.0} KB, palette {}, posterize {:?})",
            path.display(),
            outcome.palette_size,
            outcome.posterize_bits
        );
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!(
        "Could not fit under {limit_kb:.0} KB; smallest result is {size_kb:.1} KB ({} bytes over)",
        outcome.shortfall_bytes()
    );
    if let Some(smallest) = attempts.snapshot().await.smallest_attempt() {
        info!(
            "Smallest attempt: palette {} posterize {:?} ({:?}) at {} bytes",
            smallest.palette_size, smallest.posterize_bits, smallest.stage, smallest.size_bytes
        );
    }
    if args.keep_oversize {
        let path = write_output(&output_path(&args, &config, &library), &outcome.bytes)?;
        eprintln!("Oversize artifact kept at {}", path.display());
    }
    Ok(ExitCode::FAILURE)
}

fn config_path(args: &Args) -> PathBuf {
    args.config
        .clone()
        .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn load_config(path: &Path) -> ApngFitConfig {
    if !path.exists() {
        return ApngFitConfig::default();
    }
    match ApngFitConfig::from_file(path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                ApngFitConfig::default()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            ApngFitConfig::default()
        }
    }
}

/// An explicit file path, or a suggested name inside the output directory.
fn output_path(args: &Args, config: &ApngFitConfig, library: &FrameLibrary) -> PathBuf {
    let first_name = library.frames().next().map(|f| f.name.as_str());
    match &args.output {
        Some(path) if !path.is_dir() => path.clone(),
        Some(dir) => dir.join(suggest_filename(first_name)),
        None => Path::new(&config.ops.output_dir).join(suggest_filename(first_name)),
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| suggest_filename(None));
    Ok(write_artifact(dir, &name, bytes)?)
}

async fn report_progress(mut events: BoxStream<'static, PipelineEvent>) {
    while let Some(event) = events.next().await {
        match event.payload {
            EventPayload::Progress { percent, stage } => {
                info!("[gen {}] {percent:>3}% {stage:?}", event.generation)
            }
            EventPayload::Attempt(record) => info!(
                "[gen {}] palette {} posterize {:?}: {} bytes",
                event.generation, record.palette_size, record.posterize_bits, record.size_bytes
            ),
            EventPayload::Finished { .. } => break,
        }
    }
}
