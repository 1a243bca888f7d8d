//! Operational helpers: logging, attempt telemetry, artifact output.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use apngfit_types::{
    config::OpsConfig,
    telemetry::{AttemptRecord, EncodeTelemetry},
    ApngFitError, Result,
};
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_STEM: &str = "animation";
const DEFAULT_LOG_LEVEL: &str = "info";
const MAX_STEM_CHARS: usize = 50;

/// `log_level` as a filter; an unparsable level falls back to `info`.
fn log_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|err| {
        eprintln!("Ignoring log level '{log_level}': {err}");
        EnvFilter::new(DEFAULT_LOG_LEVEL)
    })
}

/// Install the global subscriber. A second call is reported as an `Ops` error.
pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    fmt()
        .with_env_filter(log_filter(&config.log_level))
        .with_target(false)
        .try_init()
        .map_err(|err| ops_error(format!("tracing already initialised: {err}")))
}

/// In-memory record of encoder attempts, reset per generation.
#[derive(Clone, Default)]
pub struct AttemptLog {
    inner: Arc<Mutex<EncodeTelemetry>>,
}

impl AttemptLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(&self, generation: u64) {
        let mut guard = self.inner.lock().await;
        *guard = EncodeTelemetry {
            generation,
            ..Default::default()
        };
    }

    pub async fn record(&self, generation: u64, attempt: AttemptRecord) {
        let mut guard = self.inner.lock().await;
        if guard.generation == generation {
            guard.attempts.push(attempt);
        }
    }

    pub async fn note(&self, generation: u64, note: impl Into<String>) {
        let mut guard = self.inner.lock().await;
        if guard.generation == generation {
            guard.notes.push(note.into());
        }
    }

    pub async fn snapshot(&self) -> EncodeTelemetry {
        self.inner.lock().await.clone()
    }

    pub async fn write_report(&self, path: impl AsRef<Path>) -> Result<()> {
        let snapshot = self.snapshot().await;
        let doc = serde_json::to_string_pretty(&snapshot)
            .map_err(|err| ops_error(format!("failed to serialize attempt log: {err}")))?;
        fs::write(path.as_ref(), doc).map_err(|err| {
            ops_error(format!(
                "failed to write attempt log {}: {err}",
                path.as_ref().display()
            ))
        })
    }
}

pub fn ensure_output_dir(path: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = path.as_ref().to_path_buf();
    fs::create_dir_all(&dir)
        .map_err(|err| ops_error(format!("failed to create output dir: {err}")))?;
    Ok(dir)
}

/// Write the artifact into `dir`, creating it if needed, and return the full path.
pub fn write_artifact(dir: impl AsRef<Path>, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let dir = ensure_output_dir(dir)?;
    let path = dir.join(file_name);
    fs::write(&path, bytes)
        .map_err(|err| ops_error(format!("failed to write {}: {err}", path.display())))?;
    info!("Artifact written to {:?} ({} bytes)", path, bytes.len());
    Ok(path)
}

/// Output name from the first frame's file name: stem, at most 50 chars, `.png`.
pub fn suggest_filename(first_frame_name: Option<&str>) -> String {
    let stem = first_frame_name
        .and_then(|name| {
            let (stem, _) = name.rsplit_once('.')?;
            Some(stem)
        })
        .filter(|stem| !stem.is_empty())
        .unwrap_or(DEFAULT_STEM);
    let stem: String = stem.chars().take(MAX_STEM_CHARS).collect();
    format!("{stem}.png")
}

pub fn ops_error(message: impl Into<String>) -> ApngFitError {
    ApngFitError::Ops(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use apngfit_types::telemetry::SearchStage;

    fn attempt(size_bytes: usize) -> AttemptRecord {
        AttemptRecord {
            stage: SearchStage::TierLadder,
            palette_size: 256,
            posterize_bits: None,
            size_bytes,
            within_budget: false,
            elapsed_ms: 1,
            recorded_at: Default::default(),
        }
    }

    #[test]
    fn tracing_installs_once() {
        let config = OpsConfig {
            log_level: "debug".into(),
            ..OpsConfig::default()
        };
        assert!(log_filter(&config.log_level).to_string().contains("debug"));
        let _ = init_tracing(&config);
        assert!(matches!(init_tracing(&config), Err(ApngFitError::Ops(_))));
    }

    #[test]
    fn filename_uses_first_stem() {
        assert_eq!(suggest_filename(Some("holiday.photo.jpg")), "holiday.photo.png");
        assert_eq!(suggest_filename(Some("noext")), "animation.png");
        assert_eq!(suggest_filename(Some(".png")), "animation.png");
        assert_eq!(suggest_filename(None), "animation.png");
        let long = format!("{}.webp", "x".repeat(80));
        assert_eq!(suggest_filename(Some(&long)), format!("{}.png", "x".repeat(50)));
    }

    #[tokio::test]
    async fn log_ignores_stale_generations() {
        let log = AttemptLog::new();
        log.begin(2).await;
        log.record(1, attempt(10)).await;
        log.record(2, attempt(20)).await;
        log.note(2, "fallback used").await;
        let snapshot = log.snapshot().await;
        assert_eq!(snapshot.attempts.len(), 1);
        assert_eq!(snapshot.attempts[0].size_bytes, 20);
        assert_eq!(snapshot.notes, vec!["fallback used".to_string()]);
    }

    #[tokio::test]
    async fn writes_artifact_and_report() {
        let dir = std::env::temp_dir().join("apngfit-ops-test");
        let path = write_artifact(&dir, "out.png", &[1, 2, 3]).expect("write artifact");
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);

        let log = AttemptLog::new();
        log.begin(1).await;
        log.record(1, attempt(99)).await;
        let report = dir.join("report.json");
        log.write_report(&report).await.expect("write report");
        let text = fs::read_to_string(&report).unwrap();
        assert!(text.contains("\"size_bytes\": 99"));
        fs::remove_dir_all(&dir).expect("cleanup");
    }
}
