use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::Level;
use tracing_appender::non_blocking::{self, WorkerGuard};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LoggingConfig, ResolvedOutputs};

/// Name of the structured log written next to the summary table.
pub const TELEMETRY_FILE: &str = "telemetry.jsonl";

/// Keeps the non-blocking writer alive; `finish` flushes it.
pub struct LoggingGuard {
    guard: WorkerGuard,
    telemetry_path: PathBuf,
}

impl LoggingGuard {
    pub fn telemetry_path(&self) -> &Path {
        &self.telemetry_path
    }

    /// Drain queued lines into the telemetry file and hand back its path.
    /// Events emitted afterwards are discarded.
    pub fn finish(self) -> PathBuf {
        drop(self.guard);
        self.telemetry_path
    }
}

/// Directory that receives `telemetry.jsonl` and its summaries.
pub fn telemetry_dir(outputs: &ResolvedOutputs) -> PathBuf {
    outputs
        .summary_md
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn init_logging(
    logging: &LoggingConfig,
    outputs: &ResolvedOutputs,
) -> Result<Option<LoggingGuard>> {
    if !logging.enable_structured {
        return Ok(None);
    }

    let telemetry_dir = telemetry_dir(outputs);
    fs::create_dir_all(&telemetry_dir).with_context(|| {
        format!(
            "creating telemetry directory at {}",
            telemetry_dir.display()
        )
    })?;

    let telemetry_path = telemetry_dir.join(TELEMETRY_FILE);
    let file = File::create(&telemetry_path)
        .with_context(|| format!("creating telemetry file at {}", telemetry_path.display()))?;

    let (writer, guard) = non_blocking::NonBlockingBuilder::default()
        .lossy(false)
        .finish(file);

    let level = logging.level().unwrap_or(Level::INFO);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .json()
        .with_current_span(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(writer)
        .finish();

    // A global subscriber may already be installed, e.g. by another test.
    let _ = tracing::subscriber::set_global_default(subscriber);

    Ok(Some(LoggingGuard {
        guard,
        telemetry_path,
    }))
}
