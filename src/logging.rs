use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "placetmachine.log";

pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
    run_id: String,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Installs the global subscriber: JSON lines into rolling files under
/// `logging.dir` and a plain stderr layer at `logging.stderr_level`.
pub fn init_tracing(logging_config: &LoggingConfig) -> Result<LoggingGuard> {
    if logging_config.filter.trim().is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }
    if logging_config.dir.as_os_str().is_empty() {
        return Err(anyhow!("logging.dir cannot be empty"));
    }
    let stderr_level = parse_stderr_level(&logging_config.stderr_level)?;

    let mut purge = None;
    let mut worker_guard = None;
    let mut log_dir = None;
    let file_layer = if logging_config.file_enabled {
        let dir = logging_config.dir.clone();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create logging directory {}", dir.display()))?;

        // Expired files go before the appender opens today's file.
        let cutoff = retention_cutoff(SystemTime::now(), logging_config.retention_days);
        purge = Some(expired_log_files(&dir, cutoff).map(remove_log_files));

        let rotation = match logging_config.rotation {
            LoggingRotation::Daily => Rotation::DAILY,
            LoggingRotation::Hourly => Rotation::HOURLY,
        };
        let (non_blocking_writer, guard) =
            tracing_appender::non_blocking(RollingFileAppender::new(rotation, &dir, LOG_FILE_PREFIX));
        worker_guard = Some(guard);
        log_dir = Some(dir);

        Some(
            fmt::layer()
                .json()
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true)
                .with_ansi(false)
                .with_writer(non_blocking_writer)
                .with_filter(build_env_filter(&logging_config.filter)?),
        )
    } else {
        None
    };

    let stderr_layer = (stderr_level != LevelFilter::OFF).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(stderr_level)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = ?log_dir.as_ref().map(|dir| dir.display().to_string()),
        filter = %logging_config.filter,
        rotation = ?logging_config.rotation,
        retention_days = logging_config.retention_days,
        stderr_level = %stderr_level,
        "logging_initialized"
    );
    match purge {
        Some(Ok(failures)) => {
            for (path, err) in failures {
                tracing::warn!(
                    target: "logging",
                    path = %path.display(),
                    error = %err,
                    "expired_log_not_removed"
                );
            }
        }
        Some(Err(err)) => {
            tracing::warn!(target: "logging", error = %err, "log_retention_scan_failed");
        }
        None => {}
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
    })
}

fn parse_stderr_level(level: &str) -> Result<LevelFilter> {
    level
        .parse::<LevelFilter>()
        .map_err(|_| anyhow!("invalid logging.stderr_level '{level}'"))
}

fn build_env_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter)
        .with_context(|| format!("failed to parse logging.filter '{}'", filter))
}

fn retention_cutoff(now: SystemTime, retention_days: usize) -> SystemTime {
    let max_age = Duration::from_secs((retention_days as u64).saturating_mul(24 * 60 * 60));
    now.checked_sub(max_age).unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Our log files in `dir` last written at or before `cutoff`.
fn expired_log_files(dir: &Path, cutoff: SystemTime) -> io::Result<Vec<PathBuf>> {
    let mut expired = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with(LOG_FILE_PREFIX) {
            continue;
        }
        let metadata = entry.metadata()?;
        if metadata.is_file() && metadata.modified()? <= cutoff {
            expired.push(entry.path());
        }
    }
    Ok(expired)
}

fn remove_log_files(paths: Vec<PathBuf>) -> Vec<(PathBuf, io::Error)> {
    paths
        .into_iter()
        .filter_map(|path| fs::remove_file(&path).err().map(|err| (path, err)))
        .collect()
}
