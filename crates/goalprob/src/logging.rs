use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FILE_NAME: &str = "goalprob.log";

/// Maximum log file size before rotation (5 MB)
const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;
/// Size to keep after rotation (1 MB of most recent logs)
const KEEP_SIZE: u64 = 1024 * 1024;

/// Where log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// `{data_dir}/goalprob.log`
    File,
}

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(level: &str) -> String {
    format!("goalprob={level},goalprob_core=warn")
}

/// Trim the log file to its last KEEP_SIZE bytes once it exceeds
/// MAX_LOG_SIZE. Returns whether the file was rotated.
pub fn rotate_log_if_needed(log_path: &Path) -> std::io::Result<bool> {
    let len = match fs::metadata(log_path) {
        Ok(metadata) => metadata.len(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if len <= MAX_LOG_SIZE {
        return Ok(false);
    }

    let mut file = File::open(log_path)?;
    file.seek(SeekFrom::Start(len.saturating_sub(KEEP_SIZE)))?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    drop(file);

    // Drop the partial first line
    let skip = buffer
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);

    let mut file = File::create(log_path)?;
    file.write_all(b"--- Log rotated (older entries removed) ---\n")?;
    file.write_all(&buffer[skip..])?;
    Ok(true)
}

/// Initialize the global subscriber.
///
/// The level can be overridden through `RUST_LOG`. File output goes through
/// a non-blocking `tracing-appender` writer; keep the returned guard alive
/// until exit so buffered lines are flushed.
pub fn init_logging(
    data_dir: &Path,
    level: &str,
    target: LogTarget,
) -> color_eyre::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let (file_layer, guard) = match target {
        LogTarget::File => {
            fs::create_dir_all(data_dir)?;
            let log_path = data_dir.join(LOG_FILE_NAME);
            if let Err(e) = rotate_log_if_needed(&log_path) {
                eprintln!("Warning: Failed to rotate log file: {e}");
            }
            let appender = tracing_appender::rolling::never(data_dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false);
            (Some(layer), Some(guard))
        }
        LogTarget::Stderr => (None, None),
    };

    let stderr_layer = (target == LogTarget::Stderr).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    tracing::info!(data_dir = %data_dir.display(), ?target, "goalprob logging initialized");
    Ok(guard)
}
