//! Logging setup for the `rowset` binary.
//!
//! Standard output carries the rendered tables or JSON, so log lines must
//! never land there. They go to stderr by default, or to a log file under the
//! platform state directory when `--log-file` is given.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

impl LogTarget {
    /// Picks the target for the `--log-file` flag.
    pub fn from_flag(log_file: bool) -> Self {
        if log_file {
            Self::File(get_log_path())
        } else {
            Self::Stderr
        }
    }
}

impl std::fmt::Display for LogTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stderr => f.write_str("stderr"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Creates (truncating) the log file and its parent directories.
fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

/// Installs the global subscriber and returns the target actually in use.
///
/// A log file that cannot be created falls back to stderr with a warning.
pub fn init(target: LogTarget) -> LogTarget {
    let target = match target {
        LogTarget::File(path) => match open_log_file(&path) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter())
                    .with_writer(file)
                    .with_ansi(false)
                    .init();
                return LogTarget::File(path);
            }
            Err(e) => {
                eprintln!("Warning: Could not create log file {}: {e}", path.display());
                LogTarget::Stderr
            }
        },
        LogTarget::Stderr => LogTarget::Stderr,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .init();
    target
}

/// Returns the path for the log file.
///
/// `~/.local/state/db-rowset/rowset.log` on Linux, the config directory where
/// no state directory exists, and the temp directory as a last resort.
pub fn get_log_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::config_dir)
        .map(|dir| dir.join("db-rowset").join("rowset.log"))
        .unwrap_or_else(|| std::env::temp_dir().join("rowset.log"))
}
