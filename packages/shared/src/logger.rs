//! Logging setup utilities for the lobbychat server.

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Library crates whose log output follows the default level.
const WORKSPACE_CRATES: [&str; 2] = ["lobbychat_server", "lobbychat_shared"];

/// Build the fallback filter directive used when `RUST_LOG` is not set.
///
/// Binary names are normalised the same way cargo normalises crate names
/// (`-` becomes `_`), since that is the tracing target of the binary.
pub fn default_directive(binary_name: &str, default_log_level: &str) -> String {
    let binary_target = binary_name.replace('-', "_");
    let mut targets: Vec<&str> = WORKSPACE_CRATES.to_vec();
    if !targets.contains(&binary_target.as_str()) {
        targets.push(&binary_target);
    }
    targets
        .iter()
        .map(|target| format!("{}={}", target, default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOutput {
    /// Append plain-text logs to this file, creating its directory if needed.
    pub file: Option<PathBuf>,
    /// Also write logs to stdout.
    pub stdout: bool,
}

impl Default for LogOutput {
    fn default() -> Self {
        Self {
            file: None,
            stdout: true,
        }
    }
}

/// Open `path` for appending, creating the file and its parent directory.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Initialize the tracing subscriber with the specified default log level.
///
/// The log level can be overridden using the `RUST_LOG` environment variable.
/// The returned guard flushes the log file when dropped, so keep it alive
/// for the lifetime of the program.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "lobbychat-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
/// * `output` - Log file and stdout switches
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
///
/// # Examples
///
/// ```no_run
/// use lobbychat_shared::logger::{LogOutput, setup_logger};
///
/// let _guard = setup_logger("lobbychat-server", "info", &LogOutput::default()).unwrap();
/// ```
pub fn setup_logger(
    binary_name: &str,
    default_log_level: &str,
    output: &LogOutput,
) -> io::Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &output.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };
    let stdout_layer = output.stdout.then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive(binary_name, default_log_level).into()),
        )
        .with(file_layer)
        .with(stdout_layer)
        .init();
    Ok(guard)
}
