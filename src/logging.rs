//! Logging configuration for querygate.
//!
//! One-shot commands log to stderr. Interactive chat logs to a file so log
//! lines do not interleave with the conversation on the terminal.

use std::fs::{self, File};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initializes logging for interactive chat.
///
/// Location: `~/.local/state/querygate/querygate.log` on Linux (XDG state
/// directory), or the platform-appropriate state/config directory elsewhere.
/// Returns the log path, or None if the file could not be created.
pub fn init_file_logging() -> Option<PathBuf> {
    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Could not create log directory: {e}");
            return None;
        }
    }

    // Truncated on each run to avoid unbounded growth.
    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file: {e}");
            return None;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Some(log_path)
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .init();
}

/// Returns the path for the log file.
pub fn get_log_path() -> PathBuf {
    if let Some(state_dir) = dirs::state_dir() {
        return state_dir.join("querygate").join("querygate.log");
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("querygate").join("querygate.log");
    }

    std::env::temp_dir().join("querygate.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_ends_with_querygate_log() {
        let path = get_log_path();
        assert!(path.ends_with("querygate.log"));
    }
}
