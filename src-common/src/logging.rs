//! Platform-specific logging directory resolution.

use std::path::PathBuf;

/// Returns the platform-appropriate directory for log files.
///
/// | Platform | Directory |
/// |----------|-----------|
/// | Linux | `$XDG_STATE_HOME/skusho/logs` or `~/.local/state/skusho/logs` |
/// | macOS | `~/Library/Logs/skusho` |
/// | Windows | `%LOCALAPPDATA%\skusho\skusho\logs` |
///
/// Falls back to `./logs` when no home directory can be resolved.
pub fn log_dir() -> PathBuf {
    let Some(base) = directories::ProjectDirs::from("", "", "skusho") else {
        return PathBuf::from("logs");
    };

    #[cfg(target_os = "linux")]
    {
        base.state_dir()
            .unwrap_or_else(|| base.data_local_dir())
            .join("logs")
    }

    #[cfg(target_os = "macos")]
    {
        // data_local_dir is ~/Library/Application Support/skusho; walk up to ~/Library.
        let library = base
            .data_local_dir()
            .parent()
            .and_then(|p| p.parent())
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| base.data_local_dir().to_path_buf());
        library.join("Logs").join("skusho")
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        base.data_local_dir().join("logs")
    }
}

/// Ensures the log directory exists, creating it if necessary.
pub fn ensure_log_dir() -> Result<PathBuf, std::io::Error> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// File name prefix for the service's rolling log
/// (the appender produces `skusho-service.log.2026-10-16` style files).
pub const SERVICE_LOG_PREFIX: &str = "skusho-service.log";
