// src/infra/paths.rs — Path management
//
// All paths respect the TRADECOACH_HOME environment variable for isolation.
// When TRADECOACH_HOME is set, config and state live under that directory.
// When unset, everything lives under ~/.tradecoach/.

use std::path::PathBuf;

/// Returns the TRADECOACH_HOME override, if set.
fn tradecoach_home() -> Option<PathBuf> {
    std::env::var_os("TRADECOACH_HOME").map(PathBuf::from)
}

/// Configuration directory: $TRADECOACH_HOME/ or ~/.tradecoach/
pub fn config_dir() -> PathBuf {
    if let Some(home) = tradecoach_home() {
        return home;
    }
    dirs_home().join(".tradecoach")
}

/// Home directory. Falls back to the working directory when none can be determined.
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// State directory: ~/.tradecoach/state/
pub fn state_dir() -> PathBuf {
    config_dir().join("state")
}

/// Durable active-session id
pub fn active_session_path() -> PathBuf {
    state_dir().join("active-session")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), state_dir()] {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}
