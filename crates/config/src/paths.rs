//! Path utilities

use std::path::PathBuf;

/// Data directory (~/.triage), or ./.triage when no home directory is known
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".triage"))
        .unwrap_or_else(|| PathBuf::from(".triage"))
}

/// Config file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}
