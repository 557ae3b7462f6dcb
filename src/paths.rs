// ABOUTME: XDG Base Directory paths for cross-platform config and data storage
// ABOUTME: Provides standardized paths for logs, the Matrix state store, and configuration

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "unerror";
const APPLICATION: &str = "athenais";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Get the data directory path (e.g., ~/.local/share/athenais/)
/// Falls back to ./data if XDG directories unavailable
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// e.g., ~/.local/share/athenais/logs/
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Default directory for the Matrix state/crypto store and the sync database
pub fn store_dir() -> PathBuf {
    data_dir().join("store")
}

/// Get the config directory path (e.g., ~/.config/athenais/)
/// Falls back to current directory if XDG directories unavailable
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
