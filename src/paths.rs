//! Path resolution for shopchat configuration and data directories.
//!
//! SHOPCHAT_HOME resolution order:
//! 1. SHOPCHAT_HOME environment variable (if set)
//! 2. ~/.config/shopchat (default)

use std::path::PathBuf;

/// Returns the shopchat home directory.
///
/// Checks SHOPCHAT_HOME env var first, falls back to ~/.config/shopchat
pub fn shopchat_home() -> PathBuf {
    if let Ok(home) = std::env::var("SHOPCHAT_HOME") {
        return PathBuf::from(home);
    }

    dirs::home_dir()
        .map(|h| h.join(".config").join("shopchat"))
        .expect("Could not determine home directory")
}

/// Returns the path to the config.toml file.
pub fn config_path() -> PathBuf {
    shopchat_home().join("config.toml")
}

/// Returns the directory backing the durable key-value store.
pub fn storage_dir() -> PathBuf {
    shopchat_home().join("storage")
}
