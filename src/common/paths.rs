//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/rule-bench/`
//! - macOS: `~/Library/Application Support/rule-bench/`
//! - Windows: `%APPDATA%\rule-bench\`

use std::path::PathBuf;

/// Directory name under the platform config root
const APP_NAME: &str = "rule-bench";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml_under_config_dir() {
        if let (Some(dir), Some(path)) = (config_dir(), config_path()) {
            assert!(path.starts_with(&dir));
            assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("config.toml"));
        }
    }
}
