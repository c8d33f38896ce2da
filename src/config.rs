// Server configuration
//
// TOML file, every key optional:
//
//   bind = "127.0.0.1"
//   ports = [8765, 8766]
//   rar_binary = "/usr/bin/rar"
//   color = true
//
// Looked up at --config if given, else <config_dir>/archd/config.toml.

use crate::archive::DEFAULT_RAR_BINARY;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORTS: [u16; 5] = [8765, 8766, 8767, 8768, 8769];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Host to bind
    pub bind: String,
    /// Port preference list; the first free one is used
    pub ports: Vec<u16>,
    /// Native RAR tool
    pub rar_binary: PathBuf,
    /// Emit ANSI colors in responses
    pub color: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            ports: DEFAULT_PORTS.to_vec(),
            rar_binary: PathBuf::from(DEFAULT_RAR_BINARY),
            color: true,
        }
    }
}

impl ServerConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("archd").join("config.toml"))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("In {}", path.display()))
    }

    /// Explicit path must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_gives_defaults() {
        assert_eq!(ServerConfig::from_toml("").unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = ServerConfig::from_toml(
            r#"
            ports = [9000, 9001]
            rar_binary = "/opt/rar/rar"
            "#,
        )
        .unwrap();

        assert_eq!(config.ports, vec![9000, 9001]);
        assert_eq!(config.rar_binary, PathBuf::from("/opt/rar/rar"));
        assert_eq!(config.bind, "127.0.0.1");
        assert!(config.color);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ServerConfig::from_toml("prots = [1]").is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(ServerConfig::load(Some(&temp.path().join("none.toml"))).is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("archd.toml");
        fs::write(&path, "bind = \"0.0.0.0\"\ncolor = false\n").unwrap();

        let config = ServerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.bind, "0.0.0.0");
        assert!(!config.color);
    }
}
