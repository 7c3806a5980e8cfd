use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use storyloom_editor::ScannerOptions;

pub const DEFAULT_CONFIG_NAME: &str = "storyloom.config.json";

/// Storyloom configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Story the local chapter files belong to
    #[serde(default = "default_story_id")]
    pub story_id: String,

    /// JSON array of associations
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,

    /// Directory of chapter files (one JSON array of blocks per chapter)
    #[serde(default = "default_chapters_dir")]
    pub chapters_dir: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_story_id() -> String {
    "local".to_string()
}

fn default_catalog_path() -> String {
    "catalog.json".to_string()
}

fn default_chapters_dir() -> String {
    "chapters".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4010
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerConfig {
    /// Unset scans each chapter until its decorations settle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_passes: Option<usize>,
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn get_catalog_path(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.catalog_path)
    }

    pub fn get_chapters_dir(&self, cwd: &str) -> PathBuf {
        PathBuf::from(cwd).join(&self.chapters_dir)
    }

    pub fn scanner_options(&self) -> ScannerOptions {
        ScannerOptions {
            max_passes: self.scanner.max_passes.map(|n| n.max(1)),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            story_id: default_story_id(),
            catalog_path: default_catalog_path(),
            chapters_dir: default_chapters_dir(),
            server: ServerConfig::default(),
            scanner: ScannerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "storyId": "the-long-night",
            "catalogPath": "data/associations.json",
            "chaptersDir": "book",
            "server": { "host": "0.0.0.0", "port": 8080 },
            "scanner": { "maxPasses": 4 },
            "logLevel": "debug"
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.story_id, "the-long-night");
        assert_eq!(config.catalog_path, "data/associations.json");
        assert_eq!(config.chapters_dir, "book");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.scanner_options().max_passes, Some(4));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{ "server": { "port": 9000 } }"#).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.chapters_dir, "chapters");
        assert_eq!(config.scanner_options(), ScannerOptions::default());
    }

    #[test]
    fn test_zero_passes_still_scans_once() {
        let config = Config {
            scanner: ScannerConfig { max_passes: Some(0) },
            ..Config::default()
        };
        assert_eq!(config.scanner_options().max_passes, Some(1));
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = std::env::temp_dir().join("storyloom-config-missing");
        let config = Config::load(&dir.display().to_string()).unwrap();
        assert_eq!(config, Config::default());
    }
}
