use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::document::PageFormat;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    /// SQLite file. Defaults to `~/.contractflow/data/contractflow.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Where uploads are resolved and merged contracts are written.
    pub artifacts_directory: String,
    #[serde(default)]
    pub renderer: RendererConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn database_path(&self) -> Option<PathBuf> {
        match &self.database_path {
            Some(path) => Some(PathBuf::from(path)),
            None => crate::db::default_database_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RendererKind {
    Chromium,
    #[default]
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererConfig {
    #[serde(default)]
    pub kind: RendererKind,
    /// Browser binary; required when `kind` is `chromium`.
    #[serde(default)]
    pub chromium_path: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub page_format: PageFormat,
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            kind: RendererKind::default(),
            chromium_path: None,
            timeout_secs: default_timeout_secs(),
            page_format: PageFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let config: Config = serde_json::from_str(
            r#"{ "version": "1.0", "artifacts_directory": "/srv/artifacts" }"#,
        )
        .unwrap();

        assert_eq!(config.renderer.kind, RendererKind::Text);
        assert_eq!(config.renderer.timeout_secs, 60);
        assert_eq!(config.renderer.page_format, PageFormat::A4);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_explicit_database_path() {
        let config: Config = serde_json::from_str(
            r#"{ "version": "1.0", "artifacts_directory": "a", "database_path": "/tmp/x.db" }"#,
        )
        .unwrap();
        assert_eq!(config.database_path(), Some(PathBuf::from("/tmp/x.db")));
    }
}
