use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub outline: OutlineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            format: LogFormat::default(),
        }
    }
}

fn default_filter() -> String {
    "warn".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OutlineConfig {
    /// Rank given to the first child of an empty context.
    #[serde(default)]
    pub base_rank: f64,
}

impl Config {
    /// Defaults for when no config file is available.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/outline.sqlite"),
            },
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
            outline: OutlineConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.db.path.as_os_str().is_empty() {
        anyhow::bail!("db.path must not be empty");
    }

    if !config.outline.base_rank.is_finite() {
        anyhow::bail!("outline.base_rank must be a finite number");
    }

    if config.logging.filter.trim().is_empty() {
        anyhow::bail!("logging.filter must not be empty");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("olh.toml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_defaults_applied() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[db]\npath = \"./data/o.sqlite\"\n");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.sync.max_retries, 3);
        assert_eq!(cfg.sync.retry_backoff_ms, 50);
        assert_eq!(cfg.logging.filter, "warn");
        assert_eq!(cfg.logging.format, LogFormat::Compact);
        assert_eq!(cfg.outline.base_rank, 0.0);
    }

    #[test]
    fn test_full_config() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"
[db]
path = "/tmp/o.sqlite"

[sync]
max_retries = 0
retry_backoff_ms = 5

[logging]
filter = "outline_harness=debug"
format = "json"

[outline]
base_rank = -10
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.sync.max_retries, 0);
        assert_eq!(cfg.logging.format, LogFormat::Json);
        assert_eq!(cfg.outline.base_rank, -10.0);
    }

    #[test]
    fn test_unknown_format_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "[db]\npath = \"o.sqlite\"\n[logging]\nformat = \"tree\"\n",
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_empty_db_path_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "[db]\npath = \"\"\n");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("db.path"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(load_config(&dir.path().join("nope.toml")).is_err());
    }
}
