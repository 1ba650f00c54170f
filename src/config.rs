//! On-disk configuration for the daemon, loaded from a TOML file and layered
//! under CLI overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "ha-replicator.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Network address of the active (master) node.
    pub master_addr: String,
    /// Network address of the standby (slave) node.
    pub slave_addr: String,

    /// Seconds between health checks of each node.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Minutes per replay chunk during range replication.
    #[serde(default = "default_chunk_minutes")]
    pub chunk_minutes: i64,

    /// Hours of history a single recovery replay may ever span, regardless of
    /// how long the slave was down.
    #[serde(default = "default_max_retention_hours")]
    pub max_retention_hours: i64,

    /// Optional regex restricting which databases are discovered/replicated.
    #[serde(default)]
    pub db_filter: Option<String>,

    /// Address the status HTTP surface binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

fn default_check_interval_secs() -> u64 {
    10
}

fn default_chunk_minutes() -> i64 {
    15
}

fn default_max_retention_hours() -> i64 {
    24
}

fn default_listen_addr() -> String {
    "0.0.0.0:8086".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        load_config_from_path(CONFIG_FILENAME)
    }

    pub fn save(&self) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(CONFIG_FILENAME, content)?;
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn chunk_duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.chunk_minutes)
    }

    pub fn max_retention_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_retention_hours)
    }
}

pub fn load_config_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
    let config: Config = toml::from_str(&content).with_context(|| format!("failed to parse {}", path.as_ref().display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let toml = r#"
master_addr = "master.internal:8086"
slave_addr = "slave.internal:8086"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.check_interval_secs, 10);
        assert_eq!(config.chunk_minutes, 15);
        assert_eq!(config.max_retention_hours, 24);
        assert_eq!(config.listen_addr, "0.0.0.0:8086");
        assert_eq!(config.db_filter, None);
    }

    #[test]
    fn parses_full_config() {
        let toml = r#"
master_addr = "master.internal:8086"
slave_addr = "slave.internal:8086"
check_interval_secs = 5
chunk_minutes = 30
max_retention_hours = 48
db_filter = "^telegraf"
listen_addr = "127.0.0.1:9090"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.check_interval_secs, 5);
        assert_eq!(config.db_filter.as_deref(), Some("^telegraf"));
    }

    #[test]
    fn load_config_not_found() {
        let result = load_config_from_path("/nonexistent/ha-replicator.toml");
        assert!(result.is_err());
    }

    #[test]
    fn loads_config_from_a_real_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "master_addr = \"master:8086\"\nslave_addr = \"slave:8086\"\n").unwrap();

        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.master_addr, "master:8086");
        assert_eq!(config.check_interval_secs, 10);
    }
}
