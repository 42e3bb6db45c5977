use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::monitor::MonitorConfig;
use crate::swarm::lsd::LSD_PORT;

/// Root configuration. Every section has defaults, so an empty file is valid.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub outcome_log: OutcomeLogConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub lsd: LsdConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("dht_metadata.db")
}

/// Append-only outcome log configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutcomeLogConfig {
    #[serde(default = "default_outcome_log_path")]
    pub path: PathBuf,
    /// Entries buffered between resolvers and the writer task.
    #[serde(default = "default_outcome_buffer")]
    pub buffer_size: usize,
}

impl Default for OutcomeLogConfig {
    fn default() -> Self {
        Self {
            path: default_outcome_log_path(),
            buffer_size: default_outcome_buffer(),
        }
    }
}

fn default_outcome_log_path() -> PathBuf {
    PathBuf::from("dht_metadata_log.txt")
}

fn default_outcome_buffer() -> usize {
    1000
}

/// Embedded librqbit session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// TCP listen port for peer connections.
    #[serde(default = "default_listen_port")]
    pub listen_port: Option<u16>,
    #[serde(default = "default_true")]
    pub enable_dht: bool,
    /// Throwaway directory librqbit may use; content is never written here.
    #[serde(default = "default_scratch_path")]
    pub scratch_path: String,
    /// How often DHT statistics are sampled (milliseconds).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            enable_dht: true,
            scratch_path: default_scratch_path(),
            stats_interval_ms: default_stats_interval(),
        }
    }
}

fn default_listen_port() -> Option<u16> {
    Some(6881)
}

fn default_true() -> bool {
    true
}

fn default_scratch_path() -> String {
    "./torrent_data".to_string()
}

fn default_stats_interval() -> u64 {
    60_000
}

/// Passive Local Service Discovery listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LsdConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_lsd_bind")]
    pub bind: SocketAddr,
}

impl Default for LsdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_lsd_bind(),
        }
    }
}

fn default_lsd_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], LSD_PORT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "dht_metadata.db");
        assert_eq!(
            config.outcome_log.path.to_str().unwrap(),
            "dht_metadata_log.txt"
        );
        assert_eq!(config.outcome_log.buffer_size, 1000);
        assert_eq!(config.session.listen_port, Some(6881));
        assert!(config.session.enable_dht);
        assert!(config.lsd.enabled);
        assert_eq!(config.lsd.bind.port(), 6771);
        assert_eq!(config.monitor.metadata_timeout_ms, 60_000);
    }

    #[test]
    fn test_deserialize_custom_sections() {
        let toml = r#"
[database]
path = "/data/records.sqlite"

[session]
listen_port = 7000
enable_dht = false
scratch_path = "/tmp/scratch"

[lsd]
enabled = false
bind = "127.0.0.1:6771"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.database.path.to_str().unwrap(),
            "/data/records.sqlite"
        );
        assert_eq!(config.session.listen_port, Some(7000));
        assert!(!config.session.enable_dht);
        assert_eq!(config.session.scratch_path, "/tmp/scratch");
        assert_eq!(config.session.stats_interval_ms, 60_000); // default
        assert!(!config.lsd.enabled);
        assert_eq!(config.lsd.bind.to_string(), "127.0.0.1:6771");
    }

    #[test]
    fn test_deserialize_invalid_bind_fails() {
        let toml = r#"
[lsd]
bind = "not an address"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
