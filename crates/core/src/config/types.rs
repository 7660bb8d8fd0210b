use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
///
/// The catalog store and the job queue share one SQLite file.
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
    PathBuf::from("chapterwatch.db")
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    /// Maximum simultaneous reconciliation passes.
    #[serde(default = "default_reconcile_concurrency")]
    pub reconcile_concurrency: usize,

    /// How often the pool promotes due triggers and claims jobs (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Attempts per job before it is marked failed.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential retry backoff (milliseconds).
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,

    /// How long `stop()` waits for in-flight jobs to drain (milliseconds).
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_ms: u64,
}

fn default_reconcile_concurrency() -> usize {
    5
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    5000
}

fn default_shutdown_grace() -> u64 {
    10_000
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            reconcile_concurrency: default_reconcile_concurrency(),
            poll_interval_ms: default_poll_interval(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            shutdown_grace_ms: default_shutdown_grace(),
        }
    }
}

/// Filesystem scanner configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScannerConfig {
    /// File extensions (lowercase, without dot) recognised as chapter archives.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    ["cbz", "cbr", "zip", "pdf", "epub"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

/// Remote chapter index service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Base URL (e.g., "http://localhost:7000")
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Scheduling behaviour at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Re-run `schedule` for every catalog title when the daemon boots.
    #[serde(default = "default_resync")]
    pub resync_on_startup: bool,
}

fn default_resync() -> bool {
    true
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            resync_on_startup: default_resync(),
        }
    }
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub workers: WorkersConfig,
    pub scanner: ScannerConfig,
    pub source_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,
    pub schedule: ScheduleConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            database: config.database.clone(),
            workers: config.workers.clone(),
            scanner: config.scanner.clone(),
            source_configured: config.source.is_some(),
            source: config.source.clone(),
            schedule: config.schedule.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_default_server() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
    }

    #[test]
    fn test_deserialize_with_default_database() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.database.path.to_str().unwrap(), "chapterwatch.db");
    }

    #[test]
    fn test_deserialize_with_custom_database_path() {
        let toml = r#"
[database]
path = "/data/archive.sqlite"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.database.path.to_str().unwrap(),
            "/data/archive.sqlite"
        );
    }

    #[test]
    fn test_workers_defaults() {
        let workers = WorkersConfig::default();
        assert_eq!(workers.reconcile_concurrency, 5);
        assert_eq!(workers.poll_interval_ms, 1000);
        assert_eq!(workers.max_attempts, 3);
        assert_eq!(workers.backoff_base_ms, 5000);
    }

    #[test]
    fn test_deserialize_partial_workers() {
        let toml = r#"
[workers]
max_attempts = 7
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.workers.max_attempts, 7);
        assert_eq!(config.workers.reconcile_concurrency, 5);
    }

    #[test]
    fn test_deserialize_source_with_default_timeout() {
        let toml = r#"
[source]
url = "http://localhost:7000"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let source = config.source.unwrap();
        assert_eq!(source.url, "http://localhost:7000");
        assert_eq!(source.timeout_secs, 30);
    }

    #[test]
    fn test_scanner_extensions_default() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.scanner.extensions.contains(&"cbz".to_string()));
        assert!(config.schedule.resync_on_startup);
    }

    #[test]
    fn test_sanitized_config() {
        let config = Config::default();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.server.port, 8080);
        assert!(!sanitized.source_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("\"source\":"));
    }
}
