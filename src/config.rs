//! Configuration module for clouddrive.

use serde::Deserialize;
use std::path::Path;

use crate::file::NamingPolicy;
use crate::{DriveError, Result};

/// Bytes per megabyte (MiB) used for size limits and display.
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Metadata database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Name of the collection (table) holding file records.
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_db_path() -> String {
    "data/clouddrive.db".to_string()
}

fn default_collection() -> String {
    "files".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            collection: default_collection(),
        }
    }
}

/// Which blob store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files on the local filesystem, served by this process.
    Local,
    /// A remote HTTP object store.
    Http,
}

/// Blob storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend kind.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    /// Root directory for the local backend.
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Base URL under which blobs are publicly reachable.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Object store endpoint for the HTTP backend.
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name for the HTTP backend.
    #[serde(default)]
    pub bucket: String,
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_storage_path() -> String {
    "data/blobs".to_string()
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
            public_base_url: default_public_base_url(),
            endpoint: String::new(),
            bucket: String::new(),
        }
    }
}

/// Upload policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size_mb: u64,
    /// How stored names are derived.
    #[serde(default)]
    pub naming: NamingPolicy,
}

fn default_max_upload_size() -> u64 {
    10
}

impl FilesConfig {
    /// Maximum upload size in bytes, saturating at `u64::MAX`.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            max_upload_size_mb: default_max_upload_size(),
            naming: NamingPolicy::default(),
        }
    }
}

/// Intent journal configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    /// Whether upload and delete intents are journaled.
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    /// Directory holding pending intents.
    #[serde(default = "default_journal_path")]
    pub path: String,
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_path() -> String {
    "data/journal".to_string()
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_journal_enabled(),
            path: default_journal_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/clouddrive.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Upload policy configuration.
    #[serde(default)]
    pub files: FilesConfig,
    /// Intent journal configuration.
    #[serde(default)]
    pub journal: JournalConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(DriveError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| DriveError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CLOUDDRIVE_DATABASE_PATH`
    /// - `CLOUDDRIVE_STORAGE_ENDPOINT`
    /// - `CLOUDDRIVE_STORAGE_BUCKET`
    /// - `CLOUDDRIVE_PUBLIC_BASE_URL`
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 4] = [
            ("CLOUDDRIVE_DATABASE_PATH", &mut self.database.path),
            ("CLOUDDRIVE_STORAGE_ENDPOINT", &mut self.storage.endpoint),
            ("CLOUDDRIVE_STORAGE_BUCKET", &mut self.storage.bucket),
            ("CLOUDDRIVE_PUBLIC_BASE_URL", &mut self.storage.public_base_url),
        ];

        for (var, target) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *target = value;
                }
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the upload limit is zero or does not fit in bytes
    /// - the collection name is not a plain identifier
    /// - the HTTP backend is selected without endpoint or bucket
    /// - the public base URL does not parse
    pub fn validate(&self) -> Result<()> {
        if self.files.max_upload_size_mb == 0 {
            return Err(DriveError::Config(
                "files.max_upload_size_mb must be greater than zero".to_string(),
            ));
        }

        if self.files.max_upload_size_mb > u64::MAX / BYTES_PER_MB {
            return Err(DriveError::Config(format!(
                "files.max_upload_size_mb must be at most {}",
                u64::MAX / BYTES_PER_MB
            )));
        }

        if !is_identifier(&self.database.collection) {
            return Err(DriveError::Config(format!(
                "database.collection '{}' must match [A-Za-z_][A-Za-z0-9_]*",
                self.database.collection
            )));
        }

        if self.storage.backend == StorageBackend::Http
            && (self.storage.endpoint.is_empty() || self.storage.bucket.is_empty())
        {
            return Err(DriveError::Config(
                "storage.backend = \"http\" requires storage.endpoint and storage.bucket. \
                 Set them in config.toml or via CLOUDDRIVE_STORAGE_ENDPOINT / \
                 CLOUDDRIVE_STORAGE_BUCKET."
                    .to_string(),
            ));
        }

        url::Url::parse(&self.storage.public_base_url).map_err(|e| {
            DriveError::Config(format!(
                "storage.public_base_url '{}' is not a valid URL: {e}",
                self.storage.public_base_url
            ))
        })?;

        Ok(())
    }
}

/// Whether `s` is usable as an unquoted SQL identifier.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
