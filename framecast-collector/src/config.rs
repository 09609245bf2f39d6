//! Configuration for the collector.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// HTTP ingest settings.
    pub server: ServerConfig,
    /// Frame persistence.
    pub storage: StorageConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// What a POST body contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// A length-prefixed batch of frames.
    Batch,
    /// One bare frame.
    Single,
}

/// HTTP ingest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Route frames are POSTed to.
    pub path: String,
    pub payload: PayloadKind,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    pub tls: TlsConfig,
}

/// TLS termination for the ingest listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Serve HTTPS. Off means plaintext HTTP.
    pub enabled: bool,
    /// PEM certificate chain.
    pub cert: PathBuf,
    /// PEM private key.
    pub key: PathBuf,
}

/// Frame persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
    /// Frames buffered ahead of the writer before the oldest are dropped.
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8443,
            path: "/".into(),
            payload: PayloadKind::Batch,
            max_body_bytes: 256 * 1024 * 1024,
            tls: TlsConfig::default(),
        }
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cert: PathBuf::from("cert.pem"),
            key: PathBuf::from("key.pem"),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("frames"),
            queue_capacity: 10_000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

/// How [`CollectorConfig::load`] arrived at its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded,
    /// No file; defaults used.
    Missing,
    /// The file did not parse; defaults used.
    Invalid(String),
}

impl LoadStatus {
    /// Report the fallback, if any. Call once tracing is installed.
    pub fn log(&self, path: &Path) {
        match self {
            Self::Loaded => tracing::info!("config loaded from {}", path.display()),
            Self::Missing => tracing::info!("no config at {}; using defaults", path.display()),
            Self::Invalid(e) => {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display())
            }
        }
    }
}

impl CollectorConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Logs nothing itself: the returned [`LoadStatus`] is logged by the
    /// caller after the subscriber is installed.
    pub fn load(path: &Path) -> (Self, LoadStatus) {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => (config, LoadStatus::Loaded),
                Err(e) => (Self::default(), LoadStatus::Invalid(e.to_string())),
            },
            Err(_) => (Self::default(), LoadStatus::Missing),
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&CollectorConfig::default()).unwrap();
        assert!(text.contains("queue_capacity"));
        let parsed: CollectorConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.server.port, 8443);
        assert_eq!(parsed.storage.queue_capacity, 10_000);
        assert_eq!(parsed.server.payload, PayloadKind::Batch);
        assert!(parsed.server.tls.enabled);
        assert_eq!(parsed.server.tls.cert, PathBuf::from("cert.pem"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let parsed: CollectorConfig = toml::from_str(
            r#"
            [server]
            payload = "single"
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(parsed.server.payload, PayloadKind::Single);
        assert_eq!(parsed.server.port, 9000);
        assert_eq!(parsed.server.path, "/");
        assert_eq!(parsed.storage.output_dir, PathBuf::from("frames"));
    }

    #[test]
    fn invalid_file_reports_the_parse_error() {
        let path = std::env::temp_dir()
            .join(format!("framecast-collector-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[storage\nqueue_capacity = 5\n").unwrap();

        let (cfg, status) = CollectorConfig::load(&path);
        assert!(matches!(status, LoadStatus::Invalid(_)));
        assert_eq!(cfg.storage.queue_capacity, 10_000);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let (cfg, status) = CollectorConfig::load(Path::new("/nonexistent/framecast-collector.toml"));
        assert_eq!(status, LoadStatus::Missing);
        assert_eq!(cfg.server.port, 8443);
    }
}
