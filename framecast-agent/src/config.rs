//! Configuration for the capture agent.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_core::{
    ControlConfig, DegeneratePolicy, DeliveryMode, EncoderMode, Endpoint, FileSink, FrameSink,
    FramecastError, HttpSender, PipelineConfig, SyntheticPattern, SyntheticSource, TrustMode,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Frame sampling.
    pub capture: CaptureConfig,
    /// Buffering and delivery mode.
    pub queue: QueueConfig,
    /// Payload encoding.
    pub encoder: EncoderConfig,
    /// Degenerate-frame filtering.
    pub filter: FilterConfig,
    /// Where payloads are sent.
    pub network: NetworkConfig,
    /// Inbound control channel.
    pub control: ControlSection,
    /// Built-in frame source.
    pub source: SourceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Frame sampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    /// Target captures per second.
    pub fps: u32,
    /// Mirror frames top-to-bottom before encoding.
    pub flip_vertical: bool,
    /// Request capture as soon as the agent starts.
    pub start_on_launch: bool,
}

/// How frames reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    Batch,
    Immediate,
}

/// Buffering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub delivery: DeliveryKind,
    /// Seconds of capture kept in memory; capacity is `fps × retention_seconds`.
    pub retention_seconds: u32,
    /// Frames per batch in batch mode.
    pub batch_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderKind {
    Raw,
    Jpeg,
    Zstd,
}

/// Payload encoding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub mode: EncoderKind,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
    pub zstd_level: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// `two_color` or `strict_uniform`.
    pub policy: DegeneratePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkKind {
    /// POST to the remote collector.
    Network,
    /// Write payloads to `output_dir`.
    File,
}

/// Delivery target configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub sink: SinkKind,
    /// `https` or `http`.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub path: String,
    /// `bypass` accepts self-signed collector certificates.
    pub trust: TrustMode,
    /// Per-send timeout in milliseconds. `0` keeps the client default.
    pub timeout_ms: u64,
    /// Target directory for the `file` sink.
    pub output_dir: PathBuf,
}

/// Control channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSection {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    pub path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Synthetic pattern: `gradient` or `solid`.
    pub pattern: SyntheticPattern,
    /// Simulate the user refusing capture.
    pub deny_permission: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            fps: 30,
            flip_vertical: false,
            start_on_launch: true,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            delivery: DeliveryKind::Batch,
            retention_seconds: 60,
            batch_size: 60,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            mode: EncoderKind::Jpeg,
            jpeg_quality: framecast_core::DEFAULT_JPEG_QUALITY,
            zstd_level: 3,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Network,
            scheme: "https".into(),
            host: "192.168.1.101".into(),
            port: 34545,
            path: "/".into(),
            trust: TrustMode::Bypass,
            timeout_ms: 0,
            output_dir: PathBuf::from("frames"),
        }
    }
}

impl Default for ControlSection {
    fn default() -> Self {
        let defaults = ControlConfig::default();
        Self {
            enabled: true,
            bind: defaults.bind,
            port: defaults.port,
            path: defaults.path,
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

/// How [`AgentConfig::load`] arrived at its result.
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

impl AgentConfig {
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

    /// Convert into a [`PipelineConfig`], clamping out-of-range values.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let delivery = match self.queue.delivery {
            DeliveryKind::Batch => DeliveryMode::Batch {
                batch_size: self.queue.batch_size.max(1),
            },
            DeliveryKind::Immediate => DeliveryMode::Immediate,
        };
        let encoder = match self.encoder.mode {
            EncoderKind::Raw => EncoderMode::Raw,
            EncoderKind::Jpeg => EncoderMode::Jpeg {
                quality: self.encoder.jpeg_quality.clamp(1, 100),
            },
            EncoderKind::Zstd => EncoderMode::Zstd {
                level: self.encoder.zstd_level,
            },
        };
        PipelineConfig {
            fps: self.capture.fps.clamp(1, 120),
            retention_seconds: self.queue.retention_seconds.max(1),
            delivery,
            policy: self.filter.policy,
            encoder,
            flip_vertical: self.capture.flip_vertical,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.network.scheme, &self.network.host, self.network.port)
            .with_path(&self.network.path)
    }

    pub fn send_timeout(&self) -> Option<Duration> {
        (self.network.timeout_ms > 0).then(|| Duration::from_millis(self.network.timeout_ms))
    }

    /// Build the configured payload sink.
    pub fn build_sink(&self) -> Result<Arc<dyn FrameSink>, FramecastError> {
        Ok(match self.network.sink {
            SinkKind::Network => Arc::new(HttpSender::new(
                &self.endpoint(),
                self.network.trust,
                self.send_timeout(),
            )?),
            SinkKind::File => Arc::new(
                FileSink::new(&self.network.output_dir)?
                    .with_batches(self.queue.delivery == DeliveryKind::Batch),
            ),
        })
    }

    /// Build the synthetic frame source at the configured resolution.
    pub fn build_source(&self) -> SyntheticSource {
        SyntheticSource::new(
            self.capture.width.max(1),
            self.capture.height.max(1),
            self.capture.fps.clamp(1, 120),
            self.source.pattern,
        )
        .with_permission_denied(self.source.deny_permission)
    }

    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            bind: self.control.bind.clone(),
            port: self.control.port,
            path: self.control.path.clone(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
