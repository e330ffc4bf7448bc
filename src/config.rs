//! Pipeline configuration
//!
//! Scaling strategies, protocol revision, pressure rule, verifier policy and
//! output location, loaded from TOML. Every section is optional.
//!
//! ```toml
//! [scaling.price]
//! strategy = "mean_percentage"
//!
//! [protocol]
//! layout = "split_flow"
//! encoding = "word16"
//! warmup_cycles = 256
//!
//! [verifier]
//! none_strictness = "zero_alerts"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::atomic_file::write_atomic;
use crate::checker::{GoldenFormat, VerifierConfig};
use crate::stimulus::assembler::DEFAULT_WARMUP_CYCLES;
use crate::stimulus::layout::DEFAULT_ORDER_QTY;
use crate::stimulus::{
    BarEncoder, LayoutRevision, PressureRule, Scaler, StimulusFileOptions, StreamAssembler,
    TextEncoding,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "NANOTRADE_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "nanotrade.toml";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Parse { path, reason } => {
                write!(f, "invalid config {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { .. } => None,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Price and volume scaling strategies
    #[serde(default)]
    pub scaling: Scaler,

    /// Wire protocol revision
    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub pressure: PressureConfig,

    /// Golden-vs-transcript policy
    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load from `NANOTRADE_CONFIG` or the default path, else defaults
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        Self::load(&path).unwrap_or_else(|e| {
            tracing::debug!("Using default pipeline config ({}): {}", path, e);
            Self::default()
        })
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        write_atomic(path, &contents).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn encoder(&self) -> BarEncoder {
        BarEncoder::new(self.protocol.layout, self.protocol.order_qty)
    }

    pub fn assembler(&self) -> StreamAssembler {
        StreamAssembler::new(self.encoder(), self.protocol.warmup_cycles)
    }

    pub fn file_options(&self) -> StimulusFileOptions {
        StimulusFileOptions {
            encoding: self.protocol.encoding,
            header: self.protocol.header_comments,
        }
    }
}

/// Protocol revision: layout, text encoding and warm-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub layout: LayoutRevision,

    #[serde(default)]
    pub encoding: TextEncoding,

    /// Cycles of first-bar replication before real data
    #[serde(default = "default_warmup_cycles")]
    pub warmup_cycles: usize,

    /// Base order quantity (1-63)
    #[serde(default = "default_order_qty")]
    pub order_qty: u8,

    /// `//` header lines in stimulus files. Off keeps line count == cycle count.
    #[serde(default)]
    pub header_comments: bool,

    #[serde(default)]
    pub golden_format: GoldenFormat,
}

fn default_warmup_cycles() -> usize {
    DEFAULT_WARMUP_CYCLES
}

fn default_order_qty() -> u8 {
    DEFAULT_ORDER_QTY
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            layout: LayoutRevision::default(),
            encoding: TextEncoding::default(),
            warmup_cycles: DEFAULT_WARMUP_CYCLES,
            order_qty: DEFAULT_ORDER_QTY,
            header_comments: false,
            golden_format: GoldenFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PressureConfig {
    #[serde(default)]
    pub rule: PressureRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Artifact directory
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Added to every synthetic scenario seed
    #[serde(default)]
    pub seed_offset: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("stimuli")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            seed_offset: 0,
        }
    }
}
