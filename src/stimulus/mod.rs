//! Stimulus Encoder
//!
//! Turns OHLCV bars into the cycle-by-cycle input stream the NanoTrade
//! hardware consumes:
//!
//! ```text
//! bars -> Scaler -> (pressure) -> BarEncoder -> StreamAssembler -> writer -> .memh
//! ```
//!
//! - **Scaler**: raw prices/volumes to the 12-bit domain (two strategies each)
//! - **BarEncoder**: one scaled bar to exactly `WORDS_PER_BAR` wire words
//! - **StreamAssembler**: warm-up prefix plus per-bar blocks, with a cycle index
//! - **writer**: atomic `XXYY` / `WWWW` hex files and a reference reader
//!
//! Layouts, scaling strategies and text encodings are explicit tagged
//! variants chosen by configuration. They are never mixed within one stream.

pub mod assembler;
pub mod layout;
pub mod pressure;
pub mod scaler;
pub mod wire;
pub mod writer;

pub use assembler::{StimulusStream, StreamAssembler};
pub use layout::{BarEncoder, LayoutRevision, WORDS_PER_BAR};
pub use pressure::PressureRule;
pub use scaler::{PriceScaling, Scaler, VolumeScaling};
pub use wire::{TextEncoding, WireTag, WireWord};
pub use writer::{parse_stimulus, read_stimulus, write_stimulus, StimulusFileOptions};

#[cfg(test)]
mod scaler_tests;

use std::path::PathBuf;

/// Errors raised while building, writing or reading stimulus streams.
#[derive(Debug)]
pub enum StimulusError {
    /// No bars to encode.
    EmptySeries,
    /// Bars input could not be used.
    InvalidBars { reason: String },
    /// A word does not fit its declared layout.
    InvalidWord { raw: u16, reason: String },
    /// A stimulus file line could not be decoded.
    InvalidStimulusLine { line: usize, reason: String },
    /// Filesystem failure.
    Io { path: PathBuf, source: std::io::Error },
}

impl std::fmt::Display for StimulusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptySeries => write!(f, "no bars to encode"),
            Self::InvalidBars { reason } => write!(f, "invalid bars: {}", reason),
            Self::InvalidWord { raw, reason } => {
                write!(f, "invalid wire word 0x{:04x}: {}", raw, reason)
            }
            Self::InvalidStimulusLine { line, reason } => {
                write!(f, "stimulus line {}: {}", line, reason)
            }
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for StimulusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
