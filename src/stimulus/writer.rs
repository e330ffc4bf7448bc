//! Stimulus file writer and reference reader.
//!
//! One word per line, execution order, in a single encoding per file:
//!
//! ```text
//! 0020      <- PinBytes: ui_in=0x00 uio_in=0x20 (price 2048)
//! 0800      <- Word16:   tag 00, payload 2048
//! ```
//!
//! The optional header uses `//` comments, which `$readmemh` skips.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::atomic_file::AtomicFile;

use super::assembler::StimulusStream;
use super::wire::{TextEncoding, WireWord};
use super::StimulusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StimulusFileOptions {
    #[serde(default)]
    pub encoding: TextEncoding,
    /// Emit `//` header lines describing the format and cycle count.
    #[serde(default)]
    pub header: bool,
}

/// Write `stream` to `path` atomically.
pub fn write_stimulus(
    path: impl AsRef<Path>,
    stream: &StimulusStream,
    options: StimulusFileOptions,
) -> Result<(), StimulusError> {
    let path = path.as_ref();
    let io_err = |source: std::io::Error| StimulusError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = AtomicFile::create(path).map_err(io_err)?;
    if options.header {
        writeln!(
            file,
            "// NanoTrade stimulus file, format: {}",
            options.encoding.describe()
        )
        .map_err(io_err)?;
        writeln!(file, "// Total cycles: {}", stream.len()).map_err(io_err)?;
    }
    for word in stream.words() {
        writeln!(file, "{}", options.encoding.encode(*word)).map_err(io_err)?;
    }
    file.commit().map_err(io_err)?;

    info!(
        path = %path.display(),
        cycles = stream.len(),
        encoding = options.encoding.as_str(),
        "wrote stimulus"
    );
    Ok(())
}

/// Parse stimulus text back into words. Blank and `//` lines are skipped.
pub fn parse_stimulus(text: &str, encoding: TextEncoding) -> Result<Vec<WireWord>, StimulusError> {
    let mut words = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let word = encoding
            .decode(line)
            .map_err(|e| StimulusError::InvalidStimulusLine {
                line: idx + 1,
                reason: e.to_string(),
            })?;
        words.push(word);
    }
    Ok(words)
}

/// Read a stimulus file written in `encoding`.
pub fn read_stimulus(
    path: impl AsRef<Path>,
    encoding: TextEncoding,
) -> Result<Vec<WireWord>, StimulusError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| StimulusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_stimulus(&text, encoding)
}
