//! Scenario-level stream assembly.
//!
//! The hardware's rolling baseline resets to an arbitrary default. Feeding the
//! first real bar (held flat at its open, neutral flow) for a whole rolling
//! window before the real data keeps the start of the stream from looking like
//! a jump out of nowhere.
//!
//! The warm-up price is the first bar's open in both layout revisions. Under
//! `SplitFlow` a real bar's single PRICE word carries its close, so the first
//! real block can differ from the warm-up blocks by that bar's own move.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::models::ScaledBar;

use super::layout::{BarEncoder, WORDS_PER_BAR};
use super::wire::WireWord;
use super::StimulusError;

/// Default warm-up length: one full 256-cycle rolling window.
pub const DEFAULT_WARMUP_CYCLES: usize = 256;

/// Full cycle-ordered stimulus for one scenario.
///
/// Only [`StreamAssembler::assemble`] builds one, so the warm-up length and
/// bar offsets always index into `words`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StimulusStream {
    words: Vec<WireWord>,
    warmup_len: usize,
    words_per_bar: usize,
    /// Cycle at which each bar's block begins.
    bar_offsets: Vec<usize>,
}

impl StimulusStream {
    pub fn words(&self) -> &[WireWord] {
        &self.words
    }

    pub fn into_words(self) -> Vec<WireWord> {
        self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn warmup_len(&self) -> usize {
        self.warmup_len
    }

    pub fn warmup(&self) -> &[WireWord] {
        self.words.get(..self.warmup_len).unwrap_or(&self.words)
    }

    pub fn bar_count(&self) -> usize {
        self.bar_offsets.len()
    }

    pub fn bar_offsets(&self) -> &[usize] {
        &self.bar_offsets
    }

    /// Words of one bar's block.
    pub fn bar_block(&self, bar: usize) -> Option<&[WireWord]> {
        let start = *self.bar_offsets.get(bar)?;
        self.words.get(start..start + self.words_per_bar)
    }

    /// Cycle index of `offset` within bar `bar`.
    pub fn cycle_of(&self, bar: usize, offset: usize) -> Option<usize> {
        if offset >= self.words_per_bar {
            return None;
        }
        self.bar_offsets.get(bar).map(|start| start + offset)
    }

    /// Map a cycle back to `(bar, offset)`. `None` inside the warm-up or past the end.
    pub fn bar_at_cycle(&self, cycle: usize) -> Option<(usize, usize)> {
        if cycle < self.warmup_len || cycle >= self.words.len() {
            return None;
        }
        let rel = cycle - self.warmup_len;
        Some((rel / self.words_per_bar, rel % self.words_per_bar))
    }

    /// SHA-256 over the packed big-endian words, hex encoded.
    ///
    /// Identical bars and configuration must reproduce this exactly.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for w in &self.words {
            hasher.update(w.to_u16().to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Builds streams with one encoder and one warm-up length.
#[derive(Debug, Clone, Copy)]
pub struct StreamAssembler {
    encoder: BarEncoder,
    warmup_cycles: usize,
}

impl StreamAssembler {
    pub fn new(encoder: BarEncoder, warmup_cycles: usize) -> Self {
        Self {
            encoder,
            warmup_cycles,
        }
    }

    pub fn encoder(&self) -> &BarEncoder {
        &self.encoder
    }

    pub fn warmup_cycles(&self) -> usize {
        self.warmup_cycles
    }

    pub fn assemble(&self, bars: &[ScaledBar]) -> Result<StimulusStream, StimulusError> {
        let first = bars.first().ok_or(StimulusError::EmptySeries)?;

        let total = self.warmup_cycles + bars.len() * WORDS_PER_BAR;
        let mut words = Vec::with_capacity(total);

        let warm_block = self.encoder.encode(&first.flattened_at_open());
        words.extend(warm_block.iter().cycle().take(self.warmup_cycles).copied());

        let mut bar_offsets = Vec::with_capacity(bars.len());
        for bar in bars {
            bar_offsets.push(words.len());
            words.extend_from_slice(&self.encoder.encode(bar));
        }
        debug_assert_eq!(words.len(), total);

        debug!(
            bars = bars.len(),
            warmup = self.warmup_cycles,
            cycles = words.len(),
            layout = self.encoder.revision().as_str(),
            "assembled stimulus stream"
        );

        Ok(StimulusStream {
            words,
            warmup_len: self.warmup_cycles,
            words_per_bar: WORDS_PER_BAR,
            bar_offsets,
        })
    }
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new(BarEncoder::default(), DEFAULT_WARMUP_CYCLES)
    }
}
