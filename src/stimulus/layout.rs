//! Per-bar word layouts.
//!
//! Each revision expands one bar into exactly `WORDS_PER_BAR` cycles so that
//! `cycle = warmup + bar * WORDS_PER_BAR + offset` holds in both directions.
//!
//! ```text
//! OhlcBurst (revision A)
//!   0-3    PRICE open, high, low, close
//!   4-5    VOLUME x2 (so the rolling average sees it clearly)
//!   6-11   BUY x n, SELL x (6 - n), n = round(pressure * 6), fixed quantity
//!   12-15  IDLE (detectors settle)
//!
//! SplitFlow (revision B)
//!   0      PRICE close
//!   1      VOLUME
//!   2-8    BUY x 7, quantity = round(pressure * 2 * base)
//!   9-15   SELL x 7, quantity = round((1 - pressure) * 2 * base)
//! ```

use serde::{Deserialize, Serialize};

use crate::models::ScaledBar;

use super::wire::{WireWord, MAX_ORDER_QTY};

/// Words per bar. Constant across both revisions.
pub const WORDS_PER_BAR: usize = 16;

/// Default per-order quantity.
pub const DEFAULT_ORDER_QTY: u8 = 10;

const BURST_ORDER_WORDS: usize = 6;
const BURST_IDLE_WORDS: usize = 4;
const FLOW_WORDS_PER_SIDE: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutRevision {
    #[default]
    OhlcBurst,
    SplitFlow,
}

impl LayoutRevision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OhlcBurst => "ohlc_burst",
            Self::SplitFlow => "split_flow",
        }
    }

    pub fn words_per_bar(&self) -> usize {
        WORDS_PER_BAR
    }
}

impl std::str::FromStr for LayoutRevision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ohlc_burst" | "a" => Ok(Self::OhlcBurst),
            "split_flow" | "b" => Ok(Self::SplitFlow),
            other => Err(format!("unknown layout revision '{}'", other)),
        }
    }
}

/// Expands scaled bars into fixed-length word blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarEncoder {
    revision: LayoutRevision,
    order_qty: u8,
}

impl BarEncoder {
    pub fn new(revision: LayoutRevision, order_qty: u8) -> Self {
        Self {
            revision,
            order_qty: order_qty.clamp(1, MAX_ORDER_QTY),
        }
    }

    pub fn revision(&self) -> LayoutRevision {
        self.revision
    }

    /// Encode one bar. Always returns exactly `WORDS_PER_BAR` words.
    pub fn encode(&self, bar: &ScaledBar) -> [WireWord; WORDS_PER_BAR] {
        let pressure = sanitize_pressure(bar.pressure);
        let mut out = [WireWord::IDLE; WORDS_PER_BAR];
        match self.revision {
            LayoutRevision::OhlcBurst => {
                out[0] = WireWord::price(bar.open);
                out[1] = WireWord::price(bar.high);
                out[2] = WireWord::price(bar.low);
                out[3] = WireWord::price(bar.close);
                out[4] = WireWord::volume(bar.volume);
                out[5] = WireWord::volume(bar.volume);

                let n_buys = burst_buy_count(pressure);
                for (k, slot) in out[6..6 + BURST_ORDER_WORDS].iter_mut().enumerate() {
                    *slot = if k < n_buys {
                        WireWord::buy(self.order_qty)
                    } else {
                        WireWord::sell(self.order_qty)
                    };
                }
                debug_assert_eq!(6 + BURST_ORDER_WORDS + BURST_IDLE_WORDS, WORDS_PER_BAR);
            }
            LayoutRevision::SplitFlow => {
                out[0] = WireWord::price(bar.close);
                out[1] = WireWord::volume(bar.volume);

                let buy_qty = side_qty(pressure, self.order_qty);
                let sell_qty = side_qty(1.0 - pressure, self.order_qty);
                for slot in &mut out[2..2 + FLOW_WORDS_PER_SIDE] {
                    *slot = WireWord::buy(buy_qty);
                }
                for slot in &mut out[2 + FLOW_WORDS_PER_SIDE..] {
                    *slot = WireWord::sell(sell_qty);
                }
            }
        }
        out
    }
}

impl Default for BarEncoder {
    fn default() -> Self {
        Self::new(LayoutRevision::default(), DEFAULT_ORDER_QTY)
    }
}

fn sanitize_pressure(p: f64) -> f64 {
    if p.is_nan() {
        0.5
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Buy words among the burst's order slots. Each side keeps at least one
/// word whenever it has any pressure at all.
fn burst_buy_count(pressure: f64) -> usize {
    let n = (pressure * BURST_ORDER_WORDS as f64).round() as usize;
    if pressure > 0.0 && pressure < 1.0 {
        n.clamp(1, BURST_ORDER_WORDS - 1)
    } else {
        n.min(BURST_ORDER_WORDS)
    }
}

/// Per-word quantity for one side of a split-flow block.
fn side_qty(side_pressure: f64, base: u8) -> u8 {
    let qty = (side_pressure * 2.0 * base as f64).round();
    let qty = qty.clamp(0.0, MAX_ORDER_QTY as f64) as u8;
    if side_pressure > 0.0 {
        qty.max(1)
    } else {
        qty
    }
}
