//! Price/volume scaling into the 12-bit hardware domain.
//!
//! The hardware's anomaly thresholds are fixed absolute unit deltas, so the
//! scaler has to make a given market move land on a comparable unit delta for
//! a $5 ticker and a $500 ticker alike.
//!
//! Two price strategies, with different sensitivity semantics:
//!
//! - **Range-anchored**: `baseline + (p - min) / (max - min) * window`. The
//!   series' own extremes always span `window` units; flat series map to
//!   `baseline`.
//! - **Mean-percentage-anchored**: `midpoint + (p - mean) * units_per_full_move / mean`.
//!   A fixed percentage move maps to a fixed unit delta regardless of the
//!   ticker's price level; a non-positive mean maps everything to `midpoint`.
//!
//! Two volume strategies: normalize to the series median or to the first
//! bar. "3x the median" and "3x the opening bar" are different claims, so a
//! scenario states which one it uses. Volume never scales to 0 (0 reads as
//! "no data" in hardware); it floors at 1.
//!
//! Degenerate input never raises. The fallbacks above are logged at debug.

use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use tracing::debug;

use crate::models::{OhlcvBar, ScaledBar};

use super::pressure::PressureRule;

/// Lowest price unit emitted (0 would alias the IDLE word).
pub const PRICE_FLOOR: f64 = 1.0;
/// Highest price unit emitted, leaving headroom below 4095.
pub const PRICE_CEIL: f64 = 4090.0;
/// Lowest volume unit emitted.
pub const VOLUME_FLOOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PriceScaling {
    RangeAnchored {
        #[serde(default = "default_baseline")]
        baseline: f64,
        #[serde(default = "default_window")]
        window: f64,
    },
    MeanPercentage {
        #[serde(default = "default_midpoint")]
        midpoint: f64,
        /// Units added for a +100% move away from the mean.
        #[serde(default = "default_units_per_full_move")]
        units_per_full_move: f64,
    },
}

fn default_baseline() -> f64 {
    200.0
}
fn default_window() -> f64 {
    800.0
}
fn default_midpoint() -> f64 {
    2048.0
}
fn default_units_per_full_move() -> f64 {
    2000.0
}

impl Default for PriceScaling {
    fn default() -> Self {
        Self::range_anchored()
    }
}

impl PriceScaling {
    pub fn range_anchored() -> Self {
        Self::RangeAnchored {
            baseline: default_baseline(),
            window: default_window(),
        }
    }

    pub fn mean_percentage() -> Self {
        Self::MeanPercentage {
            midpoint: default_midpoint(),
            units_per_full_move: default_units_per_full_move(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RangeAnchored { .. } => "range_anchored",
            Self::MeanPercentage { .. } => "mean_percentage",
        }
    }

    /// Scale a price series. Output has the same length and order as the input.
    pub fn scale(&self, prices: &[f64]) -> Vec<u16> {
        let finite: Vec<f64> = prices.iter().copied().filter(|p| p.is_finite()).collect();
        match *self {
            Self::RangeAnchored { baseline, window } => {
                let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
                let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let range = max - min;
                if !(range > 0.0) || !range.is_finite() {
                    debug!(range, baseline, "flat or unusable price range, using baseline");
                    return vec![to_price_units(baseline); prices.len()];
                }
                prices
                    .iter()
                    .map(|&p| {
                        if p.is_finite() {
                            to_price_units(baseline + (p - min) / range * window)
                        } else {
                            to_price_units(baseline)
                        }
                    })
                    .collect()
            }
            Self::MeanPercentage {
                midpoint,
                units_per_full_move,
            } => {
                let mean = if finite.is_empty() {
                    f64::NAN
                } else {
                    finite.iter().mean()
                };
                if !(mean > 0.0) || !mean.is_finite() {
                    debug!(mean, midpoint, "unusable price mean, using midpoint");
                    return vec![to_price_units(midpoint); prices.len()];
                }
                let units_per_dollar = units_per_full_move / mean;
                prices
                    .iter()
                    .map(|&p| {
                        if p.is_finite() {
                            to_price_units(midpoint + (p - mean) * units_per_dollar)
                        } else {
                            to_price_units(midpoint)
                        }
                    })
                    .collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum VolumeScaling {
    /// `value / median * baseline`
    MedianNormalized {
        #[serde(default = "default_volume_baseline")]
        baseline: f64,
        #[serde(default = "default_volume_max")]
        max: f64,
    },
    /// `value / first_value * baseline`
    FirstBarNormalized {
        #[serde(default = "default_volume_baseline")]
        baseline: f64,
        #[serde(default = "default_volume_max")]
        max: f64,
    },
}

fn default_volume_baseline() -> f64 {
    100.0
}
fn default_volume_max() -> f64 {
    3000.0
}

impl Default for VolumeScaling {
    fn default() -> Self {
        Self::median_normalized()
    }
}

impl VolumeScaling {
    pub fn median_normalized() -> Self {
        Self::MedianNormalized {
            baseline: default_volume_baseline(),
            max: default_volume_max(),
        }
    }

    pub fn first_bar_normalized() -> Self {
        Self::FirstBarNormalized {
            baseline: default_volume_baseline(),
            max: default_volume_max(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedianNormalized { .. } => "median_normalized",
            Self::FirstBarNormalized { .. } => "first_bar_normalized",
        }
    }

    pub fn scale(&self, volumes: &[f64]) -> Vec<u16> {
        let (anchor, baseline, max) = match *self {
            Self::MedianNormalized { baseline, max } => {
                let finite: Vec<f64> = volumes.iter().copied().filter(|v| v.is_finite()).collect();
                let median = if finite.is_empty() {
                    f64::NAN
                } else {
                    Data::new(finite).median()
                };
                (median, baseline, max)
            }
            Self::FirstBarNormalized { baseline, max } => {
                (volumes.first().copied().unwrap_or(f64::NAN), baseline, max)
            }
        };
        let max = if max.is_finite() {
            max
        } else {
            debug!(max, strategy = self.as_str(), "non-finite volume max, using default");
            default_volume_max()
        };
        let ceil = max.clamp(VOLUME_FLOOR, crate::models::MAX_12BIT as f64);

        if !(anchor > 0.0) || !anchor.is_finite() {
            debug!(anchor, baseline, strategy = self.as_str(), "unusable volume anchor, using baseline");
            return vec![to_units(baseline, VOLUME_FLOOR, ceil); volumes.len()];
        }

        volumes
            .iter()
            .map(|&v| {
                if v.is_finite() {
                    to_units(v / anchor * baseline, VOLUME_FLOOR, ceil)
                } else {
                    to_units(VOLUME_FLOOR, VOLUME_FLOOR, ceil)
                }
            })
            .collect()
    }
}

fn to_price_units(x: f64) -> u16 {
    to_units(x, PRICE_FLOOR, PRICE_CEIL)
}

/// Clamp then truncate. NaN lands on the floor.
fn to_units(x: f64, floor: f64, ceil: f64) -> u16 {
    if x.is_nan() {
        return floor as u16;
    }
    x.clamp(floor, ceil).floor() as u16
}

/// Price and volume strategy pair for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scaler {
    #[serde(default)]
    pub price: PriceScaling,
    #[serde(default)]
    pub volume: VolumeScaling,
}

impl Scaler {
    pub fn new(price: PriceScaling, volume: VolumeScaling) -> Self {
        Self { price, volume }
    }

    /// Scale a bar series and annotate each bar with its pressure.
    ///
    /// Open/high/low/close are pooled into one series before scaling so the
    /// four prices of every bar share a frame.
    pub fn scale_bars(&self, bars: &[OhlcvBar], rule: PressureRule) -> Vec<ScaledBar> {
        let n = bars.len();
        let pooled: Vec<f64> = bars
            .iter()
            .map(|b| b.open)
            .chain(bars.iter().map(|b| b.high))
            .chain(bars.iter().map(|b| b.low))
            .chain(bars.iter().map(|b| b.close))
            .collect();
        let scaled = self.price.scale(&pooled);
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let vol_scaled = self.volume.scale(&volumes);

        bars.iter()
            .enumerate()
            .map(|(i, bar)| ScaledBar {
                timestamp: bar.timestamp,
                open: scaled[i],
                high: scaled[n + i],
                low: scaled[2 * n + i],
                close: scaled[3 * n + i],
                volume: vol_scaled[i],
                pressure: rule.derive(bar),
            })
            .collect()
    }
}
