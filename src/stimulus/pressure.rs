//! Buy/sell pressure derivation.
//!
//! Pressure is the fraction of a bar's order flow that is buying, in [0, 1].
//! It is derived from the raw bar (percent moves are only meaningful before
//! scaling) and one rule is applied uniformly to a whole stream.

use serde::{Deserialize, Serialize};

use crate::models::OhlcvBar;

/// Neutral order flow.
pub const NEUTRAL_PRESSURE: f64 = 0.5;

/// Bias applied to any directional candle, before the percent-move term.
const CANDLE_BASE_BIAS: f64 = 0.20;
/// Extra bias per 1% open-to-close move.
const CANDLE_BIAS_PER_PCT: f64 = 0.05;
/// Cap on the bias so the minority side never disappears.
const CANDLE_MAX_BIAS: f64 = 0.45;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureRule {
    /// Bullish candles lean toward buys, bearish toward sells, scaled by the
    /// size of the open-to-close move.
    #[default]
    CandleDirection,
    /// Position of the close within [low, high] is the buy fraction.
    IntrabarPosition,
}

impl PressureRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CandleDirection => "candle_direction",
            Self::IntrabarPosition => "intrabar_position",
        }
    }

    pub fn derive(&self, bar: &OhlcvBar) -> f64 {
        match self {
            Self::CandleDirection => candle_direction(bar),
            Self::IntrabarPosition => intrabar_position(bar),
        }
    }
}

impl std::str::FromStr for PressureRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "candle_direction" | "candle" => Ok(Self::CandleDirection),
            "intrabar_position" | "intrabar" => Ok(Self::IntrabarPosition),
            other => Err(format!("unknown pressure rule '{}'", other)),
        }
    }
}

fn candle_direction(bar: &OhlcvBar) -> f64 {
    if !(bar.open > 0.0) || !bar.open.is_finite() || !bar.close.is_finite() {
        return NEUTRAL_PRESSURE;
    }
    let bias = (CANDLE_BASE_BIAS + bar.change_pct().abs() * CANDLE_BIAS_PER_PCT).min(CANDLE_MAX_BIAS);
    if bar.close > bar.open {
        NEUTRAL_PRESSURE + bias
    } else if bar.close < bar.open {
        NEUTRAL_PRESSURE - bias
    } else {
        NEUTRAL_PRESSURE
    }
}

fn intrabar_position(bar: &OhlcvBar) -> f64 {
    let range = bar.high - bar.low;
    if !(range > 0.0) || !range.is_finite() || !bar.close.is_finite() {
        return NEUTRAL_PRESSURE;
    }
    ((bar.close - bar.low) / range).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(open: f64, high: f64, low: f64, close: f64) -> OhlcvBar {
        OhlcvBar::new(
            Utc.with_ymd_and_hms(2020, 3, 16, 13, 30, 0).unwrap(),
            open,
            high,
            low,
            close,
            1e6,
        )
    }

    #[test]
    fn test_candle_small_moves_match_fixed_split() {
        // A barely-moving candle leans 70/30, like the original fixed split.
        let up = PressureRule::CandleDirection.derive(&bar(100.0, 100.1, 99.9, 100.0001));
        let down = PressureRule::CandleDirection.derive(&bar(100.0, 100.1, 99.9, 99.9999));
        assert!((up - 0.7).abs() < 1e-3);
        assert!((down - 0.3).abs() < 1e-3);
        assert_eq!(PressureRule::CandleDirection.derive(&bar(10.0, 11.0, 9.0, 10.0)), 0.5);
    }

    #[test]
    fn test_candle_bias_grows_and_caps() {
        let mild = PressureRule::CandleDirection.derive(&bar(100.0, 103.0, 99.0, 102.0));
        let wild = PressureRule::CandleDirection.derive(&bar(100.0, 200.0, 99.0, 180.0));
        assert!(mild > 0.7 && mild < wild);
        assert!((wild - 0.95).abs() < 1e-12);

        let crash = PressureRule::CandleDirection.derive(&bar(60.0, 60.0, 0.5, 1.0));
        assert!((crash - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_intrabar_position() {
        let p = PressureRule::IntrabarPosition.derive(&bar(10.0, 12.0, 8.0, 11.0));
        assert!((p - 0.75).abs() < 1e-12);
        assert_eq!(PressureRule::IntrabarPosition.derive(&bar(10.0, 10.0, 10.0, 10.0)), 0.5);
        assert_eq!(PressureRule::IntrabarPosition.derive(&bar(10.0, 12.0, 8.0, 20.0)), 1.0);
    }

    #[test]
    fn test_degenerate_inputs_are_neutral() {
        assert_eq!(PressureRule::CandleDirection.derive(&bar(0.0, 1.0, 0.0, 1.0)), 0.5);
        assert_eq!(PressureRule::CandleDirection.derive(&bar(f64::NAN, 1.0, 0.0, 1.0)), 0.5);
        assert_eq!(PressureRule::IntrabarPosition.derive(&bar(1.0, f64::INFINITY, 0.0, 1.0)), 0.5);
    }
}
