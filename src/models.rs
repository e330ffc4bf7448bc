use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest value representable in a 12-bit price/volume payload.
pub const MAX_12BIT: u16 = 4095;

/// One OHLCV sample as supplied by the market-data collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OhlcvBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl OhlcvBar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Percent change from open to close. Zero when the open is not a usable divisor.
    pub fn change_pct(&self) -> f64 {
        if self.open > 0.0 && self.open.is_finite() && self.close.is_finite() {
            (self.close - self.open) / self.open * 100.0
        } else {
            0.0
        }
    }
}

/// A bar after scaling into the 12-bit hardware domain, annotated with
/// the buy/sell pressure that drives its order words.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledBar {
    pub timestamp: DateTime<Utc>,
    pub open: u16,
    pub high: u16,
    pub low: u16,
    pub close: u16,
    pub volume: u16,
    /// Fraction of order flow that is buying, in [0, 1].
    pub pressure: f64,
}

impl ScaledBar {
    /// The same bar held flat at its opening level with neutral order flow.
    ///
    /// Used to build the warm-up prefix: repeating this keeps the hardware's
    /// rolling baseline at the first real value without injecting a move.
    pub fn flattened_at_open(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            open: self.open,
            high: self.open,
            low: self.open,
            close: self.open,
            volume: self.volume,
            pressure: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 28, 14, 30, 0).unwrap()
    }

    #[test]
    fn test_change_pct() {
        let bar = OhlcvBar::new(ts(), 100.0, 110.0, 95.0, 105.0, 1e6);
        assert!((bar.change_pct() - 5.0).abs() < 1e-9);

        let zero_open = OhlcvBar::new(ts(), 0.0, 1.0, 0.0, 1.0, 1.0);
        assert_eq!(zero_open.change_pct(), 0.0);
    }

    #[test]
    fn test_flattened_at_open() {
        let bar = ScaledBar {
            timestamp: ts(),
            open: 300,
            high: 450,
            low: 250,
            close: 400,
            volume: 120,
            pressure: 0.9,
        };
        let flat = bar.flattened_at_open();
        assert_eq!((flat.high, flat.low, flat.close), (300, 300, 300));
        assert_eq!(flat.volume, 120);
        assert_eq!(flat.pressure, 0.5);
    }
}
