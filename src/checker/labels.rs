//! Alert labels and their bit mappings.
//!
//! The rule engine and the ML engine enumerate different label subsets, so
//! each has its own label -> bit table. The two tables are versioned together
//! (`MAPPING_VERSION`) and a rule bit index is never looked up in the ML table
//! or vice versa.
//!
//! ```text
//! bit   rule mask          ML mask (class index)
//! 0     PRICE_SPIKE        NORMAL
//! 1     VOLUME_SURGE       PRICE_SPIKE
//! 2     VOLUME_DRY         VOLUME_SURGE
//! 3     TRADE_VELOCITY     FLASH_CRASH
//! 4     ORDER_IMBALANCE    ORDER_IMBALANCE
//! 5     SPREAD_WIDENING    QUOTE_STUFFING
//! 6     VOLATILITY
//! 7     FLASH_CRASH
//! ```

use serde::{Deserialize, Serialize};

/// Version of the rule/ML bit tables below.
pub const MAPPING_VERSION: u32 = 1;

/// Suffix marking an expectation that only the ML path must satisfy.
pub const ML_ONLY_SUFFIX: &str = "_ML";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLabel {
    PriceSpike,
    VolumeSurge,
    VolumeDry,
    TradeVelocity,
    OrderImbalance,
    SpreadWidening,
    Volatility,
    FlashCrash,
    QuoteStuffing,
    Normal,
}

impl AlertLabel {
    pub const ALL: [AlertLabel; 10] = [
        Self::PriceSpike,
        Self::VolumeSurge,
        Self::VolumeDry,
        Self::TradeVelocity,
        Self::OrderImbalance,
        Self::SpreadWidening,
        Self::Volatility,
        Self::FlashCrash,
        Self::QuoteStuffing,
        Self::Normal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceSpike => "PRICE_SPIKE",
            Self::VolumeSurge => "VOLUME_SURGE",
            Self::VolumeDry => "VOLUME_DRY",
            Self::TradeVelocity => "TRADE_VELOCITY",
            Self::OrderImbalance => "ORDER_IMBALANCE",
            Self::SpreadWidening => "SPREAD_WIDENING",
            Self::Volatility => "VOLATILITY",
            Self::FlashCrash => "FLASH_CRASH",
            Self::QuoteStuffing => "QUOTE_STUFFING",
            Self::Normal => "NORMAL",
        }
    }

    /// Parse a canonical name or a historical alias. Case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.trim().to_ascii_uppercase();
        let canonical = match upper.as_str() {
            "VOL_DRY" => "VOLUME_DRY",
            "VOL_SURGE" => "VOLUME_SURGE",
            "QUOTE_STUFF" => "QUOTE_STUFFING",
            other => other,
        };
        Self::ALL.iter().copied().find(|l| l.as_str() == canonical)
    }

    /// Bit in the rule engine's mask.
    pub fn rule_bit(&self) -> Option<u8> {
        match self {
            Self::PriceSpike => Some(0),
            Self::VolumeSurge => Some(1),
            Self::VolumeDry => Some(2),
            Self::TradeVelocity => Some(3),
            Self::OrderImbalance => Some(4),
            Self::SpreadWidening => Some(5),
            Self::Volatility => Some(6),
            Self::FlashCrash => Some(7),
            Self::QuoteStuffing | Self::Normal => None,
        }
    }

    /// Bit in the ML engine's mask.
    pub fn ml_bit(&self) -> Option<u8> {
        match self {
            Self::Normal => Some(0),
            Self::PriceSpike => Some(1),
            Self::VolumeSurge => Some(2),
            Self::FlashCrash => Some(3),
            Self::OrderImbalance => Some(4),
            Self::QuoteStuffing => Some(5),
            _ => None,
        }
    }

    pub fn from_rule_bit(bit: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.rule_bit() == Some(bit))
    }

    pub fn from_ml_bit(bit: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|l| l.ml_bit() == Some(bit))
    }
}

impl std::fmt::Display for AlertLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels whose rule bit is set in `mask`, in bit order. Unmapped bits are dropped.
pub fn decode_rule_mask(mask: u16) -> Vec<AlertLabel> {
    (0..16u8)
        .filter(|b| mask & (1 << b) != 0)
        .filter_map(AlertLabel::from_rule_bit)
        .collect()
}

/// Labels whose ML bit is set in `mask`, in bit order.
pub fn decode_ml_mask(mask: u16) -> Vec<AlertLabel> {
    (0..16u8)
        .filter(|b| mask & (1 << b) != 0)
        .filter_map(AlertLabel::from_ml_bit)
        .collect()
}

/// Mask bits set in `mask` that no label maps to.
pub fn unmapped_rule_bits(mask: u16) -> u16 {
    let mapped = AlertLabel::ALL
        .iter()
        .filter_map(|l| l.rule_bit())
        .fold(0u16, |acc, b| acc | (1 << b));
    mask & !mapped
}

/// Free-text transcript markers, most specific first.
///
/// Scanning consumes each matched span, so a shorter marker never re-matches
/// text a longer one already claimed (`FLASH!` vs `FLASH`, `IMBALANC` vs `IMBAL `).
pub const TRANSCRIPT_MARKERS: &[(&str, AlertLabel)] = &[
    ("FLASH!", AlertLabel::FlashCrash),
    ("VOL_SRGE", AlertLabel::VolumeSurge),
    ("VOLSRG", AlertLabel::VolumeSurge),
    ("VOL_DRY", AlertLabel::VolumeDry),
    ("VELOCITY", AlertLabel::TradeVelocity),
    ("IMBALANC", AlertLabel::OrderImbalance),
    ("IMBAL ", AlertLabel::OrderImbalance),
    ("VOLATIL", AlertLabel::Volatility),
    ("SPREAD", AlertLabel::SpreadWidening),
    ("QSTUFF", AlertLabel::QuoteStuffing),
    ("SPIKE", AlertLabel::PriceSpike),
    ("FLASH", AlertLabel::FlashCrash),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_required_bit_positions() {
        assert_eq!(AlertLabel::PriceSpike.rule_bit(), Some(0));
        assert_eq!(AlertLabel::FlashCrash.rule_bit(), Some(7));
        assert_eq!(AlertLabel::FlashCrash.ml_bit(), Some(3));
        assert_eq!(AlertLabel::QuoteStuffing.rule_bit(), None);
        assert_eq!(AlertLabel::Volatility.ml_bit(), None);
    }

    #[test]
    fn test_tables_are_injective() {
        let rule: HashSet<u8> = AlertLabel::ALL.iter().filter_map(|l| l.rule_bit()).collect();
        let ml: HashSet<u8> = AlertLabel::ALL.iter().filter_map(|l| l.ml_bit()).collect();
        assert_eq!(rule.len(), 8);
        assert_eq!(ml.len(), 6);
        for l in AlertLabel::ALL {
            if let Some(b) = l.rule_bit() {
                assert_eq!(AlertLabel::from_rule_bit(b), Some(l));
            }
            if let Some(b) = l.ml_bit() {
                assert_eq!(AlertLabel::from_ml_bit(b), Some(l));
            }
        }
    }

    #[test]
    fn test_from_name_and_aliases() {
        assert_eq!(AlertLabel::from_name("flash_crash"), Some(AlertLabel::FlashCrash));
        assert_eq!(AlertLabel::from_name("VOL_DRY"), Some(AlertLabel::VolumeDry));
        assert_eq!(AlertLabel::from_name("QUOTE_STUFF"), Some(AlertLabel::QuoteStuffing));
        assert_eq!(AlertLabel::from_name("MOON_SHOT"), None);
        for l in AlertLabel::ALL {
            assert_eq!(AlertLabel::from_name(l.as_str()), Some(l));
        }
    }

    #[test]
    fn test_decode_masks() {
        assert_eq!(
            decode_rule_mask(0b1000_0001),
            vec![AlertLabel::PriceSpike, AlertLabel::FlashCrash]
        );
        assert_eq!(decode_ml_mask(0b1000), vec![AlertLabel::FlashCrash]);
        assert_eq!(unmapped_rule_bits(0b1_0000_0001), 0b1_0000_0000);
    }

    #[test]
    fn test_markers_ordered_longest_first_per_label() {
        // Any marker that contains another must come before it.
        for (i, (a, _)) in TRANSCRIPT_MARKERS.iter().enumerate() {
            for (b, _) in &TRANSCRIPT_MARKERS[..i] {
                assert!(!a.contains(b) || a == b, "{} shadowed by {}", a, b);
            }
        }
    }
}
