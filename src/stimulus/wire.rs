//! Wire Protocol for the NanoTrade input pins
//!
//! Every clock cycle the hardware samples one 16-bit word split across two
//! 8-bit pin banks (`ui_in` and `uio_in`). The word is a 2-bit type tag plus
//! a payload:
//!
//! ```text
//! Tag     Payload                   ui_in              uio_in
//! 00      price  (12 bits)          00 pppppp [5:0]    00 pppppp [11:6]
//! 01      volume (12 bits)          01 vvvvvv [5:0]    00 vvvvvv [11:6]
//! 10      buy quantity  (6 bits)    10 qqqqqq          00000000
//! 11      sell quantity (6 bits)    11 qqqqqq          00000000
//! ```
//!
//! IDLE is the all-zero word. Payloads are clipped to their width, never wrapped.

use serde::{Deserialize, Serialize};

use super::StimulusError;

/// Payload mask for PRICE/VOLUME words.
pub const WIDE_PAYLOAD_MASK: u16 = 0x0FFF;

/// Payload mask for BUY/SELL words.
pub const QTY_PAYLOAD_MASK: u16 = 0x003F;

/// Largest order quantity a BUY/SELL word can carry.
pub const MAX_ORDER_QTY: u8 = 63;

const TAG_SHIFT: u16 = 14;

/// Word type tag (fits in 2 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WireTag {
    Price = 0,
    Volume = 1,
    Buy = 2,
    Sell = 3,
}

impl WireTag {
    pub fn from_u8(v: u8) -> Self {
        match v & 0b11 {
            0 => Self::Price,
            1 => Self::Volume,
            2 => Self::Buy,
            _ => Self::Sell,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "PRICE",
            Self::Volume => "VOLUME",
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// Whether the payload spans both pin banks.
    #[inline]
    pub fn is_wide(&self) -> bool {
        matches!(self, Self::Price | Self::Volume)
    }

    #[inline]
    fn payload_mask(&self) -> u16 {
        if self.is_wide() {
            WIDE_PAYLOAD_MASK
        } else {
            QTY_PAYLOAD_MASK
        }
    }
}

/// One cycle of packed input: `tag << 14 | payload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WireWord(u16);

impl WireWord {
    pub const IDLE: WireWord = WireWord(0);

    fn pack(tag: WireTag, payload: u16) -> Self {
        let clipped = payload.min(tag.payload_mask());
        Self(((tag as u16) << TAG_SHIFT) | clipped)
    }

    /// Price tick, clipped to 12 bits.
    pub fn price(value: u16) -> Self {
        Self::pack(WireTag::Price, value)
    }

    /// Volume tick, clipped to 12 bits.
    pub fn volume(value: u16) -> Self {
        Self::pack(WireTag::Volume, value)
    }

    /// Buy order, quantity clipped to [0, 63].
    pub fn buy(qty: u8) -> Self {
        Self::pack(WireTag::Buy, qty as u16)
    }

    /// Sell order, quantity clipped to [0, 63].
    pub fn sell(qty: u8) -> Self {
        Self::pack(WireTag::Sell, qty as u16)
    }

    #[inline]
    pub fn tag(&self) -> WireTag {
        WireTag::from_u8((self.0 >> TAG_SHIFT) as u8)
    }

    #[inline]
    pub fn payload(&self) -> u16 {
        self.0 & self.tag().payload_mask()
    }

    /// IDLE shares its encoding with a zero price tick.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn to_u16(self) -> u16 {
        self.0
    }

    /// Rebuild from a packed word. Bits outside the tag's payload width are rejected.
    pub fn from_u16(raw: u16) -> Result<Self, StimulusError> {
        let tag = WireTag::from_u8((raw >> TAG_SHIFT) as u8);
        let payload = raw & !(0b11 << TAG_SHIFT);
        if payload & !tag.payload_mask() != 0 {
            return Err(StimulusError::InvalidWord {
                raw,
                reason: format!("payload overflows {} width", tag.as_str()),
            });
        }
        Ok(Self(raw))
    }

    /// Split into the two pin bytes `(ui_in, uio_in)`.
    pub fn to_pins(self) -> [u8; 2] {
        let tag = self.tag();
        let payload = self.payload();
        let ui = ((tag as u8) << 6) | (payload & 0x3F) as u8;
        let uio = if tag.is_wide() {
            ((payload >> 6) & 0x3F) as u8
        } else {
            0
        };
        [ui, uio]
    }

    /// Reassemble from pin bytes as the hardware does.
    pub fn from_pins(ui: u8, uio: u8) -> Result<Self, StimulusError> {
        let tag = WireTag::from_u8(ui >> 6);
        if uio & 0xC0 != 0 {
            return Err(StimulusError::InvalidWord {
                raw: u16::from_be_bytes([ui, uio]),
                reason: "uio_in[7:6] must be zero".to_string(),
            });
        }
        if !tag.is_wide() && uio != 0 {
            return Err(StimulusError::InvalidWord {
                raw: u16::from_be_bytes([ui, uio]),
                reason: format!("{} word carries auxiliary bits", tag.as_str()),
            });
        }
        let low = (ui & 0x3F) as u16;
        let high = (uio & 0x3F) as u16;
        Ok(Self::pack(tag, (high << 6) | low))
    }
}

impl std::fmt::Display for WireWord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_idle() {
            write!(f, "IDLE")
        } else {
            write!(f, "{}({})", self.tag().as_str(), self.payload())
        }
    }
}

/// Textual line encoding of the stimulus file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// `XXYY`: ui_in byte then uio_in byte.
    #[default]
    PinBytes,
    /// `WWWW`: the packed 16-bit word, tag in the top two bits.
    Word16,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PinBytes => "pin_bytes",
            Self::Word16 => "word16",
        }
    }

    /// Format description used in stimulus headers.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::PinBytes => "ui_in[7:0] uio_in[7:0]",
            Self::Word16 => "word[15:0] = tag[15:14] payload[13:0]",
        }
    }

    /// Encode one word as a 4-digit lowercase hex line (no newline).
    pub fn encode(&self, word: WireWord) -> String {
        match self {
            Self::PinBytes => hex::encode(word.to_pins()),
            Self::Word16 => hex::encode(word.to_u16().to_be_bytes()),
        }
    }

    /// Decode one 4-digit hex line.
    pub fn decode(&self, text: &str) -> Result<WireWord, StimulusError> {
        let bytes = hex::decode(text.trim()).map_err(|e| StimulusError::InvalidWord {
            raw: 0,
            reason: format!("bad hex '{}': {}", text.trim(), e),
        })?;
        let [a, b]: [u8; 2] = bytes.as_slice().try_into().map_err(|_| StimulusError::InvalidWord {
            raw: 0,
            reason: format!("expected 4 hex digits, got '{}'", text.trim()),
        })?;
        match self {
            Self::PinBytes => WireWord::from_pins(a, b),
            Self::Word16 => WireWord::from_u16(u16::from_be_bytes([a, b])),
        }
    }
}

impl std::str::FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pin_bytes" | "pins" | "xxyy" => Ok(Self::PinBytes),
            "word16" | "word" | "wwww" => Ok(Self::Word16),
            other => Err(format!("unknown text encoding '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_pin_split() {
        // price 2048 = high6 32, low6 0
        let w = WireWord::price(2048);
        assert_eq!(w.to_pins(), [0x00, 0x20]);
        assert_eq!(TextEncoding::PinBytes.encode(w), "0020");
        assert_eq!(TextEncoding::Word16.encode(w), "0800");
    }

    #[test]
    fn test_volume_and_orders() {
        let v = WireWord::volume(100);
        assert_eq!(v.tag(), WireTag::Volume);
        assert_eq!(v.to_pins(), [0x40 | (100 & 0x3F) as u8, (100 >> 6) as u8]);

        assert_eq!(WireWord::buy(10).to_pins(), [0x8A, 0x00]);
        assert_eq!(WireWord::sell(10).to_pins(), [0xCA, 0x00]);
        assert_eq!(TextEncoding::Word16.encode(WireWord::sell(10)), "c00a");
    }

    #[test]
    fn test_payload_clipped_not_wrapped() {
        assert_eq!(WireWord::price(5000).payload(), 4095);
        assert_eq!(WireWord::volume(u16::MAX).payload(), 4095);
        assert_eq!(WireWord::buy(200).payload(), 63);
        assert_eq!(WireWord::sell(64).tag(), WireTag::Sell);
        assert_eq!(WireWord::sell(64).payload(), 63);
    }

    #[test]
    fn test_idle_is_all_zero() {
        assert!(WireWord::IDLE.is_idle());
        assert_eq!(WireWord::IDLE.to_pins(), [0, 0]);
        assert_eq!(TextEncoding::PinBytes.encode(WireWord::IDLE), "0000");
        assert_eq!(WireWord::IDLE.to_string(), "IDLE");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(TextEncoding::PinBytes.decode("zz00").is_err());
        assert!(TextEncoding::PinBytes.decode("000").is_err());
        assert!(TextEncoding::PinBytes.decode("000000").is_err());
        // buy word with auxiliary bits set
        assert!(TextEncoding::PinBytes.decode("8a01").is_err());
        // buy word with payload beyond 6 bits
        assert!(TextEncoding::Word16.decode("8100").is_err());
    }

    #[test]
    fn test_decode_both_encodings() {
        let words = [
            WireWord::price(1),
            WireWord::price(4090),
            WireWord::volume(3000),
            WireWord::buy(1),
            WireWord::sell(63),
            WireWord::IDLE,
        ];
        for enc in [TextEncoding::PinBytes, TextEncoding::Word16] {
            for w in words {
                assert_eq!(enc.decode(&enc.encode(w)).unwrap(), w, "{:?} {}", enc, w);
            }
        }
    }

    #[test]
    fn test_encoding_from_str() {
        assert_eq!("XXYY".parse::<TextEncoding>().unwrap(), TextEncoding::PinBytes);
        assert_eq!("word16".parse::<TextEncoding>().unwrap(), TextEncoding::Word16);
        assert!("base64".parse::<TextEncoding>().is_err());
    }
}
