//! Simulation transcript parsing.
//!
//! Structured transcripts carry explicit masks:
//!
//! ```text
//! [FIRED_RULE_MASK] 10000001
//! [FIRED_ML_MASK] 001000
//! ```
//!
//! A missing ML line means ML evidence is unavailable, not that nothing fired.
//! Without a rule mask line the transcript is scanned for free-text alert
//! markers and both masks are synthesized from the fired set.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use super::labels::{decode_ml_mask, decode_rule_mask, AlertLabel, TRANSCRIPT_MARKERS};
use super::{CheckError, InputRole};

pub const RULE_MASK_TAG: &str = "[FIRED_RULE_MASK]";
pub const ML_MASK_TAG: &str = "[FIRED_ML_MASK]";

/// Widest mask a transcript may report.
pub const MAX_MASK_DIGITS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    Structured,
    /// Masks synthesized from free-text markers.
    FreeText,
}

impl EvidenceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::FreeText => "free_text (degraded)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidenceMasks {
    pub rule_mask: u16,
    /// `None` when the transcript carried no ML evidence.
    pub ml_mask: Option<u16>,
    pub source: EvidenceSource,
    /// Labels matched by free-text markers; empty for structured evidence.
    pub matched_labels: Vec<AlertLabel>,
}

impl EvidenceMasks {
    pub fn structured(rule_mask: u16, ml_mask: Option<u16>) -> Self {
        Self {
            rule_mask,
            ml_mask,
            source: EvidenceSource::Structured,
            matched_labels: Vec::new(),
        }
    }

    /// Synthesize both masks from a set of fired labels.
    pub fn from_fired_labels(labels: impl IntoIterator<Item = AlertLabel>) -> Self {
        let set: BTreeSet<AlertLabel> = labels.into_iter().collect();
        let rule_mask = set
            .iter()
            .filter_map(|l| l.rule_bit())
            .fold(0u16, |acc, b| acc | (1 << b));
        let ml_mask = set
            .iter()
            .filter_map(|l| l.ml_bit())
            .fold(0u16, |acc, b| acc | (1 << b));
        Self {
            rule_mask,
            ml_mask: Some(ml_mask),
            source: EvidenceSource::FreeText,
            matched_labels: set.into_iter().collect(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.source == EvidenceSource::FreeText
    }

    pub fn ml_available(&self) -> bool {
        self.ml_mask.is_some()
    }

    /// False for labels without a rule bit.
    pub fn rule_fired(&self, label: AlertLabel) -> bool {
        label
            .rule_bit()
            .is_some_and(|b| self.rule_mask & (1 << b) != 0)
    }

    /// `None` when ML evidence is unavailable.
    pub fn ml_fired(&self, label: AlertLabel) -> Option<bool> {
        let mask = self.ml_mask?;
        Some(label.ml_bit().is_some_and(|b| mask & (1 << b) != 0))
    }

    pub fn rule_labels(&self) -> Vec<AlertLabel> {
        decode_rule_mask(self.rule_mask)
    }

    pub fn ml_labels(&self) -> Vec<AlertLabel> {
        self.ml_mask.map(decode_ml_mask).unwrap_or_default()
    }

    /// Parse a transcript.
    pub fn parse(text: &str) -> Result<Self, CheckError> {
        let mut rule_mask = None;
        let mut ml_mask = None;

        for (idx, line) in text.lines().enumerate() {
            if let Some(rest) = after_tag(line, RULE_MASK_TAG) {
                rule_mask = Some(parse_mask(rest, RULE_MASK_TAG, idx + 1)?);
            } else if let Some(rest) = after_tag(line, ML_MASK_TAG) {
                ml_mask = Some(parse_mask(rest, ML_MASK_TAG, idx + 1)?);
            }
        }

        match (rule_mask, ml_mask) {
            (Some(rule), ml) => {
                debug!(rule_mask = rule, ml_mask = ?ml, "structured evidence");
                Ok(Self::structured(rule, ml))
            }
            (None, Some(_)) => Err(CheckError::UnparsableEvidence {
                reason: format!("{} present but no {} line", ML_MASK_TAG, RULE_MASK_TAG),
            }),
            (None, None) => {
                let fired = scan_markers(text);
                if fired.is_empty() {
                    return Err(CheckError::UnparsableEvidence {
                        reason: "cannot determine rule mask: no mask lines and no alert markers"
                            .to_string(),
                    });
                }
                let evidence = Self::from_fired_labels(fired);
                warn!(
                    labels = ?evidence.matched_labels,
                    "no structured masks in transcript, using free-text markers"
                );
                Ok(evidence)
            }
        }
    }
}

/// Read and parse a transcript file.
pub fn read_transcript(path: impl AsRef<Path>) -> Result<EvidenceMasks, CheckError> {
    let path = path.as_ref();
    let text =
        fs::read_to_string(path).map_err(|e| CheckError::from_io(InputRole::Transcript, path, e))?;
    EvidenceMasks::parse(&text)
}

fn after_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.find(tag).map(|pos| &line[pos + tag.len()..])
}

fn parse_mask(rest: &str, tag: &str, line: usize) -> Result<u16, CheckError> {
    let digits = rest.split_whitespace().next().unwrap_or_default();
    let well_formed = !digits.is_empty()
        && digits.len() <= MAX_MASK_DIGITS
        && digits.bytes().all(|b| b == b'0' || b == b'1');
    if !well_formed {
        return Err(CheckError::UnparsableEvidence {
            reason: format!(
                "line {}: {} expects up to {} binary digits, got '{}'",
                line, tag, MAX_MASK_DIGITS, digits
            ),
        });
    }
    u16::from_str_radix(digits, 2).map_err(|e| CheckError::UnparsableEvidence {
        reason: format!("line {}: {}: {}", line, tag, e),
    })
}

/// Labels whose markers appear anywhere in `text`.
///
/// Markers are tried in priority order per line; a matched span is blanked
/// out before the next marker is tried.
pub fn scan_markers(text: &str) -> BTreeSet<AlertLabel> {
    let mut fired = BTreeSet::new();
    for line in text.lines() {
        let mut remaining = line.to_string();
        for (marker, label) in TRANSCRIPT_MARKERS {
            if remaining.contains(marker) {
                fired.insert(*label);
                remaining = remaining.replace(marker, &"\u{0}".repeat(marker.len()));
            }
        }
    }
    fired
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_masks() {
        let text = "sim start\n[FIRED_RULE_MASK] 10000001\n[FIRED_ML_MASK] 001000\ndone\n";
        let ev = EvidenceMasks::parse(text).unwrap();
        assert_eq!(ev.rule_mask, 0b1000_0001);
        assert_eq!(ev.ml_mask, Some(0b1000));
        assert_eq!(ev.source, EvidenceSource::Structured);
        assert!(ev.rule_fired(AlertLabel::FlashCrash));
        assert!(ev.rule_fired(AlertLabel::PriceSpike));
        assert_eq!(ev.ml_fired(AlertLabel::FlashCrash), Some(true));
        assert_eq!(ev.ml_fired(AlertLabel::PriceSpike), Some(false));
    }

    #[test]
    fn test_missing_ml_line_is_unavailable() {
        let ev = EvidenceMasks::parse("[FIRED_RULE_MASK] 0\n").unwrap();
        assert_eq!(ev.rule_mask, 0);
        assert!(!ev.ml_available());
        assert_eq!(ev.ml_fired(AlertLabel::FlashCrash), None);
    }

    #[test]
    fn test_last_mask_line_wins() {
        let ev = EvidenceMasks::parse("[FIRED_RULE_MASK] 1\n[FIRED_RULE_MASK] 10\n").unwrap();
        assert_eq!(ev.rule_mask, 0b10);
    }

    #[test]
    fn test_bad_masks_are_unparsable() {
        for text in [
            "[FIRED_RULE_MASK] 102\n",
            "[FIRED_RULE_MASK]\n",
            "[FIRED_RULE_MASK] 0x80\n",
            "[FIRED_RULE_MASK] 11111111111111111\n",
            "[FIRED_RULE_MASK] 1\n[FIRED_ML_MASK] zz\n",
            "[FIRED_ML_MASK] 1000\n",
        ] {
            let err = EvidenceMasks::parse(text).unwrap_err();
            assert!(matches!(err, CheckError::UnparsableEvidence { .. }), "{}", text);
        }
    }

    #[test]
    fn test_free_text_markers() {
        let text = "cycle 1200  ALERT: FLASH! px=412\ncycle 1300  ALERT: VOL_SRGE\n";
        let ev = EvidenceMasks::parse(text).unwrap();
        assert!(ev.is_degraded());
        assert_eq!(ev.matched_labels, vec![AlertLabel::VolumeSurge, AlertLabel::FlashCrash]);
        assert_eq!(ev.rule_mask, 0b1000_0010);
        assert_eq!(ev.ml_mask, Some(0b1100));
    }

    #[test]
    fn test_specific_marker_consumes_span() {
        // "IMBALANC" must not also trip "IMBAL ", and "FLASH!" must not double count.
        let fired = scan_markers("ORDER IMBALANCE seen, FLASH! here");
        assert_eq!(
            fired.into_iter().collect::<Vec<_>>(),
            vec![AlertLabel::OrderImbalance, AlertLabel::FlashCrash]
        );
        let fired = scan_markers("QSTUFF");
        assert_eq!(fired.into_iter().collect::<Vec<_>>(), vec![AlertLabel::QuoteStuffing]);
    }

    #[test]
    fn test_no_evidence_is_fatal() {
        let err = EvidenceMasks::parse("simulation finished\n").unwrap_err();
        assert!(err.is_fatal_input());
        assert!(err.to_string().contains("cannot determine rule mask"));
        assert!(EvidenceMasks::parse("").is_err());
    }

    #[test]
    fn test_missing_transcript_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_transcript(dir.path().join("out.txt")).unwrap_err();
        assert!(matches!(err, CheckError::MissingInput { role: InputRole::Transcript, .. }));
    }
}
