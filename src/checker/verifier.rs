//! Golden-vs-evidence verification.
//!
//! Policy:
//! - `NONE` golden: by default only a fired FLASH_CRASH rule bit fails the
//!   run; other fired rule labels are informational. `ZeroAlerts` requires the
//!   whole rule mask clear.
//! - Plain label: rule bit, else the same label's ML bit, else missed.
//! - `_ML` label: ML bit only. Unavailable ML evidence is a leniency.
//! - A label neither table maps is a leniency.
//!
//! Leniencies count as satisfied unless `strict_leniency` is set, and are
//! always listed in the result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::golden::{Expectation, ExpectedLabel, GoldenExpectation, LabelRef};
use super::labels::{unmapped_rule_bits, AlertLabel, MAPPING_VERSION};
use super::transcript::{EvidenceMasks, EvidenceSource};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// What a `NONE` golden requires of the rule mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoneStrictness {
    /// Only FLASH_CRASH must stay clear.
    #[default]
    FlashCrashOnly,
    /// Every rule bit must stay clear.
    ZeroAlerts,
}

impl NoneStrictness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlashCrashOnly => "flash_crash_only",
            Self::ZeroAlerts => "zero_alerts",
        }
    }
}

impl std::str::FromStr for NoneStrictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "flash_crash_only" => Ok(Self::FlashCrashOnly),
            "zero_alerts" => Ok(Self::ZeroAlerts),
            other => Err(format!("unknown none-strictness '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub none_strictness: NoneStrictness,
    /// Treat unverifiable and unmapped labels as failures.
    pub strict_leniency: bool,
}

// =============================================================================
// RESULT TYPES
// =============================================================================

/// How one expected label was (or was not) satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Satisfaction {
    Rule,
    Ml,
    /// ML evidence was needed but the transcript had none.
    MlUnavailable,
    /// The label has no bit in the table it must be checked against.
    UnmappedLabel,
    Missed,
}

impl Satisfaction {
    pub fn is_lenient(&self) -> bool {
        matches!(self, Self::MlUnavailable | Self::UnmappedLabel)
    }

    pub fn is_satisfied(&self, strict_leniency: bool) -> bool {
        match self {
            Self::Rule | Self::Ml => true,
            Self::MlUnavailable | Self::UnmappedLabel => !strict_leniency,
            Self::Missed => false,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Rule => "rule engine",
            Self::Ml => "ML engine",
            Self::MlUnavailable => "unverifiable: no ML evidence",
            Self::UnmappedLabel => "unverifiable: unknown label",
            Self::Missed => "missed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCheck {
    pub expected: ExpectedLabel,
    pub satisfaction: Satisfaction,
    pub satisfied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub mapping_version: u32,
    pub ticker: Option<String>,
    pub date: Option<NaiveDate>,
    pub expectation: Expectation,
    pub evidence_source: EvidenceSource,
    pub rule_mask: u16,
    pub ml_mask: Option<u16>,
    pub none_strictness: NoneStrictness,
    pub checks: Vec<LabelCheck>,
    /// Fired labels that fail a `NONE` expectation.
    pub false_positives: Vec<AlertLabel>,
    /// Fired labels recorded but not graded.
    pub informational: Vec<AlertLabel>,
    /// Every lenient or degraded decision taken.
    pub notes: Vec<String>,
    pub satisfied: usize,
    pub total: usize,
    pub score: f64,
    pub verdict: Verdict,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.verdict == Verdict::Pass
    }

    /// Process exit status: 0 pass, 1 fail.
    pub fn exit_code(&self) -> i32 {
        match self.verdict {
            Verdict::Pass => 0,
            Verdict::Fail => 1,
        }
    }

    pub fn missed(&self) -> Vec<&ExpectedLabel> {
        self.checks
            .iter()
            .filter(|c| c.satisfaction == Satisfaction::Missed)
            .map(|c| &c.expected)
            .collect()
    }

    pub fn lenient(&self) -> Vec<&LabelCheck> {
        self.checks
            .iter()
            .filter(|c| c.satisfaction.is_lenient())
            .collect()
    }

    /// Human-readable report.
    pub fn format_report(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        out.push_str(&rule);
        out.push('\n');
        out.push_str(&format!(
            "NanoTrade verification: {} {}\n",
            self.ticker.as_deref().unwrap_or("?"),
            self.date.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string())
        ));
        out.push_str(&rule);
        out.push('\n');

        out.push_str(&format!(
            "Evidence:  {} (rule mask {:08b}, ML mask {})\n",
            self.evidence_source.as_str(),
            self.rule_mask,
            self.ml_mask
                .map(|m| format!("{:06b}", m))
                .unwrap_or_else(|| "unavailable".to_string())
        ));
        out.push_str(&format!("Expected:  {}\n", self.expectation.summary()));

        match &self.expectation {
            Expectation::NoAlerts => {
                out.push_str(&format!("Quiet check: {}\n", self.none_strictness.as_str()));
            }
            Expectation::Alerts(_) => {
                for c in &self.checks {
                    let tag = match (c.satisfied, c.satisfaction.is_lenient()) {
                        (true, false) => "PASS",
                        (true, true) => "WARN",
                        (false, _) => "MISS",
                    };
                    out.push_str(&format!(
                        "  [{}] {:<22} {}\n",
                        tag,
                        c.expected.token(),
                        c.satisfaction.describe()
                    ));
                }
            }
        }

        if !self.false_positives.is_empty() {
            out.push_str(&format!("False positives: {}\n", join_labels(&self.false_positives)));
        }
        if !self.informational.is_empty() {
            out.push_str(&format!("Also fired:      {}\n", join_labels(&self.informational)));
        }
        if !self.notes.is_empty() {
            out.push_str("Notes:\n");
            for n in &self.notes {
                out.push_str(&format!("  - {}\n", n));
            }
        }

        if self.total > 0 {
            out.push_str(&format!(
                "Score: {}/{} ({:.0}%)\n",
                self.satisfied,
                self.total,
                self.score * 100.0
            ));
        }
        out.push_str(&format!("Result: {}\n", self.verdict.as_str()));
        out
    }
}

fn join_labels(labels: &[AlertLabel]) -> String {
    labels
        .iter()
        .map(|l| l.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// =============================================================================
// VERIFICATION
// =============================================================================

fn check_label(expected: &ExpectedLabel, evidence: &EvidenceMasks) -> Satisfaction {
    let label = match &expected.label {
        LabelRef::Known(l) => *l,
        LabelRef::Unknown(_) => return Satisfaction::UnmappedLabel,
    };

    if expected.ml_only {
        if label.ml_bit().is_none() {
            return Satisfaction::UnmappedLabel;
        }
        return match evidence.ml_fired(label) {
            Some(true) => Satisfaction::Ml,
            Some(false) => Satisfaction::Missed,
            None => Satisfaction::MlUnavailable,
        };
    }

    if evidence.rule_fired(label) {
        return Satisfaction::Rule;
    }
    match (label.rule_bit(), label.ml_bit(), evidence.ml_fired(label)) {
        (_, _, Some(true)) => Satisfaction::Ml,
        (None, None, _) => Satisfaction::UnmappedLabel,
        // Only the ML path could catch it and there is no ML evidence.
        (None, Some(_), None) => Satisfaction::MlUnavailable,
        _ => Satisfaction::Missed,
    }
}

/// Grade `evidence` against `golden`.
pub fn verify(
    golden: &GoldenExpectation,
    evidence: &EvidenceMasks,
    config: &VerifierConfig,
) -> VerificationResult {
    let mut notes = Vec::new();
    if evidence.is_degraded() {
        notes.push(format!(
            "masks synthesized from free-text markers: {}",
            join_labels(&evidence.matched_labels)
        ));
    }

    let fired_rule = evidence.rule_labels();
    let mut checks = Vec::new();
    let mut false_positives = Vec::new();
    let mut informational = Vec::new();

    let quiet_ok = match &golden.expectation {
        Expectation::NoAlerts => {
            match config.none_strictness {
                NoneStrictness::FlashCrashOnly => {
                    for l in fired_rule {
                        if l == AlertLabel::FlashCrash {
                            false_positives.push(l);
                        } else {
                            informational.push(l);
                        }
                    }
                }
                NoneStrictness::ZeroAlerts => {
                    false_positives = fired_rule;
                    let stray = unmapped_rule_bits(evidence.rule_mask);
                    if stray != 0 {
                        notes.push(format!("unmapped rule bits set: {:016b}", stray));
                    }
                }
            }
            match config.none_strictness {
                NoneStrictness::FlashCrashOnly => false_positives.is_empty(),
                NoneStrictness::ZeroAlerts => evidence.rule_mask == 0,
            }
        }
        Expectation::Alerts(labels) => {
            for expected in labels {
                let satisfaction = check_label(expected, evidence);
                let satisfied = satisfaction.is_satisfied(config.strict_leniency);
                if satisfaction.is_lenient() {
                    warn!(
                        label = %expected,
                        reason = satisfaction.describe(),
                        counted = satisfied,
                        "lenient label decision"
                    );
                    notes.push(format!(
                        "{}: {} ({})",
                        expected,
                        satisfaction.describe(),
                        if satisfied { "counted as satisfied" } else { "strict: counted as missed" }
                    ));
                }
                checks.push(LabelCheck {
                    expected: expected.clone(),
                    satisfaction,
                    satisfied,
                });
            }
            true
        }
    };

    let total = checks.len();
    let satisfied = checks.iter().filter(|c| c.satisfied).count();
    let pass = quiet_ok && satisfied == total;
    let score = if total == 0 {
        if pass {
            1.0
        } else {
            0.0
        }
    } else {
        satisfied as f64 / total as f64
    };
    let verdict = if pass { Verdict::Pass } else { Verdict::Fail };

    info!(
        ticker = golden.ticker.as_deref().unwrap_or("?"),
        verdict = verdict.as_str(),
        satisfied,
        total,
        "verification complete"
    );

    VerificationResult {
        mapping_version: MAPPING_VERSION,
        ticker: golden.ticker.clone(),
        date: golden.date,
        expectation: golden.expectation.clone(),
        evidence_source: evidence.source,
        rule_mask: evidence.rule_mask,
        ml_mask: evidence.ml_mask,
        none_strictness: config.none_strictness,
        checks,
        false_positives,
        informational,
        notes,
        satisfied,
        total,
        score,
        verdict,
    }
}
