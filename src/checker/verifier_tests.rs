//! Verifier Tests
//!
//! Equivalence policy: quiet-day checks in both strictness modes, rule and
//! ML paths, ML-only labels and every leniency state.

use chrono::NaiveDate;

use crate::checker::{
    verify, AlertLabel, EvidenceMasks, Expectation, ExpectedLabel, GoldenExpectation, LabelRef,
    NoneStrictness, Satisfaction, Verdict, VerifierConfig,
};

// =============================================================================
// TEST HELPERS
// =============================================================================

fn golden(labels: Vec<ExpectedLabel>) -> GoldenExpectation {
    GoldenExpectation::new(
        "TEST",
        NaiveDate::from_ymd_opt(2010, 5, 6).unwrap(),
        labels,
    )
}

fn none() -> GoldenExpectation {
    golden(vec![])
}

fn rule_only(mask: u16) -> EvidenceMasks {
    EvidenceMasks::structured(mask, None)
}

fn strict_none() -> VerifierConfig {
    VerifierConfig {
        none_strictness: NoneStrictness::ZeroAlerts,
        ..Default::default()
    }
}

fn strict_leniency() -> VerifierConfig {
    VerifierConfig {
        strict_leniency: true,
        ..Default::default()
    }
}

// =============================================================================
// REQUIRED SCENARIOS
// =============================================================================

#[test]
fn test_none_with_clear_mask_passes() {
    let r = verify(&none(), &rule_only(0b0000_0000), &VerifierConfig::default());
    assert_eq!(r.verdict, Verdict::Pass);
    assert_eq!(r.exit_code(), 0);
    assert!(r.false_positives.is_empty());
}

#[test]
fn test_none_with_flash_crash_fails() {
    let r = verify(&none(), &rule_only(1 << 7), &VerifierConfig::default());
    assert_eq!(r.verdict, Verdict::Fail);
    assert_eq!(r.exit_code(), 1);
    assert_eq!(r.false_positives, vec![AlertLabel::FlashCrash]);
    assert!(r.format_report().contains("False positives: FLASH_CRASH"));
}

#[test]
fn test_price_spike_satisfied_by_rule() {
    let g = golden(vec![ExpectedLabel::rule_or_ml(AlertLabel::PriceSpike)]);
    let r = verify(&g, &rule_only(0b1), &VerifierConfig::default());
    assert_eq!(r.verdict, Verdict::Pass);
    assert_eq!(r.checks[0].satisfaction, Satisfaction::Rule);
    assert_eq!(r.score, 1.0);
}

#[test]
fn test_ml_only_flash_crash_satisfied_by_ml() {
    let g = golden(vec![ExpectedLabel::ml_only(AlertLabel::FlashCrash)]);
    let ev = EvidenceMasks::structured(0, Some(1 << 3));
    let r = verify(&g, &ev, &VerifierConfig::default());
    assert_eq!(r.verdict, Verdict::Pass);
    assert_eq!(r.checks[0].satisfaction, Satisfaction::Ml);
}

#[test]
fn test_missing_order_imbalance_fails() {
    let g = golden(vec![ExpectedLabel::rule_or_ml(AlertLabel::OrderImbalance)]);
    let r = verify(&g, &EvidenceMasks::structured(0, Some(0)), &VerifierConfig::default());
    assert_eq!(r.verdict, Verdict::Fail);
    assert_eq!(r.checks[0].satisfaction, Satisfaction::Missed);
    assert_eq!(r.missed().len(), 1);
    assert_eq!(r.missed()[0].label, LabelRef::Known(AlertLabel::OrderImbalance));
    assert!(r.format_report().contains("[MISS] ORDER_IMBALANCE"));
}

// =============================================================================
// QUIET-DAY STRICTNESS
// =============================================================================

#[test]
fn test_none_other_alerts_are_informational_by_default() {
    let r = verify(&none(), &rule_only(0b0000_0011), &VerifierConfig::default());
    assert_eq!(r.verdict, Verdict::Pass);
    assert!(r.false_positives.is_empty());
    assert_eq!(r.informational, vec![AlertLabel::PriceSpike, AlertLabel::VolumeSurge]);
}

#[test]
fn test_zero_alerts_mode_rejects_any_rule_bit() {
    let r = verify(&none(), &rule_only(0b0000_0010), &strict_none());
    assert_eq!(r.verdict, Verdict::Fail);
    assert_eq!(r.false_positives, vec![AlertLabel::VolumeSurge]);

    let r = verify(&none(), &rule_only(1 << 12), &strict_none());
    assert_eq!(r.verdict, Verdict::Fail);
    assert!(r.false_positives.is_empty());
    assert!(!r.notes.is_empty());

    assert!(verify(&none(), &rule_only(0), &strict_none()).passed());
}

#[test]
fn test_none_ignores_ml_mask() {
    let ev = EvidenceMasks::structured(0, Some(1 << 3));
    assert!(verify(&none(), &ev, &strict_none()).passed());
}

// =============================================================================
// ML FALLBACK & LENIENCY
// =============================================================================

#[test]
fn test_plain_label_falls_back_to_ml() {
    let g = golden(vec![ExpectedLabel::rule_or_ml(AlertLabel::VolumeSurge)]);
    let r = verify(&g, &EvidenceMasks::structured(0, Some(1 << 2)), &VerifierConfig::default());
    assert!(r.passed());
    assert_eq!(r.checks[0].satisfaction, Satisfaction::Ml);
}

#[test]
fn test_rule_path_preferred_over_ml() {
    let g = golden(vec![ExpectedLabel::rule_or_ml(AlertLabel::FlashCrash)]);
    let r = verify(&g, &EvidenceMasks::structured(1 << 7, Some(1 << 3)), &VerifierConfig::default());
    assert_eq!(r.checks[0].satisfaction, Satisfaction::Rule);
}

#[test]
fn test_ml_only_ignores_rule_bit() {
    let g = golden(vec![ExpectedLabel::ml_only(AlertLabel::FlashCrash)]);
    let r = verify(&g, &EvidenceMasks::structured(1 << 7, Some(0)), &VerifierConfig::default());
    assert_eq!(r.verdict, Verdict::Fail);
    assert_eq!(r.checks[0].satisfaction, Satisfaction::Missed);
}

#[test]
fn test_ml_unavailable_is_lenient_and_visible() {
    let g = golden(vec![ExpectedLabel::ml_only(AlertLabel::PriceSpike)]);
    let r = verify(&g, &rule_only(0), &VerifierConfig::default());
    assert!(r.passed());
    assert_eq!(r.checks[0].satisfaction, Satisfaction::MlUnavailable);
    assert_eq!(r.lenient().len(), 1);
    assert!(r.notes.iter().any(|n| n.contains("PRICE_SPIKE_ML")));
    assert!(r.format_report().contains("[WARN] PRICE_SPIKE_ML"));

    let r = verify(&g, &rule_only(0), &strict_leniency());
    assert_eq!(r.verdict, Verdict::Fail);
}

#[test]
fn test_ml_only_label_without_ml_bit_is_unmapped() {
    let g = golden(vec![ExpectedLabel::ml_only(AlertLabel::Volatility)]);
    let r = verify(&g, &EvidenceMasks::structured(1 << 6, Some(0)), &VerifierConfig::default());
    assert_eq!(r.checks[0].satisfaction, Satisfaction::UnmappedLabel);
    assert!(r.passed());
}

#[test]
fn test_rule_less_label_without_ml_evidence_is_unavailable() {
    let g = golden(vec![ExpectedLabel::rule_or_ml(AlertLabel::QuoteStuffing)]);
    let r = verify(&g, &rule_only(0), &VerifierConfig::default());
    assert_eq!(r.checks[0].satisfaction, Satisfaction::MlUnavailable);

    let r = verify(&g, &EvidenceMasks::structured(0, Some(0)), &VerifierConfig::default());
    assert_eq!(r.checks[0].satisfaction, Satisfaction::Missed);
}

#[test]
fn test_unknown_label_is_lenient() {
    let g = GoldenExpectation {
        ticker: None,
        date: None,
        expectation: Expectation::from_labels([
            ExpectedLabel::parse("MOON_SHOT"),
            ExpectedLabel::rule_or_ml(AlertLabel::PriceSpike),
        ]),
    };
    let r = verify(&g, &rule_only(1), &VerifierConfig::default());
    assert!(r.passed());
    assert_eq!(r.checks[0].satisfaction, Satisfaction::UnmappedLabel);
    assert_eq!(r.satisfied, 2);

    let r = verify(&g, &rule_only(1), &strict_leniency());
    assert!(!r.passed());
    assert_eq!(r.satisfied, 1);
    assert_eq!(r.score, 0.5);
}

#[test]
fn test_partial_score() {
    let g = golden(vec![
        ExpectedLabel::rule_or_ml(AlertLabel::FlashCrash),
        ExpectedLabel::rule_or_ml(AlertLabel::VolumeSurge),
        ExpectedLabel::rule_or_ml(AlertLabel::PriceSpike),
        ExpectedLabel::rule_or_ml(AlertLabel::Volatility),
    ]);
    let r = verify(&g, &rule_only(0b1000_0011), &VerifierConfig::default());
    assert_eq!((r.satisfied, r.total), (3, 4));
    assert_eq!(r.score, 0.75);
    assert_eq!(r.verdict, Verdict::Fail);
    assert!(r.format_report().contains("Score: 3/4 (75%)"));
}

#[test]
fn test_free_text_evidence_is_flagged_degraded() {
    let ev = EvidenceMasks::parse("t=1200 ALERT FLASH!\n").unwrap();
    let g = golden(vec![ExpectedLabel::rule_or_ml(AlertLabel::FlashCrash)]);
    let r = verify(&g, &ev, &VerifierConfig::default());
    assert!(r.passed());
    assert!(r.notes.iter().any(|n| n.contains("free-text")));
    assert!(r.format_report().contains("degraded"));
}

#[test]
fn test_result_serializes_to_json() {
    let g = golden(vec![ExpectedLabel::ml_only(AlertLabel::FlashCrash)]);
    let r = verify(&g, &EvidenceMasks::structured(0, Some(1 << 3)), &VerifierConfig::default());
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["verdict"], "PASS");
    assert_eq!(json["checks"][0]["satisfaction"], "ml");
    assert_eq!(json["checks"][0]["expected"]["label"], "FLASH_CRASH");
    assert_eq!(json["ml_mask"], 8);
}
