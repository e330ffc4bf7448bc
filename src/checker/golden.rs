//! Golden expectation files.
//!
//! Two on-disk variants carry the same expectation:
//!
//! ```text
//! Variant A (expect lines)          Variant B (key/value)
//! // Ticker: GME  Date: 2021-01-28  TICKER=GME
//! EXPECT FLASH_CRASH                DATE=2021-01-28
//! EXPECT PRICE_SPIKE_ML             EXPECTED=FLASH_CRASH,PRICE_SPIKE_ML
//! EXPECT NONE                       EXPECTED=NONE
//! ```
//!
//! A `_ML` suffix marks a label only the learned detector is required to
//! catch. Labels are kept in first-seen order without duplicates. A file with
//! no expectation at all is malformed rather than an implicit pass.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::atomic_file::write_atomic;

use super::labels::{AlertLabel, ML_ONLY_SUFFIX};
use super::{CheckError, InputRole};

/// Date format used by golden files.
pub const GOLDEN_DATE_FORMAT: &str = "%Y-%m-%d";

/// A label reference as written in a golden file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelRef {
    Known(AlertLabel),
    /// A name neither bit table knows.
    Unknown(String),
}

impl LabelRef {
    pub fn parse(name: &str) -> Self {
        match AlertLabel::from_name(name) {
            Some(l) => Self::Known(l),
            None => Self::Unknown(name.trim().to_ascii_uppercase()),
        }
    }

    pub fn known(&self) -> Option<AlertLabel> {
        match self {
            Self::Known(l) => Some(*l),
            Self::Unknown(_) => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Known(l) => l.as_str(),
            Self::Unknown(s) => s,
        }
    }
}

impl std::fmt::Display for LabelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedLabel {
    pub label: LabelRef,
    /// Only the ML detection path needs to fire.
    pub ml_only: bool,
}

impl ExpectedLabel {
    pub fn rule_or_ml(label: AlertLabel) -> Self {
        Self {
            label: LabelRef::Known(label),
            ml_only: false,
        }
    }

    pub fn ml_only(label: AlertLabel) -> Self {
        Self {
            label: LabelRef::Known(label),
            ml_only: true,
        }
    }

    /// Parse `NAME` or `NAME_ML`.
    pub fn parse(token: &str) -> Self {
        let token = token.trim().to_ascii_uppercase();
        match token.strip_suffix(ML_ONLY_SUFFIX) {
            Some(base) if !base.is_empty() => Self {
                label: LabelRef::parse(base),
                ml_only: true,
            },
            _ => Self {
                label: LabelRef::parse(&token),
                ml_only: false,
            },
        }
    }

    /// Name as written in golden files.
    pub fn token(&self) -> String {
        if self.ml_only {
            format!("{}{}", self.label.name(), ML_ONLY_SUFFIX)
        } else {
            self.label.name().to_string()
        }
    }
}

impl std::fmt::Display for ExpectedLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "labels", rename_all = "snake_case")]
pub enum Expectation {
    /// Sentinel: the scenario should stay quiet.
    NoAlerts,
    /// Ordered, de-duplicated expected labels.
    Alerts(Vec<ExpectedLabel>),
}

impl Expectation {
    /// Build from labels, dropping repeats. An empty list means no alerts.
    pub fn from_labels(labels: impl IntoIterator<Item = ExpectedLabel>) -> Self {
        let mut out: Vec<ExpectedLabel> = Vec::new();
        for l in labels {
            if !out.contains(&l) {
                out.push(l);
            }
        }
        if out.is_empty() {
            Self::NoAlerts
        } else {
            Self::Alerts(out)
        }
    }

    pub fn labels(&self) -> &[ExpectedLabel] {
        match self {
            Self::NoAlerts => &[],
            Self::Alerts(v) => v,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::NoAlerts)
    }

    pub fn summary(&self) -> String {
        match self {
            Self::NoAlerts => "NONE".to_string(),
            Self::Alerts(v) => v.iter().map(|l| l.token()).collect::<Vec<_>>().join(", "),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldenFormat {
    /// `EXPECT <LABEL>` lines with `//` comments.
    #[default]
    ExpectLines,
    /// `TICKER=` / `DATE=` / `EXPECTED=` lines.
    KeyValue,
}

impl GoldenFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExpectLines => "expect_lines",
            Self::KeyValue => "key_value",
        }
    }
}

impl std::str::FromStr for GoldenFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "expect_lines" | "a" => Ok(Self::ExpectLines),
            "key_value" | "b" => Ok(Self::KeyValue),
            other => Err(format!("unknown golden format '{}'", other)),
        }
    }
}

/// Declarative per-scenario expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldenExpectation {
    pub ticker: Option<String>,
    pub date: Option<NaiveDate>,
    pub expectation: Expectation,
}

impl GoldenExpectation {
    pub fn new(
        ticker: impl Into<String>,
        date: NaiveDate,
        labels: impl IntoIterator<Item = ExpectedLabel>,
    ) -> Self {
        Self {
            ticker: Some(ticker.into()),
            date: Some(date),
            expectation: Expectation::from_labels(labels),
        }
    }

    /// Parse either variant; the variant is detected from the first directive line.
    pub fn parse(text: &str) -> Result<Self, CheckError> {
        match detect_format(text) {
            GoldenFormat::ExpectLines => parse_expect_lines(text),
            GoldenFormat::KeyValue => parse_key_value(text),
        }
    }

    pub fn render(&self, format: GoldenFormat, notes: &[String]) -> String {
        match format {
            GoldenFormat::ExpectLines => self.render_expect_lines(notes),
            GoldenFormat::KeyValue => self.render_key_value(notes),
        }
    }

    fn render_expect_lines(&self, notes: &[String]) -> String {
        let mut out = String::from("// NanoTrade Golden Reference\n");
        out.push_str(&format!(
            "// Ticker: {}  Date: {}\n",
            self.ticker.as_deref().unwrap_or("?"),
            self.date
                .map(|d| d.format(GOLDEN_DATE_FORMAT).to_string())
                .unwrap_or_else(|| "?".to_string())
        ));
        out.push_str(&format!("// Expected alerts: {}\n", self.expectation.summary()));
        for note in notes {
            out.push_str(&format!("// {}\n", note));
        }
        out.push_str("//\n// Format: EXPECT <ALERT_TYPE>  (chip should fire at least once)\n");
        match &self.expectation {
            Expectation::NoAlerts => out.push_str("EXPECT NONE\n"),
            Expectation::Alerts(labels) => {
                for l in labels {
                    out.push_str(&format!("EXPECT {}\n", l.token()));
                }
            }
        }
        out
    }

    fn render_key_value(&self, notes: &[String]) -> String {
        let mut out = String::new();
        for note in notes {
            out.push_str(&format!("// {}\n", note));
        }
        if let Some(t) = &self.ticker {
            out.push_str(&format!("TICKER={}\n", t));
        }
        if let Some(d) = self.date {
            out.push_str(&format!("DATE={}\n", d.format(GOLDEN_DATE_FORMAT)));
        }
        let expected = match &self.expectation {
            Expectation::NoAlerts => "NONE".to_string(),
            Expectation::Alerts(labels) => labels
                .iter()
                .map(|l| l.token())
                .collect::<Vec<_>>()
                .join(","),
        };
        out.push_str(&format!("EXPECTED={}\n", expected));
        out
    }
}

/// Read and parse a golden file.
pub fn read_golden(path: impl AsRef<Path>) -> Result<GoldenExpectation, CheckError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| CheckError::from_io(InputRole::Golden, path, e))?;
    GoldenExpectation::parse(&text)
}

/// Render and write a golden file atomically.
pub fn write_golden(
    path: impl AsRef<Path>,
    golden: &GoldenExpectation,
    format: GoldenFormat,
    notes: &[String],
) -> Result<(), CheckError> {
    let path = path.as_ref();
    write_atomic(path, &golden.render(format, notes)).map_err(|source| CheckError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_comment(line: &str) -> bool {
    line.starts_with("//") || line.starts_with('#')
}

fn detect_format(text: &str) -> GoldenFormat {
    let first = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !is_comment(l));
    match first {
        Some(line) if line.contains('=') && !line.to_ascii_uppercase().starts_with("EXPECT ") => {
            GoldenFormat::KeyValue
        }
        _ => GoldenFormat::ExpectLines,
    }
}

fn parse_date(value: &str, line: usize) -> Result<NaiveDate, CheckError> {
    NaiveDate::parse_from_str(value.trim(), GOLDEN_DATE_FORMAT).map_err(|e| CheckError::MalformedGolden {
        line,
        reason: format!("bad date '{}': {}", value.trim(), e),
    })
}

/// Lift `Ticker: X` / `Date: Y` out of a variant-A comment.
fn comment_field<'a>(comment: &'a str, key: &str) -> Option<&'a str> {
    let mut tokens = comment.split_whitespace();
    while let Some(tok) = tokens.next() {
        if tok.eq_ignore_ascii_case(key) {
            return tokens.next();
        }
    }
    None
}

fn parse_expect_lines(text: &str) -> Result<GoldenExpectation, CheckError> {
    let mut ticker = None;
    let mut date = None;
    let mut labels = Vec::new();
    let mut saw_none = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if is_comment(line) {
            if ticker.is_none() {
                ticker = comment_field(line, "Ticker:").map(str::to_string);
            }
            if date.is_none() {
                date = comment_field(line, "Date:")
                    .and_then(|d| NaiveDate::parse_from_str(d, GOLDEN_DATE_FORMAT).ok());
            }
            continue;
        }

        let mut tokens = line.split_whitespace();
        let directive = tokens.next().unwrap_or_default();
        if !directive.eq_ignore_ascii_case("EXPECT") {
            return Err(CheckError::MalformedGolden {
                line: line_no,
                reason: format!("unknown directive '{}'", directive),
            });
        }
        let name = tokens.next().ok_or(CheckError::MalformedGolden {
            line: line_no,
            reason: "EXPECT without a label".to_string(),
        })?;
        if name.eq_ignore_ascii_case("NONE") {
            saw_none = true;
        } else {
            labels.push(ExpectedLabel::parse(name));
        }
    }

    let expectation = match (saw_none, labels.is_empty()) {
        (true, true) => Expectation::NoAlerts,
        (false, false) => Expectation::from_labels(labels),
        (true, false) => {
            return Err(CheckError::MalformedGolden {
                line: 0,
                reason: "EXPECT NONE combined with expected labels".to_string(),
            })
        }
        (false, true) => {
            return Err(CheckError::MalformedGolden {
                line: 0,
                reason: "no EXPECT lines".to_string(),
            })
        }
    };

    Ok(GoldenExpectation {
        ticker,
        date,
        expectation,
    })
}

fn parse_key_value(text: &str) -> Result<GoldenExpectation, CheckError> {
    let mut ticker = None;
    let mut date = None;
    let mut expectation = None;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or(CheckError::MalformedGolden {
            line: line_no,
            reason: format!("expected KEY=VALUE, got '{}'", line),
        })?;
        match key.trim().to_ascii_uppercase().as_str() {
            "TICKER" => ticker = Some(value.trim().to_string()),
            "DATE" => date = Some(parse_date(value, line_no)?),
            "EXPECTED" => {
                let tokens: Vec<&str> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .collect();
                let is_none = tokens.is_empty()
                    || (tokens.len() == 1 && tokens[0].eq_ignore_ascii_case("NONE"));
                if !is_none && tokens.iter().any(|t| t.eq_ignore_ascii_case("NONE")) {
                    return Err(CheckError::MalformedGolden {
                        line: line_no,
                        reason: "NONE combined with expected labels".to_string(),
                    });
                }
                expectation = Some(if is_none {
                    Expectation::NoAlerts
                } else {
                    Expectation::from_labels(tokens.into_iter().map(ExpectedLabel::parse))
                });
            }
            other => {
                return Err(CheckError::MalformedGolden {
                    line: line_no,
                    reason: format!("unknown key '{}'", other),
                })
            }
        }
    }

    let expectation = expectation.ok_or(CheckError::MalformedGolden {
        line: 0,
        reason: "missing EXPECTED= line".to_string(),
    })?;

    Ok(GoldenExpectation {
        ticker,
        date,
        expectation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, GOLDEN_DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_parse_expect_lines() {
        let text = "// NanoTrade Golden Reference\n\
                    // Ticker: GME  Date: 2021-01-28  Source: synthetic\n\
                    EXPECT FLASH_CRASH\n\
                    EXPECT VOLUME_SURGE\n\
                    EXPECT FLASH_CRASH\n\
                    EXPECT QUOTE_STUFFING_ML\n";
        let g = GoldenExpectation::parse(text).unwrap();
        assert_eq!(g.ticker.as_deref(), Some("GME"));
        assert_eq!(g.date, Some(date("2021-01-28")));
        assert_eq!(
            g.expectation.labels(),
            &[
                ExpectedLabel::rule_or_ml(AlertLabel::FlashCrash),
                ExpectedLabel::rule_or_ml(AlertLabel::VolumeSurge),
                ExpectedLabel::ml_only(AlertLabel::QuoteStuffing),
            ]
        );
    }

    #[test]
    fn test_parse_expect_none() {
        let g = GoldenExpectation::parse("// quiet day\nEXPECT NONE\n").unwrap();
        assert!(g.expectation.is_none());
        assert_eq!(g.ticker, None);
    }

    #[test]
    fn test_parse_key_value() {
        let text = "TICKER=ZM\nDATE=2020-03-16\nEXPECTED=VOLUME_SURGE, PRICE_SPIKE,FLASH_CRASH_ML\n";
        let g = GoldenExpectation::parse(text).unwrap();
        assert_eq!(g.ticker.as_deref(), Some("ZM"));
        assert_eq!(g.date, Some(date("2020-03-16")));
        assert_eq!(g.expectation.labels().len(), 3);
        assert!(g.expectation.labels()[2].ml_only);
        assert_eq!(g.expectation.labels()[2].label, LabelRef::Known(AlertLabel::FlashCrash));
    }

    #[test]
    fn test_key_value_none_and_empty() {
        assert!(GoldenExpectation::parse("EXPECTED=NONE\n").unwrap().expectation.is_none());
        assert!(GoldenExpectation::parse("TICKER=KO\nEXPECTED=\n").unwrap().expectation.is_none());
    }

    #[test]
    fn test_unknown_labels_are_kept() {
        let g = GoldenExpectation::parse("EXPECT MOON_SHOT\nEXPECT WEIRD_ML\n").unwrap();
        assert_eq!(g.expectation.labels()[0].label, LabelRef::Unknown("MOON_SHOT".into()));
        assert!(g.expectation.labels()[1].ml_only);
        assert_eq!(g.expectation.labels()[1].label.name(), "WEIRD");
    }

    #[test]
    fn test_malformed_goldens() {
        assert!(GoldenExpectation::parse("// nothing here\n").is_err());
        assert!(GoldenExpectation::parse("").is_err());
        assert!(GoldenExpectation::parse("EXPECT NONE\nEXPECT FLASH_CRASH\n").is_err());
        assert!(GoldenExpectation::parse("EXPECTING FLASH_CRASH\n").is_err());
        assert!(GoldenExpectation::parse("EXPECT\n").is_err());
        assert!(GoldenExpectation::parse("TICKER=GME\nDATE=2021-13-45\nEXPECTED=NONE\n").is_err());
        assert!(GoldenExpectation::parse("TICKER=GME\n").is_err());
        assert!(GoldenExpectation::parse("TICKER=GME\nSOURCE=x\nEXPECTED=NONE\n").is_err());
        assert!(GoldenExpectation::parse("EXPECTED=NONE,FLASH_CRASH\n").is_err());
    }

    #[test]
    fn test_render_parses_back_in_both_formats() {
        let g = GoldenExpectation::new(
            "ACN",
            date("2010-05-06"),
            [
                ExpectedLabel::rule_or_ml(AlertLabel::FlashCrash),
                ExpectedLabel::ml_only(AlertLabel::PriceSpike),
            ],
        );
        let notes = vec!["Source: synthetic".to_string(), "Total bars: 390".to_string()];
        for format in [GoldenFormat::ExpectLines, GoldenFormat::KeyValue] {
            let text = g.render(format, &notes);
            assert_eq!(GoldenExpectation::parse(&text).unwrap(), g, "{}", text);
        }
    }

    #[test]
    fn test_write_and_read_golden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SPY_20190604_golden.txt");
        let g = GoldenExpectation::new("SPY", date("2019-06-04"), []);
        write_golden(&path, &g, GoldenFormat::ExpectLines, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("EXPECT NONE"));
        assert_eq!(read_golden(&path).unwrap(), g);
    }

    #[test]
    fn test_missing_golden_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_golden(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, CheckError::MissingInput { role: InputRole::Golden, .. }));
    }
}
