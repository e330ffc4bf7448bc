//! Bars -> stimulus, golden and info files for one scenario.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::checker::{write_golden, ExpectedLabel, GoldenExpectation};
use crate::config::PipelineConfig;
use crate::models::OhlcvBar;
use crate::stimulus::{write_stimulus, StimulusError};

use super::artifacts::write_info;
use super::catalog::Scenario;
use super::ScenarioError;

/// Where a job's bars came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BarSource {
    Synthetic { seed: u64 },
    File { path: PathBuf },
}

impl std::fmt::Display for BarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Synthetic { seed } => write!(f, "synthetic (seed {})", seed),
            Self::File { path } => write!(f, "file {}", path.display()),
        }
    }
}

/// One ticker-day ready to encode.
#[derive(Debug, Clone)]
pub struct ScenarioJob {
    /// Event name, or `custom` for ad-hoc bars files.
    pub name: String,
    pub label: String,
    pub golden: GoldenExpectation,
    pub bars: Vec<OhlcvBar>,
    pub source: BarSource,
}

impl ScenarioJob {
    /// Catalog scenario on its synthetic model. `seed_offset` shifts the seed.
    pub fn synthetic(scenario: &Scenario, seed_offset: u64) -> Self {
        let model = scenario.model();
        let seed = model.seed.wrapping_add(seed_offset);
        let bars = model
            .with_seed(seed)
            .generate(scenario.event.session_open());
        Self {
            name: scenario.event.name().to_string(),
            label: scenario.label.to_string(),
            golden: scenario.golden(),
            bars,
            source: BarSource::Synthetic { seed },
        }
    }

    /// Recorded bars from a JSON file.
    pub fn from_bars_file(
        path: impl AsRef<Path>,
        ticker: &str,
        date: NaiveDate,
        expected: Vec<ExpectedLabel>,
    ) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let bars = load_bars_json(path)?;
        Ok(Self {
            name: "custom".to_string(),
            label: format!("{} from {}", ticker, path.display()),
            golden: GoldenExpectation::new(ticker, date, expected),
            bars,
            source: BarSource::File {
                path: path.to_path_buf(),
            },
        })
    }

    pub fn ticker(&self) -> &str {
        self.golden.ticker.as_deref().unwrap_or("UNKNOWN")
    }

    /// `<TICKER>_<YYYYMMDD>`
    pub fn stem(&self) -> String {
        match self.golden.date {
            Some(d) => format!("{}_{}", self.ticker(), d.format("%Y%m%d")),
            None => self.ticker().to_string(),
        }
    }
}

/// Summary of one generated scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutput {
    pub name: String,
    pub ticker: String,
    pub date: Option<NaiveDate>,
    pub stem: String,
    pub source: BarSource,
    pub bars: usize,
    pub cycles: usize,
    pub warmup_cycles: usize,
    pub fingerprint: String,
    pub expected: String,
    pub stimulus_path: PathBuf,
    pub golden_path: PathBuf,
    pub info_path: PathBuf,
}

/// Encode a job and write its three artifacts under `out_dir`.
pub fn run_job(
    job: &ScenarioJob,
    config: &PipelineConfig,
    out_dir: &Path,
) -> Result<ScenarioOutput, ScenarioError> {
    let stem = job.stem();
    debug!(stem = %stem, bars = job.bars.len(), source = %job.source, "encoding scenario");

    let scaled = config.scaling.scale_bars(&job.bars, config.pressure.rule);
    let stream = config.assembler().assemble(&scaled)?;
    let fingerprint = stream.fingerprint();

    let stimulus_path = out_dir.join(format!("{}_stimulus.memh", stem));
    let golden_path = out_dir.join(format!("{}_golden.txt", stem));
    let info_path = out_dir.join(format!("{}_info.txt", stem));

    write_stimulus(&stimulus_path, &stream, config.file_options())?;

    let notes = vec![
        format!("Source: {}", job.source),
        format!("Total bars: {}", job.bars.len()),
        format!("Stream fingerprint: {}", fingerprint),
    ];
    write_golden(&golden_path, &job.golden, config.protocol.golden_format, &notes)?;
    write_info(&info_path, job, &scaled, &stream, config)?;

    let output = ScenarioOutput {
        name: job.name.clone(),
        ticker: job.ticker().to_string(),
        date: job.golden.date,
        stem,
        source: job.source.clone(),
        bars: job.bars.len(),
        cycles: stream.len(),
        warmup_cycles: stream.warmup_len(),
        fingerprint,
        expected: job.golden.expectation.summary(),
        stimulus_path,
        golden_path,
        info_path,
    };
    info!(
        stem = %output.stem,
        cycles = output.cycles,
        expected = %output.expected,
        "scenario written"
    );
    Ok(output)
}

/// Read a JSON array of bars. The series must be non-empty and time-ordered.
pub fn load_bars_json(path: impl AsRef<Path>) -> Result<Vec<OhlcvBar>, StimulusError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| StimulusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let bars: Vec<OhlcvBar> = serde_json::from_str(&text).map_err(|e| StimulusError::InvalidBars {
        reason: format!("{}: {}", path.display(), e),
    })?;
    if bars.is_empty() {
        return Err(StimulusError::EmptySeries);
    }
    if let Some(i) = bars.windows(2).position(|w| w[1].timestamp < w[0].timestamp) {
        return Err(StimulusError::InvalidBars {
            reason: format!("bar {} is earlier than bar {}", i + 1, i),
        });
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::catalog::{select, MarketEvent};

    #[test]
    fn test_synthetic_job_is_deterministic() {
        let s = select(Some(MarketEvent::FlashCrash2010), Some("ACN"))[0];
        let a = ScenarioJob::synthetic(s, 0);
        let b = ScenarioJob::synthetic(s, 0);
        assert_eq!(a.bars, b.bars);
        assert_eq!(a.source, BarSource::Synthetic { seed: 53 });
        assert_eq!(a.stem(), "ACN_20100506");
        let c = ScenarioJob::synthetic(s, 1);
        assert_eq!(c.source, BarSource::Synthetic { seed: 54 });
        assert_ne!(a.bars, c.bars);
    }

    #[test]
    fn test_load_bars_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.json");
        fs::write(
            &path,
            r#"[
  {"timestamp":"2021-01-28T14:30:00Z","open":148.0,"high":151.0,"low":147.0,"close":150.0,"volume":1000000},
  {"timestamp":"2021-01-28T14:31:00Z","open":150.0,"high":160.0,"low":149.0,"close":158.0,"volume":2500000}
]"#,
        )
        .unwrap();
        let bars = load_bars_json(&path).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 158.0);
    }

    #[test]
    fn test_load_bars_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty.json");
        fs::write(&empty, "[]").unwrap();
        assert!(matches!(load_bars_json(&empty), Err(StimulusError::EmptySeries)));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{not json").unwrap();
        assert!(matches!(load_bars_json(&garbage), Err(StimulusError::InvalidBars { .. })));

        let unordered = dir.path().join("unordered.json");
        fs::write(
            &unordered,
            r#"[
  {"timestamp":"2021-01-28T14:31:00Z","open":1,"high":1,"low":1,"close":1,"volume":1},
  {"timestamp":"2021-01-28T14:30:00Z","open":1,"high":1,"low":1,"close":1,"volume":1}
]"#,
        )
        .unwrap();
        assert!(matches!(load_bars_json(&unordered), Err(StimulusError::InvalidBars { .. })));

        assert!(matches!(
            load_bars_json(dir.path().join("missing.json")),
            Err(StimulusError::Io { .. })
        ));
    }
}
