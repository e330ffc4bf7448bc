//! Scenario generation
//!
//! Drives the encoder for whole trading sessions and writes the artifacts the
//! hardware test bench consumes:
//!
//! - `<TICKER>_<YYYYMMDD>_stimulus.memh`
//! - `<TICKER>_<YYYYMMDD>_golden.txt`
//! - `<TICKER>_<YYYYMMDD>_info.txt`
//! - `run_all_scenarios.sh`
//!
//! Scenarios share no state and may be generated in any order or in parallel.

pub mod artifacts;
pub mod catalog;
pub mod pipeline;
pub mod synthetic;

pub use artifacts::{render_info, render_run_script, write_run_script, RUN_SCRIPT_NAME};
pub use catalog::{catalog, select, MarketEvent, Scenario};
pub use pipeline::{load_bars_json, run_job, BarSource, ScenarioJob, ScenarioOutput};
pub use synthetic::{CandleShape, MarketModel, PricePhase, SESSION_BARS};

use crate::checker::CheckError;
use crate::stimulus::StimulusError;

#[derive(Debug)]
pub enum ScenarioError {
    Stimulus(StimulusError),
    Golden(CheckError),
    Io { path: std::path::PathBuf, source: std::io::Error },
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stimulus(e) => write!(f, "stimulus: {}", e),
            Self::Golden(e) => write!(f, "golden: {}", e),
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Stimulus(e) => Some(e),
            Self::Golden(e) => Some(e),
            Self::Io { source, .. } => Some(source),
        }
    }
}

impl From<StimulusError> for ScenarioError {
    fn from(e: StimulusError) -> Self {
        Self::Stimulus(e)
    }
}

impl From<CheckError> for ScenarioError {
    fn from(e: CheckError) -> Self {
        Self::Golden(e)
    }
}
