//! Result Checker
//!
//! Grades a simulation transcript against a golden expectation:
//!
//! ```text
//! golden file  -> GoldenExpectation ─┐
//!                                    ├─> verify() -> VerificationResult -> PASS / FAIL
//! transcript   -> EvidenceMasks ─────┘
//! ```
//!
//! Structured `[FIRED_RULE_MASK]` / `[FIRED_ML_MASK]` lines are the primary
//! evidence. Free-text marker scanning is a degraded fallback and is reported
//! as such. Every lenient decision (ML unavailable, unmapped label) is listed
//! in the result and can be made fatal with `strict_leniency`.

pub mod golden;
pub mod labels;
pub mod transcript;
pub mod verifier;

pub use golden::{
    read_golden, write_golden, Expectation, ExpectedLabel, GoldenExpectation, GoldenFormat,
    LabelRef,
};
pub use labels::{AlertLabel, MAPPING_VERSION};
pub use transcript::{read_transcript, EvidenceMasks, EvidenceSource};
pub use verifier::{
    verify, LabelCheck, NoneStrictness, Satisfaction, Verdict, VerificationResult, VerifierConfig,
};

#[cfg(test)]
mod verifier_tests;

use std::path::{Path, PathBuf};

/// Which checker input a failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRole {
    Golden,
    Transcript,
}

impl InputRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Golden => "golden file",
            Self::Transcript => "result transcript",
        }
    }
}

/// Errors raised while loading or interpreting checker inputs.
///
/// All of these are fatal: the checker reports them and exits non-zero
/// rather than grading a run it cannot read.
#[derive(Debug)]
pub enum CheckError {
    MissingInput { role: InputRole, path: PathBuf },
    Io { path: PathBuf, source: std::io::Error },
    /// `line` is 1-based; 0 means the problem is the file as a whole.
    MalformedGolden { line: usize, reason: String },
    UnparsableEvidence { reason: String },
}

impl CheckError {
    /// Missing or unreadable inputs, as opposed to a malformed golden file.
    pub fn is_fatal_input(&self) -> bool {
        matches!(
            self,
            Self::MissingInput { .. } | Self::Io { .. } | Self::UnparsableEvidence { .. }
        )
    }

    pub(crate) fn from_io(role: InputRole, path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::MissingInput {
                role,
                path: path.to_path_buf(),
            }
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingInput { role, path } => {
                write!(f, "{} not found: {}", role.as_str(), path.display())
            }
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::MalformedGolden { line: 0, reason } => write!(f, "malformed golden: {}", reason),
            Self::MalformedGolden { line, reason } => {
                write!(f, "malformed golden (line {}): {}", line, reason)
            }
            Self::UnparsableEvidence { reason } => {
                write!(f, "unparsable transcript: {}", reason)
            }
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
