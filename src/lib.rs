//! NanoTrade Bridge Library
//!
//! Encodes market sessions into stimulus files for the NanoTrade anomaly
//! detector and grades simulation transcripts against golden expectations.
//! Used by the `gen_stimuli` and `check_results` binaries and by tests.

pub mod atomic_file;
pub mod checker;
pub mod config;
pub mod models;
pub mod scenario;
pub mod stimulus;

pub use config::PipelineConfig;
