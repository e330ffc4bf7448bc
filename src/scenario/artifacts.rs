//! Human-readable scenario info and the batch run script.

use std::path::{Path, PathBuf};

use crate::atomic_file::write_atomic;
use crate::config::PipelineConfig;
use crate::models::ScaledBar;
use crate::stimulus::StimulusStream;

use super::pipeline::{ScenarioJob, ScenarioOutput};
use super::ScenarioError;

pub const RUN_SCRIPT_NAME: &str = "run_all_scenarios.sh";

fn range<I: Iterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

pub fn render_info(
    job: &ScenarioJob,
    scaled: &[ScaledBar],
    stream: &StimulusStream,
    config: &PipelineConfig,
) -> String {
    let mut out = String::from("NanoTrade Stimulus Info\n=======================\n");
    out.push_str(&format!("Scenario : {}\n", job.name));
    out.push_str(&format!("Ticker   : {}\n", job.ticker()));
    out.push_str(&format!(
        "Date     : {}\n",
        job.golden
            .date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "?".to_string())
    ));
    out.push_str(&format!("Label    : {}\n", job.label));
    out.push_str(&format!("Source   : {}\n", job.source));
    out.push_str(&format!("Bars     : {}\n", job.bars.len()));
    out.push_str(&format!(
        "Cycles   : {} ({} warm-up + {} x {})\n",
        stream.len(),
        stream.warmup_len(),
        stream.bar_count(),
        config.encoder().revision().words_per_bar()
    ));

    out.push_str(&format!(
        "\nLayout   : {}\nEncoding : {}\nPrice    : {}\nVolume   : {}\nPressure : {}\n",
        config.protocol.layout.as_str(),
        config.protocol.encoding.as_str(),
        config.scaling.price.as_str(),
        config.scaling.volume.as_str(),
        config.pressure.rule.as_str(),
    ));

    if let Some((lo, hi)) = range(job.bars.iter().map(|b| b.close)) {
        out.push_str(&format!("\nPrice range : ${:.2} to ${:.2}\n", lo, hi));
    }
    if let Some((lo, hi)) = range(job.bars.iter().map(|b| b.volume)) {
        out.push_str(&format!("Volume range: {:.0} to {:.0}\n", lo, hi));
    }
    if let Some((lo, hi)) = range(scaled.iter().map(|b| b.close as f64)) {
        out.push_str(&format!("Scaled close: {:.0} to {:.0}\n", lo, hi));
    }
    if let Some((lo, hi)) = range(scaled.iter().map(|b| b.volume as f64)) {
        out.push_str(&format!("Scaled vol  : {:.0} to {:.0}\n", lo, hi));
    }
    out.push_str(&format!("\nFingerprint : {}\n", stream.fingerprint()));

    out.push_str("\nExpected alerts:\n");
    let labels = job.golden.expectation.labels();
    if labels.is_empty() {
        out.push_str("  NONE (quiet baseline)\n");
    } else {
        for l in labels {
            out.push_str(&format!("  {}\n", l));
        }
    }
    out
}

pub(crate) fn write_info(
    path: &Path,
    job: &ScenarioJob,
    scaled: &[ScaledBar],
    stream: &StimulusStream,
    config: &PipelineConfig,
) -> Result<(), ScenarioError> {
    write_atomic(path, &render_info(job, scaled, stream, config)).map_err(|source| {
        ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Shell driver: simulate every scenario, then grade it with
/// `check_results <GOLDEN> <RESULT>`.
pub fn render_run_script(outputs: &[ScenarioOutput]) -> String {
    let rule = "=".repeat(50);
    let mut out = String::from(
        "#!/usr/bin/env bash\n\
         # NanoTrade: run every generated scenario through the simulator and grade it.\n\
         # Override SIM (simulator command) and CHECK (checker command) as needed.\n\
         set -u\n\n\
         DIR=\"$(cd \"$(dirname \"${BASH_SOURCE[0]}\")\" && pwd)\"\n\
         SIM=\"${SIM:-vvp sim_nanotrade}\"\n\
         CHECK=\"${CHECK:-check_results}\"\n\
         PASS=0; FAIL=0\n",
    );

    for o in outputs {
        let stimulus = file_name(&o.stimulus_path);
        let golden = file_name(&o.golden_path);
        let result = format!("{}_result.txt", o.stem);
        out.push_str(&format!(
            "\necho '{rule}'\necho 'SCENARIO: {stem} ({name})'\necho 'Expected: {expected}'\necho '{rule}'\n",
            rule = rule,
            stem = o.stem,
            name = o.name,
            expected = o.expected,
        ));
        out.push_str(&format!(
            "STIMULUS=\"$DIR/{stimulus}\" GOLDEN=\"$DIR/{golden}\" TICKER={ticker} $SIM | tee \"$DIR/{result}\"\n",
            stimulus = stimulus,
            golden = golden,
            ticker = o.ticker,
            result = result,
        ));
        out.push_str(&format!(
            "if $CHECK \"$DIR/{golden}\" \"$DIR/{result}\"; then PASS=$((PASS+1)); else FAIL=$((FAIL+1)); fi\n",
            golden = golden,
            result = result,
        ));
    }

    out.push_str(&format!(
        "\necho ''\necho '{rule}'\necho \"FINAL SCORE: $PASS passed, $FAIL failed\"\necho '{rule}'\n[ \"$FAIL\" -eq 0 ]\n",
        rule = rule
    ));
    out
}

/// Write the run script into `dir` and mark it executable.
pub fn write_run_script(dir: &Path, outputs: &[ScenarioOutput]) -> Result<PathBuf, ScenarioError> {
    let path = dir.join(RUN_SCRIPT_NAME);
    let io_err = |source: std::io::Error| ScenarioError::Io {
        path: path.clone(),
        source,
    };
    write_atomic(&path, &render_run_script(outputs)).map_err(io_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).map_err(io_err)?;
    }
    Ok(path)
}
