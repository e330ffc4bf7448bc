//! Result Checker
//!
//! Grades one simulation transcript against its golden file.
//!
//! Usage:
//!   check_results <GOLDEN> <RESULT>
//!   check_results --legacy-order <RESULT> <GOLDEN>
//!   check_results --strict-none --json stimuli/SPY_20190604_golden.txt out.txt
//!
//! Argument order is golden first, transcript second. `--legacy-order`
//! accepts the older transcript-first order.
//!
//! Exit status: 0 when the run passes, 1 when it fails, an input is
//! missing or unreadable, or the arguments are wrong. Reports go to
//! stdout, diagnostics to stderr.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::EnvFilter;

use nanotrade_bridge::checker::{
    read_golden, read_transcript, verify, NoneStrictness, VerificationResult,
};
use nanotrade_bridge::config::PipelineConfig;

#[derive(Parser, Debug)]
#[command(name = "check_results")]
#[command(about = "Compare a NanoTrade simulation transcript against its golden expectation")]
struct Args {
    /// Golden expectation file (transcript with --legacy-order)
    #[arg(value_name = "GOLDEN")]
    first: PathBuf,

    /// Simulation transcript (golden with --legacy-order)
    #[arg(value_name = "RESULT")]
    second: PathBuf,

    /// Arguments are <RESULT> <GOLDEN>
    #[arg(long)]
    legacy_order: bool,

    /// A NONE golden requires every rule bit clear, not just FLASH_CRASH
    #[arg(long)]
    strict_none: bool,

    /// Count unverifiable and unknown labels as misses
    #[arg(long)]
    strict_leniency: bool,

    /// TOML config file supplying [verifier] defaults
    #[arg(long, env = "NANOTRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Print the result as JSON instead of the text report
    #[arg(long)]
    json: bool,
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::WARN.into())
                .add_directive("check_results=info".parse()?),
        )
        .init();
    Ok(())
}

fn run(args: &Args) -> Result<VerificationResult> {
    let (golden_path, result_path) = if args.legacy_order {
        (&args.second, &args.first)
    } else {
        (&args.first, &args.second)
    };

    let mut verifier = match &args.config {
        Some(path) => {
            PipelineConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?
                .verifier
        }
        None => PipelineConfig::from_env().verifier,
    };
    if args.strict_none {
        verifier.none_strictness = NoneStrictness::ZeroAlerts;
    }
    if args.strict_leniency {
        verifier.strict_leniency = true;
    }

    let golden = read_golden(golden_path)?;
    let evidence = read_transcript(result_path)?;
    Ok(verify(&golden, &evidence, &verifier))
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => {
                let _ = e.print();
                return ExitCode::FAILURE;
            }
        },
    };
    if let Err(e) = init_tracing() {
        eprintln!("check_results: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(result) => {
            if args.json {
                match serde_json::to_string_pretty(&result) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("serializing result: {}", e);
                        return ExitCode::FAILURE;
                    }
                }
            } else {
                print!("{}", result.format_report());
            }
            ExitCode::from(result.exit_code() as u8)
        }
        Err(e) => {
            eprintln!("check_results: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
