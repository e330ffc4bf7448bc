//! Stimulus Generator
//!
//! Builds stimulus, golden and info files for the scenario catalog (or a
//! single recorded bars file) plus a `run_all_scenarios.sh` driver.
//!
//! Usage:
//!   gen_stimuli --out-dir stimuli
//!   gen_stimuli --event flash --layout split_flow --encoding word16
//!   gen_stimuli --bars gme.json --ticker GME --date 2021-01-28 --expect FLASH_CRASH,VOLUME_SURGE
//!
//! Environment:
//!   NANOTRADE_CONFIG - TOML config file (default: nanotrade.toml)
//!   RUST_LOG         - log filter (logs go to stderr)

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use rayon::prelude::*;
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use nanotrade_bridge::checker::{ExpectedLabel, GoldenFormat};
use nanotrade_bridge::config::PipelineConfig;
use nanotrade_bridge::scenario::{
    run_job, select, write_run_script, MarketEvent, ScenarioJob, ScenarioOutput,
};
use nanotrade_bridge::stimulus::{
    LayoutRevision, PressureRule, PriceScaling, TextEncoding, VolumeScaling,
};

#[derive(Parser, Debug)]
#[command(name = "gen_stimuli")]
#[command(about = "Encode market sessions into NanoTrade stimulus and golden files")]
struct Args {
    /// TOML config file
    #[arg(long, env = "NANOTRADE_CONFIG")]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Only this event (meme, flash, covid, quiet or a full event name)
    #[arg(long)]
    event: Option<String>,

    /// Only this ticker (with --bars: the ticker of the bars file)
    #[arg(long)]
    ticker: Option<String>,

    /// JSON array of recorded bars instead of the synthetic catalog
    #[arg(long, requires_all = ["ticker", "date"])]
    bars: Option<PathBuf>,

    /// Session date for --bars (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Expected alerts for --bars, comma-separated (suffix _ML for ML-only)
    #[arg(long, value_delimiter = ',')]
    expect: Vec<String>,

    /// Wire layout: ohlc_burst | split_flow
    #[arg(long)]
    layout: Option<LayoutRevision>,

    /// Text encoding: pin_bytes | word16
    #[arg(long)]
    encoding: Option<TextEncoding>,

    /// Price scaling: range_anchored | mean_percentage
    #[arg(long)]
    price_scaling: Option<String>,

    /// Volume scaling: median_normalized | first_bar_normalized
    #[arg(long)]
    volume_scaling: Option<String>,

    /// Pressure rule: candle_direction | intrabar_position
    #[arg(long)]
    pressure: Option<PressureRule>,

    /// Warm-up cycles before the first bar
    #[arg(long)]
    warmup: Option<usize>,

    /// Base order quantity (1-63)
    #[arg(long)]
    order_qty: Option<u8>,

    /// Emit `//` header lines in stimulus files
    #[arg(long)]
    header: bool,

    /// Golden file variant: expect_lines | key_value
    #[arg(long)]
    golden_format: Option<GoldenFormat>,

    /// Added to every synthetic seed
    #[arg(long)]
    seed_offset: Option<u64>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(Level::INFO.into())
                .add_directive("gen_stimuli=debug".parse()?),
        )
        .init();
    Ok(())
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::from_env(),
    };

    if let Some(dir) = &args.out_dir {
        config.output.dir = dir.clone();
    }
    if let Some(layout) = args.layout {
        config.protocol.layout = layout;
    }
    if let Some(encoding) = args.encoding {
        config.protocol.encoding = encoding;
    }
    if let Some(name) = &args.price_scaling {
        config.scaling.price = match name.as_str() {
            "range_anchored" => PriceScaling::range_anchored(),
            "mean_percentage" => PriceScaling::mean_percentage(),
            other => bail!("unknown price scaling '{}'", other),
        };
    }
    if let Some(name) = &args.volume_scaling {
        config.scaling.volume = match name.as_str() {
            "median_normalized" => VolumeScaling::median_normalized(),
            "first_bar_normalized" => VolumeScaling::first_bar_normalized(),
            other => bail!("unknown volume scaling '{}'", other),
        };
    }
    if let Some(rule) = args.pressure {
        config.pressure.rule = rule;
    }
    if let Some(warmup) = args.warmup {
        config.protocol.warmup_cycles = warmup;
    }
    if let Some(qty) = args.order_qty {
        config.protocol.order_qty = qty;
    }
    if args.header {
        config.protocol.header_comments = true;
    }
    if let Some(format) = args.golden_format {
        config.protocol.golden_format = format;
    }
    if let Some(offset) = args.seed_offset {
        config.output.seed_offset = offset;
    }
    Ok(config)
}

fn build_jobs(args: &Args, config: &PipelineConfig) -> Result<Vec<ScenarioJob>> {
    if let Some(bars) = &args.bars {
        let ticker = args.ticker.as_deref().ok_or_else(|| anyhow!("--bars needs --ticker"))?;
        let date = args.date.ok_or_else(|| anyhow!("--bars needs --date"))?;
        let expected = args
            .expect
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("NONE"))
            .map(ExpectedLabel::parse)
            .collect();
        let job = ScenarioJob::from_bars_file(bars, &ticker.to_ascii_uppercase(), date, expected)
            .with_context(|| format!("loading bars {}", bars.display()))?;
        return Ok(vec![job]);
    }

    let event = match &args.event {
        Some(name) => Some(
            MarketEvent::from_name(name).ok_or_else(|| anyhow!("unknown event '{}'", name))?,
        ),
        None => None,
    };
    let scenarios = select(event, args.ticker.as_deref());
    if scenarios.is_empty() {
        bail!("no scenario matches the event/ticker filter");
    }
    let offset = config.output.seed_offset;
    Ok(scenarios
        .par_iter()
        .map(|s| ScenarioJob::synthetic(s, offset))
        .collect())
}

fn print_summary(outputs: &[ScenarioOutput]) {
    println!(
        "{:<8} {:<12} {:<24} {:<6} {:<8} Expected",
        "Stock", "Date", "Source", "Bars", "Cycles"
    );
    println!("{}", "-".repeat(80));
    for o in outputs {
        println!(
            "{:<8} {:<12} {:<24} {:<6} {:<8} {}",
            o.ticker,
            o.date.map(|d| d.to_string()).unwrap_or_default(),
            o.source.to_string(),
            o.bars,
            o.cycles,
            o.expected
        );
    }
}

fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();
    let config = build_config(&args)?;
    let out_dir = config.output.dir.clone();

    info!("Starting stimulus generation");
    info!("  Output: {}", out_dir.display());
    info!(
        "  Protocol: {} / {} / warm-up {}",
        config.protocol.layout.as_str(),
        config.protocol.encoding.as_str(),
        config.protocol.warmup_cycles
    );
    info!(
        "  Scaling: {} / {}",
        config.scaling.price.as_str(),
        config.scaling.volume.as_str()
    );

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let jobs = build_jobs(&args, &config)?;
    let results: Vec<_> = jobs
        .par_iter()
        .map(|job| (job.stem(), run_job(job, &config, &out_dir)))
        .collect();

    let mut outputs = Vec::new();
    let mut failed = 0usize;
    for (stem, result) in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(e) => {
                error!("{}: {}", stem, e);
                failed += 1;
            }
        }
    }

    let script = write_run_script(&out_dir, &outputs).context("writing run script")?;
    info!("Run script: {}", script.display());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    } else {
        print_summary(&outputs);
    }

    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, failed + outputs.len());
    }
    Ok(())
}
