//! Regionalization CLI.
//!
//! `sweep` writes the elbow series for the operator to inspect; `classify`
//! runs the final fit with the chosen k and writes the region grid plus a
//! model report. Grids are exchanged as JSON (`null` = no-data).

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use region_core::{
    Grid, KneeLocator, MaxDistanceKnee, NormalizeMode, ReferenceBand, RegionConfig, Regionalizer, StdConvention,
};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "regionalize", about = "Partition a multi-band grid into canonical k-means regions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run k = 1..=max-clusters and write the elbow series.
    Sweep {
        #[command(flatten)]
        common: CommonArgs,

        /// Output path for the elbow series JSON.
        #[arg(short, long, default_value = "elbow.json")]
        output: PathBuf,
    },
    /// Fit the chosen k and write the canonical region grid.
    Classify {
        #[command(flatten)]
        common: CommonArgs,

        /// Output path for the region grid JSON.
        #[arg(short, long, default_value = "regions.json")]
        output: PathBuf,

        /// Output path for the model report JSON.
        #[arg(short, long, default_value = "model.json")]
        model: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Multi-band grid JSON.
    #[arg(short, long)]
    input: PathBuf,

    /// Run configuration JSON; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    normalize: Option<NormalizeArg>,

    #[arg(long, value_enum)]
    std_convention: Option<StdArg>,

    #[arg(long)]
    max_clusters: Option<usize>,

    /// Operator-selected cluster count.
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    #[arg(long)]
    sample_size: Option<usize>,

    #[arg(long)]
    restarts: Option<usize>,

    #[arg(long)]
    max_iterations: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    /// Band index or name used for canonical label order.
    #[arg(short, long)]
    reference_band: Option<ReferenceBand>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum NormalizeArg {
    CenterAndScale,
    CenterOnly,
    ScaleOnly,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StdArg {
    Sample,
    Population,
}

impl CommonArgs {
    fn config(&self) -> Result<RegionConfig> {
        let mut cfg = match &self.config {
            Some(path) => serde_json::from_str(&read(path)?).with_context(|| format!("parsing {}", path.display()))?,
            None => RegionConfig::default(),
        };
        if let Some(n) = self.normalize {
            cfg.normalize = match n {
                NormalizeArg::CenterAndScale => NormalizeMode::CenterAndScale,
                NormalizeArg::CenterOnly => NormalizeMode::CenterOnly,
                NormalizeArg::ScaleOnly => NormalizeMode::ScaleOnly,
            };
        }
        if let Some(s) = self.std_convention {
            cfg.std_convention = match s {
                StdArg::Sample => StdConvention::Sample,
                StdArg::Population => StdConvention::Population,
            };
        }
        if let Some(v) = self.max_clusters {
            cfg.max_clusters = v;
        }
        if let Some(v) = self.clusters {
            cfg.chosen_clusters = Some(v);
        }
        if let Some(v) = self.sample_size {
            cfg.sample_size = v;
        }
        if let Some(v) = self.restarts {
            cfg.restarts = v;
        }
        if let Some(v) = self.max_iterations {
            cfg.max_iterations = v;
        }
        if let Some(v) = self.seed {
            cfg.seed = v;
        }
        if let Some(b) = &self.reference_band {
            cfg.reference_band = b.clone();
        }
        Ok(cfg)
    }

    fn grid(&self) -> Result<Grid> {
        let json = read(&self.input)?;
        Grid::from_json(&json).with_context(|| format!("loading grid {}", self.input.display()))
    }
}

// ── I/O helpers ───────────────────────────────────────────────────────────────

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?).with_context(|| format!("writing {}", path.display()))
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn sweep(common: &CommonArgs, output: &Path) -> Result<()> {
    let cfg = common.config()?;
    let grid = common.grid()?;
    let series = Regionalizer::new(cfg)?.sweep(&grid)?;

    eprintln!("\n{:>4} {:>16} {:>10}", "k", "within_ss", "drop");
    eprintln!("{}", "-".repeat(32));
    let mut prev: Option<f64> = None;
    for p in &series.points {
        let pct = prev.map(|w| format!("{:.1}%", 100.0 * (w - p.total_within_ss) / w.max(f64::MIN_POSITIVE)));
        eprintln!("{:>4} {:>16.4} {:>10}", p.k, p.total_within_ss, pct.unwrap_or_default());
        prev = Some(p.total_within_ss);
    }
    if !series.warnings.is_empty() {
        eprintln!("{} starts hit the iteration cap.", series.warnings.len());
    }
    match MaxDistanceKnee.locate(&series) {
        Some(k) => eprintln!("\nSuggested k (max distance to chord): {k}. Confirm with `classify -k`."),
        None => eprintln!("\nNo clear knee; inspect the series."),
    }

    write_json(output, &series)?;
    eprintln!("  -> {}", output.display());
    Ok(())
}

fn classify(common: &CommonArgs, output: &Path, model_path: &Path) -> Result<()> {
    let cfg = common.config()?;
    let grid = common.grid()?;
    let result = Regionalizer::new(cfg)?.regionalize(&grid)?;
    let report = result.report();

    eprintln!(
        "\nk = {}   within_ss = {:.4}   between/total = {:.3}",
        report.k,
        report.total_within_ss,
        report.between_ss / report.total_ss.max(f64::MIN_POSITIVE)
    );
    eprintln!("{:>6} {:>8}  center ({})", "label", "cells", report.bands.join(", "));
    for l in &report.labels {
        let center: Vec<String> = l.center.iter().map(|v| format!("{v:.3}")).collect();
        eprintln!("{:>6} {:>8}  {}", l.label, l.size, center.join(", "));
    }
    if !report.warnings.is_empty() {
        eprintln!("{} starts hit the iteration cap.", report.warnings.len());
    }

    write_json(output, &result.regions)?;
    write_json(model_path, &report)?;
    info!(regions = %output.display(), model = %model_path.display(), "outputs written");
    eprintln!("  -> {}\n  -> {}", output.display(), model_path.display());
    Ok(())
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Command::Sweep { common, output } => sweep(common, output),
        Command::Classify { common, output, model } => classify(common, output, model),
    }
}
