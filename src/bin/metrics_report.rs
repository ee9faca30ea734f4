//! Metrics Report
//!
//! Loads recorded probe, conflict and liquidation results (JSON arrays) and
//! prints a JSON report: inclusion metrics overall and per Rc bucket, cancel
//! race rates, liquidation gaps, and bootstrap confidence intervals.
//!
//! Usage:
//!   cargo run --release --bin metrics_report -- --probes probes.json
//!   cargo run --release --bin metrics_report -- --probes p.json --conflicts c.json \
//!       --liquidations l.json --resamples 5000 --seed 7 -o report.json

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use monad_microstructure::metrics::{
    compute_cancel_metrics, compute_inclusion_metrics, compute_liquidation_metrics,
    inclusion_metrics_by_bucket, split_by_origin, BootstrapConfig, CancelMetrics,
    ConfidenceInterval, ConflictResult, InclusionMetrics, LiquidationMetrics, LiquidationResult,
    ProbeResult, RcBucket, DEFAULT_ALPHA, DEFAULT_RESAMPLES,
};
use monad_microstructure::telemetry;

#[derive(Parser, Debug)]
#[command(name = "metrics_report")]
#[command(about = "Compute fairness metrics from recorded experiment results")]
struct Args {
    /// Probe results (JSON array)
    #[arg(long)]
    probes: Option<PathBuf>,

    /// Cancel/fill race results (JSON array)
    #[arg(long)]
    conflicts: Option<PathBuf>,

    /// Liquidation results (JSON array)
    #[arg(long)]
    liquidations: Option<PathBuf>,

    /// Only use probes from this experiment
    #[arg(long, env = "REPORT_EXPERIMENT_ID")]
    experiment: Option<String>,

    /// Bootstrap resamples
    #[arg(long, default_value_t = DEFAULT_RESAMPLES)]
    resamples: usize,

    /// Bootstrap significance level
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    alpha: f64,

    /// Bootstrap RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct BucketRow {
    /// `None` for probes without an Rc measurement
    bucket: Option<RcBucket>,
    metrics: InclusionMetrics,
}

#[derive(Debug, Serialize)]
struct InclusionSection {
    overall: InclusionMetrics,
    by_bucket: Vec<BucketRow>,
    blocks_to_inclusion_ci: ConfidenceInterval,
}

#[derive(Debug, Serialize)]
struct LiquidationSection {
    all: LiquidationMetrics,
    virtual_positions: LiquidationMetrics,
    live_positions: LiquidationMetrics,
    gap_ci: ConfidenceInterval,
}

#[derive(Debug, Serialize)]
struct Report {
    generated_at: DateTime<Utc>,
    experiment_id: Option<String>,
    bootstrap: BootstrapConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    inclusion: Option<InclusionSection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cancel: Option<CancelMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    liquidation: Option<LiquidationSection>,
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<T> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "Loaded");
    Ok(records)
}

fn inclusion_section(probes: &[ProbeResult], bootstrap: &BootstrapConfig) -> Result<InclusionSection> {
    let by_bucket = inclusion_metrics_by_bucket(probes)
        .into_iter()
        .map(|(bucket, metrics)| BucketRow { bucket, metrics })
        .collect();

    let delays: Vec<f64> = probes
        .iter()
        .filter(|p| p.status.is_included())
        .filter_map(|p| p.blocks_to_inclusion())
        .map(|d| d as f64)
        .collect();

    Ok(InclusionSection {
        overall: compute_inclusion_metrics(probes),
        by_bucket,
        blocks_to_inclusion_ci: bootstrap.mean_ci(&delays)?,
    })
}

fn liquidation_section(
    results: &[LiquidationResult],
    bootstrap: &BootstrapConfig,
) -> Result<LiquidationSection> {
    let (virtual_positions, live_positions) = split_by_origin(results);
    let gaps: Vec<f64> = results
        .iter()
        .filter(|r| !r.is_open())
        .map(|r| r.gap_blocks as f64)
        .collect();

    Ok(LiquidationSection {
        all: compute_liquidation_metrics(results),
        virtual_positions,
        live_positions,
        gap_ci: bootstrap.mean_ci(&gaps)?,
    })
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing();

    let args = Args::parse();
    let bootstrap = BootstrapConfig {
        resamples: args.resamples,
        alpha: args.alpha,
        seed: args.seed,
    };
    bootstrap.validate()?;

    let inclusion = match &args.probes {
        Some(path) => {
            let mut probes: Vec<ProbeResult> = load_json(path)?;
            if let Some(id) = &args.experiment {
                let before = probes.len();
                probes.retain(|p| &p.experiment_id == id);
                info!(experiment = %id, kept = probes.len(), of = before, "Filtered probes by experiment");
            }
            Some(inclusion_section(&probes, &bootstrap)?)
        }
        None => None,
    };

    let cancel = match &args.conflicts {
        Some(path) => {
            let conflicts: Vec<ConflictResult> = load_json(path)?;
            Some(compute_cancel_metrics(&conflicts))
        }
        None => None,
    };

    let liquidation = match &args.liquidations {
        Some(path) => {
            let results: Vec<LiquidationResult> = load_json(path)?;
            for r in &results {
                r.validate()
                    .with_context(|| format!("Invalid liquidation record {}", r.position_id))?;
            }
            Some(liquidation_section(&results, &bootstrap)?)
        }
        None => None,
    };

    let report = Report {
        generated_at: Utc::now(),
        experiment_id: args.experiment.clone(),
        bootstrap,
        inclusion,
        cancel,
        liquidation,
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote report");
        }
        None => println!("{}", json),
    }
    Ok(())
}
