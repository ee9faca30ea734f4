//! Chunked Log Fetch
//!
//! Pulls eth_getLogs results for a block range through the rate-limited
//! chunked fetcher. When a sub-range fails on the primary read endpoint the
//! remainder is fetched from the backup endpoint, which has its own limiter.
//! Ctrl-C stops before the next sub-range and still writes what was fetched.
//!
//! Usage:
//!   cargo run --release --bin fetch_logs -- --from 1000 --to 5000 --address 0x... -o logs.json
//!   cargo run --release --bin fetch_logs -- --config run.toml --from 1000 --to 5000
//!
//! Environment Variables:
//!   RPC_READ, RPC_READ_BACKUP - endpoints
//!   MAX_RPS, LOG_BLOCK_CHUNK_SIZE, BATCH_DELAY_MS - pacing

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use monad_microstructure::config::{AppConfig, RateLimits};
use monad_microstructure::fetcher::{ChunkedLogFetcher, FetchError};
use monad_microstructure::rate_limit::RateLimiter;
use monad_microstructure::rpc::{BlockRange, JsonRpcClient, LogFilter, LogRecord, LogSource};
use monad_microstructure::telemetry;

#[derive(Parser, Debug)]
#[command(name = "fetch_logs")]
#[command(about = "Rate-limited chunked eth_getLogs fetch with backup endpoint fallback")]
struct Args {
    /// First block (inclusive)
    #[arg(long)]
    from: u64,

    /// Last block (inclusive)
    #[arg(long)]
    to: u64,

    /// Contract address to filter on
    #[arg(long)]
    address: Option<String>,

    /// Topic filter, positional; pass "*" to match anything in that slot
    #[arg(long = "topic")]
    topics: Vec<String>,

    /// Override LOG_BLOCK_CHUNK_SIZE
    #[arg(long)]
    chunk_size: Option<u64>,

    /// Output file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not fall back to RPC_READ_BACKUP
    #[arg(long)]
    no_fallback: bool,

    /// TOML config file used instead of the environment
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct FetchOutput<'a> {
    range: BlockRange,
    complete: bool,
    /// First block not covered when incomplete
    resume_from: Option<u64>,
    sources: Vec<String>,
    log_count: usize,
    logs: &'a [LogRecord],
}

fn build_filter(args: &Args) -> LogFilter {
    let mut filter = LogFilter {
        address: args.address.clone(),
        topics: Vec::new(),
    };
    for topic in &args.topics {
        let slot = if topic == "*" { None } else { Some(topic.clone()) };
        filter = filter.with_topic(slot);
    }
    filter
}

fn build_fetcher(endpoint: &str, limits: &RateLimits) -> Result<ChunkedLogFetcher> {
    let client: Arc<dyn LogSource> = Arc::new(JsonRpcClient::new(endpoint)?);
    let limiter = Arc::new(RateLimiter::new(limits.max_rps)?);
    Ok(ChunkedLogFetcher::from_config(client, limiter, limits)?)
}

enum Outcome {
    Complete,
    Stopped { resume_from: Option<u64> },
}

async fn run(
    args: &Args,
    config: &AppConfig,
    range: BlockRange,
    filter: &LogFilter,
    cancel: &CancellationToken,
    logs: &mut Vec<LogRecord>,
    sources: &mut Vec<String>,
) -> Result<Outcome> {
    let primary = build_fetcher(&config.rpc.read, &config.rate_limits)?;
    sources.push(primary.source_name().to_string());

    let err = match primary.fetch_with_cancel(range, filter, cancel).await {
        Ok(batch) => {
            logs.extend(batch);
            return Ok(Outcome::Complete);
        }
        Err(e) => e,
    };

    let remaining = err.remaining(range);
    let retry_on_backup = matches!(err, FetchError::Query { .. }) && !args.no_fallback;
    if !retry_on_backup {
        if let FetchError::Query { .. } = &err {
            warn!(error = %err, "Primary fetch failed, fallback disabled");
        }
        let resume_from = err.resume_from();
        logs.extend(err.into_partial());
        return Ok(Outcome::Stopped { resume_from });
    }

    warn!(error = %err, "Primary fetch failed, resuming on backup endpoint");
    logs.extend(err.into_partial());
    let Some(remaining) = remaining else {
        return Ok(Outcome::Complete);
    };

    let backup = build_fetcher(&config.rpc.read_backup, &config.rate_limits)?;
    sources.push(backup.source_name().to_string());
    info!(range = %remaining, source = backup.source_name(), "Resuming on backup");

    match backup.fetch_with_cancel(remaining, filter, cancel).await {
        Ok(batch) => {
            logs.extend(batch);
            Ok(Outcome::Complete)
        }
        Err(e) => {
            warn!(error = %e, "Backup fetch stopped");
            let resume_from = e.resume_from();
            logs.extend(e.into_partial());
            Ok(Outcome::Stopped { resume_from })
        }
    }
}

fn write_output(path: Option<&PathBuf>, output: &FetchOutput<'_>) -> Result<()> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, output)?;
            writer.flush()?;
            info!(path = %path.display(), logs = output.log_count, "Wrote logs");
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, output)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => AppConfig::from_toml_file(path)?,
        None => AppConfig::from_env()?,
    };
    if let Some(chunk_size) = args.chunk_size {
        config.rate_limits.log_block_chunk_size = chunk_size;
        config.validate()?;
    }

    let range = BlockRange::new(args.from, args.to)?;
    let filter = build_filter(&args);

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after current chunk");
            cancel_on_signal.cancel();
        }
    });

    let mut logs = Vec::new();
    let mut sources = Vec::new();
    let outcome = run(&args, &config, range, &filter, &cancel, &mut logs, &mut sources).await?;

    let (complete, resume_from) = match outcome {
        Outcome::Complete => (true, None),
        Outcome::Stopped { resume_from } => (false, resume_from),
    };

    let output = FetchOutput {
        range,
        complete,
        resume_from,
        sources,
        log_count: logs.len(),
        logs: &logs,
    };
    write_output(args.output.as_ref(), &output)?;

    if !complete {
        warn!(resume_from = ?resume_from, fetched = logs.len(), "Fetch incomplete");
        std::process::exit(2);
    }
    Ok(())
}
