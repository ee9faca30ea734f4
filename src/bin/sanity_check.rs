//! RPC Sanity Check
//!
//! Verifies that the configured endpoints answer and agree on the chain
//! before an experiment run. Every check is attempted; a failing one is
//! reported and the tool moves on.
//!
//! Usage:
//!   cargo run --release --bin sanity_check
//!   cargo run --release --bin sanity_check -- --json

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};

use monad_microstructure::config::AppConfig;
use monad_microstructure::rpc::{BlockSummary, BlockTag, JsonRpcClient, MONAD};
use monad_microstructure::telemetry;

#[derive(Parser, Debug)]
#[command(name = "sanity_check")]
#[command(about = "Check connectivity and chain identity of the configured RPC endpoints")]
struct Args {
    /// Print the report as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct EndpointCheck {
    role: &'static str,
    url: String,
    chain_id: Option<u64>,
    chain_id_matches: bool,
    block_number: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SanityReport {
    expected_chain_id: u64,
    endpoints: Vec<EndpointCheck>,
    gas_price_gwei: Option<f64>,
    latest_block: Option<BlockSummary>,
    passed: bool,
}

async fn check_endpoint(role: &'static str, url: &str) -> EndpointCheck {
    let mut check = EndpointCheck {
        role,
        url: url.to_string(),
        chain_id: None,
        chain_id_matches: false,
        block_number: None,
        error: None,
    };

    let client = match JsonRpcClient::new(url) {
        Ok(c) => c,
        Err(e) => {
            check.error = Some(format!("{:#}", e));
            return check;
        }
    };

    match client.chain_id().await {
        Ok(id) => {
            check.chain_id = Some(id);
            check.chain_id_matches = id == MONAD.id;
        }
        Err(e) => check.error = Some(format!("{:#}", e)),
    }

    match client.block_number().await {
        Ok(n) => check.block_number = Some(n),
        Err(e) => {
            check.error.get_or_insert_with(|| format!("{:#}", e));
        }
    }

    if check.error.is_some() {
        warn!(role, url, error = ?check.error, "Endpoint check failed");
    } else {
        info!(role, url, chain_id = ?check.chain_id, block = ?check.block_number, "Endpoint ok");
    }
    check
}

fn wei_to_gwei(wei: u128) -> f64 {
    wei as f64 / 1e9
}

fn print_text(report: &SanityReport) {
    println!("=== {} RPC sanity check (chain id {}) ===", MONAD.name, report.expected_chain_id);
    for ep in &report.endpoints {
        let status = if ep.error.is_none() && ep.chain_id_matches { "OK  " } else { "FAIL" };
        println!(
            "[{}] {:<12} {}  chain_id={:?} block={:?}",
            status, ep.role, ep.url, ep.chain_id, ep.block_number
        );
        if let Some(err) = &ep.error {
            println!("       error: {}", err);
        }
    }
    match report.gas_price_gwei {
        Some(g) => println!("gas price: {:.3} gwei", g),
        None => println!("gas price: unavailable"),
    }
    match &report.latest_block {
        Some(b) => println!(
            "latest block: #{} ts={} txs={} gas={}/{}",
            b.number, b.timestamp, b.tx_count, b.gas_used, b.gas_limit
        ),
        None => println!("latest block: unavailable"),
    }
    println!("result: {}", if report.passed { "PASS" } else { "FAIL" });
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    telemetry::init_tracing();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    let mut endpoints = Vec::with_capacity(3);
    for (role, url) in [
        ("write", &config.rpc.write),
        ("read", &config.rpc.read),
        ("read_backup", &config.rpc.read_backup),
    ] {
        endpoints.push(check_endpoint(role, url).await);
    }

    let mut gas_price_gwei = None;
    let mut latest_block = None;
    match JsonRpcClient::new(config.rpc.read.as_str()) {
        Ok(client) => {
            match client.gas_price().await {
                Ok(wei) => gas_price_gwei = Some(wei_to_gwei(wei)),
                Err(e) => warn!(error = %format!("{:#}", e), "Gas price check failed"),
            }
            match client.get_block(BlockTag::Latest).await {
                Ok(block) => latest_block = Some(block),
                Err(e) => warn!(error = %format!("{:#}", e), "Latest block check failed"),
            }
        }
        Err(e) => warn!(error = %format!("{:#}", e), "Read client unavailable"),
    }

    let passed = endpoints
        .iter()
        .all(|ep| ep.error.is_none() && ep.chain_id_matches)
        && gas_price_gwei.is_some()
        && latest_block.is_some();

    let report = SanityReport {
        expected_chain_id: MONAD.id,
        endpoints,
        gas_price_gwei,
        latest_block,
        passed,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_text(&report);
    }

    if !report.passed {
        std::process::exit(1);
    }
    Ok(())
}
