//! Integration tests for the metrics_report CLI
//!
//! Writes recorded results to a temp directory, runs the binary on them and
//! checks the JSON report.

use std::path::Path;
use std::process::Command;

use monad_microstructure::metrics::{
    ConflictResult, ConflictWinner, LiquidationResult, ProbeOutcome, ProbeResult, Protocol,
};
use monad_microstructure::probe_tag::ProbeTag;

fn probe(seq: u32, send_block: u64, outcome: ProbeOutcome) -> ProbeResult {
    let mut p = ProbeResult::dispatched(
        format!("0x{:064x}", seq),
        "exp001",
        seq,
        Protocol::Kuru,
        "0xmarket",
        1_700_000_000_000 + seq as i64,
        send_block,
    );
    p.resolve(outcome).unwrap();
    p
}

fn included(block: u64, rc: f64) -> ProbeOutcome {
    ProbeOutcome::Included {
        block,
        gas_used: Some(21_000),
        reverted: false,
        rc: Some(rc),
    }
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> String {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
    path.display().to_string()
}

fn run_report(dir: &Path, args: &[&str]) -> serde_json::Value {
    let output = Command::new(env!("CARGO_BIN_EXE_metrics_report"))
        .current_dir(dir)
        .env_remove("REPORT_EXPERIMENT_ID")
        .env("EXPERIMENT_ID", "exp002")
        .env("RUST_LOG", "warn")
        .args(["--resamples", "300", "--seed", "7"])
        .args(args)
        .output()
        .expect("failed to run metrics_report");
    assert!(
        output.status.success(),
        "metrics_report failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("report is not JSON")
}

#[test]
fn test_report_from_recorded_results() {
    let dir = tempfile::tempdir().unwrap();

    let probes = vec![
        probe(0, 100, included(101, 0.01)),
        probe(1, 100, included(103, 0.01)),
        probe(2, 100, ProbeOutcome::Dropped),
    ];
    let conflicts = vec![ConflictResult {
        conflict_id: "c0".into(),
        order_id: "o0".into(),
        cancel_tx_hash: "0xc".into(),
        fill_tx_hash: "0xf".into(),
        cancel_send_time_ms: 10,
        fill_send_time_ms: 12,
        cancel_block: Some(500),
        fill_block: Some(500),
        winner: ConflictWinner::Cancel,
        rc_at_resolution: Some(0.3),
    }];
    let liquidations: Vec<LiquidationResult> = [1, 2, 2, 5]
        .into_iter()
        .map(|gap| {
            LiquidationResult::liquidated(format!("p{gap}"), 900, 900 + gap, vec![0.1; gap as usize], true)
                .unwrap()
        })
        .collect();

    let p = write_json(dir.path(), "probes.json", &probes);
    let c = write_json(dir.path(), "conflicts.json", &conflicts);
    let l = write_json(dir.path(), "liquidations.json", &liquidations);

    let report = run_report(
        dir.path(),
        &["--probes", &p, "--conflicts", &c, "--liquidations", &l],
    );

    let overall = &report["inclusion"]["overall"];
    assert_eq!(overall["total"], 3);
    assert_eq!(overall["next_block_inclusion_rate"], 0.5);
    assert_eq!(overall["avg_blocks_to_inclusion"], 2.0);
    assert_eq!(overall["revert_rate"], 0.0);

    let buckets = report["inclusion"]["by_bucket"].as_array().unwrap();
    assert_eq!(buckets.len(), 2);
    assert!(buckets.iter().any(|b| b["bucket"].is_null()));
    assert!(buckets.iter().any(|b| b["bucket"] == "baseline"));

    let ci = &report["inclusion"]["blocks_to_inclusion_ci"];
    assert_eq!(ci["point"], 2.0);
    assert!(ci["lower"].as_f64().unwrap() <= ci["upper"].as_f64().unwrap());

    assert_eq!(report["cancel"]["cancel_win_rate"], 1.0);

    let liq = &report["liquidation"]["all"];
    assert_eq!(liq["mean_gap"], 2.5);
    assert_eq!(liq["median_gap"], 2);
    assert_eq!(liq["max_gap"], 5);
    assert_eq!(liq["gap_distribution"]["2"], 2);
    assert_eq!(report["liquidation"]["virtual_positions"]["count"], 4);
    assert_eq!(report["liquidation"]["live_positions"]["count"], 0);
}

#[test]
fn test_experiment_filter_and_missing_sections() {
    let dir = tempfile::tempdir().unwrap();
    let mut other = probe(9, 10, ProbeOutcome::Dropped);
    other.experiment_id = "exp002".into();
    let probes = vec![probe(0, 10, included(11, 0.2)), other];
    let p = write_json(dir.path(), "probes.json", &probes);

    let report = run_report(dir.path(), &["--probes", &p, "--experiment", "exp001"]);

    assert_eq!(report["experiment_id"], "exp001");
    assert_eq!(report["inclusion"]["overall"]["total"], 1);
    assert_eq!(report["inclusion"]["overall"]["drop_rate"], 0.0);
    assert!(report.get("cancel").is_none());
    assert!(report.get("liquidation").is_none());
}

#[test]
fn test_acquisition_experiment_id_does_not_filter_report() {
    // run_report exports EXPERIMENT_ID=exp002 as the acquisition tools would.
    let dir = tempfile::tempdir().unwrap();
    let mut other = probe(9, 10, ProbeOutcome::Dropped);
    other.experiment_id = "exp002".into();
    let probes = vec![probe(0, 10, included(11, 0.2)), other];
    let p = write_json(dir.path(), "probes.json", &probes);

    let report = run_report(dir.path(), &["--probes", &p]);

    assert!(report["experiment_id"].is_null());
    assert_eq!(report["inclusion"]["overall"]["total"], 2);
}

#[test]
fn test_recorded_probe_tags_decode_from_calldata() {
    let probes: Vec<ProbeResult> = (0..5).map(|i| probe(i, 1, ProbeOutcome::Dropped)).collect();
    for p in &probes {
        let calldata = p.tag().append_to(&[0xa9, 0x05, 0x9c, 0xbb]);
        let tag = ProbeTag::from_calldata_hex(&format!("0x{}", hex::encode(&calldata))).unwrap();
        assert!(tag.matches("exp001", p.sequence_number));
        assert!(!tag.matches("exp002", p.sequence_number));
        assert_eq!(tag.sequence(), p.sequence_number);
    }
}
