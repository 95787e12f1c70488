use assert_cmd::Command;
use predicates::str::contains;

mod common;
use common::{LEDGER_CSV, TestWorkspace};

fn fintab() -> Command {
    Command::cargo_bin("fintab").expect("binary exists")
}

#[test]
fn classify_reports_types_and_writes_decisions() {
    let ws = TestWorkspace::new();
    let csv_path = ws.write("ledger.csv", LEDGER_CSV);
    let meta_path = ws.path().join("ledger.yml");

    fintab()
        .args([
            "classify",
            "-i",
            csv_path.to_str().unwrap(),
            "--meta",
            meta_path.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("amount"))
        .stdout(contains("identifier"))
        .stdout(contains("day-first"));

    let yaml = std::fs::read_to_string(&meta_path).expect("read decisions");
    assert!(yaml.contains("invoice"));
    assert!(yaml.contains("semantic"));
}

#[test]
fn load_then_query_round_trips_through_a_snapshot() {
    let ws = TestWorkspace::new();
    let csv_path = ws.write("ledger.csv", LEDGER_CSV);
    let snapshot = ws.path().join("ledger.ftab");

    fintab()
        .args([
            "load",
            "-i",
            csv_path.to_str().unwrap(),
            "--snapshot",
            snapshot.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("amount"));

    // The parenthesized negative round-trips through canonical form.
    fintab()
        .args([
            "query",
            "--snapshot",
            snapshot.to_str().unwrap(),
            "--filter",
            "status = closed",
        ])
        .assert()
        .success()
        .stdout(contains("-45.00"));

    fintab()
        .args([
            "query",
            "--snapshot",
            snapshot.to_str().unwrap(),
            "--filter",
            "status = open",
            "--aggregate",
            "sum:amount",
        ])
        .assert()
        .success()
        .stdout(contains("sum(amount) = 2,534.51"));
}

#[test]
fn query_rejects_unknown_columns_with_a_clear_error() {
    let ws = TestWorkspace::new();
    let csv_path = ws.write("ledger.csv", LEDGER_CSV);
    let snapshot = ws.path().join("ledger.ftab");

    fintab()
        .args([
            "load",
            "-i",
            csv_path.to_str().unwrap(),
            "--snapshot",
            snapshot.to_str().unwrap(),
        ])
        .assert()
        .success();

    fintab()
        .args([
            "query",
            "--snapshot",
            snapshot.to_str().unwrap(),
            "--filter",
            "missing = 1",
        ])
        .assert()
        .failure()
        .stderr(contains("'missing' does not exist"));
}

#[test]
fn inspect_emits_json_summaries() {
    let ws = TestWorkspace::new();
    let csv_path = ws.write("ledger.csv", LEDGER_CSV);
    let snapshot = ws.path().join("ledger.ftab");

    fintab()
        .args([
            "load",
            "-i",
            csv_path.to_str().unwrap(),
            "--snapshot",
            snapshot.to_str().unwrap(),
        ])
        .assert()
        .success();

    let output = fintab()
        .args([
            "inspect",
            "--snapshot",
            snapshot.to_str().unwrap(),
            "--format",
            "json",
        ])
        .assert()
        .success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).expect("utf-8 output");
    let summaries: serde_json::Value = serde_json::from_str(&stdout).expect("json summaries");
    let amount = summaries
        .as_array()
        .and_then(|cols| cols.iter().find(|c| c["name"] == "amount"))
        .expect("amount summary");
    assert_eq!(amount["semantic"], "amount");
    assert_eq!(amount["currency"], "USD");
}

#[test]
fn tsv_input_loads_with_the_auto_detected_delimiter() {
    let ws = TestWorkspace::new();
    let tsv_path = ws.write("ledger.tsv", "amount\tstatus\n$10.00\topen\n$20.00\tclosed\n");
    let snapshot = ws.path().join("ledger.ftab");

    fintab()
        .args([
            "load",
            "-i",
            tsv_path.to_str().unwrap(),
            "--snapshot",
            snapshot.to_str().unwrap(),
        ])
        .assert()
        .success();

    fintab()
        .args([
            "query",
            "--snapshot",
            snapshot.to_str().unwrap(),
            "--aggregate",
            "count:amount",
        ])
        .assert()
        .success()
        .stdout(contains("count(amount) = 2"));
}
