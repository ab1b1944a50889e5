use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_file(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

/// Scenario: one client, one server, one day, one stream of size 30.
fn singleton_fixture(dir: &Path) {
    write_file(dir, "site_bandwidth.csv", "site_name,bandwidth\ns0,100\n");
    write_file(dir, "config.ini", "[config]\nqos_constraint=400\nbase_cost=50\n");
    write_file(dir, "qos.csv", "site_name,c0\ns0,0\n");
    write_file(
        dir,
        "demand.csv",
        "mtime,stream_id,c0\n2022-01-01T00:00,x0,30\n",
    );
}

/// Scenario: two clients, two servers, a 160-wide spike on day 0 and 19
/// steady days of 20 total.
fn hot_day_fixture(dir: &Path) {
    write_file(
        dir,
        "site_bandwidth.csv",
        "site_name,bandwidth\ns0,100\ns1,100\n",
    );
    write_file(dir, "config.ini", "[config]\nqos_constraint=400\nbase_cost=50\n");
    write_file(dir, "qos.csv", "site_name,c0,c1\ns0,10,10\ns1,10,10\n");
    let mut demand = String::from("mtime,stream_id,c0,c1\n");
    for d in 0..20 {
        let size = if d == 0 { 80 } else { 10 };
        demand.push_str(&format!("t{d:02},x{d},{size},{size}\n"));
    }
    write_file(dir, "demand.csv", &demand);
}

#[test]
fn plan_singleton_emits_expected_line() {
    let tmp = tempdir().unwrap();
    singleton_fixture(tmp.path());
    let out = tmp.path().join("solution.txt");

    let mut cmd = Command::cargo_bin("edgeplan").unwrap();
    cmd.args([
        "plan",
        "--data",
        tmp.path().to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ])
    .assert()
    .success()
    .stdout(predicate::str::contains("grade = 50.00"));

    assert_eq!(fs::read_to_string(&out).unwrap(), "c0:<s0,x0>\n");
}

#[test]
fn plan_then_verify_round_trips() {
    let tmp = tempdir().unwrap();
    hot_day_fixture(tmp.path());
    let out = tmp.path().join("solution.txt");

    Command::cargo_bin("edgeplan")
        .unwrap()
        .args([
            "plan",
            "--data",
            tmp.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    Command::cargo_bin("edgeplan")
        .unwrap()
        .args([
            "verify",
            "--data",
            tmp.path().to_str().unwrap(),
            "--solution",
            out.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("solution ok"))
        .stdout(predicate::str::contains("grade = 100.00"));
}

#[test]
fn plan_is_byte_identical_across_runs() {
    let tmp = tempdir().unwrap();
    hot_day_fixture(tmp.path());
    let out_a = tmp.path().join("a.txt");
    let out_b = tmp.path().join("b.txt");

    for out in [&out_a, &out_b] {
        Command::cargo_bin("edgeplan")
            .unwrap()
            .args([
                "plan",
                "--data",
                tmp.path().to_str().unwrap(),
                "--out",
                out.to_str().unwrap(),
            ])
            .assert()
            .success();
    }
    assert_eq!(fs::read(&out_a).unwrap(), fs::read(&out_b).unwrap());
}

#[test]
fn infeasible_demand_fails_without_output() {
    let tmp = tempdir().unwrap();
    // One 80-wide indivisible stream against two 50-cap servers.
    write_file(
        tmp.path(),
        "site_bandwidth.csv",
        "site_name,bandwidth\ns0,50\ns1,50\n",
    );
    write_file(
        tmp.path(),
        "config.ini",
        "[config]\nqos_constraint=400\nbase_cost=50\n",
    );
    write_file(tmp.path(), "qos.csv", "site_name,c0\ns0,0\ns1,0\n");
    write_file(tmp.path(), "demand.csv", "mtime,stream_id,c0\nt0,x0,80\n");
    let out = tmp.path().join("solution.txt");

    Command::cargo_bin("edgeplan")
        .unwrap()
        .args([
            "plan",
            "--data",
            tmp.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Infeasible"));
    assert!(!out.exists());
}

#[test]
fn malformed_input_fails_without_output() {
    let tmp = tempdir().unwrap();
    singleton_fixture(tmp.path());
    write_file(tmp.path(), "demand.csv", "mtime,stream_id,c0\nt0,x0,-5\n");
    let out = tmp.path().join("solution.txt");

    Command::cargo_bin("edgeplan")
        .unwrap()
        .args([
            "plan",
            "--data",
            tmp.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Parse error"));
    assert!(!out.exists());
}

#[test]
fn verify_catches_tampered_solution() {
    let tmp = tempdir().unwrap();
    singleton_fixture(tmp.path());
    let out = tmp.path().join("solution.txt");

    Command::cargo_bin("edgeplan")
        .unwrap()
        .args([
            "plan",
            "--data",
            tmp.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ])
        .assert()
        .success();

    // Drop the assignment: the stream is demanded but no longer carried.
    fs::write(&out, "c0:\n").unwrap();
    Command::cargo_bin("edgeplan")
        .unwrap()
        .args([
            "verify",
            "--data",
            tmp.path().to_str().unwrap(),
            "--solution",
            out.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not carried"));
}

#[test]
fn inspect_prints_statistics() {
    let tmp = tempdir().unwrap();
    hot_day_fixture(tmp.path());

    Command::cargo_bin("edgeplan")
        .unwrap()
        .args(["inspect", "--data", tmp.path().to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Servers        : 2"))
        .stdout(predicate::str::contains("Days           : 20"))
        .stdout(predicate::str::contains("Free-day quota : 1"));
}

#[test]
fn summary_file_reports_grade() {
    let tmp = tempdir().unwrap();
    singleton_fixture(tmp.path());
    let out = tmp.path().join("solution.txt");
    let summary = tmp.path().join("summary.json");

    Command::cargo_bin("edgeplan")
        .unwrap()
        .args([
            "plan",
            "--data",
            tmp.path().to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
            "--summary",
            summary.to_str().unwrap(),
        ])
        .assert()
        .success();

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(parsed["grade"], 50.0);
    assert_eq!(parsed["days"], 1);
    assert_eq!(parsed["free_day_quota"], 1);
}
