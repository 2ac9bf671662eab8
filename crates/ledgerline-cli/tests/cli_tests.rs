//! CLI integration tests for the `ledgerline` binary.

use assert_cmd::Command;
use predicates::prelude::*;

fn words_fixture() -> serde_json::Value {
    serde_json::json!({
        "pages": [{
            "width": 612.0,
            "height": 792.0,
            "words": [
                {"text": "Date", "bbox": {"x0": 10.0, "top": 100.0, "x1": 40.0, "bottom": 110.0}},
                {"text": "Amount", "bbox": {"x0": 200.0, "top": 100.0, "x1": 250.0, "bottom": 110.0}},
                {"text": "Balance", "bbox": {"x0": 400.0, "top": 100.0, "x1": 450.0, "bottom": 110.0}},
                {"text": "31/03/2024", "bbox": {"x0": 10.0, "top": 130.0, "x1": 62.0, "bottom": 140.0}},
                {"text": "100.00", "bbox": {"x0": 200.0, "top": 130.0, "x1": 240.0, "bottom": 140.0}},
                {"text": "1,000.00", "bbox": {"x0": 400.0, "top": 130.0, "x1": 455.0, "bottom": 140.0}},
                {"text": "01/04/2024", "bbox": {"x0": 10.0, "top": 160.0, "x1": 62.0, "bottom": 170.0}},
                {"text": "200.00", "bbox": {"x0": 200.0, "top": 160.0, "x1": 240.0, "bottom": 170.0}},
                {"text": "1,200.00", "bbox": {"x0": 400.0, "top": 160.0, "x1": 455.0, "bottom": 170.0}}
            ]
        }]
    })
}

#[test]
fn parse_produces_report_and_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("statement.json");
    std::fs::write(&input, serde_json::to_vec(&words_fixture()).unwrap()).unwrap();
    let output_dir = dir.path().join("out");

    Command::cargo_bin("ledgerline")
        .unwrap()
        .arg("parse")
        .arg(&input)
        .arg("--output-dir")
        .arg(&output_dir)
        .arg("--job-id")
        .arg("cli-test")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"job_id\": \"cli-test\""))
        .stdout(predicate::str::contains("\"score\""));

    assert!(output_dir.join("statement.csv").exists());
    assert!(output_dir.join("statement.jsonl").exists());
    assert!(output_dir.join("statement.xlsx").exists());
}

#[test]
fn headers_lists_canonical_labels() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("statement.json");
    std::fs::write(&input, serde_json::to_vec(&words_fixture()).unwrap()).unwrap();

    Command::cargo_bin("ledgerline")
        .unwrap()
        .arg("headers")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("date"))
        .stdout(predicate::str::contains("balance"));
}

#[test]
fn headers_json_format() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("statement.json");
    std::fs::write(&input, serde_json::to_vec(&words_fixture()).unwrap()).unwrap();

    Command::cargo_bin("ledgerline")
        .unwrap()
        .arg("headers")
        .arg(&input)
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"original_text\": \"Amount\""));
}

#[test]
fn score_reports_consistency() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("transactions.jsonl");
    std::fs::write(
        &input,
        concat!(
            "{\"date\":\"2024-03-31\",\"balance\":1000.0}\n",
            "{\"date\":\"2024-04-01\",\"credit\":200.0,\"balance\":1200.0}\n",
        ),
    )
    .unwrap();

    Command::cargo_bin("ledgerline")
        .unwrap()
        .arg("score")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"score\":10.0"))
        .stdout(predicate::str::contains("\"mode\":\"post\""));
}

#[test]
fn missing_file_fails_with_message() {
    Command::cargo_bin("ledgerline")
        .unwrap()
        .arg("parse")
        .arg("/nonexistent/input.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn corrupt_document_fails_with_user_message() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.json");
    std::fs::write(&input, b"this is not json").unwrap();

    Command::cargo_bin("ledgerline")
        .unwrap()
        .arg("headers")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pdf unreadable"));
}
