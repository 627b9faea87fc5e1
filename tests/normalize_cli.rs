mod common;

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

use common::{CANONICAL_HEADER, TestWorkspace};

#[test]
fn projects_vendor_invoice_onto_canonical_schema() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_feed(
        "invoice_june.csv",
        &[
            "CustomerCompanyName,CustomerTenantId,ProductId,UsageDate,Quantity,UnitPrice,PreTaxTotal,Tax,PostTaxTotal",
            "Acme  Corp,T-1,P-1,06/15/2024,2,$5.00,10,1,11",
        ],
    );
    let output = workspace.path().join("canonical.csv");

    Command::cargo_bin("invoice-recon")
        .expect("binary exists")
        .args([
            "normalize",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).expect("read output");
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some(CANONICAL_HEADER));
    assert_eq!(
        lines.next(),
        Some("Acme Corp,T-1,,,,P-1,,,,2024-06-15,,2,5.00,,10,1,11")
    );
    assert_eq!(lines.next(), None);
}

#[test]
fn exports_issue_log_with_fixed_header() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_feed(
        "invoice_log.csv",
        &[
            "CustomerCompanyName,CustomerTenantId,ProductId,UsageDate,Quantity,UnitPrice,PreTaxTotal,Tax,PostTaxTotal",
            "Acme Corp,T-1,P-1,2024-06-15,2,5.00,10,1,11",
            "Acme Corp,T-2,P-2,not-a-date,1,2.00,2,0.20,2.20",
        ],
    );
    let log_path = workspace.path().join("issues.csv");

    Command::cargo_bin("invoice-recon")
        .expect("binary exists")
        .args([
            "normalize",
            "-i",
            input.to_str().unwrap(),
            "-o",
            workspace.path().join("canonical.csv").to_str().unwrap(),
            "--log-output",
            log_path.to_str().unwrap(),
        ])
        .assert()
        .success();

    let log = fs::read_to_string(&log_path).expect("read issue log");
    let header = log.lines().next().expect("log header");
    assert_eq!(
        header,
        "timestamp,severity,row,column,description,raw_value,source,context"
    );
    assert!(log.contains("Unparsable date value"));
    assert!(log.contains("not-a-date"));
}

#[test]
fn unknown_prefix_requires_source_type() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_feed(
        "mystery.csv",
        &["CustomerId,ProductId,Quantity,UnitPrice,Total", "C-1,P-1,1,5.00,5.50"],
    );

    Command::cargo_bin("invoice-recon")
        .expect("binary exists")
        .args(["normalize", "-i", input.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("Cannot infer a source family"));

    Command::cargo_bin("invoice-recon")
        .expect("binary exists")
        .args([
            "normalize",
            "-i",
            input.to_str().unwrap(),
            "--source-type",
            "hub",
        ])
        .assert()
        .success()
        .stdout(contains(CANONICAL_HEADER))
        .stdout(contains("C-1"));
}

#[test]
fn table_mode_renders_aligned_preview() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_feed(
        "hub_preview.csv",
        &[
            "CustomerName,CustomerId,ProductId,Quantity,UnitPrice,Total",
            "Acme Corp,C-1,P-1,2,5.00,11.00",
        ],
    );

    Command::cargo_bin("invoice-recon")
        .expect("binary exists")
        .args(["normalize", "-i", input.to_str().unwrap(), "--table"])
        .assert()
        .success()
        .stdout(contains("CustomerName"))
        .stdout(contains("---"));
}

#[test]
fn limit_caps_emitted_rows() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_feed(
        "hub_limited.csv",
        &[
            "CustomerName,CustomerId,ProductId,Quantity,UnitPrice,Total",
            "Acme Corp,C-1,P-1,2,5.00,11.00",
            "Beta LLC,C-2,P-2,1,3.00,3.30",
        ],
    );
    let output = workspace.path().join("limited.csv");

    Command::cargo_bin("invoice-recon")
        .expect("binary exists")
        .args([
            "normalize",
            "-i",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--limit",
            "1",
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).expect("read output");
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("Acme Corp"));
    assert!(!contents.contains("Beta LLC"));
}
