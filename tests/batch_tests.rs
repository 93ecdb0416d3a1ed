// Copyright (c) 2025 - Cowboy AI, Inc.

//! Batch file parsing against real files

use std::fs;

use cim_provisioning::domain::{parse_batch_file, RowError};

fn parse_file(content: &str) -> cim_provisioning::domain::BatchParseOutcome {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hosts.csv");
    fs::write(&path, content).unwrap();
    parse_batch_file(&path).unwrap()
}

#[test]
fn file_with_header_and_crlf_line_endings() {
    let outcome = parse_file(
        "hostname,mac,ip\r\n\
         build-mac-01,aa:bb:cc:dd:ee:01,10.0.0.11\r\n\
         build-mac-02,aa:bb:cc:dd:ee:02,10.0.0.12\r\n",
    );
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].hostname.as_str(), "build-mac-01");
}

#[test]
fn fields_are_trimmed_and_mac_forms_normalized() {
    let outcome = parse_file("build-mac-01 , AA-BB-CC-DD-EE-01 , 10.0.0.11\n");
    assert!(outcome.errors.is_empty());
    assert_eq!(outcome.records[0].mac.canonical(), "aa:bb:cc:dd:ee:01");
}

#[test]
fn short_names_qualify_against_the_domain() {
    let outcome = parse_file(
        "build-mac-01,aa:bb:cc:dd:ee:01,10.0.0.11\n\
         build-mac-02.macfarm.example.com,aa:bb:cc:dd:ee:02,10.0.0.12\n",
    );
    let qualified: Vec<String> = outcome
        .records
        .iter()
        .map(|r| r.qualified("macfarm.example.com").hostname.to_string())
        .collect();
    assert_eq!(
        qualified,
        vec![
            "build-mac-01.macfarm.example.com",
            "build-mac-02.macfarm.example.com"
        ]
    );
}

#[test]
fn mixed_good_and_bad_rows() {
    let outcome = parse_file(
        "build-mac-01,aa:bb:cc:dd:ee:01,10.0.0.11\n\
         short-row,aa:bb:cc:dd:ee:02\n\
         bad-ip,aa:bb:cc:dd:ee:03,10.0.0.999\n\
         build-mac-04,aa:bb:cc:dd:ee:04,10.0.0.14\n",
    );
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.errors.len(), 2);
    assert!(matches!(outcome.errors[0], RowError::Format { line: 2, .. }));
    assert!(matches!(outcome.errors[1], RowError::Field { line: 3, .. }));
}

#[test]
fn empty_file_yields_nothing() {
    let outcome = parse_file("");
    assert!(outcome.records.is_empty());
    assert!(outcome.errors.is_empty());
}

#[test]
fn missing_file_is_io_error() {
    assert!(parse_batch_file("/definitely/not/here.csv").is_err());
}
