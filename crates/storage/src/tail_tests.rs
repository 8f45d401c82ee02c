// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

#[test]
fn missing_file_yields_nothing() {
    let root = tempfile::tempdir().unwrap();
    let mut reader = TailReader::from_start(root.path().join("absent.jsonl"));
    assert!(reader.read_new_lines().unwrap().is_empty());
    assert_eq!(reader.offset(), 0);
}

#[test]
fn reads_only_new_lines() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("log.jsonl");
    std::fs::write(&path, "one\ntwo\n").unwrap();

    let mut reader = TailReader::from_start(&path);
    assert_eq!(reader.read_new_lines().unwrap(), vec!["one", "two"]);
    assert!(reader.read_new_lines().unwrap().is_empty());

    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"three\n").unwrap();
    assert_eq!(reader.read_new_lines().unwrap(), vec!["three"]);
}

#[test]
fn partial_final_line_is_withheld() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("log.jsonl");
    std::fs::write(&path, "complete\n{\"partial\":").unwrap();

    let mut reader = TailReader::from_start(&path);
    assert_eq!(reader.read_new_lines().unwrap(), vec!["complete"]);
    let held = reader.offset();

    // The partial line completes later and is then delivered whole
    let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"1}\n").unwrap();
    assert_eq!(reader.read_new_lines().unwrap(), vec!["{\"partial\":1}"]);
    assert!(reader.offset() > held);
}

#[test]
fn external_truncation_resets_offset() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("log.jsonl");
    std::fs::write(&path, "a\nb\nc\n").unwrap();

    let mut reader = TailReader::from_start(&path);
    reader.read_new_lines().unwrap();

    std::fs::write(&path, "fresh\n").unwrap();
    assert_eq!(reader.read_new_lines().unwrap(), vec!["fresh"]);
}

#[test]
fn blank_lines_are_skipped() {
    let root = tempfile::tempdir().unwrap();
    let path = root.path().join("log.jsonl");
    std::fs::write(&path, "a\n\n\nb\n").unwrap();

    let mut reader = TailReader::from_start(&path);
    assert_eq!(reader.read_new_lines().unwrap(), vec!["a", "b"]);
}
