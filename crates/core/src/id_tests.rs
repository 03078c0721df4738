// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn job_id_has_prefix() {
    let id = JobId::new();
    assert!(id.as_str().starts_with("job-"));
    assert_eq!(id.suffix().len(), 12);
}

#[test]
fn job_ids_are_unique() {
    let a = JobId::new();
    let b = JobId::new();
    assert_ne!(a, b);
}

#[test]
fn correlation_id_round_trips_through_serde() {
    let id = CorrelationId::from_string("corr-abc123");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"corr-abc123\"");
    let parsed: CorrelationId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn from_string_keeps_foreign_ids() {
    let id = JobId::from_string("external-7");
    assert_eq!(id.as_str(), "external-7");
    assert_eq!(id.suffix(), "external-7");
}

#[test]
fn short_truncates() {
    assert_eq!(short("abcdef", 3), "abc");
    assert_eq!(short("ab", 3), "ab");
    assert_eq!(short("", 3), "");
}
