// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn outcome_run_accessor() {
    let ok = AgentOutcome::Ok(AgentRun { success: true, ..Default::default() });
    assert!(ok.run().is_some());

    let limited = AgentOutcome::UsageLimit { reset_at_epoch_secs: 1000 };
    assert!(limited.run().is_none());

    let failed = AgentOutcome::Failed {
        kind: AgentFailureKind::Timeout,
        message: "wall clock exceeded".to_string(),
    };
    assert!(failed.run().is_none());
}

#[test]
fn outcome_serde_tags() {
    let limited = AgentOutcome::UsageLimit { reset_at_epoch_secs: 42 };
    let json = serde_json::to_string(&limited).unwrap();
    assert!(json.contains("\"outcome\":\"usage_limit\""));

    let back: AgentOutcome = serde_json::from_str(&json).unwrap();
    assert!(matches!(back, AgentOutcome::UsageLimit { reset_at_epoch_secs: 42 }));
}

#[test]
fn agent_event_serde() {
    let ev = AgentEvent::ContainerStarted {
        container_id: "c-1".to_string(),
        container_name: "gitfix-42".to_string(),
    };
    let json = serde_json::to_string(&ev).unwrap();
    assert!(json.contains("container_started"));
}

#[test]
fn request_setters() {
    let req = AgentRequest::new("/tmp/wt", crate::IssueRef::new("acme", "widget", 1), "tok", "sonnet")
        .branch_name("ai-fix/1-x")
        .is_retry(true)
        .retry_reason("no PR detected");
    assert!(req.is_retry);
    assert_eq!(req.branch_name.as_deref(), Some("ai-fix/1-x"));
}
