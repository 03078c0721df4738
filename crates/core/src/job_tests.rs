// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn issue_payload() -> JobPayload {
    JobPayload::ImplementIssue(IssuePayload {
        issue: IssueRef::new("acme", "widget", 42),
        base_branch: None,
    })
}

#[test]
fn envelope_starts_waiting_without_delay() {
    let env = JobEnvelope::new(issue_payload(), JobOptions::default(), 1_000);
    assert_eq!(env.state, JobState::Waiting);
    assert_eq!(env.attempt, 0);
    assert!(env.delayed_until_ms.is_none());
}

#[test]
fn envelope_with_delay_starts_delayed() {
    let opts = JobOptions::default().delay_ms(5_000u64);
    let env = JobEnvelope::new(issue_payload(), opts, 1_000);
    assert_eq!(env.state, JobState::Delayed);
    assert_eq!(env.delayed_until_ms, Some(6_000));
}

#[test]
fn default_options_match_policy() {
    let opts = JobOptions::default();
    assert_eq!(opts.attempts, 3);
    assert_eq!(opts.backoff_base_ms, 2000);
    assert_eq!(opts.remove_on_complete.age_ms, DAY_MS);
    assert_eq!(opts.remove_on_complete.count, Some(1000));
    assert_eq!(opts.remove_on_fail.age_ms, 7 * DAY_MS);
}

#[yare::parameterized(
    first  = { 1, 2000 },
    second = { 2, 4000 },
    third  = { 3, 8000 },
    fourth = { 4, 16000 },
)]
fn backoff_is_exponential(attempts_made: u32, expected_ms: u64) {
    let opts = JobOptions::default();
    assert_eq!(opts.backoff_ms(attempts_made), expected_ms);
}

#[test]
fn backoff_caps_exponent() {
    let opts = JobOptions::default();
    // Exponent clamps; no overflow for absurd attempt counts.
    assert_eq!(opts.backoff_ms(60), 2000 * (1 << 16));
}

#[test]
fn attempts_exhausted() {
    let mut env = JobEnvelope::new(issue_payload(), JobOptions::default(), 0);
    assert!(!env.attempts_exhausted());
    env.attempt = 3;
    assert!(env.attempts_exhausted());
}

#[test]
fn payload_kind_tags() {
    assert_eq!(issue_payload().kind(), JobKind::ImplementIssue);
    let followup = JobPayload::ApplyPrFollowup(FollowupPayload {
        pull_request_number: 7,
        branch_name: "ai-fix/42-x".to_string(),
        repo_owner: "acme".to_string(),
        repo_name: "widget".to_string(),
        llm: None,
        correlation_id: None,
        comments: vec![],
    });
    assert_eq!(followup.kind(), JobKind::ApplyPrFollowup);
}

#[test]
fn envelope_serde_round_trip() {
    let env = JobEnvelope::new(issue_payload(), JobOptions::default(), 123);
    let json = serde_json::to_string(&env).unwrap();
    let restored: JobEnvelope = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.job_id, env.job_id);
    assert_eq!(restored.kind(), JobKind::ImplementIssue);
    assert_eq!(restored.state, JobState::Waiting);
}

#[yare::parameterized(
    waiting   = { JobState::Waiting, false },
    delayed   = { JobState::Delayed, false },
    active    = { JobState::Active, false },
    completed = { JobState::Completed, true },
    failed    = { JobState::Failed, true },
)]
fn terminal_states(state: JobState, expected: bool) {
    assert_eq!(state.is_terminal(), expected);
}
