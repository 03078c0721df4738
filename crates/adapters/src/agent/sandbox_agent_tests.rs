// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{parse_result, parse_session_id, SandboxAgent};
use crate::agent::CodingAgent;
use crate::sandbox::SandboxRun;
use crate::test_support::FakeSandbox;
use gitfix_core::{AgentOutcome, AgentRequest, IssueRef, Provider};
use std::sync::Arc;
use tokio::sync::mpsc;

fn request() -> AgentRequest {
    AgentRequest::new("/tmp/wt", IssueRef::new("acme", "widget", 42), "tok", "sonnet")
}

fn agent(sandbox: Arc<FakeSandbox>) -> SandboxAgent {
    SandboxAgent::new(sandbox, Provider::Claude)
}

#[test]
fn parse_result_reads_terminal_record() {
    let stdout = r#"{"type":"system","subtype":"init","session_id":"s-1"}
{"type":"assistant","message":"working"}
{"type":"result","subtype":"success","is_error":false,"total_cost_usd":0.37,"num_turns":12,"session_id":"s-1","result":"Fixed the parser."}"#;
    let parsed = parse_result(stdout).unwrap();
    assert!(!parsed.is_error);
    assert!(!parsed.max_turns_reached);
    assert!((parsed.cost_usd - 0.37).abs() < 1e-9);
    assert_eq!(parsed.turns, 12);
    assert_eq!(parsed.session_id.as_deref(), Some("s-1"));
    assert_eq!(parsed.summary.as_deref(), Some("Fixed the parser."));
}

#[test]
fn parse_result_flags_max_turns() {
    let stdout = r#"{"type":"result","subtype":"error_max_turns","is_error":true,"num_turns":50}"#;
    let parsed = parse_result(stdout).unwrap();
    assert!(parsed.is_error);
    assert!(parsed.max_turns_reached);
}

#[test]
fn parse_result_ignores_non_json_noise() {
    assert!(parse_result("plain text\nmore text").is_none());
}

#[test]
fn parse_session_id_from_init_line() {
    assert_eq!(
        parse_session_id(r#"{"type":"system","subtype":"init","session_id":"s-9"}"#).as_deref(),
        Some("s-9")
    );
    assert!(parse_session_id("not json").is_none());
}

#[tokio::test]
async fn execute_success_builds_run_and_streams_events() {
    let sandbox = Arc::new(FakeSandbox::new());
    sandbox.push_run(SandboxRun {
        exit_code: 0,
        stdout: concat!(
            "{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"s-7\"}\n",
            "{\"type\":\"result\",\"subtype\":\"success\",\"is_error\":false,",
            "\"total_cost_usd\":0.5,\"num_turns\":4,\"session_id\":\"s-7\",\"result\":\"done\"}\n",
        )
        .to_string(),
        stderr: String::new(),
        timed_out: false,
    });

    let (tx, mut rx) = mpsc::channel(32);
    let outcome = agent(sandbox.clone()).execute(request(), tx).await.unwrap();

    let run = outcome.run().expect("expected Ok outcome");
    assert!(run.success);
    assert_eq!(run.model, "claude-sonnet-4");
    assert_eq!(run.session_id.as_deref(), Some("s-7"));
    assert_eq!(run.turns, 4);

    // Container start, session start, then output chunks.
    let mut saw_container = false;
    let mut saw_session = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            gitfix_core::AgentEvent::ContainerStarted { .. } => saw_container = true,
            gitfix_core::AgentEvent::SessionStarted { session_id } => {
                saw_session = true;
                assert_eq!(session_id, "s-7");
            }
            _ => {}
        }
    }
    assert!(saw_container);
    assert!(saw_session);

    // Sandbox is always torn down.
    assert_eq!(sandbox.destroyed().len(), 1);
}

#[tokio::test]
async fn execute_detects_usage_limit() {
    let sandbox = Arc::new(FakeSandbox::new());
    sandbox.push_run(SandboxRun {
        exit_code: 1,
        stdout: "Claude AI usage limit reached|1718747400\n".to_string(),
        stderr: String::new(),
        timed_out: false,
    });

    let (tx, _rx) = mpsc::channel(32);
    let outcome = agent(sandbox.clone()).execute(request(), tx).await.unwrap();
    assert!(matches!(outcome, AgentOutcome::UsageLimit { reset_at_epoch_secs: 1_718_747_400 }));
    assert_eq!(sandbox.destroyed().len(), 1);
}

#[tokio::test]
async fn execute_timeout_is_unsuccessful_run_not_error() {
    let sandbox = Arc::new(FakeSandbox::new());
    sandbox.push_run(SandboxRun {
        exit_code: -1,
        stdout: String::new(),
        stderr: "still working...".to_string(),
        timed_out: true,
    });

    let (tx, _rx) = mpsc::channel(32);
    let outcome = agent(sandbox.clone()).execute(request(), tx).await.unwrap();
    let run = outcome.run().expect("timeout still yields a run");
    assert!(!run.success);
    assert!(run.logs.contains("timed out"));
}

#[tokio::test]
async fn custom_prompt_overrides_default() {
    let sandbox = Arc::new(FakeSandbox::new());
    sandbox.push_run(SandboxRun { exit_code: 0, ..Default::default() });

    let (tx, _rx) = mpsc::channel(32);
    let req = request().custom_prompt("ONLY create the PR");
    agent(sandbox.clone()).execute(req, tx).await.unwrap();

    let commands = sandbox.commands();
    assert!(commands[0].iter().any(|arg| arg == "ONLY create the PR"));
}
