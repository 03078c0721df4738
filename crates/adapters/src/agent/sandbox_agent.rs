// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`CodingAgent`] that runs a provider CLI inside a [`Sandbox`].

use super::prompt::issue_prompt;
use super::provider::provider_command;
use super::usage::parse_usage_limit_reset;
use super::{AgentError, CodingAgent};
use crate::sandbox::{Sandbox, SandboxSpec};
use async_trait::async_trait;
use gitfix_core::{AgentEvent, AgentOutcome, AgentRequest, AgentRun, Provider};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Default wall-clock budget for one agent run.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(300);

const NAME_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// One provider's agent. The worker keeps one per provider and routes by
/// the model's alias resolution.
pub struct SandboxAgent {
    sandbox: Arc<dyn Sandbox>,
    provider: Provider,
    run_timeout: Duration,
}

impl SandboxAgent {
    pub fn new(sandbox: Arc<dyn Sandbox>, provider: Provider) -> Self {
        Self { sandbox, provider, run_timeout: DEFAULT_RUN_TIMEOUT }
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    fn api_key_var(&self) -> &'static str {
        match self.provider {
            Provider::Claude => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// Fields pulled from the provider's final `result` line.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ResultSummary {
    pub is_error: bool,
    pub max_turns_reached: bool,
    pub cost_usd: f64,
    pub turns: u32,
    pub session_id: Option<String>,
    pub summary: Option<String>,
}

/// Scan line-delimited JSON output for the terminal result record.
pub(crate) fn parse_result(stdout: &str) -> Option<ResultSummary> {
    let mut found = None;
    for line in stdout.lines() {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };
        if value.get("type").and_then(|t| t.as_str()) != Some("result") {
            continue;
        }
        let subtype = value.get("subtype").and_then(|s| s.as_str()).unwrap_or_default();
        found = Some(ResultSummary {
            is_error: value.get("is_error").and_then(|b| b.as_bool()).unwrap_or(false),
            max_turns_reached: subtype == "error_max_turns",
            cost_usd: value.get("total_cost_usd").and_then(|c| c.as_f64()).unwrap_or(0.0),
            turns: value.get("num_turns").and_then(|n| n.as_u64()).unwrap_or(0) as u32,
            session_id: value.get("session_id").and_then(|s| s.as_str()).map(str::to_string),
            summary: value.get("result").and_then(|r| r.as_str()).map(str::to_string),
        });
    }
    found
}

/// First session id announced in the output stream.
pub(crate) fn parse_session_id(line: &str) -> Option<String> {
    let value = serde_json::from_str::<serde_json::Value>(line).ok()?;
    value.get("session_id").and_then(|s| s.as_str()).map(str::to_string)
}

#[async_trait]
impl CodingAgent for SandboxAgent {
    async fn execute(
        &self,
        request: AgentRequest,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<AgentOutcome, AgentError> {
        let started = std::time::Instant::now();
        let prompt = match &request.custom_prompt {
            Some(custom) => custom.clone(),
            None => issue_prompt(&request),
        };
        let command = provider_command(&request.model_name, &prompt);

        let mut env = vec![("GITHUB_TOKEN".to_string(), request.github_token.clone())];
        let key_var = self.api_key_var();
        if let Ok(key) = std::env::var(key_var) {
            env.push((key_var.to_string(), key));
        }

        let name = format!(
            "gitfix-{}-{}",
            request.issue.number,
            nanoid::nanoid!(6, &NAME_ALPHABET)
        );
        let spec = SandboxSpec {
            name,
            image: String::new(),
            worktree: request.worktree_path.clone(),
            env,
        };

        let handle = self.sandbox.create(&spec).await?;
        let _ = events
            .send(AgentEvent::ContainerStarted {
                container_id: handle.container_id.clone(),
                container_name: handle.container_name.clone(),
            })
            .await;

        // Forward output lines as they stream, surfacing the session id
        // the first time the provider announces it.
        let (line_tx, mut line_rx) = mpsc::channel::<String>(64);
        let forward_events = events.clone();
        let forwarder = tokio::spawn(async move {
            let mut session_seen = false;
            while let Some(line) = line_rx.recv().await {
                if !session_seen {
                    if let Some(session_id) = parse_session_id(&line) {
                        session_seen = true;
                        let _ = forward_events
                            .send(AgentEvent::SessionStarted { session_id })
                            .await;
                    }
                }
                let _ = forward_events.send(AgentEvent::OutputChunk { line }).await;
            }
        });

        let run = self
            .sandbox
            .exec_streaming(&handle, &command, self.run_timeout, line_tx)
            .await;
        let _ = forwarder.await;
        if let Err(e) = self.sandbox.destroy(&handle).await {
            tracing::warn!(error = %e, "sandbox teardown failed");
        }
        let run = run?;

        let execution_time_ms = started.elapsed().as_millis() as u64;

        if let Some(reset_at) = parse_usage_limit_reset(&run.stdout) {
            return Ok(AgentOutcome::UsageLimit { reset_at_epoch_secs: reset_at });
        }

        let parsed = parse_result(&run.stdout).unwrap_or_default();
        let success = !run.timed_out && run.exit_code == 0 && !parsed.is_error;
        let logs = if run.timed_out {
            format!("{}\n[run timed out after {:?}]", run.stderr, self.run_timeout)
        } else {
            run.stderr.clone()
        };

        Ok(AgentOutcome::Ok(AgentRun {
            success,
            execution_time_ms,
            exit_code: run.exit_code,
            model: gitfix_core::resolve_alias(&request.model_name),
            session_id: parsed.session_id,
            conversation_id: None,
            raw_output: run.stdout,
            logs,
            conversation_log: Vec::new(),
            modified_files: Vec::new(),
            suggested_commit_message: None,
            summary: parsed.summary,
            turns: parsed.turns,
            cost_usd: parsed.cost_usd,
            max_turns_reached: parsed.max_turns_reached,
        }))
    }

    fn validate_configuration(&self) -> Result<(), AgentError> {
        let var = self.api_key_var();
        if std::env::var(var).is_err() {
            return Err(AgentError::Configuration(format!("{var} is not set")));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        match self.provider {
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        }
    }
}

#[cfg(test)]
#[path = "sandbox_agent_tests.rs"]
mod tests;
