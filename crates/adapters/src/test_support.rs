// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake adapters for tests: scripted forge, agent and sandbox.

use crate::agent::{AgentError, CodingAgent};
use crate::forge::{ForgeClient, ForgeError, ForgeIssue, NewPullRequest, PullRequest};
use crate::sandbox::{Sandbox, SandboxError, SandboxHandle, SandboxRun, SandboxSpec};
use async_trait::async_trait;
use gitfix_core::{AgentEvent, AgentOutcome, AgentRequest, AgentRun, Comment};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::mpsc;

type IssueKey = (String, String, u64);

fn key(owner: &str, repo: &str, number: u64) -> IssueKey {
    (owner.to_string(), repo.to_string(), number)
}

#[derive(Default)]
struct ForgeState {
    issues: HashMap<IssueKey, ForgeIssue>,
    comments: HashMap<IssueKey, Vec<Comment>>,
    deleted_comment_ids: Vec<u64>,
    next_comment_id: u64,
    prs: Vec<(String, String, PullRequest)>,
    next_pr_number: u64,
    create_pr_error: Option<(u16, String)>,
    default_branch: String,
    installation_token: String,
    calls: Vec<String>,
}

/// In-memory forge with scripted failure knobs.
pub struct FakeForge {
    state: Mutex<ForgeState>,
}

impl Default for FakeForge {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeForge {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ForgeState {
                next_comment_id: 1000,
                next_pr_number: 100,
                default_branch: "main".to_string(),
                installation_token: "fake-installation-token".to_string(),
                ..Default::default()
            }),
        }
    }

    pub fn put_issue(&self, owner: &str, repo: &str, issue: ForgeIssue) {
        self.state.lock().issues.insert(key(owner, repo, issue.number), issue);
    }

    pub fn put_comment(&self, owner: &str, repo: &str, number: u64, comment: Comment) {
        self.state.lock().comments.entry(key(owner, repo, number)).or_default().push(comment);
    }

    /// Seed an existing PR (for adoption scenarios).
    pub fn put_pr(&self, owner: &str, repo: &str, pr: PullRequest) {
        self.state.lock().prs.push((owner.to_string(), repo.to_string(), pr));
    }

    /// Make the next `create_pr` fail with the given status/message.
    pub fn fail_next_create_pr(&self, status: u16, message: &str) {
        self.state.lock().create_pr_error = Some((status, message.to_string()));
    }

    pub fn labels(&self, owner: &str, repo: &str, number: u64) -> Vec<String> {
        self.state
            .lock()
            .issues
            .get(&key(owner, repo, number))
            .map(|i| i.labels.clone())
            .unwrap_or_default()
    }

    pub fn comments(&self, owner: &str, repo: &str, number: u64) -> Vec<Comment> {
        self.state.lock().comments.get(&key(owner, repo, number)).cloned().unwrap_or_default()
    }

    pub fn deleted_comment_ids(&self) -> Vec<u64> {
        self.state.lock().deleted_comment_ids.clone()
    }

    pub fn prs(&self) -> Vec<PullRequest> {
        self.state.lock().prs.iter().map(|(_, _, pr)| pr.clone()).collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }
}

#[async_trait]
impl ForgeClient for FakeForge {
    async fn get_issue(&self, owner: &str, repo: &str, number: u64) -> Result<ForgeIssue, ForgeError> {
        let mut state = self.state.lock();
        state.calls.push(format!("get_issue:{owner}/{repo}#{number}"));
        state
            .issues
            .get(&key(owner, repo, number))
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("issue #{number}")))
    }

    async fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<Vec<Comment>, ForgeError> {
        let mut state = self.state.lock();
        state.calls.push(format!("list_issue_comments:{owner}/{repo}#{number}"));
        Ok(state.comments.get(&key(owner, repo, number)).cloned().unwrap_or_default())
    }

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<(), ForgeError> {
        let mut state = self.state.lock();
        state.calls.push(format!("add_labels:{owner}/{repo}#{number}:{}", labels.join(",")));
        if let Some(issue) = state.issues.get_mut(&key(owner, repo, number)) {
            for label in labels {
                if !issue.labels.contains(label) {
                    issue.labels.push(label.clone());
                }
            }
        }
        Ok(())
    }

    async fn remove_label(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        label: &str,
    ) -> Result<(), ForgeError> {
        let mut state = self.state.lock();
        state.calls.push(format!("remove_label:{owner}/{repo}#{number}:{label}"));
        if let Some(issue) = state.issues.get_mut(&key(owner, repo, number)) {
            issue.labels.retain(|l| l != label);
        }
        // Absent label removal is success, like the real client.
        Ok(())
    }

    async fn create_pr(
        &self,
        owner: &str,
        repo: &str,
        pr: NewPullRequest,
    ) -> Result<PullRequest, ForgeError> {
        let mut state = self.state.lock();
        state.calls.push(format!("create_pr:{owner}/{repo}:{}", pr.head));
        if let Some((status, message)) = state.create_pr_error.take() {
            return Err(ForgeError::Api { status, message });
        }
        let number = state.next_pr_number;
        state.next_pr_number += 1;
        let created = PullRequest {
            number,
            url: format!("https://github.example/{owner}/{repo}/pull/{number}"),
            head: pr.head,
            base: pr.base,
            title: pr.title,
            draft: pr.draft,
        };
        state.prs.push((owner.to_string(), repo.to_string(), created.clone()));
        Ok(created)
    }

    async fn list_prs_by_head(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
    ) -> Result<Vec<PullRequest>, ForgeError> {
        let mut state = self.state.lock();
        state.calls.push(format!("list_prs_by_head:{owner}/{repo}:{head}"));
        Ok(state
            .prs
            .iter()
            .filter(|(o, r, pr)| o == owner && r == repo && pr.head == head)
            .map(|(_, _, pr)| pr.clone())
            .collect())
    }

    async fn add_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        body: &str,
    ) -> Result<u64, ForgeError> {
        let mut state = self.state.lock();
        let id = state.next_comment_id;
        state.next_comment_id += 1;
        state.calls.push(format!("add_issue_comment:{owner}/{repo}#{number}"));
        state.comments.entry(key(owner, repo, number)).or_default().push(Comment {
            id,
            body: body.to_string(),
            author: gitfix_core::CommentAuthor::bot("gitfix"),
            created_at: None,
        });
        Ok(id)
    }

    async fn delete_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: u64,
    ) -> Result<(), ForgeError> {
        let mut state = self.state.lock();
        state.calls.push(format!("delete_issue_comment:{owner}/{repo}:{comment_id}"));
        for comments in state.comments.values_mut() {
            comments.retain(|c| c.id != comment_id);
        }
        state.deleted_comment_ids.push(comment_id);
        Ok(())
    }

    async fn get_installation_token(&self) -> Result<String, ForgeError> {
        Ok(self.state.lock().installation_token.clone())
    }

    async fn default_branch(&self, _owner: &str, _repo: &str) -> Result<String, ForgeError> {
        Ok(self.state.lock().default_branch.clone())
    }
}

type AgentHook = Box<dyn Fn(&AgentRequest) + Send + Sync>;

/// Scripted coding agent. Outcomes pop in order; when the script is empty
/// a default successful run is returned.
pub struct FakeAgent {
    outcomes: Mutex<VecDeque<AgentOutcome>>,
    requests: Mutex<Vec<AgentRequest>>,
    hook: Mutex<Option<AgentHook>>,
}

impl Default for FakeAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAgent {
    pub fn new() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
        }
    }

    pub fn push_outcome(&self, outcome: AgentOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// Run `hook` on every execute (e.g. to edit files in the worktree the
    /// way a real agent would).
    pub fn set_hook(&self, hook: impl Fn(&AgentRequest) + Send + Sync + 'static) {
        *self.hook.lock() = Some(Box::new(hook));
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.lock().clone()
    }

    pub fn default_run() -> AgentRun {
        AgentRun {
            success: true,
            execution_time_ms: 1234,
            exit_code: 0,
            model: "claude-sonnet-4".to_string(),
            session_id: Some("fake-session".to_string()),
            turns: 3,
            cost_usd: 0.42,
            ..Default::default()
        }
    }
}

#[async_trait]
impl CodingAgent for FakeAgent {
    async fn execute(
        &self,
        request: AgentRequest,
        events: mpsc::Sender<AgentEvent>,
    ) -> Result<AgentOutcome, AgentError> {
        if let Some(hook) = self.hook.lock().as_ref() {
            hook(&request);
        }
        self.requests.lock().push(request);
        let _ = events
            .send(AgentEvent::SessionStarted { session_id: "fake-session".to_string() })
            .await;
        let outcome = self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| AgentOutcome::Ok(Self::default_run()));
        Ok(outcome)
    }

    fn validate_configuration(&self) -> Result<(), AgentError> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// Scripted sandbox. Runs pop in order; stdout is re-streamed line by line.
pub struct FakeSandbox {
    runs: Mutex<VecDeque<SandboxRun>>,
    specs: Mutex<Vec<SandboxSpec>>,
    commands: Mutex<Vec<Vec<String>>>,
    destroyed: Mutex<Vec<String>>,
}

impl Default for FakeSandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeSandbox {
    pub fn new() -> Self {
        Self {
            runs: Mutex::new(VecDeque::new()),
            specs: Mutex::new(Vec::new()),
            commands: Mutex::new(Vec::new()),
            destroyed: Mutex::new(Vec::new()),
        }
    }

    pub fn push_run(&self, run: SandboxRun) {
        self.runs.lock().push_back(run);
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().clone()
    }
}

#[async_trait]
impl Sandbox for FakeSandbox {
    async fn create(&self, spec: &SandboxSpec) -> Result<SandboxHandle, SandboxError> {
        self.specs.lock().push(spec.clone());
        Ok(SandboxHandle {
            container_id: format!("fake-{}", spec.name),
            container_name: spec.name.clone(),
        })
    }

    async fn exec_streaming(
        &self,
        _handle: &SandboxHandle,
        command: &[String],
        _timeout: Duration,
        lines: mpsc::Sender<String>,
    ) -> Result<SandboxRun, SandboxError> {
        self.commands.lock().push(command.to_vec());
        let run = self.runs.lock().pop_front().unwrap_or_default();
        for line in run.stdout.lines() {
            let _ = lines.send(line.to_string()).await;
        }
        Ok(run)
    }

    async fn destroy(&self, handle: &SandboxHandle) -> Result<(), SandboxError> {
        self.destroyed.lock().push(handle.container_id.clone());
        Ok(())
    }
}
