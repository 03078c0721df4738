// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared processor test harness: fake forge/agent, in-memory store, and a
//! real file-backed upstream repository serving clone/push traffic.

use super::{AgentRegistry, WorkerContext};
use crate::env::WorkerConfig;
use crate::metrics::MetricsRecorder;
use crate::task_state::TaskStateManager;
use gitfix_adapters::test_support::{FakeAgent, FakeForge};
use gitfix_adapters::ForgeIssue;
use gitfix_core::{
    Clock, FakeClock, IssuePayload, IssueRef, JobEnvelope, JobOptions, JobPayload, WorkerId,
};
use gitfix_queue::Queue;
use gitfix_store::MemoryStore;
use gitfix_workspace::{RetentionStrategy, WorkspaceManager};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

pub(crate) const OWNER: &str = "acme";
pub(crate) const REPO: &str = "widget";

pub(crate) struct Harness {
    pub dir: tempfile::TempDir,
    pub clock: FakeClock,
    pub store: Arc<MemoryStore<FakeClock>>,
    pub forge: Arc<FakeForge>,
    pub agent: Arc<FakeAgent>,
    pub ctx: Arc<WorkerContext<FakeClock>>,
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Bare upstream at `{root}/{owner}/{repo}.git` with one commit on main.
fn seed_upstream(root: &Path) -> PathBuf {
    let work = root.join("seed-work");
    std::fs::create_dir_all(&work).unwrap();
    run_git(&work, &["init", "-b", "main"]);
    run_git(&work, &["config", "user.name", "Fixture"]);
    run_git(&work, &["config", "user.email", "fixture@test"]);
    std::fs::write(work.join("README.md"), "widget\n").unwrap();
    std::fs::write(work.join("src.rs"), "pub fn widget() {}\n").unwrap();
    run_git(&work, &["add", "-A"]);
    run_git(&work, &["commit", "-m", "initial"]);

    let upstream = root.join(OWNER).join(format!("{REPO}.git"));
    std::fs::create_dir_all(upstream.parent().unwrap()).unwrap();
    let output = Command::new("git")
        .args(["clone", "--bare"])
        .arg(&work)
        .arg(&upstream)
        .output()
        .unwrap();
    assert!(output.status.success());
    upstream
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        seed_upstream(dir.path());

        let clock = FakeClock::new();
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let forge = Arc::new(FakeForge::new());
        let agent = Arc::new(FakeAgent::new());

        let config = WorkerConfig {
            redis_host: "127.0.0.1".to_string(),
            redis_port: 6379,
            concurrency: 1,
            queue_name: "test-queue".to_string(),
            primary_tag: "AI".to_string(),
            processing_tag: "AI-processing".to_string(),
            done_tag: "AI-done".to_string(),
            default_model: "claude-sonnet-4".to_string(),
            requeue_buffer_ms: 300_000,
            requeue_jitter_ms: 120_000,
            retention_strategy: RetentionStrategy::AlwaysDelete,
            retention_hours: 24,
            max_age_hours: 48,
            cost_threshold_usd: 5.0,
            clones_base: dir.path().join("clones"),
            worktrees_base: dir.path().join("worktrees"),
            default_branch: "main".to_string(),
            gh_app_id: None,
            gh_private_key_path: None,
            gh_installation_id: None,
            bot_username: Some("gitfix".to_string()),
            worker_id: WorkerId::new("w-test"),
            hostname: "test-host".to_string(),
            pr_label: "gitfix".to_string(),
            forge_base_url: format!("file://{}", dir.path().display()),
        };

        let queue = Queue::new(store.clone(), config.queue_name.clone(), clock.clone());
        let workspaces = Arc::new(WorkspaceManager::new(
            config.clones_base.clone(),
            config.worktrees_base.clone(),
            config.default_branch.clone(),
            clock.clone(),
        ));
        let tasks = TaskStateManager::new(store.clone(), clock.clone());
        let metrics =
            Arc::new(MetricsRecorder::new(store.clone(), clock.clone(), config.cost_threshold_usd));

        let ctx = Arc::new(WorkerContext {
            store: store.clone(),
            queue,
            forge: forge.clone(),
            agents: AgentRegistry::uniform(agent.clone()),
            workspaces,
            tasks,
            metrics,
            config,
            clock: clock.clone(),
        });

        Self { dir, clock, store, forge, agent, ctx }
    }

    /// Seed the fake forge with a processable issue.
    pub fn seed_issue(&self, number: u64, title: &str, labels: &[&str]) {
        self.forge.put_issue(
            OWNER,
            REPO,
            ForgeIssue {
                number,
                title: title.to_string(),
                body: "please fix".to_string(),
                labels: labels.iter().map(|s| s.to_string()).collect(),
                author: gitfix_core::CommentAuthor::user("alice"),
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
            },
        );
    }

    pub fn issue_payload(&self, number: u64, model: &str) -> IssuePayload {
        IssuePayload {
            issue: IssueRef::new(OWNER, REPO, number)
                .model_name(model)
                .correlation_id(gitfix_core::CorrelationId::from_string("corr-test")),
            base_branch: None,
        }
    }

    /// A claimed envelope (attempt 1 of 3), the way processors see jobs.
    pub fn claimed_job(&self, payload: JobPayload) -> JobEnvelope {
        let mut job = JobEnvelope::new(payload, JobOptions::default(), self.clock.epoch_ms());
        job.attempt = 1;
        job
    }
}
