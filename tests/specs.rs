// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level scenario specs.
//!
//! Drive the whole worker — queue, runtime, processors, metrics — against
//! the in-memory store, fake forge/agent adapters, and a real file-backed
//! upstream repository.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use gitfix_adapters::test_support::{FakeAgent, FakeForge};
use gitfix_adapters::ForgeIssue;
use gitfix_core::{
    keys, provider_for, resolve_alias, AgentOutcome, AgentRun, Clock, CommentAuthor, FakeClock,
    IssuePayload, IssueRef, JobOptions, JobPayload, Provider, WorkerId,
};
use gitfix_queue::Queue;
use gitfix_store::{KvStore, MemoryStore};
use gitfix_worker::processor::{AgentRegistry, WorkerContext};
use gitfix_worker::runtime::{BootOptions, WorkerRuntime};
use gitfix_worker::{MetricsRecorder, TaskStateManager, WorkerConfig};
use gitfix_workspace::{RetentionStrategy, WorkspaceManager};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

const OWNER: &str = "acme";
const REPO: &str = "widget";

struct Spec {
    _dir: tempfile::TempDir,
    clock: FakeClock,
    store: Arc<MemoryStore<FakeClock>>,
    forge: Arc<FakeForge>,
    agent: Arc<FakeAgent>,
    ctx: Arc<WorkerContext<FakeClock>>,
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

impl Spec {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();

        // Seed the upstream the clone cache will pull from.
        let work = dir.path().join("seed");
        std::fs::create_dir_all(&work).unwrap();
        run_git(&work, &["init", "-b", "main"]);
        run_git(&work, &["config", "user.name", "Fixture"]);
        run_git(&work, &["config", "user.email", "fixture@test"]);
        std::fs::write(work.join("README.md"), "widget\n").unwrap();
        run_git(&work, &["add", "-A"]);
        run_git(&work, &["commit", "-m", "initial"]);
        let upstream = dir.path().join(OWNER).join(format!("{REPO}.git"));
        std::fs::create_dir_all(upstream.parent().unwrap()).unwrap();
        let output = Command::new("git")
            .args(["clone", "--bare"])
            .arg(&work)
            .arg(&upstream)
            .output()
            .unwrap();
        assert!(output.status.success());

        let clock = FakeClock::new();
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let forge = Arc::new(FakeForge::new());
        let agent = Arc::new(FakeAgent::new());

        let config = WorkerConfig {
            redis_host: "127.0.0.1".to_string(),
            redis_port: 6379,
            concurrency: 2,
            queue_name: "spec-queue".to_string(),
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
            worker_id: WorkerId::new("w-spec"),
            hostname: "spec-host".to_string(),
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
        let metrics = Arc::new(MetricsRecorder::new(
            store.clone(),
            clock.clone(),
            config.cost_threshold_usd,
        ));

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

        Self { _dir: dir, clock, store, forge, agent, ctx }
    }

    fn seed_issue(&self, number: u64, title: &str) {
        self.forge.put_issue(
            OWNER,
            REPO,
            ForgeIssue {
                number,
                title: title.to_string(),
                body: "please fix".to_string(),
                labels: vec!["AI".to_string()],
                author: CommentAuthor::user("alice"),
                created_at: "2026-01-01T00:00:00Z".to_string(),
                updated_at: "2026-01-01T00:00:00Z".to_string(),
            },
        );
    }

    async fn enqueue_issue(&self, number: u64, model: &str) {
        self.ctx
            .queue
            .enqueue(
                JobPayload::ImplementIssue(IssuePayload {
                    issue: IssueRef::new(OWNER, REPO, number).model_name(model),
                    base_branch: None,
                }),
                JobOptions::default(),
            )
            .await
            .unwrap();
    }

    async fn processed_count(&self) -> i64 {
        self.store
            .get(keys::JOBS_PROCESSED)
            .await
            .unwrap()
            .and_then(|raw| String::from_utf8(raw).ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    async fn wait_for_processed(&self, count: i64) {
        for _ in 0..600 {
            if self.processed_count().await >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        panic!("jobs did not complete in time");
    }
}

fn successful_run() -> AgentRun {
    AgentRun {
        success: true,
        execution_time_ms: 20_000,
        exit_code: 0,
        model: "claude-sonnet-4".to_string(),
        session_id: Some("sess-spec".to_string()),
        turns: 6,
        cost_usd: 0.9,
        ..Default::default()
    }
}

// Clean success, driven through the queue: PR on the expected head, labels
// flipped, metrics written exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn implement_issue_end_to_end() {
    let spec = Spec::new();
    spec.seed_issue(42, "Fix parser");
    spec.agent.push_outcome(AgentOutcome::Ok(successful_run()));
    spec.agent.set_hook(|request| {
        let _ = std::fs::write(request.worktree_path.join("fix.rs"), "pub fn fixed() {}\n");
    });

    spec.enqueue_issue(42, "sonnet").await;
    let runtime = WorkerRuntime::new(spec.ctx.clone());
    let running = runtime
        .start(&BootOptions { reset: false, concurrency: Some(2), no_heartbeat: true })
        .await;
    spec.wait_for_processed(1).await;
    running.shutdown().await;

    // PR exists on the allocated head, carrying the model and the closes
    // keyword in its body (the fake stores what create_pr received).
    let prs = spec.forge.prs();
    assert_eq!(prs.len(), 1);
    assert!(prs[0].head.starts_with("ai-fix/42-fix-parser-"));
    assert!(prs[0].head.contains("claude-sonnet-4"));

    let labels = spec.forge.labels(OWNER, REPO, 42);
    assert!(!labels.contains(&"AI-processing".to_string()));
    assert!(labels.contains(&"AI-done".to_string()));

    assert_eq!(spec.processed_count().await, 1);
    assert_eq!(spec.store.zcard(keys::AI_LOG).await.unwrap(), 1);
    let entries = spec.store.zrange_by_score(keys::AI_LOG, f64::MIN, f64::MAX).await.unwrap();
    let entry: serde_json::Value = serde_json::from_slice(&entries[0]).unwrap();
    assert_eq!(entry["status"], "success");

    // Terminal task state is COMPLETED.
    let task_id = gitfix_core::TaskId::new(format!("{OWNER}-{REPO}-42-claude-sonnet-4"));
    let raw = spec.store.get(&keys::task_state(&task_id)).await.unwrap().unwrap();
    let state: gitfix_core::TaskState = serde_json::from_slice(&raw).unwrap();
    assert_eq!(state.stage, gitfix_core::TaskStage::Completed);
}

// Usage limit: the original job completes as handled, a fresh delayed job
// waits out the reset window.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn usage_limit_requeues_delayed_job() {
    let spec = Spec::new();
    spec.seed_issue(42, "Fix parser");
    let reset = spec.clock.epoch_ms() / 1000 + 600;
    spec.agent.push_outcome(AgentOutcome::UsageLimit { reset_at_epoch_secs: reset });

    spec.enqueue_issue(42, "sonnet").await;
    let runtime = WorkerRuntime::new(spec.ctx.clone());
    let running = runtime
        .start(&BootOptions { reset: false, concurrency: Some(1), no_heartbeat: true })
        .await;
    spec.wait_for_processed(1).await;
    running.shutdown().await;

    // The fresh job waits out the reset window in the delayed set.
    assert_eq!(spec.ctx.queue.delayed_count().await.unwrap(), 1);
    assert!(spec.forge.prs().is_empty());
    let labels = spec.forge.labels(OWNER, REPO, 42);
    assert!(!labels.contains(&"AI-processing".to_string()));
    let comments = spec.forge.comments(OWNER, REPO, 42);
    assert!(comments.iter().any(|c| c.body.contains("usage limit")));
}

// Two concurrent jobs for the same issue under different models never share
// a worktree or branch, and both produce PRs.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_models_are_isolated() {
    let spec = Spec::new();
    spec.seed_issue(42, "Fix parser");
    spec.agent.push_outcome(AgentOutcome::Ok(successful_run()));
    spec.agent.push_outcome(AgentOutcome::Ok(AgentRun {
        model: "gpt-4o".to_string(),
        ..successful_run()
    }));
    spec.agent.set_hook(|request| {
        let _ = std::fs::write(request.worktree_path.join("fix.rs"), "pub fn fixed() {}\n");
    });

    spec.enqueue_issue(42, "sonnet").await;
    spec.enqueue_issue(42, "gpt4").await;
    let runtime = WorkerRuntime::new(spec.ctx.clone());
    let running = runtime
        .start(&BootOptions { reset: false, concurrency: Some(2), no_heartbeat: true })
        .await;
    spec.wait_for_processed(2).await;
    running.shutdown().await;

    let requests = spec.agent.requests();
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].worktree_path, requests[1].worktree_path);
    assert_ne!(requests[0].branch_name, requests[1].branch_name);

    let prs = spec.forge.prs();
    assert_eq!(prs.len(), 2);
    assert_ne!(prs[0].head, prs[1].head);
}

// Boot-time reset leaves a clean queue and keyspace behind.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reset_boot_flag_obliterates_prior_state() {
    let spec = Spec::new();
    spec.enqueue_issue(1, "sonnet").await;
    spec.store.set("worker:state:stale", b"{}".to_vec(), None).await.unwrap();

    let runtime = WorkerRuntime::new(spec.ctx.clone());
    let running = runtime
        .start(&BootOptions { reset: true, concurrency: Some(1), no_heartbeat: true })
        .await;
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    running.shutdown().await;

    assert!(spec.store.get("worker:state:stale").await.unwrap().is_none());
}

// Model plumbing invariants.
#[test]
fn alias_resolution_is_idempotent_for_known_names() {
    for name in ["opus", "sonnet", "gpt4", "gemini", "claude-sonnet-4", "anything-else"] {
        let once = resolve_alias(name);
        assert_eq!(resolve_alias(&once), once);
    }
}

#[test]
fn every_model_maps_to_a_provider() {
    assert_eq!(provider_for("sonnet"), Provider::Claude);
    assert_eq!(provider_for("gpt4"), Provider::OpenAi);
    assert_eq!(provider_for("gemini"), Provider::Gemini);
    assert_eq!(provider_for("completely-unknown"), Provider::Claude);
}
