// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::processor::harness::{Harness, OWNER, REPO};
use super::*;
use gitfix_core::{
    AgentOutcome, AgentRun, Comment, CommentAuthor, FollowupPayload, JobPayload, TaskStage,
};
use gitfix_workspace::{CommitAuthor, PushOptions};

fn processor(harness: &Harness) -> PrFollowupJobProcessor<gitfix_core::FakeClock> {
    PrFollowupJobProcessor::new(harness.ctx.clone())
}

fn successful_run() -> AgentRun {
    AgentRun {
        success: true,
        execution_time_ms: 12_000,
        exit_code: 0,
        model: "claude-sonnet-4".to_string(),
        turns: 4,
        cost_usd: 0.3,
        summary: Some("Renamed the function.".to_string()),
        ..Default::default()
    }
}

/// Push a PR branch upstream the way a finished issue job would have.
async fn seed_pr_branch(harness: &Harness, branch: &str) {
    let clone = harness
        .ctx
        .workspaces
        .ensure_clone(
            &harness.ctx.config.repo_url(OWNER, REPO),
            OWNER,
            REPO,
            "",
        )
        .await
        .unwrap();
    let ws = harness
        .ctx
        .workspaces
        .create_worktree_from_existing_branch(&clone, "main", "seed-main", OWNER, REPO)
        .await
        .unwrap();
    // Branch off main, add a commit, push.
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(&ws.worktree_path)
        .args(["checkout", "-b", branch])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    std::fs::write(ws.worktree_path.join("feature.rs"), "pub fn feature() {}\n").unwrap();
    harness
        .ctx
        .workspaces
        .commit_changes(&ws, "feat: seed", &CommitAuthor::claude_code())
        .await
        .unwrap();
    let opts = PushOptions {
        repo_url: harness.ctx.config.repo_url(OWNER, REPO),
        auth_token: String::new(),
        refresh: None,
    };
    harness.ctx.workspaces.push_branch(&ws, branch, &opts).await.unwrap();

    // Refresh the clone so the new branch is present for the processor,
    // then drop the seed worktree.
    harness
        .ctx
        .workspaces
        .ensure_clone(&harness.ctx.config.repo_url(OWNER, REPO), OWNER, REPO, "")
        .await
        .unwrap();
    let _ = std::fs::remove_dir_all(&ws.worktree_path);
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(&clone)
        .args(["worktree", "prune"])
        .output()
        .unwrap();
    assert!(output.status.success());
}

fn payload(branch: &str, comments: Vec<Comment>) -> FollowupPayload {
    FollowupPayload {
        pull_request_number: 7,
        branch_name: branch.to_string(),
        repo_owner: OWNER.to_string(),
        repo_name: REPO.to_string(),
        llm: Some("sonnet".to_string()),
        correlation_id: None,
        comments,
    }
}

// E2E-6: duplicate comments are dropped, the rest are applied, the branch
// survives cleanup.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn duplicate_comments_dropped_and_branch_survives() {
    let harness = Harness::new();
    let branch = "ai-fix/42-seeded";
    seed_pr_branch(&harness, branch).await;

    // Comment 11 is already cited by an earlier bot comment.
    harness.forge.put_comment(
        OWNER,
        REPO,
        7,
        Comment::new(900, CommentAuthor::bot("gitfix"), "Done. Comment ID: 11 handled."),
    );
    let input = vec![
        Comment::new(11, CommentAuthor::user("alice"), "already done"),
        Comment::new(22, CommentAuthor::user("bob"), "rename the fn"),
        Comment::new(33, CommentAuthor::user("carol"), "add a doc comment"),
    ];

    harness.agent.push_outcome(AgentOutcome::Ok(successful_run()));
    harness.agent.set_hook(|request| {
        let _ = std::fs::write(request.worktree_path.join("feature.rs"), "pub fn renamed() {}\n");
    });

    let payload = payload(branch, input);
    let job = harness.claimed_job(JobPayload::ApplyPrFollowup(payload.clone()));
    let result = processor(&harness).process(&job, &payload).await.unwrap();

    assert_eq!(result["status"], "followup_applied");

    // The prompt only covered the two unprocessed comments.
    let requests = harness.agent.requests();
    let prompt = requests[0].custom_prompt.as_deref().unwrap();
    assert!(!prompt.contains("already done"));
    assert!(prompt.contains("rename the fn"));
    assert!(prompt.contains("add a doc comment"));

    // Confirmation cites exactly the processed ids; the ack was deleted.
    let comments = harness.forge.comments(OWNER, REPO, 7);
    let confirmation = comments
        .iter()
        .find(|c| c.body.contains("Applied follow-up changes"))
        .expect("confirmation comment");
    assert!(confirmation.body.contains("Comment ID: 22 by @bob"));
    assert!(confirmation.body.contains("Comment ID: 33 by @carol"));
    assert!(!confirmation.body.contains("Comment ID: 11"));
    assert!(!comments.iter().any(|c| c.body.contains("Starting work")));
    assert_eq!(harness.forge.deleted_comment_ids().len(), 1);

    // The PR branch is never deleted by follow-up cleanup.
    let clone = harness.ctx.config.clones_base.join(OWNER).join(format!("{REPO}.git"));
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(&clone)
        .args(["branch", "--list", branch])
        .output()
        .unwrap();
    assert!(!String::from_utf8_lossy(&output.stdout).trim().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn all_comments_already_processed_skips() {
    let harness = Harness::new();
    harness.forge.put_comment(
        OWNER,
        REPO,
        7,
        Comment::new(900, CommentAuthor::bot("gitfix"), "Processing comment ID: 11"),
    );
    let input = vec![Comment::new(11, CommentAuthor::user("alice"), "x")];

    let payload = payload("ai-fix/anything", input);
    let job = harness.claimed_job(JobPayload::ApplyPrFollowup(payload.clone()));
    let result = processor(&harness).process(&job, &payload).await.unwrap();

    assert_eq!(result["status"], "skipped");
    assert_eq!(result["reason"], "already_processed");
    assert!(harness.agent.requests().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_changes_posts_analysis_comment() {
    let harness = Harness::new();
    let branch = "ai-fix/43-seeded";
    seed_pr_branch(&harness, branch).await;

    let input = vec![Comment::new(55, CommentAuthor::user("alice"), "please reconsider")];
    harness.agent.push_outcome(AgentOutcome::Ok(successful_run()));
    // No hook: tree unchanged.

    let payload = payload(branch, input);
    let job = harness.claimed_job(JobPayload::ApplyPrFollowup(payload.clone()));
    let result = processor(&harness).process(&job, &payload).await.unwrap();

    assert_eq!(result["status"], "followup_no_changes");
    let comments = harness.forge.comments(OWNER, REPO, 7);
    assert!(comments.iter().any(|c| c.body.contains("no changes necessary")));
    assert!(comments.iter().any(|c| c.body.contains("Comment ID: 55")));
    assert!(!comments.iter().any(|c| c.body.contains("Starting work")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn usage_limit_requeues_followup() {
    let harness = Harness::new();
    let branch = "ai-fix/44-seeded";
    seed_pr_branch(&harness, branch).await;

    let reset = harness.clock.epoch_ms() / 1000 + 120;
    harness.agent.push_outcome(AgentOutcome::UsageLimit { reset_at_epoch_secs: reset });
    let input = vec![Comment::new(66, CommentAuthor::user("alice"), "tweak")];

    let payload = payload(branch, input);
    let job = harness.claimed_job(JobPayload::ApplyPrFollowup(payload.clone()));
    let result = processor(&harness).process(&job, &payload).await.unwrap();

    assert_eq!(result["status"], "requeued_usage_limit");
    assert_eq!(harness.ctx.queue.delayed_count().await.unwrap(), 1);

    // The ack was deleted so the requeued delivery is not mistaken for a
    // processed batch.
    let comments = harness.forge.comments(OWNER, REPO, 7);
    assert!(!comments.iter().any(|c| c.body.contains("Starting work")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn followup_task_reaches_completed() {
    let harness = Harness::new();
    let branch = "ai-fix/45-seeded";
    seed_pr_branch(&harness, branch).await;

    let input = vec![Comment::new(77, CommentAuthor::user("alice"), "final polish")];
    harness.agent.push_outcome(AgentOutcome::Ok(successful_run()));
    harness.agent.set_hook(|request| {
        let _ = std::fs::write(request.worktree_path.join("polish.rs"), "// polished\n");
    });

    let payload = payload(branch, input);
    let job = harness.claimed_job(JobPayload::ApplyPrFollowup(payload.clone()));
    processor(&harness).process(&job, &payload).await.unwrap();

    let task_id = gitfix_core::TaskId::new(format!("{OWNER}-{REPO}-7-claude-sonnet-4"));
    let state = harness.ctx.tasks.get(&task_id).await.unwrap().unwrap();
    assert_eq!(state.stage, TaskStage::Completed);
}
