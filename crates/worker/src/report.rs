// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User-visible text: commit messages, PR bodies, completion reports and
//! comment templates.
//!
//! The `Closes #N` / `Resolves #N` / `Addresses #N` strings must appear
//! verbatim in PR bodies so the forge's keyword linking fires.

use gitfix_core::{id::short, time_fmt, AgentRun, Comment, ErrorCategory, IssueRef};

/// Default commit message when the agent suggested none.
pub fn default_commit_message(issue_number: u64, title: &str, model: &str, success: bool) -> String {
    let outcome = if success {
        "Implementation completed successfully."
    } else {
        "Implementation attempted; review the diff before merging."
    };
    format!(
        "fix(ai): Resolve issue #{issue_number} - {}\n\nImplemented by Claude Code using {model} model.\n{outcome}",
        short(title, 50)
    )
}

pub fn pr_title(issue_number: u64, title: &str) -> String {
    format!("fix(ai): Resolve issue #{issue_number} - {}", short(title, 50))
}

/// Everything the completion report mentions.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub status: String,
    pub issue_number: u64,
    pub repo: String,
    pub success: bool,
    pub execution_time_ms: u64,
    pub conversation_id: Option<String>,
    pub model: String,
    pub turns: u32,
    pub cost_usd: f64,
    pub session_id: Option<String>,
    pub summary: Option<String>,
    pub max_turns_reached: bool,
}

impl RunReport {
    pub fn from_run(run: &AgentRun, issue: &IssueRef, status: &str) -> Self {
        Self {
            status: status.to_string(),
            issue_number: issue.number,
            repo: issue.repo_slug(),
            success: run.success,
            execution_time_ms: run.execution_time_ms,
            conversation_id: run.conversation_id.clone(),
            model: run.model.clone(),
            turns: run.turns,
            cost_usd: run.cost_usd,
            session_id: run.session_id.clone(),
            summary: run.summary.clone(),
            max_turns_reached: run.max_turns_reached,
        }
    }
}

/// The completion report embedded in PR bodies and posted as a comment on
/// the no-changes and fallback paths.
pub fn completion_report(report: &RunReport) -> String {
    let glyph = if report.success { "✅" } else { "❌" };
    let mut out = String::with_capacity(512);
    out.push_str("## Completion Report\n\n");
    out.push_str(&format!("- **Status**: {} {}\n", glyph, report.status));
    out.push_str(&format!("- **Issue**: {} #{}\n", report.repo, report.issue_number));
    out.push_str(&format!(
        "- **Execution time**: {}\n",
        time_fmt::format_elapsed_ms(report.execution_time_ms)
    ));
    out.push_str(&format!("- **Model**: {}\n", report.model));
    out.push_str(&format!("- **Turns**: {}\n", report.turns));
    out.push_str(&format!("- **Cost**: ${:.4}\n", report.cost_usd));
    if let Some(session) = &report.session_id {
        out.push_str(&format!("- **Session ID**: {session}\n"));
    }
    if let Some(conversation) = &report.conversation_id {
        out.push_str(&format!("- **Conversation ID**: {conversation}\n"));
    }
    if report.max_turns_reached {
        out.push_str("\n⚠️ **Max Turns Reached** — the agent hit its turn cap before finishing.\n");
    }
    if let Some(summary) = &report.summary {
        out.push_str(&format!("\n### Summary\n\n{summary}\n"));
    }
    out
}

/// PR body: closes-keyword first so the forge links the issue, then run
/// details and the embedded completion report.
pub fn pr_body(
    issue_number: u64,
    model: &str,
    branch: &str,
    commit_hash: Option<&str>,
    report: &RunReport,
) -> String {
    let mut out = String::with_capacity(1024);
    out.push_str(&format!("Closes #{issue_number}\n\n"));
    out.push_str(&format!("- **Model**: {model}\n"));
    out.push_str(&format!("- **Branch**: `{branch}`\n"));
    if let Some(hash) = commit_hash {
        out.push_str(&format!("- **Commit**: `{}`\n", short(hash, 8)));
    }
    out.push_str(&format!("- **Status**: {}\n\n", report.status));
    out.push_str(&completion_report(report));
    out
}

/// Comment posted when a job picks an issue up.
pub fn processing_started(model: &str, branch: &str, base: &str, worktree_name: &str) -> String {
    format!(
        "🤖 Processing started.\n\n- **Model**: {model}\n- **Branch**: `{branch}`\n- **Base**: `{base}`\n- **Worktree**: `{worktree_name}`\n"
    )
}

/// Informational comment for the usage-limit requeue path.
pub fn usage_limit_comment(reset_at_epoch_secs: u64, delay_ms: u64) -> String {
    format!(
        "⏳ The provider's usage limit is exhausted. Work on this issue will automatically resume after **{}** (re-queued with a {} delay).",
        time_fmt::format_epoch_secs(reset_at_epoch_secs),
        time_fmt::format_elapsed_ms(delay_ms),
    )
}

/// Comment posted when the agent finished without touching the tree.
pub fn no_changes_comment(report: &RunReport) -> String {
    format!(
        "🔍 Analyzed the issue — no changes necessary. The agent reviewed the repository and concluded the current code already satisfies the request.\n\n{}",
        completion_report(report)
    )
}

/// User-visible failure comment with collapsible detail.
pub fn failure_comment(category: ErrorCategory, message: &str, detail: &str, will_retry: bool) -> String {
    let retry_note = if will_retry {
        "An automatic retry will follow."
    } else {
        "No further retries are scheduled."
    };
    format!(
        "❌ Processing failed (`{category}`): {message}\n\n<details>\n<summary>Details</summary>\n\n```\n{detail}\n```\n\n</details>\n\n{retry_note}"
    )
}

// --- PR follow-up templates ---

/// Markers a bot comment uses to cite a processed comment id. Any of these
/// appearing in an earlier bot comment marks the id as already handled.
pub fn citation_markers(comment_id: u64) -> [String; 3] {
    [
        format!("Comment ID: {comment_id}"),
        format!("comment #{comment_id}"),
        format!("Processing comment ID: {comment_id}"),
    ]
}

/// True when `comment_id` has been cited by any prior bot comment.
pub fn is_comment_processed(prior_comments: &[Comment], comment_id: u64, bot_name: Option<&str>) -> bool {
    let markers = citation_markers(comment_id);
    prior_comments
        .iter()
        .filter(|c| c.author.is_bot(bot_name))
        .any(|c| markers.iter().any(|marker| c.body.contains(marker)))
}

/// Acknowledgment posted before follow-up work starts. Cites every comment
/// id so duplicate deliveries are detected next time.
pub fn followup_ack(comments: &[Comment]) -> String {
    let mut out = String::from("🔧 Starting work on follow-up changes.\n\nProcessing:\n");
    for comment in comments {
        out.push_str(&format!(
            "- Comment ID: {} by @{}\n",
            comment.id, comment.author.login
        ));
    }
    out
}

/// Commit message for applied follow-up changes.
pub fn followup_commit_message(pr_number: u64, comments: &[Comment]) -> String {
    let mut out = format!("feat(ai): Apply follow-up changes from PR #{pr_number} comments\n\n");
    for comment in comments {
        out.push_str(&format!("- Comment #{} by @{}\n", comment.id, comment.author.login));
    }
    out
}

/// Confirmation comment after follow-up changes are pushed.
pub fn followup_confirmation(
    commit_hash: &str,
    comments: &[Comment],
    report: &RunReport,
) -> String {
    let mut out = String::from("✅ Applied follow-up changes.\n\n");
    out.push_str(&format!("- **Commit**: `{}`\n", short(commit_hash, 8)));
    out.push_str(&format!(
        "- **Execution time**: {}\n",
        time_fmt::format_elapsed_ms(report.execution_time_ms)
    ));
    out.push_str(&format!("- **Turns**: {}\n", report.turns));
    out.push_str(&format!("- **Cost**: ${:.4}\n", report.cost_usd));
    out.push_str("\nAddressed:\n");
    for comment in comments {
        out.push_str(&format!("- Comment ID: {} by @{}\n", comment.id, comment.author.login));
    }
    if let Some(summary) = &report.summary {
        out.push_str(&format!("\n{summary}\n"));
    }
    out
}

/// Comment when follow-up analysis found nothing to change.
pub fn followup_no_changes(comments: &[Comment]) -> String {
    let mut out = String::from(
        "🔍 Analyzed the requested follow-up — no changes necessary.\n\nReviewed:\n",
    );
    for comment in comments {
        out.push_str(&format!("- Comment ID: {} by @{}\n", comment.id, comment.author.login));
    }
    out
}

/// Prompt for a follow-up run: the remaining comments, numbered and
/// author-prefixed, pinned to the PR's directory and branch.
pub fn followup_prompt(
    owner: &str,
    repo: &str,
    pr_number: u64,
    branch: &str,
    comments: &[Comment],
) -> String {
    let mut out = format!(
        "You are working in the checked-out worktree of {owner}/{repo} PR #{pr_number} (branch `{branch}`).\n\nApply the changes requested in these review comments:\n"
    );
    for (index, comment) in comments.iter().enumerate() {
        out.push_str(&format!(
            "\n{}. @{} (comment {}):\n{}\n",
            index + 1,
            comment.author.login,
            comment.id,
            comment.body
        ));
    }
    out.push_str(
        "\nEdit files in place. Do not commit, push, or open a new pull request; the service handles git.\n",
    );
    out
}

/// Prompt for the emergency PR-creation-only retry.
pub fn pr_only_prompt(owner: &str, repo: &str, issue_number: u64, branch: &str, base: &str) -> String {
    format!(
        "The implementation for {owner}/{repo} issue #{issue_number} is already committed and pushed on branch `{branch}`.\n\nYour ONLY task: create a pull request from `{branch}` into `{base}` using the `gh` CLI (e.g. `gh pr create`). Include `Closes #{issue_number}` in the body. Do not change any files."
    )
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
