// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Default prompt construction for issue-implementation runs.

use gitfix_core::AgentRequest;

/// Build the prompt handed to the provider when the caller supplied no
/// custom one: issue coordinates, title/body, human discussion, and the
/// ground rules for working inside the prepared worktree.
pub fn issue_prompt(request: &AgentRequest) -> String {
    let issue = &request.issue;
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(&format!(
        "You are working in a git worktree for {} issue #{}.\n",
        issue.repo_slug(),
        issue.number
    ));
    if let Some(branch) = &request.branch_name {
        prompt.push_str(&format!("The current branch is `{branch}`. Stay on it.\n"));
    }
    prompt.push('\n');

    match &request.issue_details {
        Some(details) => {
            prompt.push_str(&format!("## Issue: {}\n\n{}\n", details.title, details.body));
            if !details.comments.is_empty() {
                prompt.push_str("\n## Discussion\n");
                for comment in &details.comments {
                    prompt.push_str(&format!("\n@{} wrote:\n{}\n", comment.author.login, comment.body));
                }
            }
        }
        None => {
            if let Some(title) = &issue.title {
                prompt.push_str(&format!("## Issue: {title}\n"));
            }
        }
    }

    prompt.push_str(
        "\nImplement the change this issue asks for. Edit files in place; \
         do not commit, push, or open a pull request yourself.\n",
    );

    if request.is_retry {
        prompt.push_str("\nThis is a retry");
        if let Some(reason) = &request.retry_reason {
            prompt.push_str(&format!(" ({reason})"));
        }
        prompt.push_str(". Check existing work in the tree before starting over.\n");
    }
    prompt
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
