// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::issue_prompt;
use gitfix_core::{AgentRequest, Comment, CommentAuthor, IssueDetails, IssueRef};

fn request() -> AgentRequest {
    AgentRequest::new("/tmp/wt", IssueRef::new("acme", "widget", 42), "tok", "claude-sonnet-4")
}

#[test]
fn prompt_names_repo_and_issue() {
    let prompt = issue_prompt(&request());
    assert!(prompt.contains("acme/widget"));
    assert!(prompt.contains("#42"));
}

#[test]
fn prompt_includes_details_and_discussion() {
    let details = IssueDetails {
        title: "Fix parser".to_string(),
        body: "The parser chokes on tabs.".to_string(),
        labels: vec![],
        author: CommentAuthor::user("alice"),
        comments: vec![Comment::new(1, CommentAuthor::user("bob"), "also fails on CRLF")],
    };
    let prompt = issue_prompt(&request().issue_details(details));
    assert!(prompt.contains("Fix parser"));
    assert!(prompt.contains("chokes on tabs"));
    assert!(prompt.contains("@bob wrote:"));
    assert!(prompt.contains("CRLF"));
}

#[test]
fn prompt_forbids_agent_git_actions() {
    let prompt = issue_prompt(&request());
    assert!(prompt.contains("do not commit, push, or open a pull request"));
}

#[test]
fn retry_prompt_carries_reason() {
    let prompt = issue_prompt(&request().is_retry(true).retry_reason("no PR detected"));
    assert!(prompt.contains("This is a retry"));
    assert!(prompt.contains("no PR detected"));
}

#[test]
fn branch_pin_included_when_known() {
    let prompt = issue_prompt(&request().branch_name("ai-fix/42-x-abc"));
    assert!(prompt.contains("ai-fix/42-x-abc"));
}
