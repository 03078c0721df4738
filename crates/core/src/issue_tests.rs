// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn issue_ref_display() {
    let issue = IssueRef::new("acme", "widget", 42);
    assert_eq!(issue.to_string(), "acme/widget#42");
    assert_eq!(issue.repo_slug(), "acme/widget");
}

#[test]
fn issue_ref_setters() {
    let issue = IssueRef::new("acme", "widget", 7)
        .title("Fix parser")
        .model_name("sonnet")
        .correlation_id(CorrelationId::from_string("corr-x"));
    assert_eq!(issue.title.as_deref(), Some("Fix parser"));
    assert_eq!(issue.model_name.as_deref(), Some("sonnet"));
}

#[test]
fn issue_ref_serde_skips_absent_options() {
    let issue = IssueRef::new("acme", "widget", 7);
    let json = serde_json::to_string(&issue).unwrap();
    assert!(!json.contains("title"));
    assert!(!json.contains("model_name"));
}

#[yare::parameterized(
    forge_bot_type   = { CommentAuthor::bot("some-app"), None, true },
    bracket_suffix   = { CommentAuthor::user("dependabot[bot]"), None, true },
    configured_name  = { CommentAuthor::user("gitfix-bot"), Some("gitfix-bot"), true },
    plain_user       = { CommentAuthor::user("alice"), None, false },
    other_configured = { CommentAuthor::user("alice"), Some("gitfix-bot"), false },
)]
fn bot_detection(author: CommentAuthor, configured: Option<&str>, expected: bool) {
    assert_eq!(author.is_bot(configured), expected);
}

#[test]
fn filter_bot_comments_counts_removed() {
    let comments = vec![
        Comment::new(1, CommentAuthor::user("alice"), "please fix"),
        Comment::new(2, CommentAuthor::bot("gitfix"), "working on it"),
        Comment::new(3, CommentAuthor::user("renovate[bot]"), "bump deps"),
    ];
    let (kept, removed) = IssueDetails::filter_bot_comments(comments, None);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, 1);
    assert_eq!(removed, 2);
}

#[test]
fn has_label() {
    let details = IssueDetails {
        labels: vec!["AI".to_string(), "bug".to_string()],
        ..Default::default()
    };
    assert!(details.has_label("AI"));
    assert!(!details.has_label("AI-done"));
}
