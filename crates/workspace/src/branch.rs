// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Branch and worktree naming.
//!
//! Format: `ai-fix/{issue#}-{slug}-{YYYYMMDD-HHMM}[-{model}]-{rand3}`.
//! The timestamp plus nonce make concurrent allocations for the same
//! `(issue, model)` pair distinct by construction.

use gitfix_core::{slug, time_fmt};

const SLUG_MAX: usize = 25;
const NONCE_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Inputs for one branch allocation.
#[derive(Debug, Clone)]
pub struct BranchParts {
    pub issue_number: u64,
    pub title: String,
    pub model: Option<String>,
    pub epoch_ms: u64,
}

/// Allocate a fresh branch name. Each call draws a new nonce.
pub fn branch_name(parts: &BranchParts) -> String {
    let slug = slug(&parts.title, SLUG_MAX);
    let stamp = time_fmt::branch_stamp(parts.epoch_ms);
    let nonce = nanoid::nanoid!(3, &NONCE_ALPHABET);
    let mut name = format!("ai-fix/{}", parts.issue_number);
    if !slug.is_empty() {
        name.push('-');
        name.push_str(&slug);
    }
    name.push('-');
    name.push_str(&stamp);
    if let Some(model) = &parts.model {
        let model_slug = gitfix_core::slug(model, 20);
        if !model_slug.is_empty() {
            name.push('-');
            name.push_str(&model_slug);
        }
    }
    name.push('-');
    name.push_str(&nonce);
    name
}

/// Directory name for a worktree of `branch` (slashes flattened).
pub fn worktree_dir_name(branch: &str) -> String {
    branch.replace('/', "-")
}

/// Check a name against the host's ref naming rules: no spaces, no `..`,
/// none of `~^:*?[]@{`, no leading/trailing slash, no `.lock` suffix.
pub fn is_valid_branch_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
        return false;
    }
    if name.contains("..") || name.ends_with(".lock") || name.contains("@{") {
        return false;
    }
    !name.chars().any(|c| {
        c.is_ascii_whitespace()
            || c.is_ascii_control()
            || matches!(c, '~' | '^' | ':' | '*' | '?' | '[' | ']' | '\\')
    })
}

#[cfg(test)]
#[path = "branch_tests.rs"]
mod tests;
