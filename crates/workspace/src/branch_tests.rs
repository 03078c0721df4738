// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn parts(title: &str, model: Option<&str>) -> BranchParts {
    BranchParts {
        issue_number: 42,
        title: title.to_string(),
        model: model.map(str::to_string),
        epoch_ms: 1_700_000_000_000,
    }
}

#[test]
fn branch_name_shape() {
    let name = branch_name(&parts("Fix the parser", Some("sonnet")));
    assert!(name.starts_with("ai-fix/42-fix-the-parser-20231114-2213-sonnet-"));
    let nonce = name.rsplit('-').next().unwrap();
    assert_eq!(nonce.len(), 3);
    assert!(is_valid_branch_name(&name));
}

#[test]
fn branch_name_without_model() {
    let name = branch_name(&parts("Fix parser", None));
    assert!(name.starts_with("ai-fix/42-fix-parser-20231114-2213-"));
}

#[test]
fn branch_name_with_empty_title() {
    let name = branch_name(&parts("!!!", None));
    assert!(name.starts_with("ai-fix/42-20231114-2213-"));
    assert!(is_valid_branch_name(&name));
}

#[test]
fn two_allocations_differ() {
    let p = parts("Fix parser", Some("sonnet"));
    // Same inputs, fresh nonce each draw.
    assert_ne!(branch_name(&p), branch_name(&p));
}

#[test]
fn worktree_dir_flattens_slash() {
    assert_eq!(worktree_dir_name("ai-fix/42-x-abc"), "ai-fix-42-x-abc");
}

#[yare::parameterized(
    plain      = { "ai-fix/42-slug-abc", true },
    dotdot     = { "ai-fix/..-x", false },
    space      = { "ai fix", false },
    tilde      = { "a~b", false },
    colon      = { "a:b", false },
    glob       = { "a*b", false },
    bracket    = { "a[b", false },
    at_brace   = { "a@{b", false },
    lock       = { "branch.lock", false },
    leading    = { "/branch", false },
    trailing   = { "branch/", false },
    empty      = { "", false },
)]
fn branch_validation(name: &str, expected: bool) {
    assert_eq!(is_valid_branch_name(name), expected);
}

proptest! {
    #[test]
    fn generated_names_are_always_valid(title in ".{0,80}", model in proptest::option::of("[a-zA-Z0-9.-]{0,30}")) {
        let name = branch_name(&BranchParts {
            issue_number: 7,
            title,
            model,
            epoch_ms: 1_700_000_000_000,
        });
        prop_assert!(is_valid_branch_name(&name));
        prop_assert!(!worktree_dir_name(&name).contains('/'));
    }
}
