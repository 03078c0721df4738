// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    network     = { ForgeError::Network("socket hang up".into()), true },
    too_many    = { ForgeError::Api { status: 429, message: "slow down".into() }, true },
    bad_gateway = { ForgeError::Api { status: 502, message: "bad gateway".into() }, true },
    unavailable = { ForgeError::Api { status: 503, message: "unavailable".into() }, true },
    rate_msg    = { ForgeError::Api { status: 403, message: "API rate limit exceeded".into() }, true },
    timeout_msg = { ForgeError::Api { status: 400, message: "request timed out".into() }, true },
    unprocess   = { ForgeError::Api { status: 422, message: "already exists".into() }, false },
    not_found   = { ForgeError::NotFound("no such label".into()), false },
    auth        = { ForgeError::Auth("bad credentials".into()), false },
)]
fn retryability(err: ForgeError, expected: bool) {
    assert_eq!(err.is_retryable(), expected);
}

#[test]
fn new_pull_request_holds_keyword_body() {
    let pr = NewPullRequest {
        title: "fix(ai): Resolve issue #42".to_string(),
        head: "ai-fix/42-x".to_string(),
        base: "main".to_string(),
        body: "Closes #42\n\nDetails...".to_string(),
        draft: false,
    };
    assert!(pr.body.starts_with("Closes #42"));
}
