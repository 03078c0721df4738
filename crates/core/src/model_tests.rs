// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[yare::parameterized(
    opus        = { "opus", "claude-opus-4" },
    sonnet      = { "sonnet", "claude-sonnet-4" },
    upper       = { "SONNET", "claude-sonnet-4" },
    mixed       = { "GpT4", "gpt-4o" },
    gemini      = { "gemini", "gemini-2.5-pro" },
    historical  = { "claude-3-5-sonnet", "claude-sonnet-4" },
    passthrough = { "claude-sonnet-4", "claude-sonnet-4" },
    unknown     = { "my-local-model", "my-local-model" },
    padded      = { "  sonnet  ", "claude-sonnet-4" },
)]
fn alias_resolution(input: &str, expected: &str) {
    assert_eq!(resolve_alias(input), expected);
}

#[yare::parameterized(
    claude_short = { "sonnet", Provider::Claude },
    claude_full  = { "claude-opus-4", Provider::Claude },
    openai       = { "gpt4", Provider::OpenAi },
    o3           = { "o3", Provider::OpenAi },
    gemini       = { "gemini-flash", Provider::Gemini },
    unknown      = { "mystery-model", Provider::Claude },
)]
fn provider_mapping(model: &str, expected: Provider) {
    assert_eq!(provider_for(model), expected);
}

#[test]
fn stagger_is_deterministic_and_bounded() {
    let a = stagger_delay_ms("claude-sonnet-4");
    let b = stagger_delay_ms("claude-sonnet-4");
    assert_eq!(a, b);
    assert!((500..2000).contains(&a));
}

#[test]
fn stagger_differs_across_models() {
    // Not guaranteed in general, but these particular names must de-phase.
    assert_ne!(stagger_delay_ms("claude-sonnet-4"), stagger_delay_ms("gpt-4o"));
}

proptest! {
    #[test]
    fn alias_resolution_is_idempotent(name in "[a-zA-Z0-9._-]{0,32}") {
        let once = resolve_alias(&name);
        let twice = resolve_alias(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn stagger_stays_in_window(name in ".{0,64}") {
        let d = stagger_delay_ms(&name);
        prop_assert!((500..2000).contains(&d));
    }
}
