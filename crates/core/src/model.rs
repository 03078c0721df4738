// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Model alias resolution, provider mapping and the per-model stagger delay.

use serde::{Deserialize, Serialize};

/// Static alias table: short names and historical aliases to canonical ids.
/// Resolution is case-insensitive; unrecognized names pass through unchanged.
const ALIASES: &[(&str, &str)] = &[
    ("opus", "claude-opus-4"),
    ("sonnet", "claude-sonnet-4"),
    ("haiku", "claude-haiku-3-5"),
    ("claude", "claude-sonnet-4"),
    ("claude-3-opus", "claude-opus-4"),
    ("claude-3-sonnet", "claude-sonnet-4"),
    ("claude-3-5-sonnet", "claude-sonnet-4"),
    ("gpt4", "gpt-4o"),
    ("gpt-4", "gpt-4o"),
    ("gpt4o", "gpt-4o"),
    ("o3", "o3"),
    ("gemini", "gemini-2.5-pro"),
    ("gemini-pro", "gemini-2.5-pro"),
    ("gemini-flash", "gemini-2.5-flash"),
];

/// Resolve a model short name or historical alias to its canonical id.
///
/// Idempotent: resolving an already-canonical id returns it unchanged.
pub fn resolve_alias(name: &str) -> String {
    let lower = name.trim().to_ascii_lowercase();
    for (alias, canonical) in ALIASES {
        if lower == *alias {
            return (*canonical).to_string();
        }
    }
    // Canonical ids and unknown names pass through (trimmed).
    name.trim().to_string()
}

/// LLM provider behind a model id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Claude,
    OpenAi,
    Gemini,
}

crate::simple_display! {
    Provider {
        Claude => "claude",
        OpenAi => "openai",
        Gemini => "gemini",
    }
}

/// Map a model name (alias or canonical) to its provider.
/// Unknown models default to Claude.
pub fn provider_for(name: &str) -> Provider {
    let canonical = resolve_alias(name).to_ascii_lowercase();
    if canonical.starts_with("gpt") || canonical.starts_with("o3") || canonical.starts_with("o4") {
        Provider::OpenAi
    } else if canonical.starts_with("gemini") {
        Provider::Gemini
    } else {
        Provider::Claude
    }
}

/// The classic JS string hash `((h << 5) - h) + ch`, reduced mod 2^32.
fn js_hash(s: &str) -> u32 {
    let mut h: u32 = 0;
    for ch in s.chars() {
        h = h.wrapping_shl(5).wrapping_sub(h).wrapping_add(ch as u32);
    }
    h
}

/// Deterministic per-model stagger before heavy work:
/// `base + (|hash(model)| mod spread)` milliseconds.
///
/// Two concurrent jobs for the same issue under different models de-phase
/// their filesystem and API bursts. Not a correctness mechanism (worktree
/// names carry a random nonce).
pub fn stagger_delay_ms(model: &str) -> u64 {
    const BASE_MS: u64 = 500;
    const SPREAD_MS: u64 = 1500;
    // The JS original takes Math.abs of a 32-bit signed hash.
    let h = js_hash(model) as i32;
    BASE_MS + (h.unsigned_abs() as u64) % SPREAD_MS
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
