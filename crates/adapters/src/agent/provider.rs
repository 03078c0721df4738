// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-provider command lines run inside the sandbox.
//!
//! The alias table maps model names to providers; each provider's CLI takes
//! the prompt and model and emits line-delimited JSON we can stream.

use gitfix_core::{provider_for, resolve_alias, Provider};

/// Build the sandbox command for `model` with the given prompt.
pub fn provider_command(model: &str, prompt: &str) -> Vec<String> {
    let canonical = resolve_alias(model);
    match provider_for(model) {
        Provider::Claude => vec![
            "claude".into(),
            "-p".into(),
            prompt.into(),
            "--model".into(),
            canonical,
            "--output-format".into(),
            "stream-json".into(),
            "--verbose".into(),
            "--dangerously-skip-permissions".into(),
        ],
        Provider::OpenAi => vec![
            "codex".into(),
            "exec".into(),
            "--model".into(),
            canonical,
            "--json".into(),
            "--full-auto".into(),
            prompt.into(),
        ],
        Provider::Gemini => vec![
            "gemini".into(),
            "-m".into(),
            canonical,
            "--yolo".into(),
            "-p".into(),
            prompt.into(),
        ],
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
