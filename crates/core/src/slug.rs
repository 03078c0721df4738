// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Title slugging for branch and worktree names.

/// Sanitize a title into a branch-safe slug.
///
/// Lowercase, non-alphanumeric replaced by `-`, consecutive dashes
/// collapsed, leading/trailing dashes trimmed, truncated to `max_len`.
/// Underscores survive. Returns an empty string only when the input
/// contains no alphanumerics.
pub fn slug(title: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(title.len().min(max_len));
    let mut last_dash = true; // suppress a leading dash
    for ch in title.chars() {
        let mapped = if ch.is_ascii_alphanumeric() {
            Some(ch.to_ascii_lowercase())
        } else if ch == '_' {
            Some('_')
        } else {
            None
        };
        match mapped {
            Some(c) => {
                out.push(c);
                last_dash = false;
            }
            None => {
                if !last_dash {
                    out.push('-');
                    last_dash = true;
                }
            }
        }
        if out.len() >= max_len {
            break;
        }
    }
    out.truncate(max_len);
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
#[path = "slug_tests.rs"]
mod tests;
