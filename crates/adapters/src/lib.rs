// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gitfix-adapters: capabilities onto the outside world.
//!
//! Three seams: the code forge (GitHub), the coding agent (provider CLIs
//! run inside a sandbox), and the sandbox itself (docker). Everything the
//! worker knows about these systems goes through the traits here, so tests
//! run against the fakes exported under the `test-support` feature.

pub mod agent;
pub mod forge;
pub mod retry;
pub mod sandbox;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{AgentError, CodingAgent, SandboxAgent};
pub use forge::{
    ForgeClient, ForgeError, ForgeIssue, GithubForge, GithubForgeConfig, NewPullRequest,
    PullRequest,
};
pub use retry::{with_retry, RetryPolicy, Retryable};
pub use sandbox::{DockerSandbox, Sandbox, SandboxError, SandboxHandle, SandboxRun, SandboxSpec};

#[cfg(any(test, feature = "test-support"))]
pub use test_support::{FakeAgent, FakeForge, FakeSandbox};
