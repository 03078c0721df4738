// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gitfix-core: domain types shared by every gitfix crate.

pub mod macros;

pub mod agent;
pub mod category;
pub mod clock;
pub mod id;
pub mod issue;
pub mod job;
pub mod keys;
pub mod metrics;
pub mod model;
pub mod slug;
pub mod task;
pub mod time_fmt;
pub mod worker;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{AgentEvent, AgentFailureKind, AgentOutcome, AgentRequest, AgentRun};
pub use category::{categorize_error, ErrorCategory};
pub use clock::{Clock, FakeClock, SystemClock};
pub use id::{CorrelationId, JobId};
pub use issue::{Comment, CommentAuthor, IssueDetails, IssueRef};
pub use job::{
    FollowupPayload, ImportPayload, IssuePayload, JobEnvelope, JobKind, JobOptions, JobPayload,
    JobState, RetentionWindow,
};
pub use metrics::{ActivityEvent, AiLogEntry, HighCostAlert, ACTIVITY_LOG_CAP, HIGH_COST_ALERT_CAP};
pub use model::{provider_for, resolve_alias, stagger_delay_ms, Provider};
pub use slug::slug;
pub use task::{TaskHistoryEntry, TaskId, TaskMetadata, TaskStage, TaskState};
#[cfg(any(test, feature = "test-support"))]
pub use task::TaskStateBuilder;
pub use worker::{
    WorkerHeartbeat, WorkerId, HEARTBEAT_INTERVAL_SECS, HEARTBEAT_TTL_SECS, WORKER_ENTRY_TTL_SECS,
};
