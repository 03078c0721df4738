// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job processors and the context they share.

mod drain;
mod followup;
mod import;
mod issue;

#[cfg(test)]
pub(crate) mod harness;

pub use drain::{drain_agent_events, DrainedIds};
pub use followup::PrFollowupJobProcessor;
pub use import::ImportTaskProcessor;
pub use issue::IssueJobProcessor;

use crate::env::WorkerConfig;
use crate::metrics::MetricsRecorder;
use crate::task_state::TaskStateManager;
use async_trait::async_trait;
use gitfix_adapters::{CodingAgent, ForgeClient};
use gitfix_core::{provider_for, Clock, JobEnvelope, JobKind, JobPayload, Provider};
use gitfix_queue::{JobError, JobHandler, JobResult, Queue};
use gitfix_store::KvStore;
use gitfix_workspace::{TokenSource, WorkspaceManager};
use std::collections::HashMap;
use std::sync::Arc;

/// Coding agents by provider, resolved through the model alias table.
pub struct AgentRegistry {
    agents: HashMap<Provider, Arc<dyn CodingAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self { agents: HashMap::new() }
    }

    pub fn register(mut self, provider: Provider, agent: Arc<dyn CodingAgent>) -> Self {
        self.agents.insert(provider, agent);
        self
    }

    /// One agent for every provider (tests, single-provider deployments).
    pub fn uniform(agent: Arc<dyn CodingAgent>) -> Self {
        Self::new()
            .register(Provider::Claude, agent.clone())
            .register(Provider::OpenAi, agent.clone())
            .register(Provider::Gemini, agent)
    }

    /// Agent for a model name. Unknown models resolve to the Claude agent;
    /// a missing provider falls back to any registered agent.
    pub fn for_model(&self, model: &str) -> Option<Arc<dyn CodingAgent>> {
        let provider = provider_for(model);
        self.agents
            .get(&provider)
            .or_else(|| self.agents.get(&Provider::Claude))
            .or_else(|| self.agents.values().next())
            .cloned()
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a processor needs, wired once at boot.
pub struct WorkerContext<C: Clock> {
    pub store: Arc<dyn KvStore>,
    pub queue: Queue<C>,
    pub forge: Arc<dyn ForgeClient>,
    pub agents: AgentRegistry,
    pub workspaces: Arc<WorkspaceManager<C>>,
    pub tasks: TaskStateManager<C>,
    pub metrics: Arc<MetricsRecorder<C>>,
    pub config: WorkerConfig,
    pub clock: C,
}

/// Token refresh for pushes, backed by the forge's installation tokens.
pub struct ForgeTokenSource {
    forge: Arc<dyn ForgeClient>,
}

impl ForgeTokenSource {
    pub fn new(forge: Arc<dyn ForgeClient>) -> Self {
        Self { forge }
    }
}

#[async_trait]
impl TokenSource for ForgeTokenSource {
    async fn fresh_token(&self) -> Result<String, String> {
        self.forge.get_installation_token().await.map_err(|e| e.to_string())
    }
}

/// Routes claimed jobs to their processor by kind.
pub struct JobRouter<C: Clock> {
    issue: IssueJobProcessor<C>,
    followup: PrFollowupJobProcessor<C>,
    import: ImportTaskProcessor<C>,
}

impl<C: Clock> JobRouter<C> {
    pub fn new(ctx: Arc<WorkerContext<C>>) -> Self {
        Self {
            issue: IssueJobProcessor::new(ctx.clone()),
            followup: PrFollowupJobProcessor::new(ctx.clone()),
            import: ImportTaskProcessor::new(ctx),
        }
    }

    /// Every kind this router serves.
    pub fn kinds() -> Vec<JobKind> {
        vec![JobKind::ImplementIssue, JobKind::ApplyPrFollowup, JobKind::ImportTask]
    }
}

#[async_trait]
impl<C: Clock> JobHandler for JobRouter<C> {
    async fn handle(&self, job: JobEnvelope) -> JobResult {
        match &job.payload {
            JobPayload::ImplementIssue(payload) => {
                self.issue.process(&job, &payload.clone()).await
            }
            JobPayload::ApplyPrFollowup(payload) => {
                self.followup.process(&job, &payload.clone()).await
            }
            JobPayload::ImportTask(payload) => self.import.process(&job, &payload.clone()).await,
        }
    }
}

/// Internal step failure: what broke and at which stage, for
/// categorization and task-state bookkeeping.
#[derive(Debug)]
pub(crate) struct StepFailure {
    pub stage: gitfix_core::TaskStage,
    pub message: String,
}

impl StepFailure {
    pub(crate) fn new(stage: gitfix_core::TaskStage, message: impl Into<String>) -> Self {
        Self { stage, message: message.into() }
    }

    pub(crate) fn into_job_error(self) -> JobError {
        JobError::new(self.message)
    }
}
