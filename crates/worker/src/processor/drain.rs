// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event drain: streams live agent output into the store's pub/sub
//! channels while a run is in flight.

use gitfix_core::{keys, AgentEvent, CorrelationId, TaskId};
use gitfix_store::KvStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Ids observed in the event stream, applied to task metadata once the
/// run settles.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainedIds {
    pub session_id: Option<String>,
    pub container_id: Option<String>,
    pub container_name: Option<String>,
}

/// Execution-log locators live this long.
const LOG_LOCATOR_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Spawn the drain for one agent run. Returns a join handle resolving to
/// the ids seen in the stream.
pub fn drain_agent_events(
    store: Arc<dyn KvStore>,
    task_id: TaskId,
    correlation_id: CorrelationId,
    mut events: mpsc::Receiver<AgentEvent>,
) -> tokio::task::JoinHandle<DrainedIds> {
    tokio::spawn(async move {
        let mut ids = DrainedIds::default();
        let log_channel = keys::task_log_channel(&task_id);
        let diff_channel = keys::task_diff_channel(&task_id);
        let status_channel = keys::task_status_channel(&task_id);

        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::SessionStarted { session_id } => {
                    let locator = serde_json::json!({
                        "taskId": task_id,
                        "correlationId": correlation_id,
                    });
                    if let Ok(raw) = serde_json::to_vec(&locator) {
                        let _ = store
                            .set(&keys::session_log(&session_id), raw, Some(LOG_LOCATOR_TTL))
                            .await;
                    }
                    publish_json(
                        &store,
                        &status_channel,
                        serde_json::json!({"event": "session_started", "sessionId": session_id}),
                    )
                    .await;
                    ids.session_id = Some(session_id);
                }
                AgentEvent::ContainerStarted { container_id, container_name } => {
                    publish_json(
                        &store,
                        &status_channel,
                        serde_json::json!({
                            "event": "container_started",
                            "containerId": container_id,
                            "containerName": container_name,
                        }),
                    )
                    .await;
                    ids.container_id = Some(container_id);
                    ids.container_name = Some(container_name);
                }
                AgentEvent::OutputChunk { line } => {
                    let _ = store.publish(&log_channel, line.into_bytes()).await;
                }
                AgentEvent::DiffChunk { diff } => {
                    let _ = store.publish(&diff_channel, diff.into_bytes()).await;
                }
            }
        }
        ids
    })
}

async fn publish_json(store: &Arc<dyn KvStore>, channel: &str, value: serde_json::Value) {
    if let Ok(raw) = serde_json::to_vec(&value) {
        let _ = store.publish(channel, raw).await;
    }
}

#[cfg(test)]
#[path = "drain_tests.rs"]
mod tests;
