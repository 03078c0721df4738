// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers and proptest strategies.

pub mod strategies {
    use crate::task::TaskStage;
    use proptest::prelude::*;

    pub fn arb_task_stage() -> impl Strategy<Value = TaskStage> {
        prop_oneof![
            Just(TaskStage::Created),
            Just(TaskStage::Setup),
            Just(TaskStage::Processing),
            Just(TaskStage::ClaudeExecution),
            Just(TaskStage::GitOperations),
            Just(TaskStage::PostProcessing),
            Just(TaskStage::Completed),
            Just(TaskStage::Failed),
        ]
    }
}
