use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Result, StateDelta, Task, TaskResult};
use std::time::Duration;
use tracing::{error, info};

use super::{
    session_keys, stage_ids,
    utils::{agent_outputs, require_case, research_bundle},
};
use crate::{consensus::ConsensusBuilder, models::ConsensusReport};

pub struct BuildConsensusTask {
    builder: ConsensusBuilder,
}

impl BuildConsensusTask {
    pub fn new(builder: ConsensusBuilder) -> Self {
        Self { builder }
    }

    fn report_result(&self, report: &ConsensusReport, note: Option<String>) -> Result<TaskResult> {
        let mut delta = StateDelta::new().with(session_keys::CONSENSUS_REPORT, report)?;
        let status = match note {
            Some(note) => {
                delta.insert(session_keys::stage_error(self.id()), &note)?;
                format!("degraded consensus: {note}")
            }
            None => format!("{} sections, {} notes", report.sections.len(), report.notes.len()),
        };
        Ok(TaskResult::new_with_status(delta, NextAction::Continue, Some(status)))
    }
}

#[async_trait]
impl Task for BuildConsensusTask {
    fn id(&self) -> &str {
        stage_ids::BUILD_CONSENSUS
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        let outputs = agent_outputs(&context).await;
        let bundle = research_bundle(&context).await;
        info!(task_id = %self.id(), outputs = outputs.len(), "Building consensus");

        match self.builder.synthesize(&case, &outputs, &bundle).await {
            Ok(report) => self.report_result(&report, None),
            Err(err) if err.is_fatal() => {
                error!(task_id = %self.id(), error = %err, "No LLM provider available");
                Err(GraphError::TaskExecutionFailed(format!(
                    "consensus synthesis could not reach any LLM provider: {err}"
                )))
            }
            Err(err) => {
                let reason = err.to_string();
                let report = self
                    .builder
                    .assemble_degraded(&case, &outputs, &bundle, &reason);
                self.report_result(&report, Some(reason))
            }
        }
    }

    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        let outputs = agent_outputs(&context).await;
        let bundle = research_bundle(&context).await;
        let reason = format!("consensus synthesis timed out after {} ms", limit.as_millis());
        let report = self
            .builder
            .assemble_degraded(&case, &outputs, &bundle, &reason);
        self.report_result(&report, Some(reason))
    }
}
