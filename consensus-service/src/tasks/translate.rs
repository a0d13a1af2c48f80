use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Result, StateDelta, Task, TaskResult};
use std::time::Duration;
use tracing::info;

use super::{session_keys, stage_ids, utils::require_case};
use crate::{
    models::{ConsensusReport, TranslationResult},
    translation::{self, TranslationAgent},
};

/// Runs only when the case asked for a language. The result is kept next to the
/// report and attached to it when the run is finalized.
pub struct TranslateTask {
    agent: TranslationAgent,
}

impl TranslateTask {
    pub fn new(agent: TranslationAgent) -> Self {
        Self { agent }
    }

    async fn inputs(&self, context: &Context) -> Result<(ConsensusReport, String)> {
        let case = require_case(context).await?;
        let report: ConsensusReport = context
            .get(session_keys::CONSENSUS_REPORT)
            .await
            .ok_or_else(|| GraphError::ContextError("consensus report not found".to_string()))?;
        let language = case
            .requested_language()
            .ok_or_else(|| GraphError::ContextError("no target language requested".to_string()))?
            .to_string();
        Ok((report, language))
    }

    fn result(&self, translation: &TranslationResult) -> Result<TaskResult> {
        let mut delta = StateDelta::new().with(session_keys::TRANSLATION, translation)?;
        if let Some(note) = &translation.metadata.note {
            delta.insert(session_keys::stage_error(self.id()), note)?;
        }
        let status = format!(
            "translation to {} {}",
            translation.language,
            translation.status.as_str()
        );
        Ok(TaskResult::new_with_status(delta, NextAction::End, Some(status)))
    }
}

#[async_trait]
impl Task for TranslateTask {
    fn id(&self) -> &str {
        stage_ids::TRANSLATE
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let (report, language) = self.inputs(&context).await?;
        info!(task_id = %self.id(), language = %language, "Translating consensus report");
        let translation = self.agent.translate(&report, &language).await;
        self.result(&translation)
    }

    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let (report, language) = self.inputs(&context).await?;
        let reason = format!("translation timed out after {} ms", limit.as_millis());
        let translation = match translation::resolve_language(&language) {
            Some(target) => translation::partial(&report, target, reason),
            None => self.agent.translate(&report, &language).await,
        };
        self.result(&translation)
    }
}
