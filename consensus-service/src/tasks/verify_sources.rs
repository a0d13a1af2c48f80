use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, StateDelta, Task, TaskResult};
use std::time::Duration;
use tracing::info;

use super::{session_keys, stage_ids};
use crate::{models::SearchResult, verifier::SourceVerifier};

/// Scores the collected sources into the research bundle.
pub struct VerifySourcesTask {
    verifier: SourceVerifier,
}

impl VerifySourcesTask {
    pub fn new(verifier: SourceVerifier) -> Self {
        Self { verifier }
    }

    async fn verify(&self, context: &Context, note: Option<String>) -> Result<TaskResult> {
        let results: Vec<SearchResult> = context
            .get(session_keys::SEARCH_RESULTS)
            .await
            .unwrap_or_default();
        let bundle = self.verifier.score(&results);
        info!(
            task_id = %stage_ids::VERIFY_SOURCES,
            sources = bundle.results.len(),
            trusted = bundle.trusted_count(),
            credibility = bundle.overall_credibility,
            "Sources verified"
        );

        let mut delta = StateDelta::new().with(session_keys::RESEARCH_BUNDLE, &bundle)?;
        let status = match note {
            Some(note) => {
                delta.insert(session_keys::stage_error(stage_ids::VERIFY_SOURCES), &note)?;
                note
            }
            None => format!("overall credibility {:.1}/10", bundle.overall_credibility),
        };
        Ok(TaskResult::new_with_status(delta, NextAction::Continue, Some(status)))
    }
}

#[async_trait]
impl Task for VerifySourcesTask {
    fn id(&self) -> &str {
        stage_ids::VERIFY_SOURCES
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        self.verify(&context, None).await
    }

    /// Scoring is local and fast, so the fallback simply scores what is there.
    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let note = format!("source verification timed out after {} ms", limit.as_millis());
        self.verify(&context, Some(note)).await
    }
}
