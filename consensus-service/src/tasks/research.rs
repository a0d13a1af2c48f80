use async_trait::async_trait;
use graph_flow::{Context, NextAction, Result, StateDelta, Task, TaskResult};
use std::time::Duration;
use tracing::info;

use super::{
    session_keys, stage_ids,
    utils::{AgentDeps, clip, require_case},
};
use crate::models::{CaseInput, SearchResult};

/// History and test excerpts appended to the query are capped at this many chars
const QUERY_EXCERPT_CHARS: usize = 100;

pub struct ResearchTask {
    deps: AgentDeps,
}

impl ResearchTask {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

pub fn build_query(case: &CaseInput) -> String {
    let mut query = format!(
        "{} {} causes diagnosis treatment medical information",
        case.topic.trim(),
        case.symptoms.trim()
    );
    let history = case.medical_history.trim();
    if !history.is_empty() {
        query.push_str(&format!(" with {}", clip(history, QUERY_EXCERPT_CHARS)));
    }
    let tests = case.test_results.trim();
    if !tests.is_empty() {
        query.push_str(&format!(" test results {}", clip(tests, QUERY_EXCERPT_CHARS)));
    }
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Numbered digest handed to the downstream agents
pub fn findings_digest(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No research findings available.".to_string();
    }
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            format!(
                "{}. {}\n   Summary: {}\n   Source: {}",
                i + 1,
                result.title,
                result.snippet,
                result.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn research_delta(query: &str, results: &[SearchResult]) -> Result<StateDelta> {
    StateDelta::new()
        .with(session_keys::SEARCH_RESULTS, results)?
        .with(session_keys::RESEARCH_QUERY, query)?
        .with(session_keys::RESEARCH_FINDINGS, findings_digest(results))
}

#[async_trait]
impl Task for ResearchTask {
    fn id(&self) -> &str {
        stage_ids::RESEARCH
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        let query = build_query(&case);
        info!(task_id = %self.id(), realtime = case.realtime_search, query = %query, "Researching case");

        let results = if case.realtime_search {
            self.deps.search.search(&query, self.deps.max_results).await
        } else {
            self.deps.search.simulated(&query, self.deps.max_results)
        };

        let status = format!("{} sources collected", results.len());
        Ok(TaskResult::new_with_status(
            research_delta(&query, &results)?,
            NextAction::Continue,
            Some(status),
        ))
    }

    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        let query = build_query(&case);
        let results = self.deps.search.simulated(&query, self.deps.max_results);
        let reason = format!("research timed out after {} ms", limit.as_millis());

        let mut delta = research_delta(&query, &results)?;
        delta.insert(session_keys::stage_error(self.id()), &reason)?;
        Ok(TaskResult::new_with_status(delta, NextAction::Continue, Some(reason)))
    }
}
