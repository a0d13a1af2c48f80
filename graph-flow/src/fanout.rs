//! Concurrent execution of independent tasks as one stage.
//!
//! Children see the same context snapshot, run concurrently, and their deltas are
//! merged into one. Two children writing the same key is a conflict. Children that
//! fell back are reported on the combined result, so the stage records as timed out.

use async_trait::async_trait;
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    context::{Context, StateDelta},
    error::Result,
    task::{NextAction, StageOutcome, Task, TaskResult, run_bounded},
};

pub struct FanOutTask {
    id: String,
    children: Vec<Arc<dyn Task>>,
    child_timeout: Option<Duration>,
}

impl FanOutTask {
    pub fn new(id: impl Into<String>, children: Vec<Arc<dyn Task>>) -> Self {
        Self {
            id: id.into(),
            children,
            child_timeout: None,
        }
    }

    /// Bound each child individually; a child that overruns contributes its fallback.
    pub fn with_child_timeout(mut self, limit: Duration) -> Self {
        self.child_timeout = Some(limit);
        self
    }

    fn combine(&self, results: Vec<TaskResult>, timed_out: Vec<String>) -> Result<TaskResult> {
        let mut delta = StateDelta::new();
        let mut notes = Vec::new();
        for result in results {
            delta.extend(result.delta)?;
            if let Some(note) = result.status_message {
                notes.push(note);
            }
        }
        let status = (!notes.is_empty()).then(|| notes.join("; "));
        let mut result = TaskResult::new_with_status(delta, NextAction::Continue, status);
        result.timed_out_children = timed_out;
        Ok(result)
    }
}

#[async_trait]
impl Task for FanOutTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        info!(task_id = %self.id, children = self.children.len(), "Fanning out");

        let runs = self
            .children
            .iter()
            .map(|child| run_bounded(child.as_ref(), context.clone(), self.child_timeout));
        let outcomes = join_all(runs).await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut timed_out = Vec::new();
        for (child, (result, outcome, elapsed)) in self.children.iter().zip(outcomes) {
            if outcome == StageOutcome::TimedOut {
                warn!(task_id = %self.id, child = %child.id(), "Child used its fallback");
                timed_out.push(child.id().to_string());
            }
            info!(
                task_id = %self.id,
                child = %child.id(),
                elapsed_ms = elapsed.as_millis() as u64,
                "Child finished"
            );
            results.push(result?);
        }
        self.combine(results, timed_out)
    }

    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let fallbacks = self
            .children
            .iter()
            .map(|child| child.on_timeout(context.clone(), limit));
        let results = join_all(fallbacks)
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?;
        let timed_out = self
            .children
            .iter()
            .map(|child| child.id().to_string())
            .collect();
        self.combine(results, timed_out)
    }
}
