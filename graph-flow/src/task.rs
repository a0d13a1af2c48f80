use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::{
    context::{Context, StateDelta},
    error::{GraphError, Result},
};

/// Result of a task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Writes to merge into the run context
    pub delta: StateDelta,
    /// Next action to take
    pub next_action: NextAction,
    /// Short human readable progress note
    pub status_message: Option<String>,
    /// Inner tasks that fell back after overrunning their budget
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timed_out_children: Vec<String>,
}

impl TaskResult {
    pub fn new(delta: StateDelta, next_action: NextAction) -> Self {
        Self {
            delta,
            next_action,
            status_message: None,
            timed_out_children: Vec::new(),
        }
    }

    pub fn new_with_status(
        delta: StateDelta,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            delta,
            next_action,
            status_message,
            timed_out_children: Vec::new(),
        }
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Follow the transition table
    Continue,
    /// Stop the run
    End,
}

/// Core trait that all tasks must implement
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Execute the task against a read view of the run context
    async fn run(&self, context: Context) -> Result<TaskResult>;

    /// Produce a fallback result once the task's time budget is spent.
    /// Must not perform network calls.
    async fn on_timeout(&self, _context: Context, limit: Duration) -> Result<TaskResult> {
        Err(GraphError::TaskTimeout {
            task_id: self.id().to_string(),
            limit_ms: limit.as_millis(),
        })
    }
}

/// How a task invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    /// The task, or one of its children, finished on its fallback
    TimedOut,
    Failed,
}

/// Run a task, bounded by `limit` when one is given.
pub async fn run_bounded(
    task: &dyn Task,
    context: Context,
    limit: Option<Duration>,
) -> (Result<TaskResult>, StageOutcome, Duration) {
    let started = Instant::now();
    let Some(limit) = limit else {
        let result = task.run(context).await;
        return (result, StageOutcome::Completed, started.elapsed());
    };

    match tokio::time::timeout(limit, task.run(context.clone())).await {
        Ok(result) => (result, StageOutcome::Completed, started.elapsed()),
        Err(_) => {
            warn!(
                task_id = %task.id(),
                limit_ms = limit.as_millis() as u64,
                "Task exceeded its time budget, using fallback"
            );
            let result = task.on_timeout(context, limit).await;
            (result, StageOutcome::TimedOut, started.elapsed())
        }
    }
}
