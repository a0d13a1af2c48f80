use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};
use tracing::{debug, error, info};

use crate::{
    context::Context,
    error::{GraphError, Result},
    task::{NextAction, StageOutcome, Task, run_bounded},
};

/// Guard predicate evaluated against the run context
pub type EdgeCondition = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

const DEFAULT_MAX_STEPS: usize = 64;

/// One row of the transition table
#[derive(Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub condition: Option<EdgeCondition>,
}

impl Edge {
    fn admits(&self, context: &Context) -> bool {
        self.condition.as_ref().is_none_or(|guard| guard(context))
    }
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("guarded", &self.condition.is_some())
            .finish()
    }
}

/// Record of one executed stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub task_id: String,
    pub outcome: StageOutcome,
    pub elapsed_ms: u64,
    pub status_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timed_out_children: Vec<String>,
}

/// Outcome of a full graph run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub trail: Vec<StageRecord>,
}

impl ExecutionResult {
    pub fn timed_out(&self) -> impl Iterator<Item = &StageRecord> {
        self.trail
            .iter()
            .filter(|record| record.outcome == StageOutcome::TimedOut)
    }
}

/// An immutable stage graph: tasks, a guarded transition table and per-task budgets.
pub struct Graph {
    pub id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    edges: Vec<Edge>,
    timeouts: HashMap<String, Duration>,
    start_task_id: String,
    max_steps: usize,
}

impl Graph {
    /// Run from the start task until a task ends the run or no edge admits a successor.
    pub async fn execute(&self, context: Context) -> Result<ExecutionResult> {
        let mut trail = Vec::new();
        self.execute_recorded(context, &mut trail).await?;
        Ok(ExecutionResult { trail })
    }

    /// Same as [`execute`](Self::execute), but every stage is appended to `trail` as it
    /// finishes. A failed run keeps the stages it got through, ending with a
    /// [`StageOutcome::Failed`] record for the stage that failed.
    pub async fn execute_recorded(
        &self,
        context: Context,
        trail: &mut Vec<StageRecord>,
    ) -> Result<()> {
        let mut current = self.start_task_id.clone();
        let mut steps = 0;

        loop {
            if steps >= self.max_steps {
                return Err(GraphError::StepLimitExceeded(self.max_steps));
            }
            steps += 1;

            let next = match self.execute_task(&current, &context, trail).await? {
                NextAction::End => None,
                NextAction::Continue => self.find_next_task(&current, &context),
            };

            match next {
                Some(next) => {
                    debug!(graph_id = %self.id, from = %current, to = %next, "Transition");
                    current = next;
                }
                None => break,
            }
        }

        info!(graph_id = %self.id, stages = steps, "Graph run finished");
        Ok(())
    }

    async fn execute_task(
        &self,
        task_id: &str,
        context: &Context,
        trail: &mut Vec<StageRecord>,
    ) -> Result<NextAction> {
        let task = self
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| GraphError::TaskNotFound(task_id.to_string()))?;

        let limit = self.timeouts.get(task_id).copied();
        let (result, outcome, elapsed) = run_bounded(task.as_ref(), context.clone(), limit).await;
        let elapsed_ms = elapsed.as_millis() as u64;

        let merged = result.and_then(|mut result| {
            context.merge(std::mem::take(&mut result.delta))?;
            Ok(result)
        });

        match merged {
            Ok(result) => {
                let outcome = if result.timed_out_children.is_empty() {
                    outcome
                } else {
                    StageOutcome::TimedOut
                };
                trail.push(StageRecord {
                    task_id: task_id.to_string(),
                    outcome,
                    elapsed_ms,
                    status_message: result.status_message,
                    timed_out_children: result.timed_out_children,
                });
                Ok(result.next_action)
            }
            Err(e) => {
                error!(graph_id = %self.id, task_id = %task_id, error = %e, "Stage failed");
                let message = e.to_string();
                trail.push(StageRecord {
                    task_id: task_id.to_string(),
                    outcome: StageOutcome::Failed,
                    elapsed_ms,
                    status_message: Some(message.clone()),
                    timed_out_children: Vec::new(),
                });
                Err(GraphError::StageFailed {
                    task_id: task_id.to_string(),
                    message,
                })
            }
        }
    }

    /// First edge out of `current_task_id` whose guard admits the context
    pub fn find_next_task(&self, current_task_id: &str, context: &Context) -> Option<String> {
        self.edges
            .iter()
            .filter(|edge| edge.from == current_task_id)
            .find(|edge| edge.admits(context))
            .map(|edge| edge.to.clone())
    }

    pub fn successors(&self, task_id: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|edge| edge.from == task_id)
            .map(|edge| edge.to.as_str())
            .collect()
    }

    pub fn start_task_id(&self) -> &str {
        &self.start_task_id
    }

    pub fn timeout_for(&self, task_id: &str) -> Option<Duration> {
        self.timeouts.get(task_id).copied()
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    id: String,
    tasks: HashMap<String, Arc<dyn Task>>,
    order: Vec<String>,
    edges: Vec<Edge>,
    timeouts: HashMap<String, Duration>,
    start_task_id: Option<String>,
    max_steps: usize,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            timeouts: HashMap::new(),
            start_task_id: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if !self.tasks.contains_key(&task_id) {
            self.order.push(task_id.clone());
        }
        self.tasks.insert(task_id, task);
        self
    }

    /// Add a task that is bounded by `limit`
    pub fn add_task_with_timeout(mut self, task: Arc<dyn Task>, limit: Duration) -> Self {
        self.timeouts.insert(task.id().to_string(), limit);
        self.add_task(task)
    }

    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: None,
        });
        self
    }

    /// Guarded edges are tried in insertion order, so add them before the default edge.
    pub fn add_conditional_edge<F>(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        condition: F,
    ) -> Self
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.edges.push(Edge {
            from: from.into(),
            to: to.into(),
            condition: Some(Arc::new(condition)),
        });
        self
    }

    pub fn set_start_task(mut self, task_id: impl Into<String>) -> Self {
        self.start_task_id = Some(task_id.into());
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Validate the table and freeze the graph. The first added task is the default start.
    pub fn build(self) -> Result<Graph> {
        let start_task_id = self
            .start_task_id
            .or_else(|| self.order.first().cloned())
            .ok_or_else(|| GraphError::InvalidGraph("graph has no tasks".to_string()))?;

        if !self.tasks.contains_key(&start_task_id) {
            return Err(GraphError::TaskNotFound(start_task_id));
        }
        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !self.tasks.contains_key(endpoint) {
                    return Err(GraphError::InvalidGraph(format!(
                        "edge {} -> {} references unknown task '{}'",
                        edge.from, edge.to, endpoint
                    )));
                }
            }
        }

        Ok(Graph {
            id: self.id,
            tasks: self.tasks,
            edges: self.edges,
            timeouts: self.timeouts,
            start_task_id,
            max_steps: self.max_steps,
        })
    }
}
