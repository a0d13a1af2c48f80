//! FlowRunner: load a session, run its graph to a terminal state, persist the outcome.
//!
//! Services create one runner at startup and share it across requests. Every
//! session carries its own [`Context`](crate::Context), so concurrent runs never
//! observe each other's state.

use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    error::{GraphError, Result},
    graph::{ExecutionResult, Graph},
    storage::{SessionStatus, SessionStorage},
};

#[derive(Clone)]
pub struct FlowRunner {
    graph: Arc<Graph>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(graph: Arc<Graph>, storage: Arc<dyn SessionStorage>) -> Self {
        Self { graph, storage }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Execute the stored session to completion and save it, including on failure.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self
            .storage
            .get(session_id)
            .await?
            .ok_or_else(|| GraphError::SessionNotFound(session_id.to_string()))?;

        if session.is_finished() {
            return Err(GraphError::StorageError(format!(
                "session {session_id} has already run"
            )));
        }

        let mut trail = Vec::new();
        let outcome = self
            .graph
            .execute_recorded(session.context.clone(), &mut trail)
            .await;
        session.trail = trail.clone();

        match outcome {
            Ok(()) => {
                info!(session_id = %session_id, stages = trail.len(), "Session completed");
                session.status = SessionStatus::Completed;
                self.storage.save(session).await?;
                Ok(ExecutionResult { trail })
            }
            Err(e) => {
                warn!(session_id = %session_id, stages = trail.len(), error = %e, "Session failed");
                session.status = SessionStatus::Failed {
                    message: e.to_string(),
                };
                self.storage.save(session).await?;
                Err(e)
            }
        }
    }
}
