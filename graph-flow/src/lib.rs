pub mod context;
pub mod error;
pub mod fanout;
pub mod graph;
pub mod runner;
pub mod storage;
pub mod task;

// Re-export commonly used types
pub use context::{Context, StateDelta};
pub use error::{GraphError, Result};
pub use fanout::FanOutTask;
pub use graph::{Edge, ExecutionResult, Graph, GraphBuilder, StageRecord};
pub use runner::FlowRunner;
pub use storage::{InMemorySessionStorage, Session, SessionStatus, SessionStorage};
pub use task::{NextAction, StageOutcome, Task, TaskResult, run_bounded};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    struct WriteTask {
        id: String,
        key: String,
        value: String,
        delay: Duration,
    }

    impl WriteTask {
        fn new(id: &str, key: &str, value: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                delay: Duration::ZERO,
            })
        }

        fn slow(id: &str, key: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                key: key.to_string(),
                value: "slow".to_string(),
                delay,
            })
        }
    }

    #[async_trait]
    impl Task for WriteTask {
        fn id(&self) -> &str {
            &self.id
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let delta = StateDelta::new().with(self.key.clone(), self.value.clone())?;
            Ok(TaskResult::new(delta, NextAction::Continue))
        }

        async fn on_timeout(&self, _context: Context, _limit: Duration) -> Result<TaskResult> {
            let delta = StateDelta::new().with(self.key.clone(), "fallback")?;
            Ok(TaskResult::new_with_status(
                delta,
                NextAction::Continue,
                Some("degraded".to_string()),
            ))
        }
    }

    #[tokio::test]
    async fn linear_graph_runs_every_stage() {
        let graph = GraphBuilder::new("linear")
            .add_task(WriteTask::new("a", "first", "1"))
            .add_task(WriteTask::new("b", "second", "2"))
            .add_edge("a", "b")
            .build()
            .unwrap();

        let context = Context::new();
        let result = graph.execute(context.clone()).await.unwrap();

        let visited: Vec<_> = result.trail.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(visited, vec!["a", "b"]);
        assert_eq!(context.get_sync::<String>("second").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn guarded_edge_wins_over_default_when_admitted() {
        let build = || {
            GraphBuilder::new("branch")
                .add_task(WriteTask::new("start", "s", "x"))
                .add_task(WriteTask::new("special", "branch", "special"))
                .add_task(WriteTask::new("plain", "branch", "plain"))
                .add_conditional_edge("start", "special", |ctx| {
                    ctx.get_sync::<bool>("flag").unwrap_or(false)
                })
                .add_edge("start", "plain")
                .build()
                .unwrap()
        };

        let flagged = Context::new();
        flagged.set("flag", true).await.unwrap();
        build().execute(flagged.clone()).await.unwrap();
        assert_eq!(flagged.get_sync::<String>("branch").as_deref(), Some("special"));

        let unflagged = Context::new();
        build().execute(unflagged.clone()).await.unwrap();
        assert_eq!(unflagged.get_sync::<String>("branch").as_deref(), Some("plain"));
    }

    #[tokio::test]
    async fn timed_out_stage_uses_fallback_and_run_continues() {
        let limit = Duration::from_millis(50);
        let graph = GraphBuilder::new("timeouts")
            .add_task_with_timeout(WriteTask::slow("slow", "slow_key", Duration::from_secs(5)), limit)
            .add_task(WriteTask::new("after", "after_key", "done"))
            .add_edge("slow", "after")
            .build()
            .unwrap();

        let context = Context::new();
        let started = Instant::now();
        let result = graph.execute(context.clone()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(result.timed_out().count(), 1);
        assert_eq!(context.get_sync::<String>("slow_key").as_deref(), Some("fallback"));
        assert_eq!(context.get_sync::<String>("after_key").as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn fan_out_merges_disjoint_children() {
        let fan = FanOutTask::new(
            "panel",
            vec![
                WriteTask::new("left", "left_key", "l"),
                WriteTask::slow("right", "right_key", Duration::from_secs(5)),
            ],
        )
        .with_child_timeout(Duration::from_millis(50));

        let graph = GraphBuilder::new("fan")
            .add_task(Arc::new(fan))
            .build()
            .unwrap();

        let context = Context::new();
        let result = graph.execute(context.clone()).await.unwrap();
        assert_eq!(context.get_sync::<String>("left_key").as_deref(), Some("l"));
        assert_eq!(context.get_sync::<String>("right_key").as_deref(), Some("fallback"));

        let panel: Vec<_> = result.timed_out().collect();
        assert_eq!(panel.len(), 1);
        assert_eq!(panel[0].task_id, "panel");
        assert_eq!(panel[0].timed_out_children, vec!["right".to_string()]);
    }

    #[tokio::test]
    async fn fan_out_without_fallbacks_records_completed() {
        let fan = FanOutTask::new(
            "panel",
            vec![
                WriteTask::new("left", "left_key", "l"),
                WriteTask::new("right", "right_key", "r"),
            ],
        )
        .with_child_timeout(Duration::from_secs(5));
        let graph = GraphBuilder::new("fan")
            .add_task(Arc::new(fan))
            .build()
            .unwrap();

        let result = graph.execute(Context::new()).await.unwrap();
        assert_eq!(result.timed_out().count(), 0);
        assert_eq!(result.trail[0].outcome, StageOutcome::Completed);
    }

    #[tokio::test]
    async fn fan_out_rejects_overlapping_writes() {
        let fan = FanOutTask::new(
            "panel",
            vec![
                WriteTask::new("one", "shared", "1"),
                WriteTask::new("two", "shared", "2"),
            ],
        );
        let graph = GraphBuilder::new("conflict")
            .add_task(Arc::new(fan))
            .build()
            .unwrap();

        let err = graph.execute(Context::new()).await.unwrap_err();
        assert!(matches!(err, GraphError::StageFailed { .. }));
    }

    #[test]
    fn build_rejects_edges_to_unknown_tasks() {
        let result = GraphBuilder::new("broken")
            .add_task(WriteTask::new("a", "k", "v"))
            .add_edge("a", "missing")
            .build();
        assert!(matches!(result, Err(GraphError::InvalidGraph(_))));
    }

    #[tokio::test]
    async fn runner_persists_completed_session() {
        let graph = Arc::new(
            GraphBuilder::new("stored")
                .add_task(WriteTask::new("only", "out", "value"))
                .build()
                .unwrap(),
        );
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let session = Session::new("stored");
        let session_id = session.id.clone();
        storage.save(session).await.unwrap();

        runner.run(&session_id).await.unwrap();

        let stored = storage.get(&session_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.trail.len(), 1);
        assert_eq!(stored.context.get_sync::<String>("out").as_deref(), Some("value"));
        assert!(runner.run(&session_id).await.is_err());
    }

    struct FailingTask;

    #[async_trait]
    impl Task for FailingTask {
        fn id(&self) -> &str {
            "broken"
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Err(GraphError::TaskExecutionFailed("no provider".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_session_keeps_the_stages_it_ran() {
        let graph = Arc::new(
            GraphBuilder::new("failing")
                .add_task(WriteTask::new("first", "out", "value"))
                .add_task(Arc::new(FailingTask))
                .add_task(WriteTask::new("never", "later", "value"))
                .add_edge("first", "broken")
                .add_edge("broken", "never")
                .build()
                .unwrap(),
        );
        let storage = Arc::new(InMemorySessionStorage::new());
        let runner = FlowRunner::new(graph, storage.clone());

        let session = Session::new("failing");
        let session_id = session.id.clone();
        storage.save(session).await.unwrap();

        let err = runner.run(&session_id).await.unwrap_err();
        assert!(matches!(err, GraphError::StageFailed { ref task_id, .. } if task_id == "broken"));

        let stored = storage.get(&session_id).await.unwrap().unwrap();
        assert!(matches!(stored.status, SessionStatus::Failed { .. }));
        let stages: Vec<_> = stored
            .trail
            .iter()
            .map(|record| (record.task_id.as_str(), record.outcome))
            .collect();
        assert_eq!(
            stages,
            vec![("first", StageOutcome::Completed), ("broken", StageOutcome::Failed)]
        );
        assert!(!stored.context.contains_key("later"));
    }
}
