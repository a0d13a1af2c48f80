use graph_flow::{
    Context, ExecutionResult, FanOutTask, Graph, GraphBuilder, GraphError, Session, StageRecord,
};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::{Settings, StageTimeouts},
    consensus::ConsensusBuilder,
    error::ConsensusError,
    llm::LlmClient,
    models::{AgentKind, AgentOutput, CaseInput, ConsensusReport, ResearchBundle, TranslationResult},
    search::WebSearchClient,
    specialists::Specialization,
    tasks::{
        AgentDeps, BuildConsensusTask, DiagnoseTask, LungCancerSpecialistTask, ResearchTask,
        TranslateTask, TreatTask, VerifySourcesTask, session_keys, stage_ids,
    },
    translation::TranslationAgent,
    verifier::SourceVerifier,
};

pub const GRAPH_ID: &str = "consensus_workflow";

fn case_of(context: &Context) -> Option<CaseInput> {
    context.get_sync(session_keys::CASE)
}

/// research → verify_sources → [specialist_panel | diagnose] → treat →
/// build_consensus → [translate]
pub fn build_consensus_graph(deps: &AgentDeps, timeouts: StageTimeouts) -> Result<Graph, GraphError> {
    let panel = FanOutTask::new(
        stage_ids::SPECIALIST_PANEL,
        vec![
            Arc::new(LungCancerSpecialistTask::new(deps.clone())),
            Arc::new(DiagnoseTask::new(deps.clone())),
        ],
    )
    .with_child_timeout(timeouts.diagnosis);

    GraphBuilder::new(GRAPH_ID)
        .add_task_with_timeout(Arc::new(ResearchTask::new(deps.clone())), timeouts.research)
        .add_task_with_timeout(
            Arc::new(VerifySourcesTask::new(deps.verifier.clone())),
            timeouts.research,
        )
        .add_task(Arc::new(panel))
        .add_task_with_timeout(Arc::new(DiagnoseTask::new(deps.clone())), timeouts.diagnosis)
        .add_task_with_timeout(Arc::new(TreatTask::new(deps.clone())), timeouts.diagnosis)
        .add_task_with_timeout(
            Arc::new(BuildConsensusTask::new(ConsensusBuilder::new(deps.llm.clone()))),
            timeouts.consensus,
        )
        .add_task_with_timeout(
            Arc::new(TranslateTask::new(TranslationAgent::new(deps.llm.clone()))),
            timeouts.consensus,
        )
        .set_start_task(stage_ids::RESEARCH)
        .add_edge(stage_ids::RESEARCH, stage_ids::VERIFY_SOURCES)
        .add_conditional_edge(stage_ids::VERIFY_SOURCES, stage_ids::SPECIALIST_PANEL, |ctx| {
            case_of(ctx).is_some_and(|case| Specialization::lookup(&case.topic).is_some())
        })
        .add_edge(stage_ids::VERIFY_SOURCES, stage_ids::DIAGNOSE)
        .add_edge(stage_ids::SPECIALIST_PANEL, stage_ids::TREAT)
        .add_edge(stage_ids::DIAGNOSE, stage_ids::TREAT)
        .add_edge(stage_ids::TREAT, stage_ids::BUILD_CONSENSUS)
        .add_conditional_edge(stage_ids::BUILD_CONSENSUS, stage_ids::TRANSLATE, |ctx| {
            case_of(ctx).is_some_and(|case| case.requested_language().is_some())
        })
        .build()
}

/// New pending session holding only the case
pub async fn create_consensus_session(case: &CaseInput) -> Result<Session, GraphError> {
    let session = Session::new(GRAPH_ID);
    session.context.set(session_keys::CASE, case).await?;
    Ok(session)
}

/// Typed view over a run's context
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    pub case: Option<CaseInput>,
    pub research: Option<ResearchBundle>,
    pub agent_outputs: Vec<AgentOutput>,
    pub report: Option<ConsensusReport>,
    pub translation: Option<TranslationResult>,
    pub last_stage: Option<String>,
    pub errors: Vec<String>,
}

impl WorkflowState {
    pub fn from_context(context: &Context, trail: &[StageRecord]) -> Self {
        let agent_outputs = AgentKind::ALL
            .into_iter()
            .filter_map(|agent| context.get_sync(&session_keys::agent_output(agent)))
            .collect();

        let mut error_keys = context.keys_with_prefix(session_keys::STAGE_ERROR_PREFIX);
        error_keys.sort();
        let errors = error_keys
            .iter()
            .filter_map(|key| {
                let message: String = context.get_sync(key)?;
                let stage = key.trim_start_matches(session_keys::STAGE_ERROR_PREFIX);
                Some(format!("{stage}: {message}"))
            })
            .collect();

        Self {
            case: case_of(context),
            research: context.get_sync(session_keys::RESEARCH_BUNDLE),
            agent_outputs,
            report: context.get_sync(session_keys::CONSENSUS_REPORT),
            translation: context.get_sync(session_keys::TRANSLATION),
            last_stage: trail.last().map(|record| record.task_id.clone()),
            errors,
        }
    }

    /// Final report with the translation attached, if one was produced
    pub fn into_report(self) -> Result<ConsensusReport, ConsensusError> {
        let mut report = self.report.ok_or(ConsensusError::MissingReport)?;
        report.translation = self.translation;
        Ok(report)
    }
}

/// Complete pipeline ready to run cases. Each run gets its own context, so one
/// workflow can serve concurrent runs.
#[derive(Clone)]
pub struct ConsensusWorkflow {
    graph: Arc<Graph>,
}

impl ConsensusWorkflow {
    pub fn new(deps: AgentDeps, timeouts: StageTimeouts) -> Result<Self, ConsensusError> {
        let graph = build_consensus_graph(&deps, timeouts)?;
        Ok(Self {
            graph: Arc::new(graph),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConsensusError> {
        let http = Client::builder()
            .build()
            .map_err(|e| ConsensusError::Config(format!("failed to build HTTP client: {e}")))?;

        let deps = AgentDeps {
            llm: LlmClient::from_settings(http.clone(), &settings.llm),
            search: Arc::new(WebSearchClient::from_settings(http, &settings.search)),
            verifier: SourceVerifier::default(),
            max_results: settings.search.max_results,
        };
        info!(
            providers = ?deps.llm.provider_names(),
            research_timeout_s = settings.stages.research.as_secs(),
            diagnosis_timeout_s = settings.stages.diagnosis.as_secs(),
            consensus_timeout_s = settings.stages.consensus.as_secs(),
            "Consensus workflow configured"
        );
        Self::new(deps, settings.stages)
    }

    pub fn graph(&self) -> Arc<Graph> {
        self.graph.clone()
    }

    /// Run a case to completion and return the state it left behind
    pub async fn run_detailed(
        &self,
        case: CaseInput,
    ) -> Result<(ExecutionResult, WorkflowState), ConsensusError> {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, topic = %case.topic, "Starting consensus run");

        let context = Context::new();
        context.set(session_keys::CASE, &case).await?;

        let result = self.graph.execute(context.clone()).await.inspect_err(|e| {
            warn!(run_id = %run_id, error = %e, "Consensus run failed");
        })?;
        let state = WorkflowState::from_context(&context, &result.trail);

        info!(
            run_id = %run_id,
            stages = result.trail.len(),
            timed_out = result.timed_out().count(),
            degraded_stages = state.errors.len(),
            "Consensus run finished"
        );
        Ok((result, state))
    }

    pub async fn run(&self, case: CaseInput) -> Result<ConsensusReport, ConsensusError> {
        let (_, state) = self.run_detailed(case).await?;
        state.into_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        llm::{ChatMessage, ChatProvider, ProviderError},
        retry::RetryPolicy,
        search::TrustedDomains,
    };
    use async_trait::async_trait;

    struct Silent;

    #[async_trait]
    impl ChatProvider for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            Ok("## UNIFIED DIAGNOSIS\nTension headache".to_string())
        }
    }

    fn deps() -> AgentDeps {
        AgentDeps {
            llm: LlmClient::new(vec![Arc::new(Silent)], RetryPolicy::none()),
            search: Arc::new(WebSearchClient::new(
                Vec::new(),
                RetryPolicy::none(),
                TrustedDomains::default(),
            )),
            verifier: SourceVerifier::default(),
            max_results: 3,
        }
    }

    #[test]
    fn transition_table_has_expected_branches() {
        let graph = build_consensus_graph(&deps(), StageTimeouts::default()).unwrap();
        assert_eq!(graph.start_task_id(), stage_ids::RESEARCH);
        assert_eq!(
            graph.successors(stage_ids::VERIFY_SOURCES),
            vec![stage_ids::SPECIALIST_PANEL, stage_ids::DIAGNOSE]
        );
        assert_eq!(graph.successors(stage_ids::BUILD_CONSENSUS), vec![stage_ids::TRANSLATE]);
        assert!(graph.successors(stage_ids::TRANSLATE).is_empty());
        assert_eq!(
            graph.timeout_for(stage_ids::BUILD_CONSENSUS),
            Some(StageTimeouts::default().consensus)
        );
    }

    #[tokio::test]
    async fn generic_case_skips_panel_and_translation() {
        let workflow = ConsensusWorkflow::new(deps(), StageTimeouts::default()).unwrap();
        let (result, state) = workflow
            .run_detailed(CaseInput::new("Headache").with_symptoms("pressure"))
            .await
            .unwrap();

        let stages: Vec<_> = result.trail.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(
            stages,
            vec!["research", "verify_sources", "diagnose", "treat", "build_consensus"]
        );
        assert_eq!(state.last_stage.as_deref(), Some("build_consensus"));
        assert!(state.translation.is_none());
        let report = state.into_report().unwrap();
        assert!(report.translation.is_none());
    }
}
