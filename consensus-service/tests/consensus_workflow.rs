use async_trait::async_trait;
use consensus_service::{
    ConsensusError, ConsensusWorkflow,
    config::{ApiKey, ProviderKind, ProviderSettings, StageTimeouts},
    llm::{ChatMessage, ChatProvider, LlmClient, OpenAiCompatibleProvider, ProviderError},
    models::{AgentKind, CaseInput, SectionKind, TranslationStatus},
    retry::RetryPolicy,
    search::{TrustedDomains, WebSearchClient},
    tasks::AgentDeps,
    verifier::SourceVerifier,
};
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

/// Answers by role, recognised from the system prompt, and records every prompt
#[derive(Default)]
struct StubProvider {
    prompts: Mutex<Vec<(String, String)>>,
    slow_diagnosis: Option<Duration>,
}

impl StubProvider {
    fn slow_diagnosis(delay: Duration) -> Self {
        Self {
            slow_diagnosis: Some(delay),
            ..Default::default()
        }
    }

    fn prompt_for(&self, role_fragment: &str) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .find(|(role, _)| role.contains(role_fragment))
            .map(|(_, prompt)| prompt.clone())
    }
}

#[async_trait]
impl ChatProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ProviderError> {
        let role = messages[0].content.clone();
        let prompt = messages[1].content.clone();
        self.prompts.lock().unwrap().push((role.clone(), prompt.clone()));

        if role.contains("medical diagnostician") {
            if let Some(delay) = self.slow_diagnosis {
                tokio::time::sleep(delay).await;
            }
            let name = if prompt.contains("Migraine") {
                "Migraine with Aura"
            } else {
                "Non-Small Cell Lung Cancer"
            };
            return Ok(format!(
                "<think>weighing options</think>\n## {name}\n\n**Likelihood:** High\n\n**Reasoning:** Classic presentation.\n\n**Key Indicators:**\n- Typical history"
            ));
        }
        if role.contains("treatment specialist") {
            return Ok("## Primary Interventions\n\n### Standard therapy\n\n## Precautions\n\nNone noted.".into());
        }
        if role.contains("thoracic oncologist") {
            return Ok("## Oncologist Review\n\n**Agreement:** Staging is plausible.".into());
        }
        if role.contains("consensus builder") {
            let diagnosis = if prompt.contains("Migraine with Aura") {
                "Migraine with Aura"
            } else {
                "Non-Small Cell Lung Cancer, stage IIA"
            };
            return Ok(format!(
                "## UNIFIED DIAGNOSIS\n{diagnosis}\n\n## UNIFIED TREATMENT PLAN\nFollow the specialist plan.\n\n\
                 ## RATIONALE\nAll assessments align.\n\n## AGREEMENT & DISAGREEMENT\n- Agreement: diagnosis\n- Disagreement: imaging timing"
            ));
        }
        if role.contains("translation assistant") {
            return Ok("Informe traducido sin marcadores".into());
        }
        Err(ProviderError::BadResponse(format!("unexpected role: {role}")))
    }
}

struct Unreachable;

#[async_trait]
impl ChatProvider for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
        Err(ProviderError::Unreachable("connection refused".into()))
    }
}

fn workflow(provider: Arc<dyn ChatProvider>, timeouts: StageTimeouts) -> ConsensusWorkflow {
    let deps = AgentDeps {
        llm: LlmClient::new(vec![provider], RetryPolicy::none()),
        search: Arc::new(WebSearchClient::new(
            Vec::new(),
            RetryPolicy::none(),
            TrustedDomains::default(),
        )),
        verifier: SourceVerifier::default(),
        max_results: 5,
    };
    ConsensusWorkflow::new(deps, timeouts).unwrap()
}

fn migraine() -> CaseInput {
    CaseInput::new("Migraine")
        .with_symptoms("severe headache, light sensitivity, visual spots")
        .with_medical_history("recurrent episodes since adolescence")
}

#[tokio::test]
async fn migraine_case_reaches_unified_diagnosis() {
    let provider = Arc::new(StubProvider::default());
    let report = workflow(provider.clone(), StageTimeouts::default())
        .run(migraine())
        .await
        .unwrap();

    let kinds: Vec<_> = report.sections.iter().map(|section| section.kind).collect();
    assert_eq!(kinds, SectionKind::ORDER.to_vec());
    assert!(report
        .section(SectionKind::UnifiedDiagnosis)
        .unwrap()
        .body
        .contains("Migraine with Aura"));
    assert!(report.translation.is_none());
    assert!(!report.degraded);
    assert_eq!(report.notes.len(), 2);
    assert!((0.0..=10.0).contains(&report.overall_credibility));

    // reasoning blocks never reach downstream prompts
    let treatment_prompt = provider.prompt_for("treatment specialist").unwrap();
    assert!(!treatment_prompt.contains("<think>"));
    assert!(provider.prompt_for("thoracic oncologist").is_none());
}

#[tokio::test]
async fn lung_cancer_case_feeds_specialist_into_consensus() {
    let provider = Arc::new(StubProvider::default());
    let case = CaseInput::new("Lung cancer")
        .with_symptoms("persistent cough, weight loss")
        .with_test_results("CT chest: tumor measures 4.5 cm in the right upper lobe")
        .with_medical_history("62-year-old former smoker, 40 pack-years");

    let (result, state) = workflow(provider.clone(), StageTimeouts::default())
        .run_detailed(case)
        .await
        .unwrap();

    let stages: Vec<_> = result.trail.iter().map(|r| r.task_id.as_str()).collect();
    assert_eq!(
        stages,
        vec!["research", "verify_sources", "specialist_panel", "treat", "build_consensus"]
    );

    let specialist = state
        .agent_outputs
        .iter()
        .find(|output| output.agent == AgentKind::LungCancerSpecialist)
        .expect("specialist output");
    assert!(specialist.content.contains("T2b"));
    assert!(specialist.content.contains("## Oncologist Review"));

    let consensus_prompt = provider.prompt_for("consensus builder").unwrap();
    assert!(consensus_prompt.contains("### Lung Cancer Specialist"));
    assert!(consensus_prompt.contains("## Lung Cancer Specialist Assessment"));
    assert!(state.errors.is_empty());
}

#[tokio::test]
async fn malformed_translation_keeps_original_text() {
    let provider = Arc::new(StubProvider::default());
    let report = workflow(provider, StageTimeouts::default())
        .run(migraine().with_target_language("es"))
        .await
        .unwrap();

    let translation = report.translation.as_ref().expect("translation attached");
    assert_eq!(translation.status, TranslationStatus::Partial);
    assert_eq!(translation.language, "es");
    assert_eq!(translation.text, report.sections_markdown());
    assert!(translation.metadata.note.as_deref().unwrap().contains("missing section markers"));
}

#[tokio::test]
async fn slow_stage_degrades_within_its_budget() {
    let provider = Arc::new(StubProvider::slow_diagnosis(Duration::from_secs(30)));
    let timeouts = StageTimeouts {
        research: Duration::from_secs(5),
        diagnosis: Duration::from_millis(200),
        consensus: Duration::from_secs(5),
    };

    let started = Instant::now();
    let (result, state) = workflow(provider, timeouts)
        .run_detailed(migraine())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));

    assert_eq!(result.timed_out().count(), 1);
    let diagnosis = state
        .agent_outputs
        .iter()
        .find(|output| output.agent == AgentKind::Diagnostician)
        .unwrap();
    assert!(diagnosis.is_degraded());
    assert!(!diagnosis.content.is_empty());
    assert!(state.errors.iter().any(|e| e.starts_with("diagnose:")));

    let report = state.into_report().unwrap();
    assert!(report
        .section(SectionKind::Rationale)
        .unwrap()
        .body
        .contains("Diagnostician output is incomplete"));
}

#[tokio::test]
async fn slow_panel_member_marks_the_panel_timed_out() {
    let provider = Arc::new(StubProvider::slow_diagnosis(Duration::from_secs(30)));
    let timeouts = StageTimeouts {
        research: Duration::from_secs(5),
        diagnosis: Duration::from_millis(200),
        consensus: Duration::from_secs(5),
    };
    let case = CaseInput::new("Lung cancer")
        .with_symptoms("persistent cough")
        .with_test_results("CT chest: tumor measures 4.5 cm");

    let (result, state) = workflow(provider, timeouts)
        .run_detailed(case)
        .await
        .unwrap();

    let timed_out: Vec<_> = result.timed_out().collect();
    assert_eq!(timed_out.len(), 1);
    assert_eq!(timed_out[0].task_id, "specialist_panel");
    assert_eq!(timed_out[0].timed_out_children, vec!["diagnose".to_string()]);

    let specialist = state
        .agent_outputs
        .iter()
        .find(|output| output.agent == AgentKind::LungCancerSpecialist)
        .unwrap();
    assert!(!specialist.is_degraded());
}

#[tokio::test]
async fn unreachable_providers_abort_the_run() {
    let err = workflow(Arc::new(Unreachable), StageTimeouts::default())
        .run(migraine())
        .await
        .unwrap_err();
    assert!(matches!(err, ConsensusError::Workflow(_)));
}

#[tokio::test]
async fn empty_model_answers_degrade_instead_of_aborting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": ""}}]
        })))
        .mount(&server)
        .await;

    let settings = ProviderSettings {
        kind: ProviderKind::OpenAi,
        api_key: ApiKey::new("test-key"),
        base_url: server.uri(),
        model: "test-model".to_string(),
    };
    let provider = Arc::new(OpenAiCompatibleProvider::new(
        reqwest::Client::new(),
        &settings,
        0.7,
        Duration::from_secs(5),
    ));

    let (_, state) = workflow(provider, StageTimeouts::default())
        .run_detailed(migraine())
        .await
        .unwrap();

    let diagnosis = state
        .agent_outputs
        .iter()
        .find(|output| output.agent == AgentKind::Diagnostician)
        .unwrap();
    assert!(diagnosis.is_degraded());
    assert!(state.errors.iter().any(|e| e.starts_with("diagnose:")));

    let report = state.into_report().unwrap();
    assert!(report.degraded);
}
