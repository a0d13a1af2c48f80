use async_trait::async_trait;
use graph_flow::{Context, Result, Task, TaskResult};
use std::time::Duration;
use tracing::info;

use super::{
    session_keys, stage_ids,
    utils::{AgentDeps, agent_result, ask, degraded_result, on_llm_error, require_case},
};
use crate::models::{AgentKind, AgentOutput, CaseInput, or_not_provided};

const DIAGNOSTICIAN_ROLE: &str = r#"You are a highly skilled medical diagnostician. Based on the patient information and research findings provided, suggest the most likely diagnoses. Focus on evidence-based medicine.

FORMAT YOUR RESPONSE AS FOLLOWS:

Present 1-3 potential diagnoses in clear sections with headings. For each diagnosis:

## [DIAGNOSIS NAME]

**Likelihood:** High/Medium/Low

**Reasoning:** A clear, concise paragraph explaining the evidence supporting this diagnosis. Reference symptoms, history, and research that align with it.

**Key Indicators:** 2-3 bullet points with the most important symptoms or findings supporting this diagnosis.

Use clear, professional medical language that remains understandable."#;

pub fn diagnosis_prompt(case: &CaseInput, findings: &str) -> String {
    format!(
        "Topic: {}\nPatient Symptoms: {}\nMedical History: {}\nTest Results: {}\n\nResearch Findings:\n{}\n\n\
         Based on the above information, what are the most likely diagnoses? Format as instructed.",
        case.topic,
        or_not_provided(&case.symptoms, "symptoms"),
        or_not_provided(&case.medical_history, "medical history"),
        or_not_provided(&case.test_results, "test results"),
        findings
    )
}

/// Placeholder used when the diagnostician cannot answer
pub fn diagnosis_placeholder(case: &CaseInput) -> String {
    format!(
        "## Diagnosis unavailable\n\n**Likelihood:** Unknown\n\n**Reasoning:** No automated diagnosis could be produced for \"{}\". \
         A clinician should review the reported symptoms directly.",
        case.topic
    )
}

pub struct DiagnoseTask {
    deps: AgentDeps,
}

impl DiagnoseTask {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Task for DiagnoseTask {
    fn id(&self) -> &str {
        stage_ids::DIAGNOSE
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        let findings: String = context
            .get(session_keys::RESEARCH_FINDINGS)
            .await
            .unwrap_or_else(|| "No research findings available.".to_string());

        info!(task_id = %self.id(), topic = %case.topic, "Generating diagnoses");

        match ask(&self.deps.llm, &diagnosis_prompt(&case, &findings), DIAGNOSTICIAN_ROLE).await {
            Ok(text) if !text.trim().is_empty() => {
                agent_result(self.id(), AgentOutput::new(AgentKind::Diagnostician, text))
            }
            Ok(_) => degraded_result(
                self.id(),
                AgentOutput::degraded(
                    AgentKind::Diagnostician,
                    diagnosis_placeholder(&case),
                    "empty response from model",
                ),
            ),
            Err(err) => on_llm_error(
                self.id(),
                AgentKind::Diagnostician,
                err,
                diagnosis_placeholder(&case),
            ),
        }
    }

    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        degraded_result(
            self.id(),
            AgentOutput::degraded(
                AgentKind::Diagnostician,
                diagnosis_placeholder(&case),
                format!("diagnosis timed out after {} ms", limit.as_millis()),
            ),
        )
    }
}
