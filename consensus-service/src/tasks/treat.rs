use async_trait::async_trait;
use graph_flow::{Context, Result, Task, TaskResult};
use std::time::Duration;
use tracing::info;

use super::{
    session_keys, stage_ids,
    utils::{AgentDeps, agent_output, agent_result, ask, degraded_result, on_llm_error, require_case},
};
use crate::models::{AgentKind, AgentOutput, CaseInput, or_not_provided};

const TREATMENT_ROLE: &str = r#"You are a medical treatment specialist. Based on the diagnoses and patient information, recommend appropriate evidence-based treatments.

FORMAT YOUR RESPONSE AS FOLLOWS:

## Primary Interventions

Present 2-4 primary treatment recommendations, each formatted as:

### [TREATMENT NAME]

**Purpose:** What this treatment addresses

**Details:** Implementation (dosage if medication, frequency, duration)

**Evidence:** The evidence supporting this approach

## Lifestyle & Supportive Measures

2-3 lifestyle modifications or supportive treatments that complement the primary interventions.

## Follow-up & Monitoring

When the patient should follow up and what should be monitored.

## Precautions

Important contraindications or warnings.

Use clear, practical language that healthcare providers can easily communicate to patients."#;

pub fn treatment_prompt(
    case: &CaseInput,
    diagnosis: &str,
    specialist: Option<&str>,
    findings: &str,
) -> String {
    let mut prompt = format!("Diagnoses:\n{diagnosis}\n\n");
    if let Some(assessment) = specialist {
        prompt.push_str(&format!("Specialist Assessment:\n{assessment}\n\n"));
    }
    prompt.push_str(&format!(
        "Patient Symptoms: {}\nMedical History: {}\n\nResearch Findings:\n{}\n\n\
         Based on these diagnoses and patient information, what treatments would you recommend? Format as instructed.",
        or_not_provided(&case.symptoms, "symptoms"),
        or_not_provided(&case.medical_history, "medical history"),
        findings
    ));
    prompt
}

pub fn treatment_placeholder(case: &CaseInput) -> String {
    format!(
        "## Primary Interventions\n\nNo automated treatment plan could be produced for \"{}\".\n\n\
         ## Follow-up & Monitoring\n\nArrange a clinical consultation to agree on a treatment plan.",
        case.topic
    )
}

pub struct TreatTask {
    deps: AgentDeps,
}

impl TreatTask {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Task for TreatTask {
    fn id(&self) -> &str {
        stage_ids::TREAT
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        let Some(diagnosis) = agent_output(&context, AgentKind::Diagnostician).await else {
            return degraded_result(
                self.id(),
                AgentOutput::degraded(
                    AgentKind::TreatmentAdvisor,
                    treatment_placeholder(&case),
                    "no diagnosis to base treatments on",
                ),
            );
        };
        let specialist = agent_output(&context, AgentKind::LungCancerSpecialist).await;
        let findings: String = context
            .get(session_keys::RESEARCH_FINDINGS)
            .await
            .unwrap_or_else(|| "No research findings available.".to_string());

        info!(
            task_id = %self.id(),
            with_specialist = specialist.is_some(),
            "Recommending treatments"
        );

        let prompt = treatment_prompt(
            &case,
            &diagnosis.content,
            specialist.as_ref().map(|output| output.content.as_str()),
            &findings,
        );
        match ask(&self.deps.llm, &prompt, TREATMENT_ROLE).await {
            Ok(text) if !text.trim().is_empty() => {
                agent_result(self.id(), AgentOutput::new(AgentKind::TreatmentAdvisor, text))
            }
            Ok(_) => degraded_result(
                self.id(),
                AgentOutput::degraded(
                    AgentKind::TreatmentAdvisor,
                    treatment_placeholder(&case),
                    "empty response from model",
                ),
            ),
            Err(err) => on_llm_error(
                self.id(),
                AgentKind::TreatmentAdvisor,
                err,
                treatment_placeholder(&case),
            ),
        }
    }

    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        degraded_result(
            self.id(),
            AgentOutput::degraded(
                AgentKind::TreatmentAdvisor,
                treatment_placeholder(&case),
                format!("treatment planning timed out after {} ms", limit.as_millis()),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specialist_assessment_is_included_when_present() {
        let case = CaseInput::new("Lung cancer");
        let with = treatment_prompt(&case, "## NSCLC", Some("## Lung Cancer Specialist Assessment"), "none");
        assert!(with.contains("Specialist Assessment:\n## Lung Cancer Specialist Assessment"));

        let without = treatment_prompt(&case, "## NSCLC", None, "none");
        assert!(!without.contains("Specialist Assessment"));
        assert!(without.starts_with("Diagnoses:\n## NSCLC"));
    }
}
