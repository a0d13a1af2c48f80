use async_trait::async_trait;
use graph_flow::{Context, Result, Task, TaskResult};
use std::time::Duration;
use tracing::info;

use super::{
    stage_ids,
    utils::{AgentDeps, agent_result, ask, degraded_result, on_llm_error, require_case},
};
use crate::{
    models::{AgentKind, AgentOutput, CaseInput},
    specialists::lung_cancer::LungCancerAssessment,
};

const ONCOLOGIST_ROLE: &str = r#"You are a thoracic oncologist reviewing an automated lung cancer assessment.

Check the classification, staging and treatment options against the patient data. Respond with:

## Oncologist Review

**Agreement:** Whether you agree with the automated classification and stage, and why.

**Corrections:** Anything the assessment got wrong or missed. Write "None" if nothing.

**Next Steps:** 2-4 bullet points with the most important diagnostic or treatment actions.

Be concise and evidence-based."#;

pub fn review_prompt(case: &CaseInput, assessment: &str) -> String {
    format!(
        "Topic: {}\nSymptoms: {}\nMedical History: {}\nTest Results: {}\n\nAutomated Assessment:\n{}",
        case.topic, case.symptoms, case.medical_history, case.test_results, assessment
    )
}

/// Heuristic lung-cancer assessment followed by one review prompt. The heuristic
/// part never fails, so a failed review still leaves a useful output.
pub struct LungCancerSpecialistTask {
    deps: AgentDeps,
}

impl LungCancerSpecialistTask {
    pub fn new(deps: AgentDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl Task for LungCancerSpecialistTask {
    fn id(&self) -> &str {
        stage_ids::LUNG_CANCER_SPECIALIST
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        let assessment = LungCancerAssessment::assess(&case);
        info!(
            task_id = %self.id(),
            cancer_type = %assessment.classification.cancer_type.label(),
            stage = %assessment.staging.stage,
            "Lung cancer assessment computed"
        );
        let heuristics = assessment.to_markdown();

        match ask(&self.deps.llm, &review_prompt(&case, &heuristics), ONCOLOGIST_ROLE).await {
            Ok(review) if !review.trim().is_empty() => agent_result(
                self.id(),
                AgentOutput::new(
                    AgentKind::LungCancerSpecialist,
                    format!("{heuristics}\n\n{}", review.trim()),
                ),
            ),
            Ok(_) => degraded_result(
                self.id(),
                AgentOutput::degraded(
                    AgentKind::LungCancerSpecialist,
                    heuristics,
                    "oncologist review was empty",
                ),
            ),
            Err(err) => on_llm_error(self.id(), AgentKind::LungCancerSpecialist, err, heuristics),
        }
    }

    async fn on_timeout(&self, context: Context, limit: Duration) -> Result<TaskResult> {
        let case = require_case(&context).await?;
        degraded_result(
            self.id(),
            AgentOutput::degraded(
                AgentKind::LungCancerSpecialist,
                LungCancerAssessment::assess(&case).to_markdown(),
                format!("oncologist review timed out after {} ms", limit.as_millis()),
            ),
        )
    }
}
