use crate::models::AgentKind;

/// Context keys. Each is written by exactly one stage.
pub mod session_keys {
    use super::AgentKind;

    pub const CASE: &str = "case";
    pub const SEARCH_RESULTS: &str = "search_results";
    pub const RESEARCH_QUERY: &str = "research_query";
    pub const RESEARCH_FINDINGS: &str = "research_findings";
    pub const RESEARCH_BUNDLE: &str = "research_bundle";
    pub const AGENT_OUTPUT_PREFIX: &str = "agent_output.";
    pub const CONSENSUS_REPORT: &str = "consensus_report";
    pub const TRANSLATION: &str = "translation";
    pub const STAGE_ERROR_PREFIX: &str = "stage_error.";

    pub fn agent_output(agent: AgentKind) -> String {
        format!("{AGENT_OUTPUT_PREFIX}{}", agent.id())
    }

    pub fn stage_error(stage: &str) -> String {
        format!("{STAGE_ERROR_PREFIX}{stage}")
    }
}

pub mod stage_ids {
    pub const RESEARCH: &str = "research";
    pub const VERIFY_SOURCES: &str = "verify_sources";
    pub const SPECIALIST_PANEL: &str = "specialist_panel";
    pub const LUNG_CANCER_SPECIALIST: &str = "lung_cancer_specialist";
    pub const DIAGNOSE: &str = "diagnose";
    pub const TREAT: &str = "treat";
    pub const BUILD_CONSENSUS: &str = "build_consensus";
    pub const TRANSLATE: &str = "translate";
}
