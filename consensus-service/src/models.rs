use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Patient case submitted for analysis. Never modified once a run starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseInput {
    pub topic: String,
    #[serde(default)]
    pub symptoms: String,
    #[serde(default)]
    pub medical_history: String,
    #[serde(default)]
    pub test_results: String,
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub realtime_search: bool,
}

impl CaseInput {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ..Default::default()
        }
    }

    pub fn with_symptoms(mut self, symptoms: impl Into<String>) -> Self {
        self.symptoms = symptoms.into();
        self
    }

    pub fn with_medical_history(mut self, history: impl Into<String>) -> Self {
        self.medical_history = history.into();
        self
    }

    pub fn with_test_results(mut self, results: impl Into<String>) -> Self {
        self.test_results = results.into();
        self
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = Some(language.into());
        self
    }

    pub fn with_realtime_search(mut self, realtime: bool) -> Self {
        self.realtime_search = realtime;
        self
    }

    /// Requested language, ignoring blank values
    pub fn requested_language(&self) -> Option<&str> {
        self.target_language
            .as_deref()
            .map(str::trim)
            .filter(|language| !language.is_empty())
    }

    /// All free-text fields joined, lower-cased, for keyword heuristics
    pub fn combined_text(&self) -> String {
        format!(
            "{} {} {} {}",
            self.topic, self.symptoms, self.test_results, self.medical_history
        )
        .to_lowercase()
    }
}

/// Display value for a free-text field that may be empty
pub fn or_not_provided<'a>(value: &'a str, label: &'a str) -> std::borrow::Cow<'a, str> {
    if value.trim().is_empty() {
        std::borrow::Cow::Owned(format!("No {label} provided."))
    } else {
        std::borrow::Cow::Borrowed(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Host is on the trusted allow-list
    pub trusted: bool,
    /// Filled in by the source verifier, 0 to 10
    #[serde(default)]
    pub credibility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub results: Vec<SearchResult>,
    pub overall_credibility: f64,
}

impl ResearchBundle {
    pub fn trusted_count(&self) -> usize {
        self.results.iter().filter(|result| result.trusted).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Diagnostician,
    TreatmentAdvisor,
    LungCancerSpecialist,
}

impl AgentKind {
    /// Order in which outputs are presented to the consensus builder
    pub const ALL: [AgentKind; 3] = [
        AgentKind::Diagnostician,
        AgentKind::TreatmentAdvisor,
        AgentKind::LungCancerSpecialist,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            AgentKind::Diagnostician => "diagnostician",
            AgentKind::TreatmentAdvisor => "treatment_advisor",
            AgentKind::LungCancerSpecialist => "lung_cancer_specialist",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            AgentKind::Diagnostician => "Diagnostician",
            AgentKind::TreatmentAdvisor => "Treatment Advisor",
            AgentKind::LungCancerSpecialist => "Lung Cancer Specialist",
        }
    }

    /// Generic agents run for every case; the rest only when dispatched
    pub fn is_generic(&self) -> bool {
        !matches!(self, AgentKind::LungCancerSpecialist)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutput {
    pub agent: AgentKind,
    pub content: String,
    /// Why the output is a fallback rather than a full answer
    #[serde(default)]
    pub degraded: Option<String>,
}

impl AgentOutput {
    pub fn new(agent: AgentKind, content: impl Into<String>) -> Self {
        Self {
            agent,
            content: content.into(),
            degraded: None,
        }
    }

    pub fn degraded(agent: AgentKind, content: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            agent,
            content: content.into(),
            degraded: Some(reason.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Consensus report sections, in their fixed presentation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    UnifiedDiagnosis,
    UnifiedTreatmentPlan,
    Rationale,
    AgreementAndDisagreement,
    SourceCredibility,
}

impl SectionKind {
    pub const ORDER: [SectionKind; 5] = [
        SectionKind::UnifiedDiagnosis,
        SectionKind::UnifiedTreatmentPlan,
        SectionKind::Rationale,
        SectionKind::AgreementAndDisagreement,
        SectionKind::SourceCredibility,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::UnifiedDiagnosis => "Unified Diagnosis",
            SectionKind::UnifiedTreatmentPlan => "Unified Treatment Plan",
            SectionKind::Rationale => "Rationale",
            SectionKind::AgreementAndDisagreement => "Agreement & Disagreement",
            SectionKind::SourceCredibility => "Source Credibility",
        }
    }

    /// Upper-case heading the synthesis prompt asks the model to emit
    pub fn heading(&self) -> &'static str {
        match self {
            SectionKind::UnifiedDiagnosis => "UNIFIED DIAGNOSIS",
            SectionKind::UnifiedTreatmentPlan => "UNIFIED TREATMENT PLAN",
            SectionKind::Rationale => "RATIONALE",
            SectionKind::AgreementAndDisagreement => "AGREEMENT & DISAGREEMENT",
            SectionKind::SourceCredibility => "SOURCE CREDIBILITY",
        }
    }

    /// Language-neutral marker used to carry section boundaries through translation
    pub fn marker(&self) -> &'static str {
        match self {
            SectionKind::UnifiedDiagnosis => "[[UNIFIED_DIAGNOSIS]]",
            SectionKind::UnifiedTreatmentPlan => "[[UNIFIED_TREATMENT_PLAN]]",
            SectionKind::Rationale => "[[RATIONALE]]",
            SectionKind::AgreementAndDisagreement => "[[AGREEMENT_DISAGREEMENT]]",
            SectionKind::SourceCredibility => "[[SOURCE_CREDIBILITY]]",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Agreement,
    Disagreement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusNote {
    pub kind: NoteKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusReport {
    pub topic: String,
    pub sections: Vec<ReportSection>,
    pub notes: Vec<ConsensusNote>,
    pub overall_credibility: f64,
    /// Built without a successful synthesis call
    pub degraded: bool,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub translation: Option<TranslationResult>,
}

impl ConsensusReport {
    pub fn section(&self, kind: SectionKind) -> Option<&ReportSection> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    /// Section bodies under their headings, in fixed order
    pub fn sections_markdown(&self) -> String {
        self.sections
            .iter()
            .map(|section| format!("## {}\n\n{}", section.title, section.body.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    Success,
    Partial,
    Failed,
}

impl TranslationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationStatus::Success => "success",
            TranslationStatus::Partial => "partial",
            TranslationStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedSection {
    pub kind: SectionKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationMetadata {
    pub language_name: String,
    pub translated_at: DateTime<Utc>,
    pub agent: String,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub language: String,
    pub text: String,
    #[serde(default)]
    pub sections: Vec<TranslatedSection>,
    pub status: TranslationStatus,
    pub metadata: TranslationMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunResponse {
    pub run_id: String,
    pub status: String,
    pub stages: Vec<graph_flow::StageRecord>,
    pub report: Option<ConsensusReport>,
    pub errors: Vec<String>,
}
