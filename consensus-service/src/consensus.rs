//! Consensus synthesis: merge every specialist output into one report with a
//! fixed section order.
//!
//! The model is asked for upper-case section headings. Parsing is tolerant of
//! markdown decoration around them, and any section the model leaves out is
//! filled with a placeholder so the report shape never depends on the model.

use chrono::Utc;
use std::{collections::HashMap, fmt::Write};
use tracing::{info, warn};

use crate::{
    llm::{LlmClient, LlmError, filter_thinking_tags},
    models::{
        AgentKind, AgentOutput, CaseInput, ConsensusNote, ConsensusReport, NoteKind,
        ReportSection, ResearchBundle, SectionKind,
    },
};

const CONSENSUS_ROLE: &str = r#"You are a medical consensus builder. Analyze the specialist assessments provided and create a unified assessment that represents the most likely scenario based on the available evidence.

STRUCTURE YOUR RESPONSE WITH EXACTLY THESE HEADINGS, IN THIS ORDER:

## UNIFIED DIAGNOSIS
The most likely diagnosis with a brief explanation.

## UNIFIED TREATMENT PLAN
A clear, practical plan organised by priority (immediate actions first), with timeframes and guidance on when to seek further help.

## RATIONALE
Your reasoning: how you weighed the assessments, the strength of the evidence, and how conflicting information was resolved.

## AGREEMENT & DISAGREEMENT
Bullet points. Start each with "Agreement:" or "Disagreement:" and name the specialists involved.

## SOURCE CREDIBILITY
A short comment on the quality of the research sources.

Be clear, evidence-based and patient-centered."#;

/// Words marking a note as a disagreement
const DISAGREEMENT_TERMS: [&str; 5] = ["disagree", "conflict", "diverg", "differ", "contradict"];
const NEGATIONS: [&str; 5] = ["no", "not", "without", "nor", "never"];

#[derive(Clone)]
pub struct ConsensusBuilder {
    llm: LlmClient,
}

impl ConsensusBuilder {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// One synthesis call over every output present. Missing sections are filled
    /// and the credibility section is always completed locally.
    pub async fn synthesize(
        &self,
        case: &CaseInput,
        outputs: &[AgentOutput],
        bundle: &ResearchBundle,
    ) -> Result<ConsensusReport, LlmError> {
        let prompt = synthesis_prompt(case, outputs, bundle);
        let text = filter_thinking_tags(&self.llm.complete(&prompt, CONSENSUS_ROLE).await?);

        let parsed = parse_sections(&text);
        let missing: Vec<_> = SectionKind::ORDER
            .iter()
            .filter(|kind| !parsed.contains_key(kind))
            .map(|kind| kind.title())
            .collect();
        if !missing.is_empty() {
            warn!(missing = ?missing, "Synthesis response lacks sections");
        }

        let report = assemble(case, outputs, bundle, parsed, false);
        info!(
            topic = %report.topic,
            notes = report.notes.len(),
            credibility = report.overall_credibility,
            "Consensus report assembled"
        );
        Ok(report)
    }

    /// Report built straight from the agent outputs when synthesis is unavailable
    pub fn assemble_degraded(
        &self,
        case: &CaseInput,
        outputs: &[AgentOutput],
        bundle: &ResearchBundle,
        reason: &str,
    ) -> ConsensusReport {
        let find = |agent| outputs.iter().find(|output| output.agent == agent);

        let mut diagnosis = find(AgentKind::Diagnostician)
            .map(|output| output.content.trim().to_string())
            .unwrap_or_default();
        if let Some(specialist) = find(AgentKind::LungCancerSpecialist) {
            let _ = write!(diagnosis, "\n\n### Specialist Assessment\n\n{}", specialist.content.trim());
        }
        let treatment = find(AgentKind::TreatmentAdvisor)
            .map(|output| output.content.trim().to_string())
            .unwrap_or_default();

        let mut parsed = HashMap::new();
        if !diagnosis.trim().is_empty() {
            parsed.insert(SectionKind::UnifiedDiagnosis, diagnosis.trim().to_string());
        }
        if !treatment.is_empty() {
            parsed.insert(SectionKind::UnifiedTreatmentPlan, treatment);
        }
        parsed.insert(
            SectionKind::Rationale,
            format!(
                "Consensus synthesis was unavailable ({reason}). The sections above reproduce the specialist outputs without reconciliation."
            ),
        );
        parsed.insert(
            SectionKind::AgreementAndDisagreement,
            "Agreement between specialists could not be assessed without synthesis.".to_string(),
        );

        warn!(topic = %case.topic, reason = %reason, "Assembling degraded consensus report");
        let mut report = assemble(case, outputs, bundle, parsed, true);
        report.notes.clear();
        report
    }
}

pub fn synthesis_prompt(case: &CaseInput, outputs: &[AgentOutput], bundle: &ResearchBundle) -> String {
    let mut prompt = format!("Topic: {}\n\n", case.topic);
    if outputs.is_empty() {
        prompt.push_str("No specialist assessments are available.\n\n");
    }
    for output in outputs {
        let _ = write!(prompt, "### {}", output.agent.display_name());
        if let Some(reason) = &output.degraded {
            let _ = write!(prompt, " (incomplete: {reason})");
        }
        let _ = write!(prompt, "\n{}\n\n", output.content.trim());
    }
    let _ = writeln!(
        prompt,
        "Sources (overall credibility {:.1}/10):",
        bundle.overall_credibility
    );
    for result in &bundle.results {
        let _ = writeln!(
            prompt,
            "- {} ({}) score {:.1}",
            result.title,
            result.url,
            result.credibility.unwrap_or_default()
        );
    }
    prompt.push_str("\nBased on all of this, produce the unified report. Format as instructed.");
    prompt
}

/// Recognise a section heading regardless of markdown decoration. Returns the
/// section and whatever follows the heading on the same line, so
/// `**Unified Diagnosis:** Migraine with Aura` opens the section with its first line.
/// Inline text is only taken after a colon.
pub fn split_heading(line: &str) -> Option<(SectionKind, &str)> {
    let start = line.trim().trim_start_matches(|c: char| {
        matches!(c, '#' | '*' | '.' | ')') || c.is_ascii_digit() || c.is_whitespace()
    });
    SectionKind::ORDER.into_iter().find_map(|kind| {
        [kind.heading().to_string(), kind.heading().replace(" & ", " AND ")]
            .iter()
            .find_map(|heading| {
                let head = start.get(..heading.len())?;
                if !head.eq_ignore_ascii_case(heading) {
                    return None;
                }
                let rest = &start[heading.len()..];
                let inline = rest.trim_start_matches(|c: char| {
                    matches!(c, '*' | ':' | '#') || c.is_whitespace()
                });
                let separator = &rest[..rest.len() - inline.len()];
                if inline.is_empty() {
                    Some((kind, ""))
                } else if separator.contains(':') {
                    Some((kind, inline.trim_end()))
                } else {
                    None
                }
            })
    })
}

/// Split model text into known sections. Text before the first heading is dropped,
/// and a repeated heading keeps its first body.
pub fn parse_sections(text: &str) -> HashMap<SectionKind, String> {
    let mut sections = HashMap::new();
    let mut current: Option<(SectionKind, Vec<&str>)> = None;

    for line in text.lines() {
        if let Some((kind, inline)) = split_heading(line) {
            if let Some((previous, body)) = current.take() {
                store(&mut sections, previous, &body);
            }
            let body = if inline.is_empty() { Vec::new() } else { vec![inline] };
            current = Some((kind, body));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((kind, body)) = current {
        store(&mut sections, kind, &body);
    }
    sections
}

fn store(sections: &mut HashMap<SectionKind, String>, kind: SectionKind, body: &[&str]) {
    let body = body.join("\n").trim().to_string();
    if !body.is_empty() {
        sections.entry(kind).or_insert(body);
    }
}

/// Bullet lines of the agreement section. An explicit `Agreement:` or
/// `Disagreement:` label decides first, then a conflict term that is not negated
/// ("no disagreement" is agreement); otherwise a bullet follows the most recent
/// sub-heading.
pub fn extract_notes(body: &str) -> Vec<ConsensusNote> {
    let mut mode = NoteKind::Agreement;
    let mut notes = Vec::new();

    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let bullet = line
            .strip_prefix("- ")
            .or_else(|| line.strip_prefix("* "))
            .or_else(|| line.strip_prefix("• "));
        let lower = line.to_lowercase();
        let mentions_conflict = names_conflict(&lower);

        match bullet {
            Some(text) => {
                let kind = if let Some(kind) = note_label(&text.to_lowercase()) {
                    kind
                } else if mentions_conflict {
                    NoteKind::Disagreement
                } else if lower.contains("agree") || lower.contains("concur") {
                    NoteKind::Agreement
                } else {
                    mode
                };
                notes.push(ConsensusNote {
                    kind,
                    text: text.trim().to_string(),
                });
            }
            None if mentions_conflict => mode = NoteKind::Disagreement,
            None if lower.contains("agree") => mode = NoteKind::Agreement,
            None => {}
        }
    }
    notes
}

/// `Agreement:` / `Disagreement:` at the start of a bullet, bold or not
fn note_label(lower: &str) -> Option<NoteKind> {
    let text = lower.trim_start_matches('*');
    let (kind, rest) = if let Some(rest) = text.strip_prefix("disagreement") {
        (NoteKind::Disagreement, rest)
    } else if let Some(rest) = text.strip_prefix("agreement") {
        (NoteKind::Agreement, rest)
    } else {
        return None;
    };
    rest.trim_start_matches('s')
        .trim_start_matches('*')
        .starts_with(':')
        .then_some(kind)
}

/// A conflict term not preceded by a negation within two words
fn names_conflict(lower: &str) -> bool {
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    words.iter().enumerate().any(|(i, word)| {
        DISAGREEMENT_TERMS.iter().any(|term| word.starts_with(term))
            && !words[i.saturating_sub(2)..i]
                .iter()
                .any(|previous| NEGATIONS.contains(previous))
    })
}

/// Outputs that are missing or incomplete, one line each
pub fn input_gaps(outputs: &[AgentOutput]) -> Vec<String> {
    let mut gaps = Vec::new();
    for agent in AgentKind::ALL {
        match outputs.iter().find(|output| output.agent == agent) {
            None if agent.is_generic() => {
                gaps.push(format!("{} output was not available.", agent.display_name()));
            }
            Some(AgentOutput {
                degraded: Some(reason),
                ..
            }) => {
                gaps.push(format!(
                    "{} output is incomplete: {reason}.",
                    agent.display_name()
                ));
            }
            _ => {}
        }
    }
    gaps
}

pub fn credibility_summary(bundle: &ResearchBundle) -> String {
    let mut summary = format!(
        "**Overall credibility:** {:.1}/10 across {} sources ({} trusted)\n",
        bundle.overall_credibility,
        bundle.results.len(),
        bundle.trusted_count()
    );
    if bundle.results.is_empty() {
        summary.push_str("\n- No sources were retrieved.");
    }
    for result in &bundle.results {
        let _ = write!(
            summary,
            "\n- [{}]({}): {:.1}/10{}",
            result.title,
            result.url,
            result.credibility.unwrap_or_default(),
            if result.trusted { ", trusted domain" } else { "" }
        );
    }
    summary
}

fn placeholder(kind: SectionKind) -> String {
    format!("_No {} was provided._", kind.title().to_lowercase())
}

fn assemble(
    case: &CaseInput,
    outputs: &[AgentOutput],
    bundle: &ResearchBundle,
    mut parsed: HashMap<SectionKind, String>,
    degraded: bool,
) -> ConsensusReport {
    let notes = parsed
        .get(&SectionKind::AgreementAndDisagreement)
        .map(|body| extract_notes(body))
        .unwrap_or_default();
    let gaps = input_gaps(outputs);

    let sections = SectionKind::ORDER
        .into_iter()
        .map(|kind| {
            let mut body = parsed.remove(&kind).unwrap_or_else(|| match kind {
                SectionKind::SourceCredibility => String::new(),
                _ => placeholder(kind),
            });
            match kind {
                SectionKind::Rationale if !gaps.is_empty() => {
                    body.push_str("\n\n**Gaps in specialist input:**\n");
                    for gap in &gaps {
                        let _ = write!(body, "\n- {gap}");
                    }
                }
                SectionKind::SourceCredibility => {
                    if !body.trim().is_empty() {
                        body.push_str("\n\n");
                    }
                    body.push_str(&credibility_summary(bundle));
                }
                _ => {}
            }
            ReportSection {
                kind,
                title: kind.title().to_string(),
                body: body.trim().to_string(),
            }
        })
        .collect();

    ConsensusReport {
        topic: case.topic.clone(),
        sections,
        notes,
        overall_credibility: bundle.overall_credibility,
        degraded,
        generated_at: Utc::now(),
        translation: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        llm::{ChatMessage, ChatProvider, ProviderError},
        models::SearchResult,
        retry::RetryPolicy,
    };
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Canned(&'static str);

    #[async_trait]
    impl ChatProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn chat(&self, _messages: &[ChatMessage]) -> Result<String, ProviderError> {
            Ok(self.0.to_string())
        }
    }

    fn builder(reply: &'static str) -> ConsensusBuilder {
        ConsensusBuilder::new(LlmClient::new(vec![Arc::new(Canned(reply))], RetryPolicy::none()))
    }

    fn bundle() -> ResearchBundle {
        ResearchBundle {
            results: vec![SearchResult {
                url: "https://www.mayoclinic.org/migraine".into(),
                title: "Migraine - Mayo Clinic".into(),
                snippet: "Overview".into(),
                trusted: true,
                credibility: Some(10.0),
            }],
            overall_credibility: 10.0,
        }
    }

    #[test]
    fn headings_tolerate_decoration() {
        assert_eq!(split_heading("## UNIFIED DIAGNOSIS"), Some((SectionKind::UnifiedDiagnosis, "")));
        assert_eq!(split_heading("**Rationale:**"), Some((SectionKind::Rationale, "")));
        assert_eq!(
            split_heading("3. Agreement and Disagreement"),
            Some((SectionKind::AgreementAndDisagreement, ""))
        );
        assert_eq!(split_heading("The unified diagnosis is migraine"), None);
        assert_eq!(split_heading("Rationale for imaging"), None);
    }

    #[test]
    fn inline_heading_carries_its_text() {
        assert_eq!(
            split_heading("**Unified Diagnosis:** Migraine with Aura"),
            Some((SectionKind::UnifiedDiagnosis, "Migraine with Aura"))
        );

        let sections = parse_sections(
            "**Unified Diagnosis:** Migraine with Aura\nConfirmed by history.\n\nRationale: symptoms match",
        );
        assert_eq!(
            sections[&SectionKind::UnifiedDiagnosis],
            "Migraine with Aura\nConfirmed by history."
        );
        assert_eq!(sections[&SectionKind::Rationale], "symptoms match");
    }

    #[test]
    fn notes_follow_subheadings_and_keywords() {
        let body = "Points of agreement\n- All specialists favour migraine\n\nPoints of disagreement\n- Imaging timing\n- Disagreement: triptan choice";
        let notes = extract_notes(body);
        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].kind, NoteKind::Agreement);
        assert_eq!(notes[1].kind, NoteKind::Disagreement);
        assert_eq!(notes[2].kind, NoteKind::Disagreement);
    }

    #[test]
    fn labels_and_negations_decide_before_keywords() {
        let body = "Points of disagreement\n- No disagreement; all agents concur\n- Agreement: agents differ only on dose\n- **Disagreement:** imaging timing\n- Conflicting views on triptans";
        let kinds: Vec<_> = extract_notes(body).into_iter().map(|note| note.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NoteKind::Agreement,
                NoteKind::Agreement,
                NoteKind::Disagreement,
                NoteKind::Disagreement,
            ]
        );
    }

    #[tokio::test]
    async fn missing_sections_get_placeholders_in_fixed_order() {
        let reply = "## UNIFIED DIAGNOSIS\nMigraine with Aura\n\n## AGREEMENT & DISAGREEMENT\n- Agreement: both agents agree";
        let outputs = vec![AgentOutput::new(AgentKind::Diagnostician, "## Migraine with Aura")];
        let report = builder(reply)
            .synthesize(&CaseInput::new("Migraine"), &outputs, &bundle())
            .await
            .unwrap();

        let kinds: Vec<_> = report.sections.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, SectionKind::ORDER.to_vec());
        assert_eq!(report.section(SectionKind::UnifiedDiagnosis).unwrap().body, "Migraine with Aura");
        assert!(report
            .section(SectionKind::UnifiedTreatmentPlan)
            .unwrap()
            .body
            .starts_with("_No unified treatment plan"));
        assert!(report
            .section(SectionKind::Rationale)
            .unwrap()
            .body
            .contains("Treatment Advisor output was not available."));
        assert!(report
            .section(SectionKind::SourceCredibility)
            .unwrap()
            .body
            .contains("**Overall credibility:** 10.0/10"));
        assert_eq!(report.notes.len(), 1);
        assert!(!report.degraded);
    }

    #[test]
    fn degraded_report_reuses_agent_outputs() {
        let outputs = vec![
            AgentOutput::new(AgentKind::Diagnostician, "## NSCLC"),
            AgentOutput::degraded(AgentKind::TreatmentAdvisor, "placeholder plan", "timed out"),
            AgentOutput::new(AgentKind::LungCancerSpecialist, "## Lung Cancer Specialist Assessment"),
        ];
        let report = builder("").assemble_degraded(
            &CaseInput::new("Lung cancer"),
            &outputs,
            &bundle(),
            "synthesis timed out",
        );

        assert!(report.degraded);
        let diagnosis = &report.section(SectionKind::UnifiedDiagnosis).unwrap().body;
        assert!(diagnosis.starts_with("## NSCLC"));
        assert!(diagnosis.contains("## Lung Cancer Specialist Assessment"));
        let rationale = &report.section(SectionKind::Rationale).unwrap().body;
        assert!(rationale.contains("synthesis timed out"));
        assert!(rationale.contains("Treatment Advisor output is incomplete: timed out."));
    }
}
