//! Report translation with structural checks.
//!
//! Sections travel to the model wrapped in `[[SECTION]]` markers. The reply is
//! accepted only when every marker comes back and every number or clinical code of
//! the source survives verbatim; otherwise the caller gets the original report text
//! with a `partial` status.

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::{collections::BTreeSet, sync::LazyLock};
use tracing::{info, warn};

use crate::{
    llm::{LlmClient, filter_thinking_tags},
    models::{
        ConsensusReport, SectionKind, TranslatedSection, TranslationMetadata, TranslationResult,
        TranslationStatus,
    },
};

const AGENT_NAME: &str = "Medical Translation Agent";

const TRANSLATOR_ROLE: &str = r#"You are a specialized medical translation assistant. Translate medical consensus reports while keeping medical accuracy and terminology.

Rules:
1. Lines of the form [[SECTION_NAME]] are structural markers. Copy every marker unchanged, on its own line, in the same order.
2. Preserve numerical values, percentages, measurements, staging codes and gene names exactly as written.
3. Keep the markdown structure (headings, lists, links) of the original.
4. Translate medical terms accurately and keep the professional tone.
5. Output only the translation, without commentary.

Prioritize accuracy over fluency."#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

const fn lang(code: &'static str, name: &'static str) -> Language {
    Language { code, name }
}

pub const SUPPORTED_LANGUAGES: [Language; 36] = [
    lang("ar", "Arabic"),
    lang("bn", "Bengali"),
    lang("bg", "Bulgarian"),
    lang("zh", "Chinese (Simplified)"),
    lang("cs", "Czech"),
    lang("da", "Danish"),
    lang("nl", "Dutch"),
    lang("fi", "Finnish"),
    lang("fr", "French"),
    lang("de", "German"),
    lang("el", "Greek"),
    lang("gu", "Gujarati"),
    lang("he", "Hebrew"),
    lang("hi", "Hindi"),
    lang("hu", "Hungarian"),
    lang("it", "Italian"),
    lang("ja", "Japanese"),
    lang("kn", "Kannada"),
    lang("ko", "Korean"),
    lang("ml", "Malayalam"),
    lang("mr", "Marathi"),
    lang("no", "Norwegian"),
    lang("fa", "Persian"),
    lang("pl", "Polish"),
    lang("pt", "Portuguese"),
    lang("pa", "Punjabi"),
    lang("ro", "Romanian"),
    lang("ru", "Russian"),
    lang("es", "Spanish"),
    lang("sv", "Swedish"),
    lang("ta", "Tamil"),
    lang("te", "Telugu"),
    lang("th", "Thai"),
    lang("tr", "Turkish"),
    lang("ur", "Urdu"),
    lang("vi", "Vietnamese"),
];

/// Look a language up by ISO 639-1 code or English name, case-insensitively.
/// "Chinese" matches "Chinese (Simplified)".
pub fn resolve_language(input: &str) -> Option<Language> {
    let wanted = input.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    SUPPORTED_LANGUAGES.into_iter().find(|language| {
        let name = language.name.to_lowercase();
        language.code == wanted
            || name == wanted
            || name.split(" (").next() == Some(wanted.as_str())
    })
}

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("valid regex"));
static CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,5}\d+[a-z]?\b").expect("valid regex"));

/// Numbers and clinical codes (T2b, HER2, M1a) that must survive translation
pub fn protected_tokens(text: &str) -> BTreeSet<&str> {
    NUMBER
        .find_iter(text)
        .chain(CODE.find_iter(text))
        .map(|m| m.as_str())
        .collect()
}

/// Report sections, each preceded by its marker line
pub fn wrap_sections(report: &ConsensusReport) -> String {
    report
        .sections
        .iter()
        .map(|section| {
            format!(
                "{}\n## {}\n\n{}",
                section.kind.marker(),
                section.title,
                section.body.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Cut a translated reply at its markers. Every marker of `expected` must be present.
pub fn split_sections(
    text: &str,
    expected: &[SectionKind],
) -> Result<Vec<TranslatedSection>, String> {
    let mut found = Vec::with_capacity(expected.len());
    let mut missing = Vec::new();
    for kind in expected {
        match text.find(kind.marker()) {
            Some(position) => found.push((position, *kind)),
            None => missing.push(kind.marker()),
        }
    }
    if !missing.is_empty() {
        return Err(format!("missing section markers: {}", missing.join(", ")));
    }

    found.sort_by_key(|(position, _)| *position);
    let sections = found
        .iter()
        .enumerate()
        .map(|(i, (start, kind))| {
            let body_start = start + kind.marker().len();
            let end = found.get(i + 1).map_or(text.len(), |(next, _)| *next);
            TranslatedSection {
                kind: *kind,
                text: text[body_start..end].trim().to_string(),
            }
        })
        .collect();
    Ok(sections)
}

#[derive(Clone)]
pub struct TranslationAgent {
    llm: LlmClient,
}

impl TranslationAgent {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    /// Never fails: problems are reported through the result status
    pub async fn translate(&self, report: &ConsensusReport, language: &str) -> TranslationResult {
        let Some(target) = resolve_language(language) else {
            warn!(language = %language, "Unsupported translation language");
            return failed(report, language);
        };

        info!(language = %target.code, sections = report.sections.len(), "Translating report");
        let source = wrap_sections(report);
        let prompt = format!(
            "Translate the following medical report into {}.\n\n{source}",
            target.name
        );

        let reply = match self.llm.complete(&prompt, TRANSLATOR_ROLE).await {
            Ok(reply) => filter_thinking_tags(&reply),
            Err(e) => return partial(report, target, format!("translation request failed: {e}")),
        };

        let expected: Vec<_> = report.sections.iter().map(|section| section.kind).collect();
        let sections = match split_sections(&reply, &expected) {
            Ok(sections) => sections,
            Err(reason) => return partial(report, target, reason),
        };

        let original = protected_tokens(&source);
        let translated = protected_tokens(&reply);
        let altered: Vec<_> = original.difference(&translated).copied().collect();
        if !altered.is_empty() {
            return partial(
                report,
                target,
                format!("numeric values changed in translation: {}", altered.join(", ")),
            );
        }

        let text = sections
            .iter()
            .map(|section| section.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        info!(language = %target.code, "Translation accepted");
        TranslationResult {
            language: target.code.to_string(),
            text,
            sections,
            status: TranslationStatus::Success,
            metadata: metadata(target.name, None),
        }
    }
}

fn metadata(language_name: &str, note: Option<String>) -> TranslationMetadata {
    TranslationMetadata {
        language_name: language_name.to_string(),
        translated_at: Utc::now(),
        agent: AGENT_NAME.to_string(),
        note,
    }
}

/// Original report text with the reason the translation was not used
pub fn partial(report: &ConsensusReport, target: Language, reason: String) -> TranslationResult {
    warn!(language = %target.code, reason = %reason, "Translation downgraded to partial");
    TranslationResult {
        language: target.code.to_string(),
        text: report.sections_markdown(),
        sections: Vec::new(),
        status: TranslationStatus::Partial,
        metadata: metadata(target.name, Some(reason)),
    }
}

fn failed(report: &ConsensusReport, language: &str) -> TranslationResult {
    TranslationResult {
        language: language.trim().to_string(),
        text: report.sections_markdown(),
        sections: Vec::new(),
        status: TranslationStatus::Failed,
        metadata: metadata(
            language.trim(),
            Some(format!("unsupported language: {}", language.trim())),
        ),
    }
}
