use chrono::{DateTime, Local, TimeZone};
use std::{
    fmt::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::{
    error::ConsensusError,
    models::{ConsensusReport, TranslationStatus},
};

pub fn default_report_filename<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("medical_diagnosis_{}.md", now.format("%Y%m%d_%H%M%S"))
}

/// Report as markdown: header, the sections in fixed order, then the translated
/// copy when there is one.
pub fn render_markdown(report: &ConsensusReport) -> String {
    let mut out = format!("# Medical Consensus Report: {}\n\n", report.topic);
    let _ = writeln!(
        out,
        "_Generated {} | Source credibility {:.1}/10_\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.overall_credibility
    );
    if report.degraded {
        out.push_str(
            "> This report was assembled without a consensus synthesis and reproduces the specialist outputs directly.\n\n",
        );
    }
    out.push_str(&report.sections_markdown());
    out.push('\n');

    if let Some(translation) = &report.translation {
        let _ = write!(
            out,
            "\n---\n\n# Translation: {} ({})\n\n",
            translation.metadata.language_name,
            translation.status.as_str()
        );
        if translation.status != TranslationStatus::Success {
            if let Some(note) = &translation.metadata.note {
                let _ = writeln!(out, "> {note}\n");
            }
        }
        out.push_str(translation.text.trim());
        out.push('\n');
    }
    out
}

/// Write the rendered report to `path`, or to a timestamped file in the working
/// directory. Returns where it went.
pub async fn write_report(
    report: &ConsensusReport,
    path: Option<&Path>,
) -> Result<PathBuf, ConsensusError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default_report_filename(&Local::now())),
    };
    tokio::fs::write(&path, render_markdown(report)).await?;
    info!(path = %path.display(), "Report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ReportSection, SectionKind, TranslationMetadata, TranslationResult,
    };
    use chrono::Utc;

    fn report() -> ConsensusReport {
        ConsensusReport {
            topic: "Migraine".into(),
            sections: SectionKind::ORDER
                .into_iter()
                .map(|kind| ReportSection {
                    kind,
                    title: kind.title().into(),
                    body: format!("{} text", kind.title()),
                })
                .collect(),
            notes: Vec::new(),
            overall_credibility: 7.25,
            degraded: false,
            generated_at: Utc::now(),
            translation: None,
        }
    }

    #[test]
    fn default_filename_is_timestamped() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(default_report_filename(&at), "medical_diagnosis_20240309_140507.md");
    }

    #[test]
    fn sections_render_in_fixed_order() {
        let markdown = render_markdown(&report());
        let positions: Vec<_> = SectionKind::ORDER
            .iter()
            .map(|kind| markdown.find(&format!("## {}", kind.title())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(!markdown.contains("# Translation"));
    }

    #[tokio::test]
    async fn translated_copy_follows_original() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.md");
        let mut report = report();
        report.translation = Some(TranslationResult {
            language: "es".into(),
            text: "## Diagnóstico unificado\n\nMigraña".into(),
            sections: Vec::new(),
            status: TranslationStatus::Success,
            metadata: TranslationMetadata {
                language_name: "Spanish".into(),
                translated_at: Utc::now(),
                agent: "test".into(),
                note: None,
            },
        });

        let written = write_report(&report, Some(&path)).await.unwrap();
        let content = std::fs::read_to_string(written).unwrap();
        let original = content.find("## Unified Diagnosis").unwrap();
        let translated = content.find("# Translation: Spanish (success)").unwrap();
        assert!(original < translated);
        assert!(content.ends_with("Migraña\n"));
    }
}
