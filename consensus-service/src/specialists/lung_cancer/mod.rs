//! Deterministic lung-cancer assessment: classification, staging, prognosis and
//! treatment options computed from the case text alone. The specialist stage renders
//! this to markdown and asks the model for an oncologist review on top.

pub mod classifier;
pub mod factors;
pub mod prognosis;
pub mod stager;
pub mod treatment;

use std::fmt::Write;

use crate::models::CaseInput;
use classifier::Classification;
use factors::PatientFactors;
use prognosis::Prognosis;
use stager::StageAssessment;
use treatment::TreatmentPlan;

#[derive(Debug, Clone, PartialEq)]
pub struct LungCancerAssessment {
    pub classification: Classification,
    pub staging: StageAssessment,
    pub factors: PatientFactors,
    pub prognosis: Prognosis,
    pub treatment: TreatmentPlan,
}

impl LungCancerAssessment {
    pub fn assess(case: &CaseInput) -> Self {
        let text = case.combined_text();
        let history = case.medical_history.to_lowercase();

        let classification = classifier::classify(&text, &history);
        let staging = stager::stage(&text, classification.cancer_type);
        let factors = PatientFactors::extract(&text);
        let prognosis = prognosis::estimate(&classification, &staging, &factors);
        let treatment = treatment::recommend(&classification, &staging, &factors);

        Self {
            classification,
            staging,
            factors,
            prognosis,
            treatment,
        }
    }

    pub fn to_markdown(&self) -> String {
        let c = &self.classification;
        let s = &self.staging;
        let p = &self.prognosis;
        let t = &self.treatment;
        let mut out = String::from("## Lung Cancer Specialist Assessment\n\n### Classification\n");

        let markers = if c.markers.is_empty() {
            "None identified".to_string()
        } else {
            c.markers
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = writeln!(out, "- **Type:** {}", c.cancer_type.label());
        let _ = writeln!(out, "- **Subtype:** {}", c.subtype.label());
        let _ = writeln!(out, "- **Genetic Markers:** {markers}");
        let _ = writeln!(out, "- **Smoking Status:** {}", c.smoking);
        let _ = writeln!(out, "- **Differentiation:** {}", c.differentiation.label());
        let _ = writeln!(out, "- **Confidence:** {:.0}%", c.confidence * 100.0);

        out.push_str("\n### Staging\n");
        match &s.tnm {
            Some(tnm) => {
                let _ = writeln!(out, "- **Stage:** {} ({} {} {})", s.stage, tnm.t, tnm.n, tnm.m);
            }
            None => {
                let _ = writeln!(out, "- **Stage:** {}", s.stage);
            }
        }
        let _ = writeln!(out, "- **Description:** {}", s.description);
        let _ = writeln!(out, "- **Confidence:** {:.0}%", s.confidence * 100.0);

        out.push_str("\n### Prognosis\n");
        let _ = writeln!(
            out,
            "- **Estimated 5-year survival:** {}% (range {}% to {}%, baseline {}%)",
            p.adjusted_survival, p.range.0, p.range.1, p.base_survival
        );
        let _ = writeln!(out, "- **Outlook:** {}", p.outlook.label());
        for adjustment in &p.adjustments {
            let _ = writeln!(out, "  - {} ({:+}%)", adjustment.factor, adjustment.delta);
        }
        let _ = writeln!(out, "\n{}", p.description);

        out.push_str("\n### Treatment Options\n");
        write_list(&mut out, "Primary", &t.primary);
        write_list(&mut out, "Alternatives", &t.alternatives);
        write_list(&mut out, "Additional", &t.additional);
        write_list(&mut out, "Options", &t.options);
        for therapy in &t.targeted {
            let _ = writeln!(
                out,
                "- **Targeted ({}):** {}; subsequent: {}",
                therapy.marker,
                therapy.first_line.join(", "),
                therapy.subsequent.join(", ")
            );
        }
        write_list(&mut out, "Immunotherapy", &t.immunotherapy);
        write_list(&mut out, "Clinical Considerations", &t.considerations);

        out.push_str("\n### Recommendations\n");
        for rec in p.recommendations.iter().chain(&t.general) {
            let _ = writeln!(out, "- {rec}");
        }
        out.trim_end().to_string()
    }
}

fn write_list(out: &mut String, label: &str, items: &[String]) {
    if !items.is_empty() {
        let _ = writeln!(out, "- **{label}:** {}", items.join("; "));
    }
}
