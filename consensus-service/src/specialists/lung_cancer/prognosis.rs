//! Five-year survival estimate from population tables, adjusted for patient factors.

use super::{
    classifier::{Alteration, Classification, Gene},
    factors::{Gender, MetastasisSite, PatientFactors},
    stager::StageAssessment,
};

const NSCLC_SURVIVAL: &[(&str, i32)] = &[
    ("IA1", 92),
    ("IA2", 83),
    ("IA3", 77),
    ("IA", 84),
    ("IB", 68),
    ("IIA", 60),
    ("IIB", 53),
    ("II", 56),
    ("IIIA", 36),
    ("IIIB", 26),
    ("IIIC", 13),
    ("III", 30),
    ("IVA", 10),
    ("IVB", 1),
    ("IV", 7),
];
/// Used when no stage could be determined
const NSCLC_UNSTAGED_SURVIVAL: i32 = 50;
const SCLC_LIMITED_SURVIVAL: i32 = 27;
const SCLC_EXTENSIVE_SURVIVAL: i32 = 3;
const SCLC_UNKNOWN_SURVIVAL: i32 = 7;
/// Half-width of the reported survival range, in percentage points
const RANGE_HALF_WIDTH: i32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outlook {
    Favorable,
    Intermediate,
    Guarded,
    Poor,
}

impl Outlook {
    pub fn from_survival(percent: i32) -> Self {
        match percent {
            70.. => Outlook::Favorable,
            40..=69 => Outlook::Intermediate,
            15..=39 => Outlook::Guarded,
            _ => Outlook::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outlook::Favorable => "favorable",
            Outlook::Intermediate => "intermediate",
            Outlook::Guarded => "guarded",
            Outlook::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adjustment {
    pub factor: String,
    /// Percentage points
    pub delta: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prognosis {
    pub base_survival: i32,
    pub adjusted_survival: i32,
    pub range: (i32, i32),
    pub adjustments: Vec<Adjustment>,
    pub outlook: Outlook,
    pub description: String,
    pub recommendations: Vec<String>,
}

pub fn estimate(
    classification: &Classification,
    staging: &StageAssessment,
    factors: &PatientFactors,
) -> Prognosis {
    let small_cell = classification.cancer_type.is_small_cell();
    let base_survival = if small_cell {
        sclc_survival(&staging.stage)
    } else {
        nsclc_survival(&staging.stage)
    };

    let adjustments = adjustments(classification, staging, factors);
    let adjusted_survival =
        (base_survival + adjustments.iter().map(|a| a.delta).sum::<i32>()).clamp(1, 99);
    let range = (
        (adjusted_survival - RANGE_HALF_WIDTH).max(1),
        (adjusted_survival + RANGE_HALF_WIDTH).min(99),
    );
    let outlook = Outlook::from_survival(adjusted_survival);

    Prognosis {
        description: describe(classification, staging, adjusted_survival, outlook, &adjustments),
        recommendations: recommendations(classification, staging, factors),
        base_survival,
        adjusted_survival,
        range,
        adjustments,
        outlook,
    }
}

fn nsclc_survival(stage: &str) -> i32 {
    let stage = stage.trim().to_uppercase();
    if let Some((_, rate)) = NSCLC_SURVIVAL.iter().find(|(s, _)| *s == stage) {
        return *rate;
    }
    let family = ["IV", "III", "II", "I"]
        .into_iter()
        .find(|prefix| stage.starts_with(prefix));
    match family {
        Some("IV") => 7,
        Some("III") => 30,
        Some("II") => 56,
        Some(_) => 84,
        None => NSCLC_UNSTAGED_SURVIVAL,
    }
}

fn sclc_survival(stage: &str) -> i32 {
    let stage = stage.to_lowercase();
    if stage.contains("limited") {
        SCLC_LIMITED_SURVIVAL
    } else if stage.contains("extensive") {
        SCLC_EXTENSIVE_SURVIVAL
    } else {
        SCLC_UNKNOWN_SURVIVAL
    }
}

fn adjustments(
    classification: &Classification,
    staging: &StageAssessment,
    factors: &PatientFactors,
) -> Vec<Adjustment> {
    let mut out = Vec::new();
    let mut push = |factor: &str, delta: i32| {
        out.push(Adjustment {
            factor: factor.to_string(),
            delta,
        })
    };

    match factors.age {
        Some(age) if age < 50 => push("Younger age (<50)", 5),
        Some(age) if age >= 70 => push("Older age (70 or over)", -5),
        _ => {}
    }
    match factors.gender {
        Some(Gender::Female) => push("Female gender", 3),
        Some(Gender::Male) => push("Male gender", -1),
        None => {}
    }
    match factors.performance_status {
        Some(ps) if ps <= 1 => push("Good performance status (ECOG 0-1)", 5),
        Some(_) => push("Poor performance status (ECOG 2 or more)", -10),
        None => {}
    }
    if factors.weight_loss {
        push("Significant weight loss", -5);
    }

    for marker in &classification.markers {
        let favourable = matches!(
            (marker.gene, marker.alteration),
            (Gene::Egfr, Alteration::Mutation)
                | (Gene::Alk, Alteration::Rearrangement)
                | (Gene::Ros1, Alteration::Fusion)
        );
        if favourable {
            let delta = if staging.is_metastatic() { 10 } else { 5 };
            push(&marker.to_string(), delta);
        } else if (marker.gene, marker.alteration) == (Gene::Kras, Alteration::Mutation) {
            push(&marker.to_string(), -3);
        }
    }

    for site in &factors.metastasis_sites {
        let delta = match site {
            MetastasisSite::Brain => -10,
            MetastasisSite::Liver => -8,
            MetastasisSite::Bone => -5,
            MetastasisSite::Adrenal => -3,
        };
        push(&format!("{} metastases", site.label()), delta);
    }
    out
}

fn describe(
    classification: &Classification,
    staging: &StageAssessment,
    survival: i32,
    outlook: Outlook,
    adjustments: &[Adjustment],
) -> String {
    let mut description = format!(
        "The overall prognosis for {} at stage {} is {}. The estimated 5-year survival rate is approximately {}%.",
        classification.cancer_type.label(),
        staging.stage,
        outlook.label(),
        survival
    );
    let positive: Vec<&str> = adjustments
        .iter()
        .filter(|a| a.delta > 0)
        .map(|a| a.factor.as_str())
        .collect();
    if !positive.is_empty() {
        description.push_str(&format!(
            " Positive factors improving the prognosis include {}.",
            positive.join(", ")
        ));
    }
    let negative: Vec<&str> = adjustments
        .iter()
        .filter(|a| a.delta < 0)
        .map(|a| a.factor.as_str())
        .collect();
    if !negative.is_empty() {
        description.push_str(&format!(
            " Factors that may negatively affect the prognosis include {}.",
            negative.join(", ")
        ));
    }
    description.push_str(
        " These statistics are population averages and individual outcomes may vary significantly.",
    );
    description
}

fn recommendations(
    classification: &Classification,
    staging: &StageAssessment,
    factors: &PatientFactors,
) -> Vec<String> {
    let mut recs: Vec<&str> = vec![
        "Adhere to treatment plan and follow-up schedule",
        "Maintain good nutrition and stay physically active as tolerated",
        "Quit smoking if currently smoking",
        "Join a support group or seek psychological support",
    ];

    if classification.cancer_type.is_small_cell() {
        recs.push("Consider prophylactic cranial irradiation if recommended");
        recs.push("Report new symptoms promptly due to risk of rapid progression");
    } else {
        let targetable = classification.markers.iter().any(|marker| {
            matches!(marker.gene, Gene::Egfr | Gene::Alk | Gene::Ros1 | Gene::Braf)
                && marker.alteration != Alteration::Mentioned
        });
        if targetable {
            recs.push("Adhere to targeted therapy regimen to maximize benefit");
            recs.push("Regular monitoring for treatment resistance");
        }
        if staging.is_metastatic() && factors.metastasis_sites.is_empty() {
            recs.push("Consider comprehensive genomic testing if not already done");
        }
    }

    if factors.metastasis_sites.contains(&MetastasisSite::Brain) {
        recs.push("Be alert for neurological symptoms and report them promptly");
        recs.push("Follow neurological monitoring schedule");
    }
    if factors.metastasis_sites.contains(&MetastasisSite::Bone) {
        recs.push("Consider bone-strengthening medications");
        recs.push("Take precautions to prevent falls and fractures");
    }

    recs.push("Discuss clinical trial options with your oncologist");
    if staging.is_advanced() {
        recs.push("Consider early integration of palliative care for symptom management");
    }
    recs.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specialists::lung_cancer::{classifier, stager};

    fn assess(text: &str) -> Prognosis {
        let classification = classifier::classify(text, text);
        let staging = stager::stage(text, classification.cancer_type);
        estimate(&classification, &staging, &PatientFactors::extract(text))
    }

    #[test]
    fn early_stage_has_favorable_outlook() {
        let prognosis = assess("adenocarcinoma, tumor measures 0.9 cm, n0 m0");
        assert_eq!(prognosis.base_survival, 92);
        assert_eq!(prognosis.outlook, Outlook::Favorable);
        assert_eq!(prognosis.range, (85, 99));
    }

    #[test]
    fn patient_factors_shift_the_estimate() {
        let prognosis = assess(
            "45-year-old female, ecog 0, adenocarcinoma with egfr mutation, stage iiia",
        );
        assert_eq!(prognosis.base_survival, 36);
        // +5 age, +3 female, +5 ECOG, +5 EGFR outside stage IV
        assert_eq!(prognosis.adjusted_survival, 54);
        assert_eq!(prognosis.outlook, Outlook::Intermediate);
        assert!(prognosis.description.contains("EGFR Mutation"));
    }

    #[test]
    fn survival_is_clamped_and_metastases_penalised() {
        let prognosis = assess(
            "78 year old male, ecog 3, weight loss, stage ivb nsclc with brain metastases and liver metastases",
        );
        assert_eq!(prognosis.adjusted_survival, 1);
        assert_eq!(prognosis.range, (1, 8));
        assert_eq!(prognosis.outlook, Outlook::Poor);
        assert!(prognosis
            .recommendations
            .iter()
            .any(|r| r.contains("neurological")));
    }

    #[test]
    fn sclc_tables() {
        assert_eq!(sclc_survival("Limited-Stage SCLC"), 27);
        assert_eq!(sclc_survival("Extensive-Stage SCLC"), 3);
        assert_eq!(sclc_survival("Unknown Stage SCLC"), 7);
        assert_eq!(nsclc_survival("IIIA"), 36);
        assert_eq!(nsclc_survival("Unknown"), 50);
    }
}
