//! Guideline-style treatment options by histology, stage, biomarkers and patient factors.

use super::{
    classifier::{Alteration, Classification, Gene, GeneticMarker},
    factors::{Comorbidity, PatientFactors, PdL1Level},
    stager::StageAssessment,
};

struct StageRegimen {
    primary: &'static [&'static str],
    alternative: &'static [&'static str],
    additional: &'static [&'static str],
    options: &'static [&'static str],
}

const EMPTY: &[&str] = &[];

const NSCLC_RESECTABLE_EARLY: StageRegimen = StageRegimen {
    primary: &["Surgical resection (lobectomy preferred)"],
    alternative: &["Stereotactic Body Radiation Therapy (SBRT) if medically inoperable"],
    additional: &["Observation", "Consider adjuvant chemotherapy for high-risk features"],
    options: EMPTY,
};
const NSCLC_IB: StageRegimen = StageRegimen {
    primary: &["Surgical resection (lobectomy preferred)"],
    alternative: &["Stereotactic Body Radiation Therapy (SBRT) if medically inoperable"],
    additional: &["Consider adjuvant chemotherapy for high-risk features"],
    options: EMPTY,
};
const NSCLC_II: StageRegimen = StageRegimen {
    primary: &["Surgical resection (lobectomy preferred)"],
    alternative: &["Definitive radiation therapy if medically inoperable"],
    additional: &["Adjuvant chemotherapy"],
    options: EMPTY,
};
const NSCLC_IIIA: StageRegimen = StageRegimen {
    primary: &["Multidisciplinary evaluation"],
    alternative: EMPTY,
    additional: EMPTY,
    options: &[
        "Surgery followed by adjuvant chemotherapy",
        "Concurrent chemoradiation therapy",
        "Induction chemotherapy followed by surgery",
    ],
};
const NSCLC_IIIB_C: StageRegimen = StageRegimen {
    primary: &["Concurrent chemoradiation therapy"],
    alternative: &["Sequential chemoradiation therapy if poor performance status"],
    additional: &["Consider durvalumab after chemoradiation if no progression"],
    options: EMPTY,
};
const NSCLC_IVA: StageRegimen = StageRegimen {
    primary: &["Systemic therapy based on biomarker testing"],
    alternative: EMPTY,
    additional: EMPTY,
    options: &[
        "Targeted therapy for actionable mutations",
        "Immunotherapy for PD-L1 positive tumors",
        "Chemotherapy",
        "Consider local therapy for oligometastatic disease",
    ],
};
const NSCLC_IVB: StageRegimen = StageRegimen {
    primary: &["Systemic therapy based on biomarker testing"],
    alternative: EMPTY,
    additional: EMPTY,
    options: &[
        "Targeted therapy for actionable mutations",
        "Immunotherapy for PD-L1 positive tumors",
        "Chemotherapy",
        "Best supportive care",
    ],
};
const UNSTAGED: StageRegimen = StageRegimen {
    primary: &["Treatment recommendations require accurate staging"],
    alternative: EMPTY,
    additional: &["Please consult with a multidisciplinary tumor board"],
    options: EMPTY,
};
const SCLC_LIMITED: StageRegimen = StageRegimen {
    primary: &["Concurrent chemoradiation therapy"],
    alternative: EMPTY,
    additional: &["Prophylactic cranial irradiation (PCI) if good response to initial therapy"],
    options: &[
        "Platinum-based chemotherapy (cisplatin or carboplatin) + etoposide",
        "Thoracic radiation therapy (preferably concurrent with chemotherapy)",
    ],
};
const SCLC_EXTENSIVE: StageRegimen = StageRegimen {
    primary: &["Systemic therapy"],
    alternative: &["Platinum-based chemotherapy (cisplatin or carboplatin) + etoposide"],
    additional: &[
        "Consider prophylactic cranial irradiation (PCI) if good response to chemotherapy",
        "Subsequent lines: topotecan, lurbinectedin, clinical trial or best supportive care",
    ],
    options: &[
        "Platinum-based chemotherapy (cisplatin or carboplatin) + etoposide + atezolizumab/durvalumab",
    ],
};

const NSCLC_GENERAL: &[&str] = &[
    "Smoking cessation counseling if currently smoking",
    "Multidisciplinary tumor board discussion recommended",
    "Consider clinical trial participation",
    "Palliative care integration throughout treatment course",
];
const SCLC_GENERAL: &[&str] = &[
    "Smoking cessation counseling if currently smoking",
    "Multidisciplinary tumor board discussion recommended",
    "Consider clinical trial participation",
    "Early integration of palliative care recommended",
    "Close monitoring for treatment response (typically after 2-3 cycles)",
];

fn nsclc_regimen(stage: &str) -> &'static StageRegimen {
    match stage {
        "IA" | "IA1" | "IA2" | "IA3" => &NSCLC_RESECTABLE_EARLY,
        "IB" => &NSCLC_IB,
        "IIA" | "IIB" => &NSCLC_II,
        "IIIA" => &NSCLC_IIIA,
        "IIIB" | "IIIC" => &NSCLC_IIIB_C,
        "IVA" => &NSCLC_IVA,
        "IVB" => &NSCLC_IVB,
        s if s.starts_with("IV") => &NSCLC_IVA,
        s if s.starts_with("III") => &NSCLC_IIIA,
        s if s.starts_with("II") => &NSCLC_II,
        s if s.starts_with('I') => &NSCLC_RESECTABLE_EARLY,
        _ => &UNSTAGED,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetedTherapy {
    pub marker: String,
    pub first_line: Vec<String>,
    pub subsequent: Vec<String>,
}

/// First-line and subsequent agents for an actionable alteration
fn targeted_agents(marker: &GeneticMarker) -> Option<(&'static [&'static str], &'static [&'static str])> {
    use Alteration::*;
    let agents: (&[&str], &[&str]) = match (marker.gene, marker.alteration) {
        (Gene::Egfr, Mutation) => (
            &["Osimertinib", "Erlotinib", "Gefitinib", "Afatinib", "Dacomitinib"],
            &["Osimertinib (if not used first-line)", "Chemotherapy", "Clinical trial"],
        ),
        (Gene::Alk, Rearrangement | Fusion | Positive) => (
            &["Alectinib", "Brigatinib", "Lorlatinib"],
            &["Lorlatinib", "Ceritinib", "Chemotherapy"],
        ),
        (Gene::Ros1, Fusion | Rearrangement | Positive) => {
            (&["Entrectinib", "Crizotinib"], &["Lorlatinib", "Chemotherapy"])
        }
        (Gene::Braf, Mutation) => (&["Dabrafenib + Trametinib"], &["Immunotherapy", "Chemotherapy"]),
        (Gene::Kras, Mutation) => (
            &["Sotorasib (G12C)", "Adagrasib (G12C)"],
            &["Immunotherapy", "Chemotherapy"],
        ),
        (Gene::Met, Mutation | Amplification | Positive) => {
            (&["Tepotinib", "Capmatinib"], &["Chemotherapy"])
        }
        (Gene::Ret, Fusion | Rearrangement | Positive) => (
            &["Selpercatinib", "Pralsetinib"],
            &["Cabozantinib", "Chemotherapy"],
        ),
        (Gene::Ntrk, Fusion | Positive) => (&["Larotrectinib", "Entrectinib"], &["Chemotherapy"]),
        (Gene::Her2, Mutation | Amplification | Positive) => (
            &["Trastuzumab deruxtecan", "Chemotherapy"],
            &["Clinical trial", "Chemotherapy"],
        ),
        _ => return None,
    };
    Some(agents)
}

fn immunotherapy(level: PdL1Level) -> &'static [&'static str] {
    match level {
        PdL1Level::High => &[
            "Pembrolizumab",
            "Cemiplimab",
            "Atezolizumab",
            "Pembrolizumab + chemotherapy",
            "Atezolizumab + chemotherapy + bevacizumab",
        ],
        PdL1Level::Low => &[
            "Pembrolizumab + chemotherapy",
            "Atezolizumab + chemotherapy + bevacizumab",
            "Pembrolizumab monotherapy",
            "Chemotherapy",
        ],
        PdL1Level::Negative => &[
            "Chemotherapy + immunotherapy",
            "Chemotherapy",
            "Subsequent: nivolumab, atezolizumab or pembrolizumab",
        ],
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreatmentPlan {
    pub primary: Vec<String>,
    pub alternatives: Vec<String>,
    pub additional: Vec<String>,
    pub options: Vec<String>,
    pub targeted: Vec<TargetedTherapy>,
    pub immunotherapy: Vec<String>,
    pub considerations: Vec<String>,
    pub general: Vec<String>,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

pub fn recommend(
    classification: &Classification,
    staging: &StageAssessment,
    factors: &PatientFactors,
) -> TreatmentPlan {
    if classification.cancer_type.is_small_cell() {
        recommend_sclc(staging, factors)
    } else {
        recommend_nsclc(classification, staging, factors)
    }
}

fn from_regimen(regimen: &StageRegimen) -> TreatmentPlan {
    TreatmentPlan {
        primary: owned(regimen.primary),
        alternatives: owned(regimen.alternative),
        additional: owned(regimen.additional),
        options: owned(regimen.options),
        ..Default::default()
    }
}

fn recommend_nsclc(
    classification: &Classification,
    staging: &StageAssessment,
    factors: &PatientFactors,
) -> TreatmentPlan {
    let mut plan = from_regimen(nsclc_regimen(&staging.stage));
    let metastatic = staging.is_metastatic();

    for marker in &classification.markers {
        let Some((first_line, subsequent)) = targeted_agents(marker) else {
            continue;
        };
        if metastatic && plan.targeted.is_empty() {
            plan.primary = std::iter::once(format!("Targeted therapy for {marker}"))
                .chain(owned(first_line))
                .collect();
        }
        plan.targeted.push(TargetedTherapy {
            marker: marker.to_string(),
            first_line: owned(first_line),
            subsequent: owned(subsequent),
        });
    }

    if let Some(level) = factors.pd_l1 {
        plan.immunotherapy = owned(immunotherapy(level));
        if level == PdL1Level::High && metastatic && plan.targeted.is_empty() {
            plan.primary = std::iter::once("Immunotherapy (PD-L1 high expression)".to_string())
                .chain(owned(&immunotherapy(level)[..3]))
                .collect();
        }
    }

    if factors.age.is_some_and(|age| age >= 75) {
        push_unique(&mut plan.considerations, "Consider less intensive therapy due to advanced age");
    }
    if factors.performance_status.is_some_and(|ps| ps >= 2) {
        push_unique(
            &mut plan.considerations,
            "Consider less intensive therapy due to poor performance status",
        );
        push_unique(&mut plan.considerations, "Evaluate for palliative care referral");
    }
    for comorbidity in &factors.comorbidities {
        match comorbidity {
            Comorbidity::Cardiac => {
                push_unique(&mut plan.considerations, "Cardiac evaluation recommended before treatment")
            }
            Comorbidity::Pulmonary => push_unique(
                &mut plan.considerations,
                "Pulmonary function testing recommended before surgery",
            ),
            _ => {}
        }
    }
    plan.general = owned(NSCLC_GENERAL);
    plan
}

fn recommend_sclc(staging: &StageAssessment, factors: &PatientFactors) -> TreatmentPlan {
    let stage = staging.stage.to_lowercase();
    let regimen = if stage.contains("limited") {
        &SCLC_LIMITED
    } else if stage.contains("extensive") {
        &SCLC_EXTENSIVE
    } else {
        &UNSTAGED
    };
    let mut plan = from_regimen(regimen);
    let considerations = &mut plan.considerations;

    if factors.age.is_some_and(|age| age >= 75) {
        push_unique(considerations, "Consider carboplatin instead of cisplatin due to advanced age");
        push_unique(
            considerations,
            "Careful assessment of benefit vs. risk for prophylactic cranial irradiation",
        );
    }
    if let Some(ps) = factors.performance_status.filter(|ps| *ps >= 2) {
        push_unique(considerations, "Consider less intensive therapy due to poor performance status");
        push_unique(considerations, "Evaluate for palliative care referral");
        if ps >= 3 {
            push_unique(
                considerations,
                "Consider best supportive care instead of aggressive treatment",
            );
        }
    }
    for comorbidity in &factors.comorbidities {
        match comorbidity {
            Comorbidity::Cardiac => {
                push_unique(considerations, "Cardiac evaluation recommended before treatment");
                push_unique(considerations, "Consider carboplatin instead of cisplatin");
            }
            Comorbidity::Renal => {
                push_unique(considerations, "Renal function assessment required");
                push_unique(
                    considerations,
                    "Consider carboplatin instead of cisplatin if renal impairment",
                );
            }
            Comorbidity::HearingLoss | Comorbidity::Neuropathy => push_unique(
                considerations,
                "Consider carboplatin instead of cisplatin to reduce neurotoxicity",
            ),
            Comorbidity::Pulmonary => {}
        }
    }
    plan.general = owned(SCLC_GENERAL);
    plan
}
