//! Patient factors pulled out of free text for prognosis and treatment adjustments.

use regex::Regex;
use std::sync::LazyLock;

static AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,3})[- ]?(?:year|yr)s?[- ]old\b|\bage[:\s]+(\d{1,3})\b").expect("valid regex")
});
static FEMALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:female|woman|she)\b").expect("valid regex"));
static MALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:male|man|he)\b").expect("valid regex"));
static ECOG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:ecog|performance status)\s*(?:ps)?\s*(?:of|:|=|score)?\s*([0-4])\b")
        .expect("valid regex")
});
static NO_WEIGHT_LOSS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:no|denies|without)\s+(?:significant\s+)?weight\s+loss").expect("valid regex")
});
static METASTASIS_SITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(brain|liver|hepatic|bone|osseous|adrenal)\s+(?:metasta\w*|lesions?|mets)\b|\bmetasta\w*\s+(?:to|in)\s+(?:the\s+)?(brain|liver|bone|adrenal)",
    )
    .expect("valid regex")
});
static PD_L1_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pd-?l1[^%\d]{0,30}(\d{1,3})\s*%").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetastasisSite {
    Brain,
    Liver,
    Bone,
    Adrenal,
}

impl MetastasisSite {
    pub fn label(&self) -> &'static str {
        match self {
            MetastasisSite::Brain => "Brain",
            MetastasisSite::Liver => "Liver",
            MetastasisSite::Bone => "Bone",
            MetastasisSite::Adrenal => "Adrenal",
        }
    }
}

/// PD-L1 tumour proportion score tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdL1Level {
    /// 50% or more
    High,
    /// 1 to 49%
    Low,
    Negative,
}

impl PdL1Level {
    pub fn from_percent(percent: u32) -> Self {
        match percent {
            50.. => PdL1Level::High,
            1..=49 => PdL1Level::Low,
            0 => PdL1Level::Negative,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PdL1Level::High => "high (50% or more)",
            PdL1Level::Low => "low (1-49%)",
            PdL1Level::Negative => "negative (<1%)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comorbidity {
    Cardiac,
    Pulmonary,
    Renal,
    HearingLoss,
    Neuropathy,
}

impl Comorbidity {
    const KEYWORDS: &'static [(Comorbidity, &'static [&'static str])] = &[
        (Comorbidity::Cardiac, &["heart disease", "heart failure", "cardiac", "coronary artery"]),
        (Comorbidity::Pulmonary, &["copd", "emphysema", "pulmonary fibrosis", "interstitial lung"]),
        (Comorbidity::Renal, &["renal", "kidney disease", "ckd"]),
        (Comorbidity::HearingLoss, &["hearing loss", "hearing impairment"]),
        (Comorbidity::Neuropathy, &["neuropathy"]),
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Comorbidity::Cardiac => "Cardiac disease",
            Comorbidity::Pulmonary => "Chronic pulmonary disease",
            Comorbidity::Renal => "Renal impairment",
            Comorbidity::HearingLoss => "Hearing loss",
            Comorbidity::Neuropathy => "Neuropathy",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientFactors {
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    /// ECOG 0 to 4
    pub performance_status: Option<u8>,
    pub weight_loss: bool,
    pub metastasis_sites: Vec<MetastasisSite>,
    pub pd_l1: Option<PdL1Level>,
    pub comorbidities: Vec<Comorbidity>,
}

impl PatientFactors {
    /// `text` is expected lower-cased.
    pub fn extract(text: &str) -> Self {
        Self {
            age: extract_age(text),
            gender: extract_gender(text),
            performance_status: ECOG
                .captures(text)
                .and_then(|caps| caps[1].parse().ok()),
            weight_loss: text.contains("weight loss") && !NO_WEIGHT_LOSS.is_match(text),
            metastasis_sites: extract_sites(text),
            pd_l1: extract_pd_l1(text),
            comorbidities: Comorbidity::KEYWORDS
                .iter()
                .filter(|(_, keywords)| keywords.iter().any(|k| text.contains(k)))
                .map(|(comorbidity, _)| *comorbidity)
                .collect(),
        }
    }
}

fn extract_age(text: &str) -> Option<u32> {
    let caps = AGE.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
        .filter(|age| (1..=120).contains(age))
}

fn extract_gender(text: &str) -> Option<Gender> {
    if FEMALE.is_match(text) {
        Some(Gender::Female)
    } else if MALE.is_match(text) {
        Some(Gender::Male)
    } else {
        None
    }
}

fn extract_sites(text: &str) -> Vec<MetastasisSite> {
    let mut sites = Vec::new();
    for caps in METASTASIS_SITE.captures_iter(text) {
        let word = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str());
        let site = match word {
            Some("brain") => MetastasisSite::Brain,
            Some("liver" | "hepatic") => MetastasisSite::Liver,
            Some("bone" | "osseous") => MetastasisSite::Bone,
            Some("adrenal") => MetastasisSite::Adrenal,
            _ => continue,
        };
        if !sites.contains(&site) {
            sites.push(site);
        }
    }
    sites
}

fn extract_pd_l1(text: &str) -> Option<PdL1Level> {
    if let Some(caps) = PD_L1_PERCENT.captures(text) {
        return caps[1].parse().ok().map(PdL1Level::from_percent);
    }
    if !text.contains("pd-l1") && !text.contains("pdl1") {
        return None;
    }
    if text.contains("pd-l1 high") || text.contains("high pd-l1") {
        Some(PdL1Level::High)
    } else if text.contains("pd-l1 low") || text.contains("low pd-l1") {
        Some(PdL1Level::Low)
    } else if text.contains("pd-l1 negative") {
        Some(PdL1Level::Negative)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_demographics_and_status() {
        let factors = PatientFactors::extract(
            "68-year-old female, former smoker. ecog 1. reports 5 kg weight loss over 3 months.",
        );
        assert_eq!(factors.age, Some(68));
        assert_eq!(factors.gender, Some(Gender::Female));
        assert_eq!(factors.performance_status, Some(1));
        assert!(factors.weight_loss);
    }

    #[test]
    fn negated_weight_loss_is_ignored() {
        let factors = PatientFactors::extract("72 year old male, denies weight loss");
        assert!(!factors.weight_loss);
        assert_eq!(factors.gender, Some(Gender::Male));
    }

    #[test]
    fn finds_sites_and_pd_l1() {
        let factors = PatientFactors::extract(
            "mri shows brain metastases; ct with metastasis to the liver. pd-l1 tps 80%",
        );
        assert_eq!(
            factors.metastasis_sites,
            vec![MetastasisSite::Brain, MetastasisSite::Liver]
        );
        assert_eq!(factors.pd_l1, Some(PdL1Level::High));
    }

    #[test]
    fn comorbidities_are_collected() {
        let factors = PatientFactors::extract("history of copd and chronic kidney disease");
        assert_eq!(
            factors.comorbidities,
            vec![Comorbidity::Pulmonary, Comorbidity::Renal]
        );
    }

    #[test]
    fn empty_text_has_no_factors() {
        assert_eq!(PatientFactors::extract(""), PatientFactors::default());
    }
}
