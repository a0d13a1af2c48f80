//! Specialist dispatch by case topic.

pub mod lung_cancer;

const LUNG_CANCER_KEYWORDS: &[&str] = &[
    "lung cancer",
    "lung carcinoma",
    "nsclc",
    "sclc",
    "non-small cell",
    "small cell lung",
    "bronchogenic carcinoma",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialization {
    LungCancer,
}

impl Specialization {
    /// Map a case topic onto a specialization. Matching is on the lower-cased topic with
    /// runs of whitespace collapsed.
    pub fn lookup(topic: &str) -> Option<Self> {
        let normalized = topic
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if LUNG_CANCER_KEYWORDS
            .iter()
            .any(|keyword| normalized.contains(keyword))
        {
            Some(Specialization::LungCancer)
        } else {
            None
        }
    }
}
