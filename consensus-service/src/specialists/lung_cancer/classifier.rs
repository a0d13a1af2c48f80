//! Histological type, subtype, genetic markers, smoking history and differentiation.

use regex::Regex;
use std::{fmt, sync::LazyLock};

const NSCLC_PHRASES: &[&str] = &["non-small cell", "non small cell", "nonsmall cell"];
const SCLC_TERMS: &[&str] = &[
    "small cell",
    "oat cell",
    "neuroendocrine",
    "extensive-stage",
    "limited-stage",
];
const ADENOCARCINOMA_TERMS: &[&str] = &[
    "adenocarcinoma",
    "acinar",
    "papillary",
    "bronchioloalveolar",
    "lepidic",
    "egfr mutation",
    "alk rearrangement",
    "ros1",
    "ground glass",
];
const SQUAMOUS_TERMS: &[&str] = &["squamous", "epidermoid", "keratinizing", "scc"];
const LARGE_CELL_TERMS: &[&str] = &["large cell", "large-cell", "undifferentiated", "anaplastic", "pleomorphic"];
const DIAGNOSTIC_TERMS: &[&str] = &[
    "biopsy confirmed",
    "biopsy-confirmed",
    "pathology report",
    "histologically confirmed",
    "immunohistochemistry",
    "histopathology",
    "cytology",
];

static SCLC_ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bsclc\b").expect("valid regex"));
static NSCLC_ABBREVIATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnsclc\b").expect("valid regex"));
static PACK_YEARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*[- ]?pack[\s-]years?").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancerType {
    SmallCell,
    NonSmallCell,
    /// No histology given; NSCLC assumed as the more common type
    LikelyNonSmallCell,
}

impl CancerType {
    pub fn label(&self) -> &'static str {
        match self {
            CancerType::SmallCell => "Small Cell Lung Cancer (SCLC)",
            CancerType::NonSmallCell => "Non-Small Cell Lung Cancer (NSCLC)",
            CancerType::LikelyNonSmallCell => "Likely Non-Small Cell Lung Cancer (NSCLC)",
        }
    }

    pub fn is_small_cell(&self) -> bool {
        matches!(self, CancerType::SmallCell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subtype {
    CombinedSmallCell,
    PureSmallCell,
    SmallCell,
    Adenocarcinoma,
    SquamousCell,
    LargeCell,
    Unspecified,
}

impl Subtype {
    pub fn label(&self) -> &'static str {
        match self {
            Subtype::CombinedSmallCell => "Combined Small Cell Carcinoma",
            Subtype::PureSmallCell => "Pure Small Cell Carcinoma",
            Subtype::SmallCell => "Small Cell Carcinoma",
            Subtype::Adenocarcinoma => "Adenocarcinoma",
            Subtype::SquamousCell => "Squamous Cell Carcinoma",
            Subtype::LargeCell => "Large Cell Carcinoma",
            Subtype::Unspecified => "Unspecified NSCLC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gene {
    Egfr,
    Alk,
    Ros1,
    Braf,
    Kras,
    Met,
    Ret,
    Ntrk,
    Her2,
    PdL1,
}

impl Gene {
    const ALL: [Gene; 10] = [
        Gene::Egfr,
        Gene::Alk,
        Gene::Ros1,
        Gene::Braf,
        Gene::Kras,
        Gene::Met,
        Gene::Ret,
        Gene::Ntrk,
        Gene::Her2,
        Gene::PdL1,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Gene::Egfr => "EGFR",
            Gene::Alk => "ALK",
            Gene::Ros1 => "ROS1",
            Gene::Braf => "BRAF",
            Gene::Kras => "KRAS",
            Gene::Met => "MET",
            Gene::Ret => "RET",
            Gene::Ntrk => "NTRK",
            Gene::Her2 => "HER2",
            Gene::PdL1 => "PD-L1",
        }
    }

    /// Alternation of the names a report may use, matched on word boundaries
    fn pattern(&self) -> &'static str {
        match self {
            Gene::Egfr => r"egfr|epidermal growth factor receptor",
            Gene::Alk => r"alk|anaplastic lymphoma kinase",
            Gene::Ros1 => r"ros-?1",
            Gene::Braf => r"b-?raf",
            Gene::Kras => r"k-?ras",
            Gene::Met => r"c-met|met exon 14|met",
            Gene::Ret => r"ret",
            Gene::Ntrk => r"ntrk\d?|neurotrophic receptor tyrosine kinase",
            Gene::Her2 => r"her2|erbb2",
            Gene::PdL1 => r"pd-?l1|programmed death-ligand 1",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alteration {
    Mutation,
    Fusion,
    Rearrangement,
    Amplification,
    Positive,
    /// Named without a qualifier
    Mentioned,
}

impl Alteration {
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Alteration::Mutation => Some("Mutation"),
            Alteration::Fusion => Some("Fusion"),
            Alteration::Rearrangement => Some("Rearrangement"),
            Alteration::Amplification => Some("Amplification"),
            Alteration::Positive => Some("Positive"),
            Alteration::Mentioned => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneticMarker {
    pub gene: Gene,
    pub alteration: Alteration,
}

impl fmt::Display for GeneticMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alteration.label() {
            Some(label) => write!(f, "{} {}", self.gene.symbol(), label),
            None => f.write_str(self.gene.symbol()),
        }
    }
}

struct MarkerPattern {
    gene: Gene,
    mention: Regex,
    qualified: Regex,
}

static MARKER_PATTERNS: LazyLock<Vec<MarkerPattern>> = LazyLock::new(|| {
    Gene::ALL
        .iter()
        .map(|gene| MarkerPattern {
            gene: *gene,
            mention: Regex::new(&format!(r"\b(?:{})\b", gene.pattern())).expect("valid regex"),
            qualified: Regex::new(&format!(
                r"\b(?:{})[\s-]+(mutation|mutated|mutant|fusion|rearrangement|rearranged|amplification|amplified|positive)|\b(?:{})\+",
                gene.pattern(),
                gene.pattern()
            ))
            .expect("valid regex"),
        })
        .collect()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmokingStatus {
    Never,
    Former { pack_years: Option<u32> },
    Current { pack_years: Option<u32> },
    Unknown,
}

impl fmt::Display for SmokingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, pack_years) = match self {
            SmokingStatus::Never => return f.write_str("Never Smoker"),
            SmokingStatus::Unknown => return f.write_str("Unknown"),
            SmokingStatus::Former { pack_years } => ("Former Smoker", pack_years),
            SmokingStatus::Current { pack_years } => ("Current Smoker", pack_years),
        };
        match pack_years {
            Some(years) => write!(f, "{label} ({years} pack-years)"),
            None => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Differentiation {
    Well,
    Moderate,
    Poor,
    Undifferentiated,
    Unknown,
}

impl Differentiation {
    pub fn label(&self) -> &'static str {
        match self {
            Differentiation::Well => "Well Differentiated",
            Differentiation::Moderate => "Moderately Differentiated",
            Differentiation::Poor => "Poorly Differentiated",
            Differentiation::Undifferentiated => "Undifferentiated",
            Differentiation::Unknown => "Unknown Differentiation",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub cancer_type: CancerType,
    pub subtype: Subtype,
    pub markers: Vec<GeneticMarker>,
    pub smoking: SmokingStatus,
    pub differentiation: Differentiation,
    /// 0.5 to 0.95
    pub confidence: f64,
}

impl Classification {
    pub fn has_marker(&self, gene: Gene, alteration: Alteration) -> bool {
        self.markers
            .iter()
            .any(|marker| marker.gene == gene && marker.alteration == alteration)
    }
}

fn count_terms(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|term| text.contains(*term)).count()
}

/// Both inputs lower-cased. Smoking history is read from `history` only.
pub fn classify(text: &str, history: &str) -> Classification {
    let cancer_type = main_type(text);
    let subtype = subtype(text, cancer_type);
    let confidence = confidence(cancer_type, subtype, text);
    Classification {
        cancer_type,
        subtype,
        markers: markers(text),
        smoking: smoking_status(history),
        differentiation: differentiation(text),
        confidence,
    }
}

fn main_type(text: &str) -> CancerType {
    let mut without_nsclc = text.to_string();
    for phrase in NSCLC_PHRASES {
        without_nsclc = without_nsclc.replace(phrase, " ");
    }
    let sclc_score = count_terms(&without_nsclc, SCLC_TERMS)
        + usize::from(SCLC_ABBREVIATION.is_match(text));
    let nsclc_score =
        count_terms(text, NSCLC_PHRASES) + usize::from(NSCLC_ABBREVIATION.is_match(text));

    if sclc_score > nsclc_score {
        CancerType::SmallCell
    } else if nsclc_score > 0
        || count_terms(text, ADENOCARCINOMA_TERMS) > 0
        || count_terms(text, SQUAMOUS_TERMS) > 0
        || count_terms(text, LARGE_CELL_TERMS) > 0
    {
        CancerType::NonSmallCell
    } else {
        CancerType::LikelyNonSmallCell
    }
}

fn subtype(text: &str, cancer_type: CancerType) -> Subtype {
    if cancer_type.is_small_cell() {
        return if text.contains("combined") {
            Subtype::CombinedSmallCell
        } else if text.contains("pure") {
            Subtype::PureSmallCell
        } else {
            Subtype::SmallCell
        };
    }
    let adeno = count_terms(text, ADENOCARCINOMA_TERMS);
    let squamous = count_terms(text, SQUAMOUS_TERMS);
    let large = count_terms(text, LARGE_CELL_TERMS);
    if adeno > squamous && adeno > large {
        Subtype::Adenocarcinoma
    } else if squamous > adeno && squamous > large {
        Subtype::SquamousCell
    } else if large > 0 {
        Subtype::LargeCell
    } else {
        Subtype::Unspecified
    }
}

fn markers(text: &str) -> Vec<GeneticMarker> {
    MARKER_PATTERNS
        .iter()
        .filter(|pattern| pattern.mention.is_match(text))
        .map(|pattern| {
            let qualifier = pattern
                .qualified
                .captures(text)
                .map(|caps| caps.get(1).map(|m| m.as_str()).unwrap_or("positive"));
            let alteration = match qualifier {
                Some("mutation" | "mutated" | "mutant") => Alteration::Mutation,
                Some("fusion") => Alteration::Fusion,
                Some("rearrangement" | "rearranged") => Alteration::Rearrangement,
                Some("amplification" | "amplified") => Alteration::Amplification,
                Some(_) => Alteration::Positive,
                None => Alteration::Mentioned,
            };
            GeneticMarker {
                gene: pattern.gene,
                alteration,
            }
        })
        .collect()
}

fn smoking_status(history: &str) -> SmokingStatus {
    let pack_years = PACK_YEARS
        .captures(history)
        .and_then(|caps| caps[1].parse().ok());
    if ["never smok", "non-smoker", "nonsmoker"]
        .iter()
        .any(|term| history.contains(term))
    {
        SmokingStatus::Never
    } else if ["former smoker", "ex-smoker", "quit smoking"]
        .iter()
        .any(|term| history.contains(term))
    {
        SmokingStatus::Former { pack_years }
    } else if ["smoker", "pack-year", "pack year", "smoking"]
        .iter()
        .any(|term| history.contains(term))
    {
        SmokingStatus::Current { pack_years }
    } else {
        SmokingStatus::Unknown
    }
}

fn differentiation(text: &str) -> Differentiation {
    if text.contains("well differentiated") || text.contains("grade 1") {
        Differentiation::Well
    } else if text.contains("moderately differentiated") || text.contains("grade 2") {
        Differentiation::Moderate
    } else if text.contains("poorly differentiated") || text.contains("grade 3") {
        Differentiation::Poor
    } else if text.contains("undifferentiated") || text.contains("grade 4") {
        Differentiation::Undifferentiated
    } else {
        Differentiation::Unknown
    }
}

fn confidence(cancer_type: CancerType, subtype: Subtype, text: &str) -> f64 {
    let mut confidence = 0.5;
    if cancer_type != CancerType::LikelyNonSmallCell {
        confidence += 0.1;
    }
    if subtype != Subtype::Unspecified {
        confidence += 0.1;
    }
    if DIAGNOSTIC_TERMS.iter().any(|term| text.contains(term)) {
        confidence += 0.05;
    }
    f64::min(confidence, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nsclc_mention_does_not_count_as_small_cell() {
        let result = classify("biopsy confirmed non-small cell lung cancer (nsclc), adenocarcinoma", "");
        assert_eq!(result.cancer_type, CancerType::NonSmallCell);
        assert_eq!(result.subtype, Subtype::Adenocarcinoma);
        assert!((result.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn small_cell_with_extensive_stage() {
        let result = classify("small cell lung cancer, extensive-stage disease", "");
        assert_eq!(result.cancer_type, CancerType::SmallCell);
        assert_eq!(result.subtype, Subtype::SmallCell);
    }

    #[test]
    fn no_histology_defaults_to_likely_nsclc() {
        let result = classify("persistent cough and a lung mass", "");
        assert_eq!(result.cancer_type, CancerType::LikelyNonSmallCell);
        assert_eq!(result.subtype, Subtype::Unspecified);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn markers_are_word_bounded_and_qualified() {
        let result = classify(
            "adenocarcinoma with egfr mutation (exon 19), alk negative by fish; patient walks daily; metastatic",
            "",
        );
        let labels: Vec<String> = result.markers.iter().map(ToString::to_string).collect();
        assert_eq!(labels, vec!["EGFR Mutation", "ALK"]);
        assert!(result.has_marker(Gene::Egfr, Alteration::Mutation));
    }

    #[test]
    fn smoking_history_with_pack_years() {
        assert_eq!(
            smoking_status("current smoker, 40 pack-years"),
            SmokingStatus::Current { pack_years: Some(40) }
        );
        assert_eq!(smoking_status("lifelong non-smoker"), SmokingStatus::Never);
        assert_eq!(smoking_status("former smoker").to_string(), "Former Smoker");
        assert_eq!(smoking_status(""), SmokingStatus::Unknown);
    }

    #[test]
    fn differentiation_grades() {
        assert_eq!(differentiation("poorly differentiated tumor"), Differentiation::Poor);
        assert_eq!(differentiation("grade 1 lesion"), Differentiation::Well);
        assert_eq!(differentiation("nothing here"), Differentiation::Unknown);
    }
}
