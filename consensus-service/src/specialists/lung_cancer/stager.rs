//! TNM staging (8th edition grouping) for NSCLC, limited/extensive staging for SCLC.

use regex::Regex;
use std::sync::LazyLock;

use super::classifier::CancerType;

static T_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:c|p)?t(is|x|0|1[abc]?|2[ab]?|3|4)\b").expect("valid regex")
});
static N_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:c|p)?n(x|0|1|2|3)\b").expect("valid regex"));
static M_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:c|p)?m(0|1[abc]?)\b").expect("valid regex"));
static TUMOR_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"tumou?r\s+(?:size|measures|measuring|of)\s+(\d+(?:\.\d+)?)\s*(?:cm|centimet)")
        .expect("valid regex")
});
static EXPLICIT_STAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bstage\s+(iv[abc]?|i{1,3}[abc]?[123]?)\b").expect("valid regex")
});

const T_PHRASES: &[(&str, &[&str])] = &[
    ("TX", &["primary tumor cannot be assessed", "tumor cannot be assessed"]),
    ("T0", &["no evidence of primary tumor"]),
    ("Tis", &["carcinoma in situ"]),
    ("T3", &["invasion of chest wall"]),
    (
        "T4",
        &[
            "invasion of mediastinum",
            "invasion of diaphragm",
            "invasion of heart",
            "invasion of great vessels",
        ],
    ),
];
const N_PHRASES: &[(&str, &[&str])] = &[
    ("NX", &["lymph nodes cannot be assessed"]),
    (
        "N0",
        &[
            "no regional lymph node metastasis",
            "no lymph node",
            "lymph nodes negative",
            "no nodal involvement",
        ],
    ),
    ("N3", &["contralateral mediastinal", "contralateral hilar", "supraclavicular", "scalene"]),
    ("N2", &["ipsilateral mediastinal", "subcarinal"]),
    ("N1", &["ipsilateral peribronchial", "ipsilateral hilar", "peribronchial"]),
];
const M1C_PHRASES: &[&str] = &["multiple extrathoracic metastases", "multiple distant metastases"];
const M1B_PHRASES: &[&str] = &["single extrathoracic metastasis", "single distant metastasis"];
const M1A_PHRASES: &[&str] = &[
    "malignant pleural effusion",
    "malignant pericardial effusion",
    "pleural nodules",
    "contralateral lobe",
];
const M0_PHRASES: &[&str] = &[
    "no distant metastasis",
    "no metastasis",
    "no evidence of metastatic disease",
];
const DISTANT_ORGANS: &[&str] = &["brain", "liver", "adrenal", "bone"];

const SCLC_LIMITED: &[&str] = &[
    "limited stage",
    "limited-stage",
    "confined to hemithorax",
    "confined to one hemithorax",
    "confined to ipsilateral hemithorax",
    "can be encompassed in a radiation field",
];
const SCLC_EXTENSIVE: &[&str] = &[
    "extensive stage",
    "extensive-stage",
    "beyond one hemithorax",
    "distant metastasis",
    "beyond radiation field",
    "metastatic",
    "metastases",
];
const SPREAD_TERMS: &[&str] = &[
    "metastasis",
    "metastases",
    "metastatic",
    "distant spread",
    "spread to liver",
    "spread to brain",
    "spread to bone",
    "spread to adrenal",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tnm {
    pub t: String,
    pub n: String,
    pub m: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageAssessment {
    /// Stage group such as `IIIA`, or `Limited-Stage SCLC`
    pub stage: String,
    pub description: &'static str,
    /// Absent for SCLC
    pub tnm: Option<Tnm>,
    pub confidence: f64,
}

impl StageAssessment {
    pub fn is_advanced(&self) -> bool {
        self.stage.starts_with("III") || self.stage.starts_with("IV") || self.stage.contains("Extensive")
    }

    pub fn is_metastatic(&self) -> bool {
        self.stage.starts_with("IV")
    }
}

/// `text` is expected lower-cased.
pub fn stage(text: &str, cancer_type: CancerType) -> StageAssessment {
    if cancer_type.is_small_cell() {
        stage_sclc(text)
    } else {
        stage_nsclc(text)
    }
}

fn count_terms(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|term| text.contains(*term)).count()
}

fn stage_sclc(text: &str) -> StageAssessment {
    let limited = count_terms(text, SCLC_LIMITED);
    let extensive = count_terms(text, SCLC_EXTENSIVE);

    let (stage, confidence) = if extensive > limited {
        ("Extensive-Stage SCLC", if extensive > 1 { 0.8 } else { 0.6 })
    } else if limited > 0 {
        ("Limited-Stage SCLC", if limited > 1 { 0.8 } else { 0.6 })
    } else if SPREAD_TERMS.iter().any(|term| text.contains(term)) {
        ("Extensive-Stage SCLC", 0.7)
    } else {
        ("Unknown Stage SCLC", 0.3)
    };
    StageAssessment {
        stage: stage.to_string(),
        description: describe(stage),
        tnm: None,
        confidence,
    }
}

fn stage_nsclc(text: &str) -> StageAssessment {
    let tnm = Tnm {
        t: t_category(text),
        n: n_category(text),
        m: m_category(text),
    };
    let (stage, confidence) = stage_group(&tnm, text);
    StageAssessment {
        description: describe(&stage),
        stage,
        tnm: Some(tnm),
        confidence,
    }
}

fn t_category(text: &str) -> String {
    if let Some(caps) = T_CODE.captures(text) {
        return match &caps[1] {
            "is" => "Tis".to_string(),
            "x" => "TX".to_string(),
            code => format!("T{code}"),
        };
    }
    if let Some(t) = first_phrase_match(text, T_PHRASES) {
        return t.to_string();
    }
    if let Some(size) = TUMOR_SIZE
        .captures(text)
        .and_then(|caps| caps[1].parse::<f64>().ok())
    {
        return t_for_size(size).to_string();
    }
    if ["invades", "invasion", "invading", "extends into"]
        .iter()
        .any(|term| text.contains(term))
    {
        if ["chest wall", "parietal pleura", "phrenic nerve"]
            .iter()
            .any(|term| text.contains(term))
        {
            return "T3".to_string();
        }
        if [
            "mediastinum",
            "heart",
            "great vessels",
            "trachea",
            "carina",
            "esophagus",
            "vertebra",
            "diaphragm",
        ]
        .iter()
        .any(|term| text.contains(term))
        {
            return "T4".to_string();
        }
    }
    "TX".to_string()
}

/// Greatest tumour dimension in centimetres to T category
pub fn t_for_size(size_cm: f64) -> &'static str {
    match size_cm {
        s if s <= 1.0 => "T1a",
        s if s <= 2.0 => "T1b",
        s if s <= 3.0 => "T1c",
        s if s <= 4.0 => "T2a",
        s if s <= 5.0 => "T2b",
        s if s <= 7.0 => "T3",
        _ => "T4",
    }
}

fn n_category(text: &str) -> String {
    if let Some(caps) = N_CODE.captures(text) {
        return format!("N{}", caps[1].to_uppercase());
    }
    first_phrase_match(text, N_PHRASES)
        .unwrap_or("NX")
        .to_string()
}

fn m_category(text: &str) -> String {
    if let Some(caps) = M_CODE.captures(text) {
        return format!("M{}", &caps[1]);
    }
    let mentions_organ = DISTANT_ORGANS.iter().any(|organ| text.contains(organ));
    let m = if M0_PHRASES.iter().any(|p| text.contains(p)) {
        "M0"
    } else if M1C_PHRASES.iter().any(|p| text.contains(p))
        || (text.contains("multiple") && text.contains("metasta") && mentions_organ)
    {
        "M1c"
    } else if M1B_PHRASES.iter().any(|p| text.contains(p))
        || (text.contains("single") && text.contains("metasta") && mentions_organ)
    {
        "M1b"
    } else if M1A_PHRASES.iter().any(|p| text.contains(p)) {
        "M1a"
    } else if text.contains("metasta") && mentions_organ {
        "M1"
    } else {
        "M0"
    };
    m.to_string()
}

fn first_phrase_match(text: &str, table: &[(&'static str, &[&str])]) -> Option<&'static str> {
    table
        .iter()
        .find(|(_, phrases)| phrases.iter().any(|phrase| text.contains(phrase)))
        .map(|(code, _)| *code)
}

fn stage_group(tnm: &Tnm, text: &str) -> (String, f64) {
    if let Some(caps) = EXPLICIT_STAGE.captures(text) {
        let explicit = caps[1].to_uppercase();
        let normalized = match explicit.as_str() {
            "I" => "IA".to_string(),
            "II" => "IIA".to_string(),
            "III" => "IIIA".to_string(),
            "IV" => "IVA".to_string(),
            _ => explicit,
        };
        return (normalized, 0.9);
    }

    match tnm.m.as_str() {
        "M1c" => return ("IVB".to_string(), 0.9),
        "M1a" | "M1b" => return ("IVA".to_string(), 0.9),
        "M1" => return ("IV".to_string(), 0.8),
        _ => {}
    }

    if let Some(group) = group_for(&tnm.t, &tnm.n) {
        return (group.to_string(), 0.8);
    }
    // Unassessed nodes: assume node-negative at lower confidence
    if tnm.n == "NX" {
        if let Some(group) = group_for(&tnm.t, "N0") {
            return (group.to_string(), 0.6);
        }
    }

    let (stage, confidence) = match (tnm.t.as_str(), tnm.n.as_str()) {
        (t, "N0") if t.starts_with("T1") => ("IA", 0.6),
        (t, "N0") if t.starts_with("T2") => ("IB", 0.6),
        (_, "N1") => ("II", 0.5),
        (_, "N2" | "N3") | ("T4", _) => ("III", 0.5),
        _ => ("Unknown", 0.3),
    };
    (stage.to_string(), confidence)
}

/// Stage group for an M0 tumour
fn group_for(t: &str, n: &str) -> Option<&'static str> {
    let t1_t2 = matches!(t, "T1a" | "T1b" | "T1c" | "T2a" | "T2b");
    let group = match (t, n) {
        ("T1a", "N0") => "IA1",
        ("T1b", "N0") => "IA2",
        ("T1c", "N0") => "IA3",
        ("T2a", "N0") => "IB",
        ("T2b", "N0") => "IIA",
        (_, "N1") if t1_t2 => "IIB",
        ("T3", "N0") => "IIB",
        (_, "N2") if t1_t2 => "IIIA",
        ("T3", "N1") | ("T4", "N0" | "N1") => "IIIA",
        (_, "N3") if t1_t2 => "IIIB",
        ("T3" | "T4", "N2") => "IIIB",
        ("T3" | "T4", "N3") => "IIIC",
        _ => return None,
    };
    Some(group)
}

pub fn describe(stage: &str) -> &'static str {
    match stage {
        "IA1" => "Very early cancer confined to lung tissue. Tumor is 1 cm or less.",
        "IA2" => "Very early cancer confined to lung tissue. Tumor is between 1-2 cm.",
        "IA3" => "Very early cancer confined to lung tissue. Tumor is between 2-3 cm.",
        "IA" => "Very early cancer confined to lung tissue. Tumor is 3 cm or less.",
        "IB" => "Early cancer confined to lung tissue. Tumor is between 3-4 cm.",
        "IIA" => "Early cancer confined to lung tissue. Tumor is between 4-5 cm.",
        "IIB" => "Locally advanced cancer that may have spread to nearby lymph nodes or chest structures.",
        "II" => "Early cancer that may have spread to nearby lymph nodes.",
        "IIIA" => "Locally advanced cancer that has spread to lymph nodes on the same side of the chest.",
        "IIIB" => "Locally advanced cancer that has spread to lymph nodes above the collarbone or on the opposite side.",
        "IIIC" => "Locally advanced cancer with extensive lymph node involvement.",
        "III" => "Locally advanced cancer that has spread to nearby structures or lymph nodes.",
        "IVA" => "Advanced cancer that has spread within the chest cavity or to a single area outside the chest.",
        "IVB" => "Advanced cancer that has spread to multiple areas outside the chest.",
        "IV" => "Advanced cancer that has spread to distant parts of the body.",
        "Limited-Stage SCLC" => "Cancer is confined to one lung and regional lymph nodes, and can be safely treated with radiation therapy.",
        "Extensive-Stage SCLC" => "Cancer has spread beyond one lung, to the other lung, to lymph nodes on the other side, or to distant organs.",
        "Unknown" | "Unknown Stage SCLC" => "Insufficient information to determine the cancer stage accurately.",
        _ => "Stage information not available.",
    }
}
