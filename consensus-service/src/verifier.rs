//! Heuristic credibility scoring for retrieved sources.
//!
//! Scores are 0 to 10. A trusted source never scores below an untrusted one with the
//! same title and snippet, whatever either host type. The bundle aggregate is a
//! weighted mean in which each source weighs `1 + score / 10`, so stronger sources pull
//! the aggregate harder. Raising any single score never lowers the aggregate.

use crate::{
    models::{ResearchBundle, SearchResult},
    search::domains::host_of,
};

/// Known journal and literature-index hosts
const ACADEMIC_HOSTS: &[&str] = &[
    "ncbi.nlm.nih.gov",
    "pubmed.gov",
    "nejm.org",
    "thelancet.com",
    "jamanetwork.com",
    "bmj.com",
    "nature.com",
    "sciencedirect.com",
    "springer.com",
    "wiley.com",
    "cochranelibrary.com",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    Government,
    Academic,
    Commercial,
    Unknown,
}

impl SourceType {
    pub fn classify(url: &str) -> Self {
        let Some(host) = host_of(url) else {
            return SourceType::Unknown;
        };
        if matches_any(&host, ACADEMIC_HOSTS) || host.ends_with(".edu") || has_country_suffix(&host, "ac")
        {
            SourceType::Academic
        } else if host.ends_with(".gov")
            || host.ends_with(".mil")
            || host.ends_with(".int")
            || has_country_suffix(&host, "gov")
        {
            SourceType::Government
        } else {
            SourceType::Commercial
        }
    }
}

fn matches_any(host: &str, domains: &[&str]) -> bool {
    domains
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// `*.gov.uk`, `*.ac.jp` and similar
fn has_country_suffix(host: &str, label: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    labels.len() >= 3
        && labels[labels.len() - 2] == label
        && labels[labels.len() - 1].len() == 2
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringPolicy {
    pub government: f64,
    pub academic: f64,
    pub commercial: f64,
    pub unknown: f64,
    pub trusted_bonus: f64,
    pub missing_title_penalty: f64,
    pub missing_snippet_penalty: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            government: 8.0,
            academic: 7.5,
            commercial: 4.5,
            unknown: 2.0,
            trusted_bonus: 2.0,
            missing_title_penalty: 1.0,
            missing_snippet_penalty: 1.0,
        }
    }
}

impl ScoringPolicy {
    fn base(&self, source_type: SourceType) -> f64 {
        match source_type {
            SourceType::Government => self.government,
            SourceType::Academic => self.academic,
            SourceType::Commercial => self.commercial,
            SourceType::Unknown => self.unknown,
        }
    }

    fn highest_base(&self) -> f64 {
        self.government
            .max(self.academic)
            .max(self.commercial)
            .max(self.unknown)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceVerifier {
    policy: ScoringPolicy,
}

impl SourceVerifier {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn score_one(&self, result: &SearchResult) -> f64 {
        let base = self.policy.base(SourceType::classify(&result.url));
        let mut score = if result.trusted {
            (base + self.policy.trusted_bonus).max(self.policy.highest_base())
        } else {
            base
        };
        if result.title.trim().is_empty() {
            score -= self.policy.missing_title_penalty;
        }
        if result.snippet.trim().is_empty() {
            score -= self.policy.missing_snippet_penalty;
        }
        score.clamp(0.0, 10.0)
    }

    /// Score every result and aggregate. Order is preserved, and any credibility
    /// already present is recomputed from scratch.
    pub fn score(&self, results: &[SearchResult]) -> ResearchBundle {
        let results: Vec<SearchResult> = results
            .iter()
            .map(|result| SearchResult {
                credibility: Some(self.score_one(result)),
                ..result.clone()
            })
            .collect();
        let overall_credibility =
            aggregate(results.iter().filter_map(|result| result.credibility));
        ResearchBundle {
            results,
            overall_credibility,
        }
    }
}

pub fn aggregate(scores: impl IntoIterator<Item = f64>) -> f64 {
    let (weighted, total_weight) = scores
        .into_iter()
        .fold((0.0, 0.0), |(weighted, total), score| {
            let weight = 1.0 + score / 10.0;
            (weighted + weight * score, total + weight)
        });
    if total_weight == 0.0 {
        0.0
    } else {
        (weighted / total_weight).clamp(0.0, 10.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(url: &str, trusted: bool) -> SearchResult {
        SearchResult {
            url: url.to_string(),
            title: "Title".to_string(),
            snippet: "Snippet".to_string(),
            trusted,
            credibility: None,
        }
    }

    #[test]
    fn classifies_hosts() {
        assert_eq!(SourceType::classify("https://www.cdc.gov/x"), SourceType::Government);
        assert_eq!(SourceType::classify("https://www.nhs.gov.uk/x"), SourceType::Government);
        assert_eq!(SourceType::classify("https://who.int/x"), SourceType::Government);
        assert_eq!(SourceType::classify("https://www.ncbi.nlm.nih.gov/pmc/1"), SourceType::Academic);
        assert_eq!(SourceType::classify("https://med.stanford.edu/x"), SourceType::Academic);
        assert_eq!(SourceType::classify("https://www.ox.ac.uk/x"), SourceType::Academic);
        assert_eq!(SourceType::classify("https://www.webmd.com/x"), SourceType::Commercial);
        assert_eq!(SourceType::classify("nonsense"), SourceType::Unknown);
    }

    #[test]
    fn individual_scores_follow_the_policy() {
        let verifier = SourceVerifier::default();
        assert_eq!(verifier.score_one(&result("https://www.cdc.gov/x", true)), 10.0);
        assert_eq!(verifier.score_one(&result("https://blog.example.com/x", false)), 4.5);
        assert_eq!(verifier.score_one(&result("https://www.webmd.com/x", true)), 8.0);

        let mut bare = result("not a url", false);
        bare.title.clear();
        bare.snippet.clear();
        assert_eq!(verifier.score_one(&bare), 0.0);
    }

    #[test]
    fn empty_input_aggregates_to_zero() {
        let bundle = SourceVerifier::default().score(&[]);
        assert!(bundle.results.is_empty());
        assert_eq!(bundle.overall_credibility, 0.0);
    }

    #[test]
    fn aggregate_stays_in_bounds() {
        let verifier = SourceVerifier::default();
        let bundle = verifier.score(&[
            result("https://www.cdc.gov/x", true),
            result("https://blog.example.com/x", false),
            result("junk", false),
        ]);
        assert!((0.0..=10.0).contains(&bundle.overall_credibility));
        assert!(bundle.results.iter().all(|r| r.credibility.is_some()));
    }

    #[test]
    fn replacing_untrusted_with_trusted_never_lowers_the_aggregate() {
        let verifier = SourceVerifier::default();
        let mut sources = vec![
            result("https://blog.example.com/a", false),
            result("https://shop.example.com/b", false),
            result("https://forum.example.net/c", false),
        ];
        let mut previous = verifier.score(&sources).overall_credibility;
        for (i, url) in ["https://www.mayoclinic.org/a", "https://www.nih.gov/b", "https://www.cdc.gov/c"]
            .iter()
            .enumerate()
        {
            sources[i] = result(url, true);
            let current = verifier.score(&sources).overall_credibility;
            assert!(current >= previous, "{current} < {previous}");
            previous = current;
        }
    }

    #[test]
    fn trusted_commercial_source_outranks_untrusted_government_and_academic() {
        let verifier = SourceVerifier::default();
        let filler = result("https://blog.example.com/x", false);
        for untrusted in ["https://www.fda.gov/drugs", "https://www.ox.ac.uk/x", "https://med.stanford.edu/x"] {
            for trusted in ["https://www.webmd.com/x", "https://www.mayoclinic.org/x"] {
                let before = verifier.score(&[result(untrusted, false), filler.clone()]);
                let after = verifier.score(&[result(trusted, true), filler.clone()]);
                assert!(
                    after.overall_credibility >= before.overall_credibility,
                    "{trusted} replacing {untrusted}: {} < {}",
                    after.overall_credibility,
                    before.overall_credibility
                );
            }
        }
    }

    #[test]
    fn scoring_is_idempotent() {
        let verifier = SourceVerifier::default();
        let once = verifier.score(&[
            result("https://www.cdc.gov/x", true),
            result("https://blog.example.com/x", false),
        ]);
        let twice = verifier.score(&once.results);
        assert_eq!(once, twice);
    }
}
