use url::Url;

pub const DEFAULT_TRUSTED_DOMAINS: &[&str] = &[
    "mayoclinic.org",
    "nih.gov",
    "who.int",
    "cdc.gov",
    "webmd.com",
    "medlineplus.gov",
    "healthline.com",
    "medicalnewstoday.com",
    "hopkinsmedicine.org",
    "clevelandclinic.org",
    "health.harvard.edu",
    "ncbi.nlm.nih.gov",
    "pubmed.gov",
    "nejm.org",
    "thelancet.com",
    "jamanetwork.com",
    "bmj.com",
    "aafp.org",
    "medscape.com",
];

/// Lower-cased host of `url` without a leading `www.`
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// Allow-list of medical domains. A host matches a domain when it equals it or is a
/// subdomain of it.
#[derive(Debug, Clone)]
pub struct TrustedDomains {
    domains: Vec<String>,
}

impl TrustedDomains {
    pub fn new(domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            domains: domains
                .into_iter()
                .map(|domain| Into::<String>::into(domain).trim().to_lowercase())
                .filter(|domain| !domain.is_empty())
                .collect(),
        }
    }

    pub fn is_trusted(&self, url: &str) -> bool {
        let Some(host) = host_of(url) else {
            return false;
        };
        self.domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }
}

impl Default for TrustedDomains {
    fn default() -> Self {
        Self::new(DEFAULT_TRUSTED_DOMAINS.iter().copied())
    }
}
