//! Referrer heuristics
//!
//! Labels a referrer as institutional-leaning when its host looks like an
//! educational domain. Pure; no I/O; never panics on garbage input.

/// Classification of a referrer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferrerClass {
    Institutional,
    Neutral,
}

/// Host keywords that mark a referrer as institutional
const DEFAULT_KEYWORDS: &[&str] = &["university", "college", "alumni", "campus"];

/// Matches referrer hosts against educational suffixes and host keywords
#[derive(Debug, Clone)]
pub struct ReferrerClassifier {
    keywords: Vec<String>,
}

impl Default for ReferrerClassifier {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl ReferrerClassifier {
    /// Default keywords plus `extra` (case-insensitive, blanks ignored)
    pub fn with_extra_keywords<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut classifier = Self::default();
        for keyword in extra {
            let keyword = keyword.as_ref().trim().to_ascii_lowercase();
            if !keyword.is_empty() && !classifier.keywords.contains(&keyword) {
                classifier.keywords.push(keyword);
            }
        }
        classifier
    }

    pub fn classify(&self, referrer: &str) -> ReferrerClass {
        let Some(host) = extract_host(referrer) else {
            return ReferrerClass::Neutral;
        };

        if has_educational_suffix(&host) {
            return ReferrerClass::Institutional;
        }

        let keyword_hit = host
            .split('.')
            .any(|label| self.keywords.iter().any(|k| label.contains(k.as_str())));
        if keyword_hit {
            ReferrerClass::Institutional
        } else {
            ReferrerClass::Neutral
        }
    }
}

/// `.edu`, `.edu.<cc>` and `.ac.<cc>`
fn has_educational_suffix(host: &str) -> bool {
    let labels: Vec<&str> = host.split('.').collect();
    match labels.as_slice() {
        [.., _, "edu"] => true,
        [.., _, "edu" | "ac", cc] => cc.len() == 2,
        _ => false,
    }
}

/// Lower-cased host of an absolute URL, or `None` if there is no usable host
fn extract_host(referrer: &str) -> Option<String> {
    let trimmed = referrer.trim();
    let (_, rest) = trimmed.split_once("://")?;

    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    // IPv6 literals never match a domain pattern
    if host_port.starts_with('[') {
        return None;
    }
    let host = host_port.split(':').next().unwrap_or_default();
    let host = host.trim_end_matches('.').to_ascii_lowercase();

    let valid = !host.is_empty() && host.split('.').all(is_host_label);
    valid.then_some(host)
}

fn is_host_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(referrer: &str) -> ReferrerClass {
        ReferrerClassifier::default().classify(referrer)
    }

    #[test]
    fn test_edu_domains_are_institutional() {
        assert_eq!(classify("https://university.edu/alumni"), ReferrerClass::Institutional);
        assert_eq!(classify("https://www.stanford.edu/"), ReferrerClass::Institutional);
        assert_eq!(classify("http://cs.mit.edu:8080/path?q=1"), ReferrerClass::Institutional);
    }

    #[test]
    fn test_country_academic_suffixes() {
        assert_eq!(classify("https://www.ox.ac.uk/news"), ReferrerClass::Institutional);
        assert_eq!(classify("https://www.unimelb.edu.au"), ReferrerClass::Institutional);
        assert_eq!(classify("https://example.ac.nz"), ReferrerClass::Institutional);
    }

    #[test]
    fn test_keyword_hosts_are_institutional() {
        assert_eq!(classify("https://stateuniversity.org/giving"), ReferrerClass::Institutional);
        assert_eq!(classify("https://alumni.example.com/"), ReferrerClass::Institutional);
        assert_eq!(classify("https://WWW.COMMUNITYCOLLEGE.NET"), ReferrerClass::Institutional);
    }

    #[test]
    fn test_keyword_in_path_only_is_neutral() {
        assert_eq!(classify("https://google.com/search?q=university"), ReferrerClass::Neutral);
        assert_eq!(classify("https://example.com/alumni"), ReferrerClass::Neutral);
    }

    #[test]
    fn test_common_referrers_are_neutral() {
        assert_eq!(classify("https://www.google.com/"), ReferrerClass::Neutral);
        assert_eq!(classify("https://www.linkedin.com/feed"), ReferrerClass::Neutral);
        // "edu" must be the suffix label, not a substring
        assert_eq!(classify("https://education.com"), ReferrerClass::Neutral);
        assert_eq!(classify("https://edu.example.com"), ReferrerClass::Neutral);
    }

    #[test]
    fn test_garbage_is_neutral() {
        let garbage = [
            "",
            "   ",
            "not a url",
            "https://",
            "://",
            "https:///path",
            "https://[::1]/",
            "https://a..b.edu",
        ];
        for referrer in garbage {
            assert_eq!(classify(referrer), ReferrerClass::Neutral, "referrer {referrer:?}");
        }
    }

    #[test]
    fn test_userinfo_is_stripped() {
        assert_eq!(classify("https://user:pw@harvard.edu/"), ReferrerClass::Institutional);
        assert_eq!(classify("https://harvard.edu@evil.com/"), ReferrerClass::Neutral);
    }

    #[test]
    fn test_extra_keywords() {
        let classifier = ReferrerClassifier::with_extra_keywords(["Foundation", " ", "alumni"]);
        assert_eq!(
            classifier.classify("https://giving-foundation.org"),
            ReferrerClass::Institutional
        );
        assert_eq!(classifier.classify("https://example.org"), ReferrerClass::Neutral);
        assert_eq!(classifier.keywords.iter().filter(|k| *k == "alumni").count(), 1);
    }
}
