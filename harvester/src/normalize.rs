use vulnwatch_model::{
    normalize_date, CveRecord, Ecosystem, PackageRecord, RawRecord, Severity, VulnerabilityType,
};

const TITLE_LIMIT: usize = 200;
const VERSIONS_LIMIT: usize = 255;
const URL_LIMIT: usize = 500;

const DEFAULT_TITLE: &str = "No title";
const DEFAULT_DESCRIPTION: &str = "No description available";

/// A raw record classified and mapped onto its canonical shape.
#[derive(Clone, Debug)]
pub enum Record {
    Cve(CveRecord),
    Package(PackageRecord),
}

impl Record {
    /// Classify and normalize one raw record. A record carrying both an
    /// ecosystem and a package name is a package vulnerability; anything
    /// else is a general one keyed on its external identifier.
    pub fn from_raw(raw: &RawRecord) -> Record {
        let severity = Severity::normalize(&raw.severity);
        let score = severity.estimated_score();
        let summary = raw.summary.trim();
        let title = if summary.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            truncate(summary, TITLE_LIMIT)
        };
        let description = if summary.is_empty() {
            DEFAULT_DESCRIPTION.to_string()
        } else {
            summary.to_string()
        };
        let url = first_reference(&raw.references);
        let published = normalize_date(raw.published.as_deref());
        let collected = raw.collected_at.date_naive();

        match (&raw.ecosystem, &raw.package) {
            (Some(ecosystem), Some(package)) if !ecosystem.is_empty() && !package.is_empty() => {
                Record::Package(PackageRecord {
                    package_name: package.clone(),
                    ecosystem: Ecosystem::normalize(ecosystem),
                    vulnerability_type: VulnerabilityType::classify(&raw.summary),
                    cvss_score: Some(score),
                    severity,
                    title,
                    description,
                    published_date: published,
                    discovered_date: collected,
                    affected_versions: truncate(&raw.affected_versions, VERSIONS_LIMIT),
                    patched_version: raw.patched_version.clone(),
                    source: raw.source.clone(),
                    url,
                })
            }
            _ => Record::Cve(CveRecord {
                cve_id: raw.id.clone(),
                title,
                description,
                cvss_score: Some(score),
                severity,
                published_date: published,
                modified_date: collected,
                source: raw.source.clone(),
                url,
            }),
        }
    }
}

fn first_reference(references: &[String]) -> String {
    references
        .first()
        .map(|reference| truncate(reference, URL_LIMIT))
        .unwrap_or_default()
}

/// Truncate to at most `limit` bytes without splitting a character.
fn truncate(value: &str, limit: usize) -> String {
    if value.len() <= limit {
        return value.to_string();
    }
    let mut end = limit;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn raw() -> RawRecord {
        RawRecord {
            source: "OSV".to_string(),
            id: "GHSA-jf85-cpcp-j695".to_string(),
            package: Some("lodash".to_string()),
            ecosystem: Some("npm".to_string()),
            severity: "CVSS_V3".to_string(),
            summary: "Prototype Pollution in lodash".to_string(),
            affected_versions: "lodash: introduced 0, fixed 4.17.12".to_string(),
            patched_version: "4.17.12".to_string(),
            references: vec!["https://example.com/advisory".to_string()],
            published: Some("2019-07-10T19:45:23Z".to_string()),
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn record_with_package_and_ecosystem_is_package() {
        let record = Record::from_raw(&raw());
        match record {
            Record::Package(package) => {
                assert_eq!("lodash", package.package_name);
                assert_eq!(Ecosystem::Npm, package.ecosystem);
                assert_eq!(VulnerabilityType::PrototypePollution, package.vulnerability_type);
                assert_eq!(Severity::High, package.severity);
                assert_eq!(Some(7.5), package.cvss_score);
                assert_eq!("4.17.12", package.patched_version);
                assert_eq!("2019-07-10", package.published_date.to_string());
                assert_eq!(Utc::now().date_naive(), package.discovered_date);
            }
            Record::Cve(_) => panic!("expected a package record"),
        }
    }

    #[test]
    fn record_without_package_is_general() {
        let mut input = raw();
        input.package = None;
        input.id = "CVE-2021-3114".to_string();

        match Record::from_raw(&input) {
            Record::Cve(cve) => {
                assert_eq!("CVE-2021-3114", cve.cve_id);
                assert_eq!(Severity::High, cve.severity);
                assert_eq!("https://example.com/advisory", cve.url);
            }
            Record::Package(_) => panic!("expected a general record"),
        }
    }

    #[test]
    fn empty_ecosystem_is_general() {
        let mut input = raw();
        input.ecosystem = Some(String::new());
        assert!(matches!(Record::from_raw(&input), Record::Cve(_)));
    }

    #[test]
    fn empty_summary_gets_defaults() {
        let mut input = raw();
        input.summary = String::new();

        match Record::from_raw(&input) {
            Record::Package(package) => {
                assert_eq!("No title", package.title);
                assert_eq!("No description available", package.description);
                assert_eq!(VulnerabilityType::Other, package.vulnerability_type);
            }
            Record::Cve(_) => panic!("expected a package record"),
        }
    }

    #[test]
    fn long_fields_are_truncated() {
        let mut input = raw();
        input.summary = "x".repeat(300);
        input.references = vec!["y".repeat(600)];

        match Record::from_raw(&input) {
            Record::Package(package) => {
                assert_eq!(200, package.title.len());
                assert_eq!(300, package.description.len());
                assert_eq!(500, package.url.len());
            }
            Record::Cve(_) => panic!("expected a package record"),
        }
    }

    #[test]
    fn unknown_ecosystem_label_maps_to_npm() {
        let mut input = raw();
        input.ecosystem = Some("crates.io".to_string());

        match Record::from_raw(&input) {
            Record::Package(package) => assert_eq!(Ecosystem::Npm, package.ecosystem),
            Record::Cve(_) => panic!("expected a package record"),
        }
    }
}
