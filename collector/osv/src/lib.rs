use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use vulnwatch_collector_common::{CancelFlag, Fetched, Source};
use vulnwatch_model::RawRecord;

use crate::client::schema::{Event, Vulnerability};
use crate::client::OsvClient;

pub mod client;

pub const SOURCE_NAME: &str = "OSV";

/// Pause between package queries. The bulk query API tolerates sustained
/// traffic but throttles bursty clients.
const REQUEST_DELAY: Duration = Duration::from_millis(300);

/// A package/ecosystem pair to query for known vulnerabilities. The
/// ecosystem is spelled the way the upstream database expects it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PackageTarget {
    pub ecosystem: String,
    pub name: String,
}

pub struct OsvSource {
    client: OsvClient,
    targets: Vec<PackageTarget>,
}

impl OsvSource {
    pub fn new(targets: Vec<PackageTarget>) -> Self {
        Self {
            client: OsvClient::new(),
            targets,
        }
    }
}

#[async_trait]
impl Source for OsvSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, cancel: &CancelFlag) -> Fetched {
        let mut fetched = Fetched::default();

        for (i, target) in self.targets.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("osv fetch cancelled after {} of {} targets", i, self.targets.len());
                break;
            }
            if i > 0 {
                sleep(REQUEST_DELAY).await;
            }

            match self.client.query(&target.ecosystem, &target.name).await {
                Ok(response) => {
                    let vulns = response.vulns.unwrap_or_default();
                    log::debug!("{}/{}: {} vulnerabilities", target.ecosystem, target.name, vulns.len());
                    fetched
                        .records
                        .extend(vulns.iter().map(|vuln| to_raw_record(vuln, target)));
                }
                Err(e) => {
                    log::warn!("skipping {}/{}: {}", target.ecosystem, target.name, e);
                    fetched.errors += 1;
                }
            }
        }

        fetched
    }
}

fn to_raw_record(vuln: &Vulnerability, target: &PackageTarget) -> RawRecord {
    RawRecord {
        source: SOURCE_NAME.to_string(),
        id: vuln.id.clone(),
        package: Some(target.name.clone()),
        ecosystem: Some(target.ecosystem.clone()),
        severity: vuln
            .severity
            .first()
            .map(|severity| severity.severity_type.clone())
            .unwrap_or_default(),
        summary: vuln.summary.clone().unwrap_or_default(),
        affected_versions: render_affected(vuln),
        patched_version: patched_version(vuln),
        references: vuln.references.iter().map(|reference| reference.url.clone()).collect(),
        published: vuln.published.map(|published| published.to_rfc3339()),
        collected_at: Utc::now(),
    }
}

/// Render the affected ranges as one line of free text per affected
/// package, e.g. `lodash: introduced 0, fixed 4.17.21`.
fn render_affected(vuln: &Vulnerability) -> String {
    vuln.affected
        .iter()
        .map(|affected| {
            let name = affected
                .package
                .as_ref()
                .map(|package| package.name.as_str())
                .unwrap_or_default();
            let events = affected
                .ranges
                .iter()
                .flat_map(|range| range.events.iter())
                .map(|event| match event {
                    Event::Introduced(version) => format!("introduced {version}"),
                    Event::Fixed(version) => format!("fixed {version}"),
                    Event::LastAffected(version) => format!("last affected {version}"),
                    Event::Limit(version) => format!("limit {version}"),
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("{name}: {events}")
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// The last `fixed` event across all affected ranges, when the advisory
/// carries one.
fn patched_version(vuln: &Vulnerability) -> String {
    vuln.affected
        .iter()
        .flat_map(|affected| affected.ranges.iter())
        .flat_map(|range| range.events.iter())
        .filter_map(|event| match event {
            Event::Fixed(version) => Some(version.clone()),
            _ => None,
        })
        .last()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vulnerability() -> Vulnerability {
        serde_json::from_str(
            r#"{
                "id": "GHSA-jf85-cpcp-j695",
                "summary": "Prototype Pollution in lodash",
                "published": "2019-07-10T19:45:23Z",
                "severity": [
                    {"type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:H/PR:N/UI:N/S:U/C:N/I:H/A:N"}
                ],
                "affected": [
                    {
                        "package": {"name": "lodash", "ecosystem": "npm"},
                        "ranges": [
                            {"type": "SEMVER", "events": [{"introduced": "0"}, {"fixed": "4.17.12"}]}
                        ]
                    }
                ],
                "references": [
                    {"type": "ADVISORY", "url": "https://github.com/advisories/GHSA-jf85-cpcp-j695"},
                    {"type": "WEB", "url": "https://example.com/more"}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn maps_vulnerability_to_raw_record() {
        let target = PackageTarget {
            ecosystem: "npm".to_string(),
            name: "lodash".to_string(),
        };
        let record = to_raw_record(&vulnerability(), &target);

        assert_eq!("OSV", record.source);
        assert_eq!("GHSA-jf85-cpcp-j695", record.id);
        assert_eq!(Some("lodash".to_string()), record.package);
        assert_eq!(Some("npm".to_string()), record.ecosystem);
        assert_eq!("CVSS_V3", record.severity);
        assert_eq!("Prototype Pollution in lodash", record.summary);
        assert_eq!("lodash: introduced 0, fixed 4.17.12", record.affected_versions);
        assert_eq!("4.17.12", record.patched_version);
        assert_eq!(2, record.references.len());
        assert_eq!(Some("2019-07-10T19:45:23+00:00".to_string()), record.published);
    }

    #[test]
    fn raw_ecosystem_label_is_preserved() {
        let target = PackageTarget {
            ecosystem: "PyPI".to_string(),
            name: "requests".to_string(),
        };
        let record = to_raw_record(&vulnerability(), &target);
        assert_eq!(Some("PyPI".to_string()), record.ecosystem);
    }

    #[test]
    fn missing_fields_default_empty() {
        let vuln: Vulnerability = serde_json::from_str(r#"{"id": "OSV-2020-484"}"#).unwrap();
        let target = PackageTarget {
            ecosystem: "npm".to_string(),
            name: "axios".to_string(),
        };
        let record = to_raw_record(&vuln, &target);

        assert_eq!("", record.severity);
        assert_eq!("", record.summary);
        assert_eq!("", record.affected_versions);
        assert_eq!("", record.patched_version);
        assert!(record.references.is_empty());
        assert_eq!(None, record.published);
    }
}
