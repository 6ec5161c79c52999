use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Package coordinates for a query: the name and the ecosystem label as the
/// vulnerability database spells it (e.g. `PyPI`, `Maven`, `npm`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub ecosystem: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryRequest {
    pub package: Package,
}

/// Response to a single package query. `vulns` is absent when the package
/// has no known vulnerabilities.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulns: Option<Vec<Vulnerability>>,
}

/// A vulnerability entry as defined by the OSV schema
/// <https://ossf.github.io/osv-schema/>, trimmed to the fields this
/// pipeline consumes.
#[derive(Debug, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Unique identifier in `<DB>-<ENTRYID>` form, for example
    /// `CVE-2021-3114` or `GHSA-vp9c-fpxx-744v`.
    pub id: String,

    /// One-line English summary of the vulnerability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    /// Quantitative severity entries. Each carries the scoring system type
    /// (e.g. `CVSS_V3`) and a vector or score string.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub severity: Vec<Severity>,

    /// The package ranges affected by this vulnerability.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected: Vec<Affected>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Severity {
    #[serde(rename = "type")]
    pub severity_type: String,
    pub score: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Affected {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<AffectedPackage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ranges: Vec<Range>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AffectedPackage {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ecosystem: Option<String>,
}

/// The range of versions of a package for which it is affected by the
/// vulnerability.
#[derive(Debug, Serialize, Deserialize)]
pub struct Range {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub range_type: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

/// A single range event. The wire format is a one-key object such as
/// `{"introduced": "0"}` or `{"fixed": "4.17.21"}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    Introduced(String),
    Fixed(String),
    LastAffected(String),
    Limit(String),
}

/// Reference to additional information about the vulnerability.
#[derive(Debug, Serialize, Deserialize)]
pub struct Reference {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,

    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_request_shape() {
        let request = QueryRequest {
            package: Package {
                name: "lodash".into(),
                ecosystem: "npm".into(),
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert_eq!(r#"{"package":{"name":"lodash","ecosystem":"npm"}}"#, json);
    }

    #[test]
    fn empty_response_has_no_vulns() {
        let response: QueryResponse = serde_json::from_str("{}").unwrap();
        assert!(response.vulns.is_none());
    }

    #[test]
    fn range_events_deserialize() {
        let range: Range = serde_json::from_str(
            r#"{"type": "SEMVER", "events": [{"introduced": "0"}, {"fixed": "4.17.21"}]}"#,
        )
        .unwrap();
        assert_eq!(2, range.events.len());
        assert!(matches!(&range.events[1], Event::Fixed(v) if v == "4.17.21"));
    }
}
