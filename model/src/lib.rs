use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical coarse severity classification.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    None,
}

/// Raw label fragments mapped onto severity buckets, checked in order. The
/// CVSS_V4/CVSS_V3 entries cover sources which report the scoring system
/// type instead of a textual label.
const SEVERITY_RULES: &[(&str, Severity)] = &[
    ("CRITICAL", Severity::Critical),
    ("CVSS_V4", Severity::Critical),
    ("HIGH", Severity::High),
    ("CVSS_V3", Severity::High),
    ("MEDIUM", Severity::Medium),
    ("MODERATE", Severity::Medium),
    ("LOW", Severity::Low),
];

impl Severity {
    /// Map a raw upstream severity label onto a bucket. Case-insensitive
    /// substring match, first rule wins. Empty or unrecognized input falls
    /// back to `Medium` rather than failing.
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.to_uppercase();
        SEVERITY_RULES
            .iter()
            .find(|(fragment, _)| raw.contains(fragment))
            .map(|(_, severity)| *severity)
            .unwrap_or(Severity::Medium)
    }

    /// Fixed per-bucket midpoint, used when the source provides no numeric
    /// CVSS value.
    pub fn estimated_score(&self) -> f64 {
        match self {
            Severity::Critical => 9.5,
            Severity::High => 7.5,
            Severity::Medium => 5.0,
            Severity::Low => 2.5,
            Severity::None => 5.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::None => "NONE",
        }
    }
}

impl From<&str> for Severity {
    fn from(value: &str) -> Self {
        match value {
            "CRITICAL" => Severity::Critical,
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            "NONE" => Severity::None,
            _ => Severity::Medium,
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The package-management domain a component belongs to.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Pip,
    Maven,
    Docker,
    Kubernetes,
    Github,
}

/// Alias table mapping upstream ecosystem labels onto the closed set above,
/// matched case-insensitively on the trimmed label.
const ECOSYSTEM_ALIASES: &[(&str, Ecosystem)] = &[
    ("npm", Ecosystem::Npm),
    ("node", Ecosystem::Npm),
    ("nodejs", Ecosystem::Npm),
    ("pip", Ecosystem::Pip),
    ("pypi", Ecosystem::Pip),
    ("python", Ecosystem::Pip),
    ("maven", Ecosystem::Maven),
    ("docker", Ecosystem::Docker),
    ("kubernetes", Ecosystem::Kubernetes),
    ("k8s", Ecosystem::Kubernetes),
    ("github", Ecosystem::Github),
];

impl Ecosystem {
    /// Map a raw upstream ecosystem label onto the closed set. Unmapped or
    /// empty labels default to `Npm` rather than being rejected.
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim().to_lowercase();
        ECOSYSTEM_ALIASES
            .iter()
            .find(|(alias, _)| raw == *alias)
            .map(|(_, ecosystem)| *ecosystem)
            .unwrap_or(Ecosystem::Npm)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Pip => "pip",
            Ecosystem::Maven => "maven",
            Ecosystem::Docker => "docker",
            Ecosystem::Kubernetes => "kubernetes",
            Ecosystem::Github => "github",
        }
    }
}

impl Display for Ecosystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse vulnerability classification inferred from free-form summary text.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VulnerabilityType {
    #[serde(rename = "DoS")]
    DenialOfService,
    Injection,
    #[serde(rename = "XSS")]
    Xss,
    #[serde(rename = "RCE")]
    Rce,
    #[serde(rename = "Prototype Pollution")]
    PrototypePollution,
    #[serde(rename = "SSRF")]
    Ssrf,
    Other,
}

/// Ordered classification rules over the lowercased summary text. First
/// match wins; order matters since a description can match several
/// fragments.
const TYPE_RULES: &[(&[&str], VulnerabilityType)] = &[
    (&["denial of service", "dos"], VulnerabilityType::DenialOfService),
    (&["injection"], VulnerabilityType::Injection),
    (&["xss", "cross-site"], VulnerabilityType::Xss),
    (&["rce", "remote code"], VulnerabilityType::Rce),
    (&["prototype pollution"], VulnerabilityType::PrototypePollution),
    (&["ssrf"], VulnerabilityType::Ssrf),
];

impl VulnerabilityType {
    /// Classify a summary into a vulnerability type. Text matching none of
    /// the rules is `Other`.
    pub fn classify(text: &str) -> Self {
        let text = text.to_lowercase();
        TYPE_RULES
            .iter()
            .find(|(fragments, _)| fragments.iter().any(|fragment| text.contains(fragment)))
            .map(|(_, vuln_type)| *vuln_type)
            .unwrap_or(VulnerabilityType::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VulnerabilityType::DenialOfService => "DoS",
            VulnerabilityType::Injection => "Injection",
            VulnerabilityType::Xss => "XSS",
            VulnerabilityType::Rce => "RCE",
            VulnerabilityType::PrototypePollution => "Prototype Pollution",
            VulnerabilityType::Ssrf => "SSRF",
            VulnerabilityType::Other => "Other",
        }
    }
}

impl Display for VulnerabilityType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize a raw upstream timestamp into a calendar date.
///
/// Accepts RFC 3339 / ISO-8601 timestamps (truncated at `T`) and bare
/// `YYYY-MM-DD` prefixes. A missing or unparseable value falls back to the
/// current date at normalization time, which approximates the unknown
/// original event time rather than reporting it.
pub fn normalize_date(raw: Option<&str>) -> NaiveDate {
    let today = Utc::now().date_naive();
    let raw = match raw {
        Some(raw) if !raw.trim().is_empty() => raw.trim(),
        _ => return today,
    };
    let prefix = match raw.split_once('T') {
        Some((date, _)) => date,
        None => raw.get(..10).unwrap_or(raw),
    };
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").unwrap_or(today)
}

/// A vulnerability keyed by a globally unique external identifier, not tied
/// to a specific package ecosystem. Re-inserting an existing identifier is
/// a no-op.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CveRecord {
    pub cve_id: String,
    pub title: String,
    pub description: String,
    pub cvss_score: Option<f64>,
    pub severity: Severity,
    pub published_date: NaiveDate,
    pub modified_date: NaiveDate,
    pub source: String,
    pub url: String,
}

/// A vulnerability tied to a specific package name and ecosystem. Carries
/// no unique external key; every insert creates a new row.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PackageRecord {
    pub package_name: String,
    pub ecosystem: Ecosystem,
    pub vulnerability_type: VulnerabilityType,
    pub cvss_score: Option<f64>,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub published_date: NaiveDate,
    pub discovered_date: NaiveDate,
    pub affected_versions: String,
    pub patched_version: String,
    pub source: String,
    pub url: String,
}

/// Directed dependency edge: `dependent_package` depends on
/// `parent_package`. The vulnerability reference is weak; the linked row
/// may be absent.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SupplyChainEdge {
    pub parent_package: String,
    pub dependent_package: String,
    pub ecosystem: Ecosystem,
    pub vulnerability_id: Option<i64>,
}

/// One keyword occurrence sample. Accumulated, never deduplicated.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TrendSample {
    pub keyword: String,
    pub count: i64,
    pub severity: Severity,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub source: String,
    pub category: String,
    pub url: String,
    pub published_date: Option<NaiveDate>,
}

/// A source-specific record as emitted by a source adapter, before
/// normalization.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RawRecord {
    pub source: String,
    pub id: String,
    pub package: Option<String>,
    pub ecosystem: Option<String>,
    pub severity: String,
    pub summary: String,
    pub affected_versions: String,
    pub patched_version: String,
    pub references: Vec<String>,
    pub published: Option<String>,
    pub collected_at: DateTime<Utc>,
}

/// One row of the read-side union of general and package vulnerabilities,
/// projected onto a common shape. Columns absent on one side are `None`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CombinedRow {
    pub cve_id: Option<String>,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub cvss_score: Option<f64>,
    pub affected_component: Option<String>,
    pub ecosystem: Option<String>,
    pub vulnerability_type: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub discovered_date: Option<NaiveDate>,
    pub source: Option<String>,
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SeverityStat {
    pub count: i64,
    pub percentage: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ComponentCount {
    pub component: String,
    pub count: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CriticalRow {
    pub id: String,
    pub title: String,
    pub cvss_score: Option<f64>,
    pub published_date: Option<NaiveDate>,
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Counts {
    pub cve: i64,
    pub packages: i64,
    pub total: i64,
}

/// Supply-chain impact row: an edge onto a dependent package joined with
/// the linked vulnerability, when present.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ImpactRow {
    pub parent_package: String,
    pub dependent_package: String,
    pub ecosystem: Option<String>,
    pub severity: Option<Severity>,
    pub cvss_score: Option<f64>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_substring_match() {
        assert_eq!(Severity::Critical, Severity::normalize("Critical"));
        assert_eq!(Severity::Critical, Severity::normalize("this is CRITICAL stuff"));
        assert_eq!(Severity::Critical, Severity::normalize("CVSS_V4"));
        assert_eq!(Severity::High, Severity::normalize("CVSS_V3"));
        assert_eq!(Severity::Medium, Severity::normalize("Moderate"));
        assert_eq!(Severity::Low, Severity::normalize("low"));
    }

    #[test]
    fn severity_defaults_to_medium() {
        assert_eq!(Severity::Medium, Severity::normalize(""));
        assert_eq!(Severity::Medium, Severity::normalize("bogus"));
        assert_eq!(Severity::Medium, Severity::from("WAT"));
    }

    #[test]
    fn estimated_scores_are_bucket_midpoints() {
        for raw in ["critical", "HIGH", "medium", "Low", "unknown", ""] {
            let score = Severity::normalize(raw).estimated_score();
            assert!([9.5, 7.5, 5.0, 2.5].contains(&score), "{raw} -> {score}");
        }
    }

    #[test]
    fn ecosystem_aliases() {
        assert_eq!(Ecosystem::Pip, Ecosystem::normalize("PyPI"));
        assert_eq!(Ecosystem::Pip, Ecosystem::normalize("Python"));
        assert_eq!(Ecosystem::Npm, Ecosystem::normalize("Node"));
        assert_eq!(Ecosystem::Kubernetes, Ecosystem::normalize("K8s"));
        assert_eq!(Ecosystem::Maven, Ecosystem::normalize(" Maven "));
        assert_eq!(Ecosystem::Github, Ecosystem::normalize("GITHUB"));
    }

    #[test]
    fn unknown_ecosystem_defaults_to_npm() {
        assert_eq!(Ecosystem::Npm, Ecosystem::normalize(""));
        assert_eq!(Ecosystem::Npm, Ecosystem::normalize("crates.io"));
    }

    #[test]
    fn vulnerability_type_first_match_wins() {
        assert_eq!(
            VulnerabilityType::DenialOfService,
            VulnerabilityType::classify("Denial of service via SQL injection")
        );
        assert_eq!(
            VulnerabilityType::Injection,
            VulnerabilityType::classify("SQL Injection in the login form")
        );
        assert_eq!(VulnerabilityType::Xss, VulnerabilityType::classify("Stored cross-site scripting"));
        assert_eq!(VulnerabilityType::Rce, VulnerabilityType::classify("unauthenticated remote code execution"));
        assert_eq!(
            VulnerabilityType::PrototypePollution,
            VulnerabilityType::classify("Prototype pollution in merge()")
        );
        assert_eq!(VulnerabilityType::Ssrf, VulnerabilityType::classify("blind SSRF"));
        assert_eq!(VulnerabilityType::Other, VulnerabilityType::classify("something else entirely"));
    }

    #[test]
    fn date_truncates_timestamps() {
        assert_eq!(
            NaiveDate::from_ymd_opt(2025, 12, 23).unwrap(),
            normalize_date(Some("2025-12-23T17:09:22.862759"))
        );
        assert_eq!(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            normalize_date(Some("2024-01-02 12:00:00"))
        );
    }

    #[test]
    fn date_defaults_to_today() {
        let today = Utc::now().date_naive();
        assert_eq!(today, normalize_date(None));
        assert_eq!(today, normalize_date(Some("")));
        assert_eq!(today, normalize_date(Some("not a date")));
    }

    #[test]
    fn severity_serializes_uppercase() {
        assert_eq!("\"CRITICAL\"", serde_json::to_string(&Severity::Critical).unwrap());
        assert_eq!("\"npm\"", serde_json::to_string(&Ecosystem::Npm).unwrap());
        assert_eq!(
            "\"Prototype Pollution\"",
            serde_json::to_string(&VulnerabilityType::PrototypePollution).unwrap()
        );
    }
}
