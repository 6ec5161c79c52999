use std::path::Path;

use serde::{Deserialize, Serialize};
use vulnwatch_collector_osv::PackageTarget;

/// Collection targets for one cycle: package coordinates for the
/// vulnerability-database source and search keywords for the issue source.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct HarvesterConfig {
    #[serde(default = "default_packages")]
    pub packages: Vec<PackageTarget>,
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            keywords: default_keywords(),
        }
    }
}

impl HarvesterConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let file = std::fs::File::open(path.as_ref())?;
        Ok(serde_yaml::from_reader(file)?)
    }
}

fn default_packages() -> Vec<PackageTarget> {
    [
        ("npm", "lodash"),
        ("npm", "axios"),
        ("npm", "express"),
        ("npm", "react"),
        ("PyPI", "requests"),
        ("PyPI", "django"),
        ("PyPI", "flask"),
        ("Maven", "spring-boot"),
    ]
    .into_iter()
    .map(|(ecosystem, name)| PackageTarget {
        ecosystem: ecosystem.to_string(),
        name: name.to_string(),
    })
    .collect()
}

fn default_keywords() -> Vec<String> {
    [
        "docker security vulnerability",
        "kubernetes CVE",
        "jenkins exploit",
        "ci/cd pipeline security",
        "github actions vulnerability",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_sources() {
        let config = HarvesterConfig::default();
        assert_eq!(8, config.packages.len());
        assert_eq!(5, config.keywords.len());
        assert!(config.packages.contains(&PackageTarget {
            ecosystem: "PyPI".to_string(),
            name: "requests".to_string(),
        }));
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config: HarvesterConfig = serde_yaml::from_str(
            r#"
            packages:
              - ecosystem: npm
                name: left-pad
            keywords:
              - "supply chain attack"
            "#,
        )
        .unwrap();

        assert_eq!(1, config.packages.len());
        assert_eq!("left-pad", config.packages[0].name);
        assert_eq!(vec!["supply chain attack".to_string()], config.keywords);
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config: HarvesterConfig = serde_yaml::from_str("keywords: []").unwrap();
        assert_eq!(8, config.packages.len());
        assert!(config.keywords.is_empty());
    }
}
