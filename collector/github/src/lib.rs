use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;
use vulnwatch_collector_common::{CancelFlag, Fetched, Source};
use vulnwatch_model::RawRecord;

use crate::client::schema::Issue;
use crate::client::GithubSearchClient;

pub mod client;

pub const SOURCE_NAME: &str = "GitHub Issues";

/// Pause between keyword searches. The search API has the strictest rate
/// limit of all the sources.
const REQUEST_DELAY: Duration = Duration::from_millis(1000);

/// Issues carry no severity information; everything starts out as a
/// medium until triaged.
const DEFAULT_SEVERITY: &str = "MEDIUM";

pub struct GithubSource {
    client: GithubSearchClient,
    keywords: Vec<String>,
}

impl GithubSource {
    pub fn new(keywords: Vec<String>, token: Option<String>) -> Self {
        Self {
            client: GithubSearchClient::new(token),
            keywords,
        }
    }
}

#[async_trait]
impl Source for GithubSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, cancel: &CancelFlag) -> Fetched {
        let mut fetched = Fetched::default();

        for (i, keyword) in self.keywords.iter().enumerate() {
            if cancel.is_cancelled() {
                log::info!("github fetch cancelled after {} of {} keywords", i, self.keywords.len());
                break;
            }
            if i > 0 {
                sleep(REQUEST_DELAY).await;
            }

            match self.client.search(keyword).await {
                Ok(response) => {
                    log::debug!("'{}': {} issues", keyword, response.items.len());
                    fetched
                        .records
                        .extend(response.items.iter().map(|issue| to_raw_record(issue, keyword)));
                }
                Err(e) => {
                    log::warn!("skipping '{}': {}", keyword, e);
                    fetched.errors += 1;
                }
            }
        }

        fetched
    }
}

fn to_raw_record(issue: &Issue, keyword: &str) -> RawRecord {
    RawRecord {
        source: SOURCE_NAME.to_string(),
        id: format!("GH-{}", issue.number),
        package: Some(keyword.to_string()),
        ecosystem: Some("github".to_string()),
        severity: DEFAULT_SEVERITY.to_string(),
        summary: format!("[{}] {}", keyword, issue.title),
        affected_versions: String::new(),
        patched_version: String::new(),
        references: vec![issue.html_url.clone()],
        published: issue.created_at.clone(),
        collected_at: Utc::now(),
    }
}
