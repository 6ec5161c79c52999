pub mod schema;

use std::time::Duration;

use anyhow::Context;
use reqwest::header;
use vulnwatch_collector_common::with_retries;

use crate::client::schema::SearchResponse;

const SEARCH_URL: &str = "https://api.github.com/search/issues";
const ACCEPT: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("vulnwatch/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: u32 = 5;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct GithubSearchClient {
    client: reqwest::Client,
    token: Option<String>,
}

impl GithubSearchClient {
    /// The token is optional; unauthenticated search works but is limited
    /// to a far lower request budget.
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
        }
    }

    /// Search the newest issues matching `keyword`, newest first, one page.
    pub async fn search(&self, keyword: &str) -> Result<SearchResponse, anyhow::Error> {
        let query = format!("{keyword} is:issue");

        with_retries("github search", RETRY_ATTEMPTS, RETRY_DELAY, || async {
            let mut request = self
                .client
                .get(SEARCH_URL)
                .timeout(REQUEST_TIMEOUT)
                .header(header::ACCEPT, ACCEPT)
                .header(header::USER_AGENT, USER_AGENT)
                .query(&[("q", query.as_str()), ("sort", "created"), ("order", "desc")])
                .query(&[("per_page", PAGE_SIZE)]);
            if let Some(token) = &self.token {
                request = request.bearer_auth(token);
            }

            Ok(request.send().await?.error_for_status()?.json().await?)
        })
        .await
        .with_context(|| format!("searching issues for '{keyword}'"))
    }
}
