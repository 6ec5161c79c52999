pub mod schema;

use std::time::Duration;

use anyhow::Context;
use vulnwatch_collector_common::with_retries;

use crate::client::schema::{Package, QueryRequest, QueryResponse};

const QUERY_URL: &str = "https://api.osv.dev/v1/query";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct OsvClient {
    client: reqwest::Client,
}

impl OsvClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Query the known vulnerabilities of one package. Retries transient
    /// failures before giving up on the target.
    pub async fn query(&self, ecosystem: &str, name: &str) -> Result<QueryResponse, anyhow::Error> {
        let request = QueryRequest {
            package: Package {
                name: name.to_string(),
                ecosystem: ecosystem.to_string(),
            },
        };

        with_retries("osv query", RETRY_ATTEMPTS, RETRY_DELAY, || async {
            Ok(self
                .client
                .post(QUERY_URL)
                .timeout(REQUEST_TIMEOUT)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?)
        })
        .await
        .with_context(|| format!("querying {ecosystem}/{name}"))
    }
}

impl Default for OsvClient {
    fn default() -> Self {
        Self::new()
    }
}
