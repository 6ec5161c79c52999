use serde::{Deserialize, Serialize};

/// Subset of the issue-search response this pipeline consumes.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub items: Vec<Issue>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_deserializes() {
        let response: SearchResponse = serde_json::from_str(
            r#"{
                "total_count": 1,
                "incomplete_results": false,
                "items": [
                    {
                        "number": 4242,
                        "title": "CVE in base image",
                        "html_url": "https://github.com/example/repo/issues/4242",
                        "created_at": "2024-03-01T08:00:00Z",
                        "state": "open"
                    }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(1, response.total_count);
        assert_eq!(4242, response.items[0].number);
        assert_eq!(Some("2024-03-01T08:00:00Z".to_string()), response.items[0].created_at);
    }

    #[test]
    fn empty_response_has_no_items() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.items.is_empty());
    }
}
