use std::collections::BTreeMap;

use reqwest::Response;
use serde::{Deserialize, Serialize};

/// Headers of the exchange that produced a cache entry.
///
/// Stored as JSON in the entry's `.http-metadata.json` sibling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeMetadata {
    pub url:     String,
    pub status:  u16,
    pub headers: BTreeMap<String, Vec<String>>,
}

impl ExchangeMetadata {
    pub fn from_response(response: &Response) -> Self {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }

        Self {
            url: response.url().to_string(),
            status: response.status().as_u16(),
            headers,
        }
    }

    /// First value of `name`; header names are stored lowercase.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> { serde_json::to_vec_pretty(self) }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> { serde_json::from_slice(bytes) }
}
