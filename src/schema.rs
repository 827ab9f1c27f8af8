//! Federation introspection client
//!
//! Issues the `{_service{sdl}}` query against a resolved backend and pulls
//! the SDL text out of the response. One attempt per call; retry policy
//! lives with the reconciler.

use crate::registry::BackendConfig;
use crate::{GraphfedError, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const INTROSPECTION_QUERY: &str = r#"{"query":"{_service{sdl}}"}"#;

#[derive(Debug, Deserialize)]
struct SdlResponse {
    data: Option<SdlData>,
}

#[derive(Debug, Deserialize)]
struct SdlData {
    #[serde(rename = "_service")]
    service: Option<SdlService>,
}

#[derive(Debug, Deserialize)]
struct SdlService {
    sdl: Option<String>,
}

#[derive(Clone)]
pub struct SchemaFetcher {
    client: reqwest::Client,
}

impl SchemaFetcher {
    /// Build a fetcher whose requests are bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GraphfedError::ConfigError(format!("HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch the partial schema SDL from one backend
    pub async fn fetch_sdl(&self, config: &BackendConfig) -> Result<String> {
        let url = config.endpoint_url();
        debug!("Fetching SDL from {}", url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(INTROSPECTION_QUERY)
            .send()
            .await
            .map_err(|e| GraphfedError::SchemaFetch {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        if response.status() != StatusCode::OK {
            return Err(GraphfedError::SchemaFetch {
                url,
                reason: format!("unexpected status {}", response.status()),
            });
        }

        let body: SdlResponse =
            response
                .json()
                .await
                .map_err(|e| GraphfedError::SchemaFetch {
                    url: url.clone(),
                    reason: format!("malformed body: {}", e),
                })?;

        body.data
            .and_then(|d| d.service)
            .and_then(|s| s.sdl)
            .ok_or(GraphfedError::SchemaFetch {
                url,
                reason: "response missing data._service.sdl".to_string(),
            })
    }
}
