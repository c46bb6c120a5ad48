//! Search index HTTP client.

use std::time::Duration;

use tracing::debug;

use crate::error::{AgentError, AgentResult};

/// Status and body of one index endpoint response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexResponse {
    pub status: u16,
    pub body: String,
}

impl IndexResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Operations the dashboard loader needs from the search index.
///
/// HTTP error statuses are returned as responses; only transport failures
/// are errors.
pub trait IndexClient {
    fn delete_index(&self, index: &str) -> AgentResult<IndexResponse>;

    /// Submit a newline-delimited `_bulk` request.
    fn bulk(&self, body: String) -> AgentResult<IndexResponse>;
}

/// [`IndexClient`] over plain HTTP.
pub struct HttpIndexClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpIndexClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            agent: config.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn read(
        &self,
        url: &str,
        result: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    ) -> AgentResult<IndexResponse> {
        let mut response = result.map_err(|e| AgentError::Index {
            message: format!("Request to {} failed: {}", url, e),
        })?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| AgentError::Index {
                message: format!("Failed to read response from {}: {}", url, e),
            })?;
        debug!(url = %url, status, "Index endpoint responded");
        Ok(IndexResponse::new(status, body))
    }
}

impl IndexClient for HttpIndexClient {
    fn delete_index(&self, index: &str) -> AgentResult<IndexResponse> {
        let url = format!("{}/{}", self.base_url, index);
        let result = self.agent.delete(&url).call();
        self.read(&url, result)
    }

    fn bulk(&self, body: String) -> AgentResult<IndexResponse> {
        let url = format!("{}/_bulk", self.base_url);
        let result = self
            .agent
            .post(&url)
            .header("Content-Type", "application/x-ndjson")
            .send(body);
        self.read(&url, result)
    }
}
