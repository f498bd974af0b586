//! REST call helper for API-side test setup and verification.
//!
//! UI suites often need to seed or verify state through a backend API
//! around the browser flow. This stays deliberately thin: JSON in, JSON
//! out, dotted-path field extraction on the response.

use crate::result::{ManejarError, ManejarResult};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

fn api_error(e: impl std::fmt::Display) -> ManejarError {
    ManejarError::Api {
        message: e.to_string(),
    }
}

/// Thin JSON-speaking HTTP client
#[derive(Debug, Clone, Default)]
pub struct ApiClient {
    base_url: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client resolving endpoints as absolute URLs
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client resolving endpoints relative to `base_url`
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            client: reqwest::Client::new(),
        }
    }

    /// Resolve an endpoint against the base URL, if one is set
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                endpoint.trim_start_matches('/')
            ),
            None => endpoint.to_string(),
        }
    }

    /// GET the endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Api`] when the request cannot be sent.
    pub async fn get(&self, endpoint: &str) -> ManejarResult<ApiResponse> {
        self.send("GET", self.client.get(self.url(endpoint))).await
    }

    /// GET the endpoint with headers and query parameters
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Api`] when the request cannot be sent.
    pub async fn get_with(
        &self,
        endpoint: &str,
        headers: &HashMap<String, String>,
        query: &HashMap<String, String>,
    ) -> ManejarResult<ApiResponse> {
        let mut request = self.client.get(self.url(endpoint));
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let query: Vec<(&str, &str)> = query
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        self.send("GET", request.query(&query)).await
    }

    /// POST a JSON body to the endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Api`] when the request cannot be sent.
    pub async fn post(&self, endpoint: &str, body: &Value) -> ManejarResult<ApiResponse> {
        self.send("POST", self.client.post(self.url(endpoint)).json(body))
            .await
    }

    /// PUT a JSON body to the endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Api`] when the request cannot be sent.
    pub async fn put(&self, endpoint: &str, body: &Value) -> ManejarResult<ApiResponse> {
        self.send("PUT", self.client.put(self.url(endpoint)).json(body))
            .await
    }

    /// DELETE the endpoint
    ///
    /// # Errors
    ///
    /// Returns [`ManejarError::Api`] when the request cannot be sent.
    pub async fn delete(&self, endpoint: &str) -> ManejarResult<ApiResponse> {
        self.send("DELETE", self.client.delete(self.url(endpoint)))
            .await
    }

    async fn send(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> ManejarResult<ApiResponse> {
        debug!(method, "sending API request");
        let response = request.send().await.map_err(api_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(api_error)?;
        info!(method, status, "API response received");
        let body = if text.is_empty() {
            Value::Null
        } else {
            // Non-JSON bodies are kept verbatim as a string value
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(ApiResponse { status, body })
    }
}

/// Status code plus parsed JSON body of one API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body; `Null` when empty, a string value when not JSON
    pub body: Value,
}

impl ApiResponse {
    /// Whether the status code is in the 2xx range
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Extract a body field by dotted path, with numeric segments indexing
    /// into arrays (e.g. `"data.items.0.name"`)
    #[must_use]
    pub fn json_field(&self, path: &str) -> Option<&Value> {
        let mut current = &self.body;
        for segment in path.split('.') {
            current = match segment.parse::<usize>() {
                Ok(index) => current.get(index)?,
                Err(_) => current.get(segment)?,
            };
        }
        Some(current)
    }

    /// Extract a body field as a string slice
    #[must_use]
    pub fn json_str(&self, path: &str) -> Option<&str> {
        self.json_field(path)?.as_str()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ApiResponse {
        ApiResponse {
            status: 200,
            body: json!({
                "data": {
                    "items": [
                        { "name": "alpha", "count": 3 },
                        { "name": "beta", "count": 7 }
                    ]
                },
                "token": "abc123"
            }),
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_base_url_joining() {
            let client = ApiClient::with_base_url("https://api.example.test/");
            assert_eq!(
                client.url("/users/7"),
                "https://api.example.test/users/7"
            );
            assert_eq!(client.url("health"), "https://api.example.test/health");
        }

        #[test]
        fn test_absolute_endpoints_without_base() {
            let client = ApiClient::new();
            assert_eq!(
                client.url("https://other.test/ping"),
                "https://other.test/ping"
            );
        }
    }

    mod response_tests {
        use super::*;

        #[test]
        fn test_json_field_by_dotted_path() {
            let response = sample();
            assert_eq!(response.json_str("token"), Some("abc123"));
            assert_eq!(response.json_str("data.items.1.name"), Some("beta"));
            assert_eq!(
                response.json_field("data.items.0.count"),
                Some(&json!(3))
            );
        }

        #[test]
        fn test_missing_path_is_none() {
            let response = sample();
            assert!(response.json_field("data.missing").is_none());
            assert!(response.json_field("data.items.9.name").is_none());
        }

        #[test]
        fn test_is_success_range() {
            assert!(ApiResponse { status: 201, body: Value::Null }.is_success());
            assert!(!ApiResponse { status: 404, body: Value::Null }.is_success());
            assert!(!ApiResponse { status: 500, body: Value::Null }.is_success());
        }
    }
}
