use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde_json::Value;

use crate::api::{BackendClient, TokenProvider};
use crate::error::{Error, Result};

/// reqwest-backed implementation of [`BackendClient`] for the school
/// management REST API.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()
            .expect("Failed to build HTTP client");
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            tokens,
        }
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.tokens.bearer_token())).unwrap(),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static("reportcard-manager"));
        headers
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .client
            .request(method, &url)
            .headers(self.build_headers());
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| Error::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| Error::Transport {
            url: url.clone(),
            message: e.to_string(),
        })?;
        check_status(status, &url, &text)?;

        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| Error::Decode {
            url,
            message: e.to_string(),
        })
    }
}

/// Map a response status to the error taxonomy: 401/403 mean the bearer
/// token was rejected, any other non-2xx is a transport failure carrying
/// the start of the response body for context.
fn check_status(status: StatusCode, url: &str, body: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::Authentication);
    }
    if !status.is_success() {
        return Err(Error::Transport {
            url: url.to_string(),
            message: format!(
                "status {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            ),
        });
    }
    Ok(())
}

#[async_trait]
impl BackendClient for RestClient {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.execute(Method::GET, path, query, None).await
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.execute(Method::POST, path, &[], Some(body)).await
    }

    async fn patch(&self, path: &str, body: Value) -> Result<Value> {
        self.execute(Method::PATCH, path, &[], Some(body)).await
    }
}
