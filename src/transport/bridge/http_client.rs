use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use super::types::{LoginRequest, LoginResponse, SESSION_HEADER, ThreadInfo};
use crate::error::TransportError;
use crate::session::Credentials;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// REST side of the account bridge.
#[derive(Debug, Clone)]
pub struct BridgeHttpClient {
    client: Client,
    base_url: Url,
}

pub fn build_bridge_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
}

impl BridgeHttpClient {
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client: build_bridge_client(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("build bridge URL for {path}"))
    }

    /// `threads/{thread_id}[/{action}]` with the id percent-encoded as one
    /// path segment.
    fn thread_endpoint(&self, thread_id: &str, action: Option<&str>) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow::anyhow!("bridge URL {} cannot be a base", self.base_url))?;
            segments.pop_if_empty().push("threads").push(thread_id);
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<LoginResponse> {
        let url = self.endpoint("/login")?;
        let response = self
            .client
            .post(url)
            .json(&LoginRequest {
                app_state: credentials,
            })
            .send()
            .await
            .map_err(|e| TransportError::Login(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|error| format!("<failed to read response body: {error}>"));
            anyhow::bail!(TransportError::Login(format!("bridge answered {status}: {body}")));
        }

        response
            .json::<LoginResponse>()
            .await
            .map_err(|e| TransportError::Decode {
                operation: "login".into(),
                message: e.to_string(),
            })
            .context("parse bridge login response")
    }

    pub async fn thread(&self, token: &str, thread_id: &str) -> Result<ThreadInfo> {
        let url = self.thread_endpoint(thread_id, None)?;
        self.request_json(token, Method::GET, url, None, "thread_info").await
    }

    pub async fn set_title(&self, token: &str, thread_id: &str, title: &str) -> Result<()> {
        let url = self.thread_endpoint(thread_id, Some("title"))?;
        self.request(
            token,
            Method::POST,
            url,
            Some(json!({ "title": title })),
            "set_title",
        )
        .await
        .map(drop)
    }

    pub async fn set_nickname(
        &self,
        token: &str,
        thread_id: &str,
        member_id: &str,
        nickname: &str,
    ) -> Result<()> {
        let url = self.thread_endpoint(thread_id, Some("nickname"))?;
        self.request(
            token,
            Method::POST,
            url,
            Some(json!({ "participantId": member_id, "nickname": nickname })),
            "set_nickname",
        )
        .await
        .map(drop)
    }

    pub async fn send_typing(&self, token: &str, thread_id: &str) -> Result<()> {
        let url = self.thread_endpoint(thread_id, Some("typing"))?;
        self.request(token, Method::POST, url, None, "send_typing")
            .await
            .map(drop)
    }

    pub async fn credentials(&self, token: &str) -> Result<Credentials> {
        let url = self.endpoint("/session/credentials")?;
        self.request_json(token, Method::GET, url, None, "export_credentials")
            .await
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        token: &str,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        operation: &str,
    ) -> Result<T> {
        let response = self.request(token, method, url, body, operation).await?;
        response.json::<T>().await.map_err(|e| {
            anyhow::Error::from(TransportError::Decode {
                operation: operation.to_string(),
                message: e.to_string(),
            })
        })
    }

    async fn request(
        &self,
        token: &str,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        operation: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .request(method, url)
            .header(SESSION_HEADER, token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::Disconnected(format!("{operation}: {e}"))
            } else {
                TransportError::Request {
                    operation: operation.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::GONE) {
            anyhow::bail!(TransportError::Disconnected(format!(
                "{operation}: bridge answered {status}"
            )));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|error| format!("<failed to read response body: {error}>"));
            anyhow::bail!(TransportError::Request {
                operation: operation.to_string(),
                message: format!("{status}: {body}"),
            });
        }
        Ok(response)
    }
}
