//! Thin client for the parts of the Discord REST API the fetcher uses.

use crate::config::Config;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Status, headers and raw body of a single API call.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub status: u16,
    /// Header names are lower-cased.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.body)
    }
}

/// The remote side of a fetch. An `Err` means no response arrived at all
/// (connect failure, timeout, broken body).
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<ApiResponse>;
}

pub struct HttpChatApi {
    client: reqwest::Client,
    api_base: String,
    auth_token: String,
}

impl HttpChatApi {
    pub fn new(config: &Config, auth_token: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(config.http_connect_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
        })
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn get(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<ApiResponse> {
        let url = format!("{}{}", self.api_base, path);
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.auth_token)
            .query(query)
            .send()
            .await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// A message object as returned by `GET /channels/{id}/messages`.
/// Every field is optional so partial objects still decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub edited_timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthor {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

pub fn channel_messages_path(channel_id: &str) -> String {
    format!("/channels/{}/messages", channel_id)
}

pub const CURRENT_USER_PATH: &str = "/users/@me";
