//! Walks a channel's message history forward from a lookback cursor and
//! hands the collected batch to the database.

use crate::config::Config;
use crate::db::Database;
use crate::discord_api::{
    channel_messages_path, ApiResponse, ChatApi, HttpChatApi, RawMessage, CURRENT_USER_PATH,
};
use crate::model::StoredMessage;
use crate::rate_limit::RateLimitHeaders;
use crate::snowflake::{cursor_to_ms, iso_to_unix_ms, ms_to_cursor};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Largest page the messages endpoint returns.
pub const PAGE_LIMIT: u32 = 100;

const MS_PER_HOUR: i64 = 3_600_000;

/// Conditions that end pagination early. They are logged, never returned.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(anyhow::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("undecodable page: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Start of a window reaching `lookback_hours` back from now, in Unix ms.
/// Saturates instead of overflowing for absurd lookbacks.
pub fn window_start_ms(lookback_hours: u64) -> i64 {
    let lookback_ms = i64::try_from(lookback_hours)
        .unwrap_or(i64::MAX)
        .saturating_mul(MS_PER_HOUR);
    Utc::now().timestamp_millis().saturating_sub(lookback_ms)
}

enum PageOutcome {
    RateLimited(Duration),
    Page {
        messages: Vec<RawMessage>,
        limits: RateLimitHeaders,
    },
}

pub struct MessageFetcher {
    api: Arc<dyn ChatApi>,
    db: Database,
}

impl MessageFetcher {
    pub fn new(api: Arc<dyn ChatApi>, db: Database) -> Self {
        Self { api, db }
    }

    /// Fetcher backed by the real Discord API, authenticating with `auth_token`.
    pub fn connect(config: &Config, auth_token: &str, db: Database) -> anyhow::Result<Self> {
        let api = HttpChatApi::new(config, auth_token)?;
        Ok(Self::new(Arc::new(api), db))
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// True only when `/users/@me` answers 200.
    pub async fn validate_token(&self) -> bool {
        match self.api.get(CURRENT_USER_PATH, &[]).await {
            Ok(response) => {
                debug!("Token check returned status {}", response.status);
                response.status == 200
            }
            Err(e) => {
                debug!("Token check failed: {}", e);
                false
            }
        }
    }

    /// Fetches everything newer than `lookback_hours` ago and stores it.
    /// Returns how many messages were fetched, not how many were written.
    pub async fn fetch_and_store(
        &self,
        server_id: &str,
        channel_id: &str,
        lookback_hours: u64,
    ) -> usize {
        let messages = self
            .fetch_messages(server_id, channel_id, lookback_hours)
            .await;
        self.store(channel_id, messages).await
    }

    pub async fn fetch_and_store_since(
        &self,
        server_id: &str,
        channel_id: &str,
        since_ms: i64,
    ) -> usize {
        let messages = self
            .fetch_messages_since(server_id, channel_id, since_ms)
            .await;
        self.store(channel_id, messages).await
    }

    async fn store(&self, channel_id: &str, messages: Vec<StoredMessage>) -> usize {
        let fetched = messages.len();
        if fetched == 0 {
            info!("Channel {}: no messages fetched", channel_id);
            return 0;
        }

        match self
            .db
            .run_blocking(move |db| db.upsert_messages(&messages))
            .await
        {
            Ok(written) => info!(
                "Channel {}: fetched {} messages, stored {}",
                channel_id, fetched, written
            ),
            Err(e) => error!(
                "Channel {}: failed to store {} fetched messages: {}",
                channel_id, fetched, e
            ),
        }
        fetched
    }

    pub async fn fetch_messages(
        &self,
        server_id: &str,
        channel_id: &str,
        lookback_hours: u64,
    ) -> Vec<StoredMessage> {
        self.fetch_messages_since(server_id, channel_id, window_start_ms(lookback_hours))
            .await
    }

    /// Pages through `channel_id` starting at the first snowflake minted at
    /// `since_ms`. Stops on an empty page, a non-200 status other than 429,
    /// an undecodable body, or a transport error, keeping what it has.
    pub async fn fetch_messages_since(
        &self,
        server_id: &str,
        channel_id: &str,
        since_ms: i64,
    ) -> Vec<StoredMessage> {
        let path = channel_messages_path(channel_id);
        let mut after = ms_to_cursor(since_ms).to_string();
        let mut collected = Vec::new();
        let mut pages = 0usize;

        debug!(
            "Channel {}: fetching after cursor {} (window starts at {:?} ms)",
            channel_id,
            after,
            cursor_to_ms(&after)
        );

        loop {
            match self.fetch_page(&path, &after).await {
                Ok(PageOutcome::RateLimited(delay)) => {
                    warn!(
                        "Channel {}: rate limited, retrying in {:?}",
                        channel_id, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Ok(PageOutcome::Page { messages, limits }) => {
                    if messages.is_empty() {
                        break;
                    }
                    pages += 1;

                    let last_id = messages.last().and_then(|m| m.id.clone());
                    collected.extend(
                        messages
                            .iter()
                            .map(|raw| normalize(raw, server_id, channel_id)),
                    );

                    match last_id.filter(|id| !id.is_empty()) {
                        Some(id) => after = id,
                        None => {
                            warn!(
                                "Channel {}: last message on page {} has no id, stopping",
                                channel_id, pages
                            );
                            break;
                        }
                    }

                    if let Some(delay) = limits.preemptive_delay() {
                        debug!(
                            "Channel {}: {} requests left in bucket, pausing {:?}",
                            channel_id, limits.remaining, delay
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!("Channel {}: stopping pagination: {}", channel_id, e);
                    break;
                }
            }
        }

        debug!(
            "Channel {}: collected {} messages over {} pages",
            channel_id,
            collected.len(),
            pages
        );
        collected
    }

    async fn fetch_page(&self, path: &str, after: &str) -> Result<PageOutcome, FetchError> {
        let query = [
            ("after", after.to_string()),
            ("limit", PAGE_LIMIT.to_string()),
        ];
        let response: ApiResponse = self
            .api
            .get(path, &query)
            .await
            .map_err(FetchError::Transport)?;

        match response.status {
            429 => Ok(PageOutcome::RateLimited(
                RateLimitHeaders::from_response(&response).retry_delay(),
            )),
            200 => Ok(PageOutcome::Page {
                messages: response.json()?,
                limits: RateLimitHeaders::from_response(&response),
            }),
            status => Err(FetchError::Status(status)),
        }
    }
}

/// Maps an API message onto the stored shape. A missing or unparseable
/// timestamp becomes `-1`, which the database refuses to store.
pub fn normalize(raw: &RawMessage, server_id: &str, channel_id: &str) -> StoredMessage {
    let author = raw.author.as_ref();
    StoredMessage {
        message_id: raw.id.clone().unwrap_or_default(),
        channel_id: channel_id.to_string(),
        server_id: server_id.to_string(),
        author_id: author.and_then(|a| a.id.clone()).unwrap_or_default(),
        author_name: author.and_then(|a| a.username.clone()).unwrap_or_default(),
        content: raw.content.clone().unwrap_or_default(),
        timestamp: raw
            .timestamp
            .as_deref()
            .and_then(iso_to_unix_ms)
            .unwrap_or(-1),
        edited_ts: raw.edited_timestamp.as_deref().and_then(iso_to_unix_ms),
    }
}
