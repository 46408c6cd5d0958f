use dotenvy::dotenv;
use std::env;

pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Clone)]
pub struct Config {
    pub discord_token: String,
    pub server_id: Option<String>,
    pub channel_id: Option<String>,
    pub api_base: String,
    pub database_url: String,
    // Fetch window
    pub lookback_hours: u64,
    // Timeout settings
    pub http_timeout_secs: u64,
    pub http_connect_timeout_secs: u64,
    // Background fetch pool
    pub fetch_workers: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            server_id: env::var("SERVER_ID").ok().filter(|s| !s.is_empty()),
            channel_id: env::var("CHANNEL_ID").ok().filter(|s| !s.is_empty()),
            api_base: env::var("DISCORD_API_BASE")
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "discord_messages.db".to_string()),
            lookback_hours: env::var("LOOKBACK_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .unwrap_or(15),
            http_connect_timeout_secs: env::var("HTTP_CONNECT_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            fetch_workers: env::var("FETCH_WORKERS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .ok()
                .filter(|n| *n > 0)
                .unwrap_or(2),
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("server_id", &self.server_id)
            .field("channel_id", &self.channel_id)
            .field("api_base", &self.api_base)
            .field("database_url", &self.database_url)
            .field("lookback_hours", &self.lookback_hours)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field(
                "http_connect_timeout_secs",
                &self.http_connect_timeout_secs,
            )
            .field("fetch_workers", &self.fetch_workers)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        discord_token: "test".to_string(),
        server_id: Some("s1".to_string()),
        channel_id: Some("c1".to_string()),
        api_base: DEFAULT_API_BASE.to_string(),
        database_url: ":memory:".to_string(),
        lookback_hours: 24,
        http_timeout_secs: 15,
        http_connect_timeout_secs: 10,
        fetch_workers: 2,
    }
}
