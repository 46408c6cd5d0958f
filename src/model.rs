use serde::{Deserialize, Serialize};

/// A channel message as persisted by the storage layer.
///
/// `timestamp` and `edited_ts` are milliseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub message_id: String,
    pub channel_id: String,
    pub server_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub timestamp: i64,
    pub edited_ts: Option<i64>,
}

impl StoredMessage {
    /// Records without a key, a channel, or a valid timestamp cannot be stored.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.message_id.is_empty() {
            anyhow::bail!("message has no id");
        }
        if self.channel_id.is_empty() {
            anyhow::bail!("message {} has no channel", self.message_id);
        }
        if self.timestamp < 0 {
            anyhow::bail!("message {} has no valid timestamp", self.message_id);
        }
        Ok(())
    }
}
