use crate::model::StoredMessage;
use chrono::{DateTime, Utc};

/// Renders messages as a plain chat log, one `[time] author: content` line
/// each, for summarization and topic prompts. Times are UTC.
/// Messages with blank content are left out.
pub fn format_transcript(messages: &[StoredMessage]) -> String {
    messages
        .iter()
        .filter(|msg| !msg.content.trim().is_empty())
        .filter_map(|msg| {
            let time = DateTime::<Utc>::from_timestamp_millis(msg.timestamp)?;
            let author = if msg.author_name.is_empty() {
                "Unknown User"
            } else {
                msg.author_name.as_str()
            };
            Some(format!(
                "[{}] {}: {}",
                time.format("%Y-%m-%d %H:%M:%S"),
                author,
                msg.content
            ))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(author: &str, content: &str, ts: i64) -> StoredMessage {
        StoredMessage {
            message_id: ts.to_string(),
            channel_id: "c1".to_string(),
            server_id: "s1".to_string(),
            author_id: "u1".to_string(),
            author_name: author.to_string(),
            content: content.to_string(),
            timestamp: ts,
            edited_ts: None,
        }
    }

    #[test]
    fn test_transcript_lines() {
        let messages = vec![
            msg("alice", "morning", 1_420_070_400_000),
            msg("bob", "   ", 1_420_070_401_000),
            msg("", "who am i", 1_420_070_462_000),
        ];
        assert_eq!(
            format_transcript(&messages),
            "[2015-01-01 00:00:00] alice: morning\n[2015-01-01 00:01:02] Unknown User: who am i"
        );
    }

    #[test]
    fn test_empty_transcript() {
        assert_eq!(format_transcript(&[]), "");
    }
}
