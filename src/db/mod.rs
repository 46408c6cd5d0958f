use crate::config::Config;
use crate::model::StoredMessage;
use rusqlite::{Connection, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

const SCHEMA: &str = include_str!("schema.sql");

const SELECT_COLUMNS: &str = "SELECT message_id, channel_id, server_id, author_id, author_name, content, timestamp, edited_ts FROM messages";

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Self::open(&config.database_url)
    }

    pub fn open(path: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;
        if path != ":memory:" {
            conn.pragma_update(None, "journal_mode", "WAL")?;
        }
        info!("Database: opened {}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("Database lock poisoned: {}", e))
    }

    pub fn execute_init(&self) -> anyhow::Result<()> {
        info!("Database: Initializing schema...");
        let conn = self.lock()?;
        conn.execute_batch(SCHEMA)?;
        debug!("Database: Schema initialized successfully");
        Ok(())
    }

    /// Runs `f` on the blocking thread pool with a clone of this handle.
    pub async fn run_blocking<F, T>(&self, f: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db)).await?
    }

    /// Inserts or overwrites each message by `message_id`.
    ///
    /// Invalid records and rows SQLite rejects are skipped; the batch keeps
    /// going and the return value counts only the rows written.
    pub fn upsert_messages(&self, messages: &[StoredMessage]) -> anyhow::Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut written = 0usize;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO messages
                    (message_id, channel_id, server_id, author_id, author_name, content, timestamp, edited_ts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(message_id) DO UPDATE SET
                    channel_id = excluded.channel_id,
                    server_id = excluded.server_id,
                    author_id = excluded.author_id,
                    author_name = excluded.author_name,
                    content = excluded.content,
                    timestamp = excluded.timestamp,
                    edited_ts = excluded.edited_ts",
            )?;

            for msg in messages {
                if let Err(e) = msg.validate() {
                    debug!("Database: Skipping malformed message: {}", e);
                    continue;
                }
                match stmt.execute((
                    &msg.message_id,
                    &msg.channel_id,
                    &msg.server_id,
                    &msg.author_id,
                    &msg.author_name,
                    &msg.content,
                    msg.timestamp,
                    msg.edited_ts,
                )) {
                    Ok(_) => written += 1,
                    Err(e) => warn!("Database: Failed to write message {}: {}", msg.message_id, e),
                }
            }
        }
        tx.commit()?;

        debug!(
            "Database: Upserted {}/{} messages",
            written,
            messages.len()
        );
        Ok(written)
    }

    /// Messages in `channel_id` at or after `since_ms`, oldest first.
    pub fn get_messages_since(
        &self,
        channel_id: &str,
        since_ms: i64,
    ) -> anyhow::Result<Vec<StoredMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE channel_id = ?1 AND timestamp >= ?2 ORDER BY timestamp ASC, rowid ASC"
        ))?;
        let rows = stmt.query_map((channel_id, since_ms), row_to_message)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// The newest `limit` messages of a channel within a server, newest first.
    pub fn get_recent_messages(
        &self,
        channel_id: &str,
        server_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<StoredMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE channel_id = ?1 AND server_id = ?2 ORDER BY timestamp DESC, rowid DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map((channel_id, server_id, limit as i64), row_to_message)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Like [`Database::get_recent_messages`] without the server filter.
    pub fn get_channel_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<StoredMessage>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE channel_id = ?1 ORDER BY timestamp DESC, rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map((channel_id, limit as i64), row_to_message)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    pub fn count_messages(&self, channel_id: &str) -> anyhow::Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE channel_id = ?1",
            [channel_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        message_id: row.get(0)?,
        channel_id: row.get(1)?,
        server_id: row.get(2)?,
        author_id: row.get(3)?,
        author_name: row.get(4)?,
        content: row.get(5)?,
        timestamp: row.get(6)?,
        edited_ts: row.get(7)?,
    })
}
