pub mod config;
pub mod db;
pub mod discord_api;
pub mod fetcher;
pub mod jobs;
pub mod model;
pub mod rate_limit;
pub mod snowflake;
pub mod transcript;

/// Long-lived handles shared by every fetch and query
pub struct Data {
    pub config: config::Config,
    pub db: db::Database,
    pub fetch_queue: jobs::FetchQueue,
}

impl Data {
    /// Opens storage and prepares the fetch pool. Storage failures are fatal.
    pub fn init(config: config::Config) -> anyhow::Result<Self> {
        let db = db::Database::new(&config)?;
        db.execute_init()?;
        let fetch_queue = jobs::FetchQueue::new(&config, db.clone());

        Ok(Self {
            config,
            db,
            fetch_queue,
        })
    }
}
