//! Fire-and-forget fetches. Callers submit a request, get a handle back
//! immediately, and read the results from the database later.

use crate::config::Config;
use crate::db::Database;
use crate::discord_api::{ChatApi, HttpChatApi};
use crate::fetcher::MessageFetcher;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Builds the API client for one caller-supplied token.
pub type ApiFactory = Arc<dyn Fn(&str) -> anyhow::Result<Arc<dyn ChatApi>> + Send + Sync>;

#[derive(Clone)]
pub struct FetchRequest {
    pub auth_token: String,
    pub server_id: String,
    pub channel_id: String,
    pub lookback_hours: u64,
}

impl std::fmt::Debug for FetchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchRequest")
            .field("auth_token", &"[REDACTED]")
            .field("server_id", &self.server_id)
            .field("channel_id", &self.channel_id)
            .field("lookback_hours", &self.lookback_hours)
            .finish()
    }
}

/// Runs at most `workers` fetches at once; extra submissions wait for a slot.
#[derive(Clone)]
pub struct FetchQueue {
    db: Database,
    api_factory: ApiFactory,
    permits: Arc<Semaphore>,
}

impl FetchQueue {
    pub fn new(config: &Config, db: Database) -> Self {
        let workers = config.fetch_workers;
        let config = config.clone();
        let api_factory: ApiFactory = Arc::new(move |token: &str| -> anyhow::Result<Arc<dyn ChatApi>> {
            let api: Arc<dyn ChatApi> = Arc::new(HttpChatApi::new(&config, token)?);
            Ok(api)
        });
        Self::with_api_factory(db, api_factory, workers)
    }

    pub fn with_api_factory(db: Database, api_factory: ApiFactory, workers: usize) -> Self {
        Self {
            db,
            api_factory,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Spawns the fetch and returns at once. The handle resolves to the
    /// number of messages fetched and may be dropped.
    pub fn submit(&self, request: FetchRequest) -> JoinHandle<usize> {
        let queue = self.clone();
        tokio::spawn(async move { queue.run(request).await })
    }

    async fn run(&self, request: FetchRequest) -> usize {
        let _permit = match self.permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Fetch queue closed: {}", e);
                return 0;
            }
        };

        let api = match (self.api_factory)(&request.auth_token) {
            Ok(api) => api,
            Err(e) => {
                error!(
                    "Channel {}: could not build API client: {}",
                    request.channel_id, e
                );
                return 0;
            }
        };

        info!("Starting background fetch: {:?}", request);
        MessageFetcher::new(api, self.db.clone())
            .fetch_and_store(
                &request.server_id,
                &request.channel_id,
                request.lookback_hours,
            )
            .await
    }
}
