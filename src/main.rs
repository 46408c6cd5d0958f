use scrollback::fetcher::{window_start_ms, MessageFetcher};
use scrollback::jobs::FetchRequest;
use scrollback::transcript::format_transcript;
use scrollback::{config::Config, Data};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let data = Data::init(config)?;
    let token = data.config.discord_token.clone();

    let probe = MessageFetcher::connect(&data.config, &token, data.db.clone())?;
    if !probe.validate_token().await {
        error!("Discord token was rejected or the API is unreachable");
        anyhow::bail!("token validation failed");
    }
    info!("Discord token validated");

    let (Some(server_id), Some(channel_id)) =
        (data.config.server_id.clone(), data.config.channel_id.clone())
    else {
        warn!("SERVER_ID and CHANNEL_ID not set; nothing to fetch");
        return Ok(());
    };

    let lookback_hours = data.config.lookback_hours;
    let handle = data.fetch_queue.submit(FetchRequest {
        auth_token: token,
        server_id,
        channel_id: channel_id.clone(),
        lookback_hours,
    });
    let fetched = handle.await?;
    info!("Fetched {} messages from channel {}", fetched, channel_id);

    let since_ms = window_start_ms(lookback_hours);
    let window = data
        .db
        .run_blocking(move |db| db.get_messages_since(&channel_id, since_ms))
        .await?;
    info!(
        "{} messages stored for the last {} hours",
        window.len(),
        lookback_hours
    );

    let transcript = format_transcript(&window);
    if !transcript.is_empty() {
        println!("{}", transcript);
    }

    Ok(())
}
