use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokenwatch::{
    config::{AppConfig, ConfigLoader},
    http_client::{HttpClientPool, RateLimitedClient},
    models::CollectionConfig,
    notification::{DiscordWebhookNotifier, Notifier, StdoutNotifier},
    persistence::sqlite::SqliteStateRepository,
    sources::{ActivitySource, MagicEdenSource, OpenSeaSource},
    supervisor::Supervisor,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding app.yaml and collections.yaml.
    #[arg(long, default_value = "configs")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the activity monitor.
    Run {
        /// Print emitted events to stdout instead of posting webhooks.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { dry_run } => run_monitor(&cli.config_dir, dry_run).await?,
    }

    Ok(())
}

async fn run_monitor(config_dir: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!(config_dir, "Loading application configuration...");
    let config = AppConfig::new(Some(config_dir))?;
    tracing::debug!(database_url = %config.database_url, "Configuration loaded.");

    let repo = Arc::new(SqliteStateRepository::new(&config.database_url).await?);
    repo.run_migrations().await?;
    tracing::info!("Database migrations completed.");

    let collections: Vec<CollectionConfig> =
        ConfigLoader::new(config.collections_config_path.clone()).load("collections")?;
    tracing::info!(count = collections.len(), "Loaded collection configurations.");

    let pool = HttpClientPool::new();
    let http_client = pool.get_or_create(&config.http_retry_config).await?;
    let rate_limited = RateLimitedClient::new(
        Arc::clone(&http_client),
        config.http_retry_config.retry_after_cap_secs,
    );

    let primary: Arc<dyn ActivitySource> = Arc::new(MagicEdenSource::new(
        config.magic_eden_base_url.clone(),
        rate_limited.clone(),
    ));

    let secondary: Option<Arc<dyn ActivitySource>> = match &config.opensea_api_key {
        Some(api_key) => {
            tracing::info!("OpenSea API key configured; secondary source enabled.");
            Some(Arc::new(OpenSeaSource::new(
                config.opensea_base_url.clone(),
                api_key.clone(),
                rate_limited,
            )))
        }
        None => {
            tracing::info!("No OpenSea API key configured; secondary source disabled.");
            None
        }
    };

    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(StdoutNotifier)
    } else {
        Arc::new(DiscordWebhookNotifier::new(http_client))
    };

    let supervisor = Supervisor::builder()
        .config(config)
        .state(Arc::clone(&repo))
        .collections(collections)
        .primary_source(primary)
        .secondary_source(secondary)
        .notifier(notifier)
        .build()?;

    tracing::info!("Supervisor initialized, starting monitoring...");
    supervisor.run().await?;

    repo.close().await;
    Ok(())
}
