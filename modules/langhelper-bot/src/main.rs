use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use langhelper_bot::cli::Cli;
use langhelper_bot::dispatch::{Dispatcher, Handlers};
use langhelper_bot::export::{DatabaseFile, Exporter};
use langhelper_bot::feed::FeedConnector;
use langhelper_bot::supervisor::Supervisor;
use langhelper_store::SqliteStore;
use telegram_client::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let working_dir = std::env::current_dir().context("Failed to read working directory")?;

    // Loaded before logging is up, reported right after.
    let env_file = cli.env_file(&working_dir);
    let env_loaded = dotenvy::from_path(&env_file);

    let env_token = std::env::var("BOT_TOKEN").ok();
    let config = cli.into_config(&working_dir, env_token)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Langhelper bot starting...");
    match env_loaded {
        Ok(_) => info!(path = %env_file.display(), "Loaded .env file"),
        Err(e) => warn!(path = %env_file.display(), error = %e, "Could not load .env file"),
    }
    config.log_redacted();

    let store = SqliteStore::connect(&config.db_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.db_path.display()))?;
    store.migrate().await?;

    let client = Arc::new(TelegramClient::new(&config.bot_token, config.request_timeout)?);
    info!(
        poll_timeout_secs = client.poll_timeout().as_secs(),
        "Telegram client ready"
    );

    let feed = Arc::new(FeedConnector::new(client.clone(), config.fetch_limit));
    let handlers = Handlers::new(Arc::new(store), client.clone());
    let dispatcher = Arc::new(Dispatcher::new(feed.clone(), handlers));

    let exporter = config.export.as_ref().map(|export| {
        Arc::new(Exporter::new(
            feed.clone(),
            Arc::new(DatabaseFile::new(config.db_path.clone())),
            client.clone(),
            export.recipient,
            export.interval,
        ))
    });

    if let Err(e) = Supervisor::new(feed, dispatcher, exporter).run().await {
        let detail = format!("{e:#}");
        error!(error = detail.as_str(), "Shut down with failures");
        std::process::exit(1);
    }

    info!("Langhelper bot stopped");
    Ok(())
}
