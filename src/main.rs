use anyhow::Context;
use batch_service::{BatchOrchestrator, ProgressStore};
use database::Database;
use reddit_client::RedditClient;
use redpost_core::AppConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

const DEFAULT_LOG_FILTER: &str =
    "redpost=info,reddit_client=info,batch_service=info,web_api=info,database=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Starting Redpost - Reddit bulk poster");

    let config = AppConfig::load().context("failed to load configuration")?;

    let db = Database::connect(&config.database.url)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    db.run_migrations()
        .await
        .context("failed to run database migrations")?;

    let reddit = RedditClient::new(Arc::new(db.clone()), &config.reddit)
        .context("failed to build Reddit client")?;
    let store = Arc::new(ProgressStore::from_config(&config.batch));
    let orchestrator = BatchOrchestrator::new(Arc::new(reddit.clone()), store);

    let app = router(AppState::new(db, reddit, orchestrator, &config));

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!("Listening on {}", config.server.bind);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
