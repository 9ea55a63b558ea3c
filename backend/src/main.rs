//! Weather Scraper - entry point
//!
//! Runs one scrape cycle: loads configuration, connects to PostgreSQL,
//! fetches forecast and recent history for every active location and
//! upserts them into the `weather` table.

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use weather_scraper::{Config, PostgresWeatherStore, Scraper, TomorrowClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weather_scraper=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Running Tomorrow.io scraper");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect_with(config.database.connect_options()?)
        .await?;

    tracing::info!("Database connection established");

    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    let store = PostgresWeatherStore::with_policy(db_pool.clone(), config.storage.overwrite_policy);
    let client = TomorrowClient::from_config(&config.tomorrow)?;
    let scraper = Scraper::new(client, store);

    let summary = scraper.scrape().await?;
    tracing::info!(
        "Scrape complete: {} locations, {} forecast records, {} history records",
        summary.locations,
        summary.forecast_records,
        summary.history_records
    );

    db_pool.close().await;
    Ok(())
}
