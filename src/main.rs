use anyhow::{Context, Result};
use dotenvy::dotenv;
use solr_search::{config, create_app, AppConfig, SearchService, SolrClient};
use sqlx::postgres::PgPoolOptions;
use std::env;
use std::net::SocketAddr;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig::from_env();
    let database_url =
        config::database_url().context("POSTGRES_URI or DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("Failed to create pool")?;

    let solr = SolrClient::new(&config.solr).context("Failed to build Solr client")?;
    if solr.ping().await? {
        info!("Solr core reachable at {}", solr.base_url());
    } else {
        warn!(
            "Solr core at {} did not answer a ping; searches will fail until it does",
            solr.base_url()
        );
    }

    let app = create_app(pool, solr, &config);

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
