//! Reindex public CMS records into Solr
//!
//! Reads every public item from PostgreSQL, converts it with the current facet
//! configuration and submits it to the configured Solr core in batches.
//!
//! Usage:
//!     solr_reindex
//!     solr_reindex --delete-first --page-size 500
//!     solr_reindex --host solr.internal --core omeka_test
//!     solr_reindex --delete-all

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use solr_search::config::{self, AppConfig, SolrOverrides};
use solr_search::indexer::{self, Indexer, ReindexOptions};
use solr_search::records::PgRecordSource;
use solr_search::registry::{FacetTable, PgFacetTable};
use solr_search::solr::SolrClient;

/// CLI arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Reindex public CMS records into Solr",
    long_about = "Rebuilds the Solr index from the CMS database.\n\
                  Connection settings come from SOLR_SEARCH_* variables unless overridden here."
)]
struct Args {
    /// Solr host (overrides SOLR_SEARCH_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Solr port (overrides SOLR_SEARCH_PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Solr core (overrides SOLR_SEARCH_CORE)
    #[arg(long)]
    core: Option<String>,

    /// Records per batch (overrides SOLR_SEARCH_PAGE_SIZE)
    #[arg(long)]
    page_size: Option<u64>,

    /// Public site base path used for document URLs
    #[arg(long)]
    public_base: Option<String>,

    /// Delete every document before reindexing
    #[arg(long, alias = "force", default_value_t = false)]
    delete_first: bool,

    /// Only clear the index, do not reindex
    #[arg(long, default_value_t = false, conflicts_with = "delete_first")]
    delete_all: bool,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::from_env();
    config.solr = config.solr.merged(&SolrOverrides {
        host: args.host,
        port: args.port,
        core: args.core,
    });
    if let Some(page_size) = args.page_size.filter(|size| *size > 0) {
        config.index.page_size = page_size;
    }
    if let Some(public_base) = args.public_base {
        config.index.public_base = public_base;
    }

    let solr = SolrClient::new(&config.solr).context("Failed to build Solr client")?;
    info!("Using Solr core at {}", solr.base_url());

    if args.delete_all {
        indexer::ensure_available(&solr).await?;
        indexer::delete_all(&solr).await?;
        info!("Index cleared");
        return Ok(());
    }

    // Connect to database
    let database_url =
        config::database_url().context("POSTGRES_URI or DATABASE_URL must be set")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    info!("Connected to database");

    let registry = PgFacetTable::new(pool.clone(), config.index.table_prefix.clone())
        .snapshot()
        .await
        .context("Failed to load facet configuration")?;
    info!(
        "{} fields configured, {} active facets",
        registry.all_facets().len(),
        registry.active_facets().len()
    );

    let source = PgRecordSource::new(pool, config.index.table_prefix.clone());
    let report = Indexer::new(config.index.clone())
        .reindex_all(
            &solr,
            &source,
            &registry,
            ReindexOptions {
                delete_first: args.delete_first,
            },
        )
        .await
        .context("Reindex failed")?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
