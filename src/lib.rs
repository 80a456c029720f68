use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

pub mod builder;
pub mod config;
pub mod document;
pub mod error;
pub mod facets;
pub mod indexer;
pub mod records;
pub mod registry;
pub mod solr;
pub mod sorting;
pub mod uri;

pub use config::AppConfig;
pub use document::SearchDocument;
pub use error::{IndexError, Result};
pub use facets::{FacetFilter, FacetQuery};
pub use indexer::{Indexer, IndexingReport, ReindexOptions};
pub use registry::{FacetTable, FieldRegistry, PgFacetTable};
pub use solr::{SearchService, SolrClient};

/// Path of the public results page, relative to the public base.
pub const RESULTS_PATH: &str = "/solr-search";

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ApiError>)>;

fn api_error(status: StatusCode, error: impl std::fmt::Display) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            error: error.to_string(),
        }),
    )
}

/// A filter currently applied to the results, with the link that drops it.
#[derive(Serialize, Debug)]
pub struct AppliedFilter {
    pub field: String,
    pub label: String,
    pub value: String,
    pub remove_url: String,
}

#[derive(Serialize, Debug)]
pub struct FacetValueLink {
    pub value: String,
    pub count: u64,
    pub add_url: String,
}

#[derive(Serialize, Debug)]
pub struct FacetGroup {
    pub key: String,
    pub label: String,
    pub values: Vec<FacetValueLink>,
}

#[derive(Serialize, Debug)]
pub struct SearchResponse {
    /// Link back to this result page with the same filters
    pub url: String,
    pub num_found: u64,
    pub limit: u32,
    pub offset: u32,
    pub docs: Vec<Value>,
    pub applied: Vec<AppliedFilter>,
    pub facets: Vec<FacetGroup>,
}

// ============================================================================
// Query Parameters
// ============================================================================

#[derive(Deserialize, Debug, Default)]
pub struct SearchParams {
    pub q: Option<String>,
    pub facet: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

// ============================================================================
// App State
// ============================================================================

#[derive(Clone)]
pub struct AppState {
    pub search: Arc<dyn SearchService>,
    pub facets: Arc<dyn FacetTable>,
    /// Base URL facet links are built against
    pub results_url: String,
}

// ============================================================================
// Router Setup
// ============================================================================

pub fn create_app(pool: Pool<Postgres>, solr: SolrClient, config: &AppConfig) -> Router {
    let state = AppState {
        search: Arc::new(solr),
        facets: Arc::new(PgFacetTable::new(pool, config.index.table_prefix.clone())),
        results_url: format!(
            "{}{}",
            config.index.public_base.trim_end_matches('/'),
            RESULTS_PATH
        ),
    };

    router(state)
}

/// Router over an already assembled state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/search", get(search))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_check() -> Json<Message> {
    Json(Message {
        message: "Solr search is running!".to_string(),
    })
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<SearchResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let offset = params.offset.unwrap_or(0);

    let registry = state.facets.snapshot().await.map_err(|e| {
        error!("Failed to load facet configuration: {}", e);
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e)
    })?;

    let query = FacetQuery::new(params.q.as_deref(), params.facet.as_deref());
    let results = state
        .search
        .query(&query.to_query_params(&registry, limit, offset))
        .await
        .map_err(|e| {
            error!("Search failed: {}", e);
            api_error(StatusCode::BAD_GATEWAY, format!("Search failed: {}", e))
        })?;

    let applied = query
        .facets
        .iter()
        .map(|f| AppliedFilter {
            field: f.field.clone(),
            label: sorting::label_or_key(&f.field, &registry),
            value: f.value.clone(),
            remove_url: query.remove_url(&state.results_url, &f.field, &f.value),
        })
        .collect();

    let facets = sorting::sort_facet_results(&results.facet_fields, &registry)
        .into_iter()
        .map(|facet| FacetGroup {
            label: sorting::label_or_key(&facet.key, &registry),
            values: facet
                .values
                .iter()
                .map(|v| FacetValueLink {
                    value: v.value.clone(),
                    count: v.count,
                    add_url: query.add_url(&state.results_url, &facet.key, &v.value),
                })
                .collect(),
            key: facet.key,
        })
        .collect();

    Ok(Json(SearchResponse {
        url: query.url(&state.results_url),
        num_found: results.num_found,
        limit,
        offset,
        docs: results.docs,
        applied,
        facets,
    }))
}
