//! Runtime configuration, read once from the environment and passed
//! explicitly into every operation.

use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_SOLR_HOST: &str = "localhost";
pub const DEFAULT_SOLR_PORT: u16 = 8983;
pub const DEFAULT_SOLR_CORE: &str = "omeka";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const DEFAULT_TABLE_PREFIX: &str = "omeka_";

/// Connection settings for the Solr core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolrConfig {
    pub host: String,
    pub port: u16,
    pub core: String,
    pub timeout_secs: u64,
}

impl Default for SolrConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SOLR_HOST.to_string(),
            port: DEFAULT_SOLR_PORT,
            core: DEFAULT_SOLR_CORE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Partial connection settings, e.g. from CLI flags or an admin form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SolrOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub core: Option<String>,
}

impl SolrConfig {
    /// Read `SOLR_SEARCH_HOST`, `SOLR_SEARCH_PORT`, `SOLR_SEARCH_CORE` and
    /// `SOLR_SEARCH_TIMEOUT`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env::var("SOLR_SEARCH_HOST").unwrap_or(defaults.host),
            port: env_parse("SOLR_SEARCH_PORT").unwrap_or(defaults.port),
            core: env::var("SOLR_SEARCH_CORE").unwrap_or(defaults.core),
            timeout_secs: env_parse("SOLR_SEARCH_TIMEOUT").unwrap_or(defaults.timeout_secs),
        }
    }

    /// Apply overrides on top of this config. Absent values keep the base.
    pub fn merged(&self, overrides: &SolrOverrides) -> Self {
        Self {
            host: overrides.host.clone().unwrap_or_else(|| self.host.clone()),
            port: overrides.port.unwrap_or(self.port),
            core: overrides.core.clone().unwrap_or_else(|| self.core.clone()),
            timeout_secs: self.timeout_secs,
        }
    }

    /// Base URL of the core, e.g. `http://localhost:8983/solr/omeka`.
    pub fn core_url(&self) -> String {
        let core = self.core.trim_matches('/');
        format!("http://{}:{}/solr/{}", self.host, self.port, core)
    }
}

/// Settings for reading records and resolving their public URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Records fetched and submitted per batch
    pub page_size: u64,
    /// Prefix of the CMS tables, e.g. `omeka_items`
    pub table_prefix: String,
    /// Path the public site is mounted under (empty for the web root)
    pub public_base: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            public_base: String::new(),
        }
    }
}

impl IndexConfig {
    /// Read `SOLR_SEARCH_PAGE_SIZE`, `OMEKA_TABLE_PREFIX` and `OMEKA_PUBLIC_BASE`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            page_size: env_parse("SOLR_SEARCH_PAGE_SIZE")
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            table_prefix: env::var("OMEKA_TABLE_PREFIX").unwrap_or(defaults.table_prefix),
            public_base: env::var("OMEKA_PUBLIC_BASE").unwrap_or(defaults.public_base),
        }
    }
}

/// Everything the server and the reindex binary need.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub solr: SolrConfig,
    pub index: IndexConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            solr: SolrConfig::from_env(),
            index: IndexConfig::from_env(),
        }
    }
}

/// Database URL from `POSTGRES_URI`, or `DATABASE_URL` as a fallback.
pub fn database_url() -> Option<String> {
    env::var("POSTGRES_URI")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
