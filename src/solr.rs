//! Search engine client: the `SearchService` seam and its Solr HTTP
//! implementation.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SolrConfig;
use crate::document::SearchDocument;
use crate::error::{IndexError, Result};

/// Query that matches every document.
pub const MATCH_ALL: &str = "*:*";

/// One value of a facet field and its hit count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub value: String,
    pub count: u64,
}

/// Parameters for a select request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryParams {
    pub q: String,
    /// Filter queries, each AND-ed with `q`
    pub fq: Vec<String>,
    pub facet_fields: Vec<String>,
    pub facet_mincount: u32,
    pub rows: u32,
    pub start: u32,
}

impl QueryParams {
    /// Flatten into request parameters, repeating `fq` and `facet.field`.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let q = if self.q.trim().is_empty() {
            MATCH_ALL.to_string()
        } else {
            self.q.clone()
        };

        let mut pairs = vec![
            ("q".to_string(), q),
            ("wt".to_string(), "json".to_string()),
            ("json.nl".to_string(), "arrarr".to_string()),
            ("rows".to_string(), self.rows.to_string()),
            ("start".to_string(), self.start.to_string()),
        ];
        pairs.extend(self.fq.iter().map(|fq| ("fq".to_string(), fq.clone())));

        if !self.facet_fields.is_empty() {
            pairs.push(("facet".to_string(), "true".to_string()));
            pairs.push((
                "facet.mincount".to_string(),
                self.facet_mincount.to_string(),
            ));
            pairs.extend(
                self.facet_fields
                    .iter()
                    .map(|f| ("facet.field".to_string(), f.clone())),
            );
        }

        pairs
    }
}

/// Hits plus facet counts keyed by facet field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub num_found: u64,
    pub docs: Vec<Value>,
    pub facet_fields: HashMap<String, Vec<FacetCount>>,
}

/// Operations the indexer and the results endpoint need from the engine.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn ping(&self) -> Result<bool>;
    async fn add_documents(&self, docs: &[SearchDocument]) -> Result<()>;
    async fn commit(&self) -> Result<()>;
    async fn optimize(&self) -> Result<()>;
    async fn delete_by_query(&self, query: &str) -> Result<()>;
    async fn query(&self, params: &QueryParams) -> Result<ResultSet>;
}

#[derive(Deserialize)]
struct SelectResponse {
    response: SelectHits,
    #[serde(default)]
    facet_counts: Option<FacetCounts>,
}

#[derive(Deserialize)]
struct SelectHits {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<Value>,
}

#[derive(Deserialize)]
struct FacetCounts {
    #[serde(default)]
    facet_fields: HashMap<String, Vec<(String, u64)>>,
}

#[derive(Deserialize)]
struct PingResponse {
    status: String,
}

/// Solr core reached over its JSON HTTP API.
#[derive(Clone)]
pub struct SolrClient {
    client: reqwest::Client,
    base_url: String,
}

impl SolrClient {
    pub fn new(config: &SolrConfig) -> Result<Self> {
        Self::with_base_url(config.core_url(), Duration::from_secs(config.timeout_secs))
    }

    /// Client for an explicit core URL such as `http://host:8983/solr/core`.
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn update<T: Serialize + ?Sized>(&self, body: &T) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/update", self.base_url))
            .query(&[("wt", "json")])
            .json(body)
            .send()
            .await?;

        check_status(response).await.map(|_| ())
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(IndexError::Solr {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SearchService for SolrClient {
    async fn ping(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/admin/ping", self.base_url))
            .query(&[("wt", "json")])
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!("Solr ping failed: {}", e);
                return Ok(false);
            }
        };

        if response.status() != StatusCode::OK {
            warn!("Solr ping returned {}", response.status());
            return Ok(false);
        }

        let ping: PingResponse = response.json().await?;
        Ok(ping.status.eq_ignore_ascii_case("ok"))
    }

    async fn add_documents(&self, docs: &[SearchDocument]) -> Result<()> {
        debug!("Submitting {} documents", docs.len());
        self.update(docs).await
    }

    async fn commit(&self) -> Result<()> {
        self.update(&json!({ "commit": {} })).await
    }

    async fn optimize(&self) -> Result<()> {
        self.update(&json!({ "optimize": {} })).await
    }

    async fn delete_by_query(&self, query: &str) -> Result<()> {
        self.update(&json!({ "delete": { "query": query } })).await
    }

    async fn query(&self, params: &QueryParams) -> Result<ResultSet> {
        let response = self
            .client
            .get(format!("{}/select", self.base_url))
            .query(&params.to_pairs())
            .send()
            .await?;

        let parsed: SelectResponse = check_status(response).await?.json().await?;

        let facet_fields = parsed
            .facet_counts
            .map(|counts| {
                counts
                    .facet_fields
                    .into_iter()
                    .map(|(field, values)| {
                        let values = values
                            .into_iter()
                            .map(|(value, count)| FacetCount { value, count })
                            .collect();
                        (field, values)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResultSet {
            num_found: parsed.response.num_found,
            docs: parsed.response.docs,
            facet_fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_query_matches_everything() {
        let params = QueryParams {
            q: "  ".to_string(),
            rows: 10,
            ..QueryParams::default()
        };

        let pairs = params.to_pairs();
        assert!(pairs.contains(&("q".to_string(), MATCH_ALL.to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "facet"));
    }

    #[test]
    fn filters_and_facet_fields_repeat() {
        let params = QueryParams {
            q: "jefferson".to_string(),
            fq: vec![r#"subject:"History""#.to_string(), r#"tag:"maps""#.to_string()],
            facet_fields: vec!["subject".to_string(), "tag".to_string()],
            facet_mincount: 1,
            rows: 20,
            start: 40,
        };

        let pairs = params.to_pairs();
        let fq: Vec<&str> = pairs
            .iter()
            .filter(|(k, _)| k == "fq")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(fq, vec![r#"subject:"History""#, r#"tag:"maps""#]);
        assert_eq!(pairs.iter().filter(|(k, _)| k == "facet.field").count(), 2);
        assert!(pairs.contains(&("start".to_string(), "40".to_string())));
    }
}
