//! Bulk and single-record indexing against a `SearchService`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::builder::DocumentBuilder;
use crate::config::IndexConfig;
use crate::document::{document_id, SearchDocument};
use crate::error::{IndexError, Result};
use crate::records::{Catalog, CmsRecord, RecordSource};
use crate::registry::FieldRegistry;
use crate::solr::{SearchService, MATCH_ALL};
use crate::uri::UriResolver;

/// Position in a paginated scan of public records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchCursor {
    pub offset: u64,
    pub page_size: u64,
    pub total_estimate: Option<u64>,
}

impl BatchCursor {
    pub fn new(page_size: u64, total_estimate: Option<u64>) -> Self {
        Self {
            offset: 0,
            page_size: page_size.max(1),
            total_estimate,
        }
    }

    /// Move past a page of `fetched` records. Returns `false` once a short
    /// (or empty) page shows the scan is exhausted.
    pub fn advance(&mut self, fetched: u64) -> bool {
        self.offset += fetched;
        fetched >= self.page_size
    }

    /// Percentage done, when the total is known.
    pub fn progress(&self) -> Option<f64> {
        self.total_estimate
            .filter(|total| *total > 0)
            .map(|total| (self.offset as f64 / total as f64) * 100.0)
    }
}

/// Component contributing documents outside the primary record model,
/// e.g. exhibits or simple pages.
#[async_trait]
pub trait AddonProducer: Send + Sync {
    fn name(&self) -> &str;

    async fn produce_documents(&self) -> Result<Vec<SearchDocument>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexOptions {
    /// Clear the whole index before the first batch (full rebuild)
    pub delete_first: bool,
}

/// Summary of one full reindex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexingReport {
    pub records_indexed: u64,
    pub records_skipped: u64,
    pub batches: u64,
    pub addon_documents: u64,
    pub deleted_first: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Fail with `SearchServiceUnavailable` unless the engine answers a ping.
pub async fn ensure_available(service: &dyn SearchService) -> Result<()> {
    match service.ping().await {
        Ok(true) => Ok(()),
        Ok(false) => Err(IndexError::SearchServiceUnavailable(
            "ping was not acknowledged".to_string(),
        )),
        Err(e) => Err(IndexError::SearchServiceUnavailable(e.to_string())),
    }
}

/// Remove every document from the index.
pub async fn delete_all(service: &dyn SearchService) -> Result<()> {
    service.delete_by_query(MATCH_ALL).await?;
    service.commit().await?;
    service.optimize().await
}

/// Runs reindex passes with a fixed configuration and set of addon producers.
pub struct Indexer {
    config: IndexConfig,
    addons: Vec<Box<dyn AddonProducer>>,
}

impl Indexer {
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            addons: Vec::new(),
        }
    }

    pub fn with_addon(mut self, addon: impl AddonProducer + 'static) -> Self {
        self.addons.push(Box::new(addon));
        self
    }

    fn builder(&self, registry: &FieldRegistry, catalog: Catalog) -> DocumentBuilder {
        DocumentBuilder::new(
            registry.index_set(),
            catalog,
            UriResolver::new(self.config.public_base.clone()),
        )
    }

    /// Reindex every public record, one add+commit per page, then addon
    /// documents as one last batch, then optimize.
    ///
    /// Nothing is written when the engine does not answer a ping. A failed
    /// batch is returned as `BatchSubmission` carrying the cursor offset; the
    /// run is not retried here.
    pub async fn reindex_all(
        &self,
        service: &dyn SearchService,
        source: &dyn RecordSource,
        registry: &FieldRegistry,
        options: ReindexOptions,
    ) -> Result<IndexingReport> {
        let started_at = Utc::now();
        ensure_available(service).await?;

        if options.delete_first {
            info!("Deleting all documents before reindexing");
            service.delete_by_query(MATCH_ALL).await?;
            service.commit().await?;
        }

        let builder = self.builder(registry, source.catalog().await?);
        let total = source.count_public().await?;
        let mut cursor = BatchCursor::new(self.config.page_size, total);

        if let Some(total) = total {
            info!("Total public records to index: {}", total);
        }

        let mut report = IndexingReport {
            records_indexed: 0,
            records_skipped: 0,
            batches: 0,
            addon_documents: 0,
            deleted_first: options.delete_first,
            started_at,
            finished_at: started_at,
        };

        loop {
            let records = source
                .fetch_public(cursor.offset, cursor.page_size)
                .await?;
            if records.is_empty() {
                break;
            }

            let fetched = records.len() as u64;
            let docs = build_page(&builder, &records, &mut report);
            submit_batch(service, &docs)
                .await
                .map_err(|e| e.at_offset(cursor.offset))?;

            report.records_indexed += docs.len() as u64;
            report.batches += 1;
            let more = cursor.advance(fetched);

            match cursor.progress() {
                Some(pct) => info!(
                    "Indexed batch of {} records (total: {}, {:.1}%)",
                    docs.len(),
                    report.records_indexed,
                    pct
                ),
                None => info!(
                    "Indexed batch of {} records (total: {})",
                    docs.len(),
                    report.records_indexed
                ),
            }

            if !more {
                break;
            }
        }

        let mut addon_docs = Vec::new();
        for addon in &self.addons {
            let docs = addon.produce_documents().await?;
            debug!("Addon {} produced {} documents", addon.name(), docs.len());
            addon_docs.extend(docs);
        }

        if !addon_docs.is_empty() {
            submit_batch(service, &addon_docs)
                .await
                .map_err(|e| e.at_offset(cursor.offset))?;
            report.addon_documents = addon_docs.len() as u64;
            report.batches += 1;
        }

        info!("Optimizing index...");
        service.optimize().await?;

        report.finished_at = Utc::now();
        info!(
            "Reindex complete: {} records, {} skipped, {} addon documents",
            report.records_indexed, report.records_skipped, report.addon_documents
        );

        Ok(report)
    }

    /// Index one record after it was saved, replacing its previous document.
    pub async fn index_record(
        &self,
        service: &dyn SearchService,
        record: &CmsRecord,
        registry: &FieldRegistry,
        catalog: Catalog,
    ) -> Result<()> {
        let doc = self.builder(registry, catalog).build(record)?;
        debug!("Indexing {}", doc.id);
        service.add_documents(std::slice::from_ref(&doc)).await?;
        service.commit().await
    }

    /// Remove one record's document, e.g. after deletion or when it was made
    /// private.
    pub async fn delete_record(
        &self,
        service: &dyn SearchService,
        model: &str,
        record_id: i64,
    ) -> Result<()> {
        let id = document_id(model, record_id);
        debug!("Removing {} from the index", id);
        service.delete_by_query(&format!("id:\"{}\"", id)).await?;
        service.commit().await
    }
}

fn build_page(
    builder: &DocumentBuilder,
    records: &[CmsRecord],
    report: &mut IndexingReport,
) -> Vec<SearchDocument> {
    let mut docs = Vec::with_capacity(records.len());
    for record in records {
        match builder.build(record) {
            Ok(doc) => docs.push(doc),
            Err(e) => {
                warn!("Skipping record: {}", e);
                report.records_skipped += 1;
            }
        }
    }
    docs
}

async fn submit_batch(service: &dyn SearchService, docs: &[SearchDocument]) -> Result<()> {
    if !docs.is_empty() {
        if let Err(e) = service.add_documents(docs).await {
            error!("Failed to submit {} documents: {}", docs.len(), e);
            return Err(e);
        }
    }
    service.commit().await
}
