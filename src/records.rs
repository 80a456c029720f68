//! CMS records as seen by the indexer, and the paginated record source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;

use crate::error::Result;

pub const ITEM_MODEL: &str = "Item";
pub const SIMPLE_PAGE_MODEL: &str = "SimplePagesPage";
pub const EXHIBIT_MODEL: &str = "Exhibit";
pub const EXHIBIT_PAGE_MODEL: &str = "ExhibitPage";

/// One metadata value attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ElementText {
    pub element_id: i64,
    pub text: String,
}

/// A file attached to a record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: i64,
    pub has_derivative_image: bool,
    /// XML body for full-text indexing, when the source loads it
    pub xml: Option<String>,
}

/// A sluggable parent record, e.g. the exhibit that owns an exhibit page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlugRef {
    pub model: String,
    pub slug: String,
}

/// How a record's public URL is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    /// Flat page addressed directly by its slug
    Page { slug: String },
    /// Page nested under an exhibit
    ExhibitPage { slug: String, exhibit: SlugRef },
    /// Any other record with a slug, routed as `/<controller>/show/<slug>`
    Sluggable { slug: String },
    /// Routed by id as `/<controller>/show/<id>`
    Fallback,
}

impl RecordKind {
    /// Pick the URL strategy from the record's model and what it carries.
    pub fn classify(model: &str, slug: Option<String>, exhibit: Option<SlugRef>) -> Self {
        match (model, slug, exhibit) {
            (SIMPLE_PAGE_MODEL, Some(slug), _) => RecordKind::Page { slug },
            (_, Some(slug), Some(exhibit)) => RecordKind::ExhibitPage { slug, exhibit },
            (_, Some(slug), None) => RecordKind::Sluggable { slug },
            (_, None, _) => RecordKind::Fallback,
        }
    }
}

/// A record plus the related data the document builder reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CmsRecord {
    pub model: String,
    pub id: Option<i64>,
    pub kind: RecordKind,
    pub element_texts: Vec<ElementText>,
    pub tags: Vec<String>,
    pub collection_id: Option<i64>,
    pub item_type_id: Option<i64>,
    pub files: Vec<FileAttachment>,
}

impl CmsRecord {
    pub fn new(model: impl Into<String>, id: Option<i64>, kind: RecordKind) -> Self {
        Self {
            model: model.into(),
            id,
            kind,
            element_texts: Vec::new(),
            tags: Vec::new(),
            collection_id: None,
            item_type_id: None,
            files: Vec::new(),
        }
    }

    /// An item, routed by id.
    pub fn item(id: i64) -> Self {
        Self::new(ITEM_MODEL, Some(id), RecordKind::Fallback)
    }

    pub fn with_text(mut self, element_id: i64, text: impl Into<String>) -> Self {
        self.element_texts.push(ElementText {
            element_id,
            text: text.into(),
        });
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Names of the entities records point at by foreign key, loaded once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub collections: HashMap<i64, String>,
    pub item_types: HashMap<i64, String>,
}

impl Catalog {
    pub fn collection_name(&self, id: i64) -> Option<&str> {
        self.collections.get(&id).map(String::as_str)
    }

    pub fn item_type_name(&self, id: i64) -> Option<&str> {
        self.item_types.get(&id).map(String::as_str)
    }
}

/// Paginated read access to public records, ordered by id ascending.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Total number of public records, if cheap to know. Used for progress only.
    async fn count_public(&self) -> Result<Option<u64>> {
        Ok(None)
    }

    async fn fetch_public(&self, offset: u64, limit: u64) -> Result<Vec<CmsRecord>>;

    async fn catalog(&self) -> Result<Catalog>;
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: i64,
    collection_id: Option<i64>,
    item_type_id: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct ElementTextRow {
    record_id: i64,
    element_id: i64,
    text: String,
}

#[derive(sqlx::FromRow)]
struct TagRow {
    record_id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: i64,
    item_id: i64,
    has_derivative_image: bool,
}

/// Public items read straight from the CMS tables.
#[derive(Clone)]
pub struct PgRecordSource {
    pool: PgPool,
    table_prefix: String,
}

impl PgRecordSource {
    pub fn new(pool: PgPool, table_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            table_prefix: table_prefix.into(),
        }
    }

    async fn names(&self, table: &str) -> Result<HashMap<i64, String>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(&format!(
            "SELECT id::BIGINT, name FROM {}{}",
            self.table_prefix, table
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn count_public(&self) -> Result<Option<u64>> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {}items WHERE public = TRUE",
            self.table_prefix
        ))
        .fetch_one(&self.pool)
        .await?;

        Ok(Some(count.max(0) as u64))
    }

    async fn fetch_public(&self, offset: u64, limit: u64) -> Result<Vec<CmsRecord>> {
        let p = &self.table_prefix;

        let items = sqlx::query_as::<Postgres, ItemRow>(&format!(
            r#"
            SELECT id::BIGINT AS id, collection_id::BIGINT AS collection_id,
                   item_type_id::BIGINT AS item_type_id
            FROM {p}items
            WHERE public = TRUE
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        if items.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();

        let texts = sqlx::query_as::<Postgres, ElementTextRow>(&format!(
            r#"
            SELECT record_id::BIGINT AS record_id, element_id::BIGINT AS element_id, text
            FROM {p}element_texts
            WHERE record_type = 'Item' AND record_id = ANY($1)
            ORDER BY id
            "#
        ))
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let tags = sqlx::query_as::<Postgres, TagRow>(&format!(
            r#"
            SELECT rt.record_id::BIGINT AS record_id, t.name
            FROM {p}records_tags rt
            JOIN {p}tags t ON t.id = rt.tag_id
            WHERE rt.record_type = 'Item' AND rt.record_id = ANY($1)
            ORDER BY t.name
            "#
        ))
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let files = sqlx::query_as::<Postgres, FileRow>(&format!(
            r#"
            SELECT id::BIGINT AS id, item_id::BIGINT AS item_id,
                   has_derivative_image
            FROM {p}files
            WHERE item_id = ANY($1)
            ORDER BY "order" NULLS LAST, id
            "#
        ))
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut texts_by_item: HashMap<i64, Vec<ElementText>> = HashMap::new();
        for row in texts {
            texts_by_item.entry(row.record_id).or_default().push(ElementText {
                element_id: row.element_id,
                text: row.text,
            });
        }

        let mut tags_by_item: HashMap<i64, Vec<String>> = HashMap::new();
        for row in tags {
            tags_by_item.entry(row.record_id).or_default().push(row.name);
        }

        let mut files_by_item: HashMap<i64, Vec<FileAttachment>> = HashMap::new();
        for row in files {
            files_by_item.entry(row.item_id).or_default().push(FileAttachment {
                id: row.id,
                has_derivative_image: row.has_derivative_image,
                xml: None,
            });
        }

        let records = items
            .into_iter()
            .map(|item| CmsRecord {
                model: ITEM_MODEL.to_string(),
                id: Some(item.id),
                kind: RecordKind::Fallback,
                element_texts: texts_by_item.remove(&item.id).unwrap_or_default(),
                tags: tags_by_item.remove(&item.id).unwrap_or_default(),
                collection_id: item.collection_id,
                item_type_id: item.item_type_id,
                files: files_by_item.remove(&item.id).unwrap_or_default(),
            })
            .collect();

        Ok(records)
    }

    async fn catalog(&self) -> Result<Catalog> {
        Ok(Catalog {
            collections: self.names("collections").await?,
            item_types: self.names("item_types").await?,
        })
    }
}
