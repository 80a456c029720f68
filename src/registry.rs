//! Admin-configured field table and the per-operation registry snapshot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;

use crate::error::Result;

/// Group name for fields that are not backed by a metadata element
/// (tags, collection, item type, full text).
pub const NON_ELEMENT_GROUP: &str = "Omeka Categories";

/// One indexable field as configured by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FieldDescriptor {
    /// Metadata element id; `None` or 0 for symbolic fields
    pub element_id: Option<i64>,
    /// Field name in the index, e.g. `subject`, `tag`, `collection`
    pub slug: String,
    pub label: String,
    pub is_displayed: bool,
    pub is_facet: bool,
    pub sort_order: i32,
    pub element_set_name: Option<String>,
}

impl FieldDescriptor {
    /// Source key: the element id when there is one, the slug otherwise.
    pub fn key(&self) -> String {
        match self.element_id {
            Some(id) if id > 0 => id.to_string(),
            _ => self.slug.clone(),
        }
    }

    fn is_indexed(&self) -> bool {
        self.is_displayed || self.is_facet
    }
}

/// Source key -> index field name, for every displayed or faceted field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexSet {
    fields: HashMap<String, String>,
}

impl IndexSet {
    /// Build from descriptors. A later descriptor with the same key silently
    /// replaces an earlier one.
    pub fn from_descriptors<'a>(descriptors: impl IntoIterator<Item = &'a FieldDescriptor>) -> Self {
        let mut fields = HashMap::new();
        for descriptor in descriptors.into_iter().filter(|d| d.is_indexed()) {
            fields.insert(descriptor.key(), descriptor.slug.clone());
        }
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn field_for_element(&self, element_id: i64) -> Option<&str> {
        self.get(&element_id.to_string())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for IndexSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Immutable snapshot of the field table, taken once per operation.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    descriptors: Vec<FieldDescriptor>,
}

impl FieldRegistry {
    pub fn new(descriptors: Vec<FieldDescriptor>) -> Self {
        Self { descriptors }
    }

    pub fn all_facets(&self) -> &[FieldDescriptor] {
        &self.descriptors
    }

    /// Fields flagged as facets, in admin sort order. Ties keep table order.
    pub fn active_facets(&self) -> Vec<&FieldDescriptor> {
        let mut active: Vec<&FieldDescriptor> =
            self.descriptors.iter().filter(|d| d.is_facet).collect();
        active.sort_by_key(|d| d.sort_order);
        active
    }

    pub fn index_set(&self) -> IndexSet {
        IndexSet::from_descriptors(&self.descriptors)
    }

    pub fn find_by_slug(&self, slug: &str) -> Option<&FieldDescriptor> {
        self.descriptors.iter().find(|d| d.slug == slug)
    }

    pub fn find_by_element(&self, element_id: i64) -> Option<&FieldDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.element_id == Some(element_id))
    }

    /// Descriptors grouped by element set name, groups in order of first
    /// appearance.
    pub fn group_by_element_set(&self) -> Vec<(String, Vec<&FieldDescriptor>)> {
        let mut groups: Vec<(String, Vec<&FieldDescriptor>)> = Vec::new();
        for descriptor in &self.descriptors {
            let set = descriptor
                .element_set_name
                .as_deref()
                .unwrap_or(NON_ELEMENT_GROUP);
            match groups.iter_mut().find(|(name, _)| name.as_str() == set) {
                Some((_, members)) => members.push(descriptor),
                None => groups.push((set.to_string(), vec![descriptor])),
            }
        }
        groups
    }
}

/// Read side of the admin field table.
#[async_trait]
pub trait FacetTable: Send + Sync {
    async fn all_facets(&self) -> Result<Vec<FieldDescriptor>>;

    /// Take a fresh snapshot. Never cached: configuration edits must show up
    /// on the next operation.
    async fn snapshot(&self) -> Result<FieldRegistry> {
        Ok(FieldRegistry::new(self.all_facets().await?))
    }
}

/// Field table stored alongside the CMS tables in PostgreSQL.
#[derive(Clone)]
pub struct PgFacetTable {
    pool: PgPool,
    table_prefix: String,
}

impl PgFacetTable {
    pub fn new(pool: PgPool, table_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            table_prefix: table_prefix.into(),
        }
    }
}

#[async_trait]
impl FacetTable for PgFacetTable {
    async fn all_facets(&self) -> Result<Vec<FieldDescriptor>> {
        let p = &self.table_prefix;
        let facets = sqlx::query_as::<Postgres, FieldDescriptor>(&format!(
            r#"
            SELECT f.element_id::BIGINT AS element_id, f.name AS slug, f.label,
                   f.is_displayed, f.is_facet, f.sort_order::INT AS sort_order,
                   es.name AS element_set_name
            FROM {p}solr_search_facets f
            LEFT JOIN {p}elements e ON e.id = f.element_id
            LEFT JOIN {p}element_sets es ON es.id = e.element_set_id
            ORDER BY f.id
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(facets)
    }
}
