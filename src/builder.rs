//! Record -> search document conversion.

use roxmltree::{Document, ParsingOptions};
use tracing::{debug, warn};

use crate::document::{document_id, SearchDocument};
use crate::error::{IndexError, Result};
use crate::records::{Catalog, CmsRecord};
use crate::registry::IndexSet;
use crate::uri::UriResolver;

/// Element id of Dublin Core "Title". Its values are also copied to `title`.
pub const TITLE_ELEMENT_ID: i64 = 50;

pub const TAG_FIELD: &str = "tag";
pub const COLLECTION_FIELD: &str = "collection";
pub const ITEM_TYPE_FIELD: &str = "itemtype";
pub const FULLTEXT_FIELD: &str = "fulltext";
pub const IMAGE_FIELD: &str = "image";
pub const TITLE_FIELD: &str = "title";

/// Converts records into documents against one configuration snapshot.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    index_set: IndexSet,
    catalog: Catalog,
    resolver: UriResolver,
}

impl DocumentBuilder {
    pub fn new(index_set: IndexSet, catalog: Catalog, resolver: UriResolver) -> Self {
        Self {
            index_set,
            catalog,
            resolver,
        }
    }

    /// Build the document for one record. Missing related data is left out of
    /// the document; only a record without an id is an error.
    pub fn build(&self, record: &CmsRecord) -> Result<SearchDocument> {
        let id = record.id.ok_or_else(|| IndexError::RecordIncomplete {
            model: record.model.clone(),
        })?;

        let mut doc = SearchDocument::new(document_id(&record.model, id));
        doc.set_field("model", record.model.as_str());
        doc.set_field("modelid", id);
        doc.set_field("url", self.resolver.resolve(&record.model, id, &record.kind));

        for text in &record.element_texts {
            if let Some(field) = self.index_set.field_for_element(text.element_id) {
                doc.add_multi(field, text.text.as_str());

                if text.element_id == TITLE_ELEMENT_ID {
                    doc.add_multi(TITLE_FIELD, text.text.as_str());
                }
            }
        }

        doc.add_multi("resulttype", record.model.as_str());

        if self.index_set.contains(TAG_FIELD) {
            for tag in &record.tags {
                doc.add_multi(TAG_FIELD, tag.as_str());
            }
        }

        if self.index_set.contains(COLLECTION_FIELD) {
            if let Some(collection_id) = record.collection_id.filter(|id| *id > 0) {
                match self.catalog.collection_name(collection_id) {
                    Some(name) => doc.set_field(COLLECTION_FIELD, name),
                    None => warn!(
                        "{} references missing collection {}",
                        doc.id, collection_id
                    ),
                }
            }
        }

        if self.index_set.contains(ITEM_TYPE_FIELD) {
            if let Some(item_type_id) = record.item_type_id.filter(|id| *id > 0) {
                match self.catalog.item_type_name(item_type_id) {
                    Some(name) => doc.set_field(ITEM_TYPE_FIELD, name),
                    None => warn!(
                        "{} references missing item type {}",
                        doc.id, item_type_id
                    ),
                }
            }
        }

        for file in &record.files {
            if file.has_derivative_image {
                doc.add_multi(IMAGE_FIELD, file.id);
            }
        }

        if self.index_set.contains(FULLTEXT_FIELD) {
            for xml in record.files.iter().filter_map(|f| f.xml.as_deref()) {
                for text in xml_text(xml) {
                    doc.add_multi(FULLTEXT_FIELD, text);
                }
            }
        }

        debug!("Built document {} with {} fields", doc.id, doc.fields.len());
        Ok(doc)
    }
}

/// Non-blank text and CDATA nodes of an XML body, whitespace runs collapsed.
/// A body that does not parse contributes nothing.
pub fn xml_text(xml: &str) -> Vec<String> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = match Document::parse_with_options(xml, options) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Skipping unparseable XML body: {}", e);
            return Vec::new();
        }
    };

    doc.descendants()
        .filter(|node| node.is_text())
        .filter_map(|node| node.text())
        .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|text| !text.is_empty())
        .collect()
}
