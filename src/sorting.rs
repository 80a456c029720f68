//! Ordering and labelling of facet counts returned by Solr.

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{IndexError, Result};
use crate::registry::FieldRegistry;
use crate::solr::FacetCount;

/// Suffix Solr's dynamic string fields get when a field is auto-generated
/// rather than declared. Facet keys may come back as `slug` or `slug_s`, so
/// both spellings are checked. Consumers depend on this exact convention.
pub const AUTO_FIELD_SUFFIX: &str = "_s";

/// One facet field ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortedFacet {
    /// Key exactly as Solr returned it (`slug` or `slug_s`)
    pub key: String,
    pub values: Vec<FacetCount>,
}

/// Keep only configured, active facets, in admin order. Each facet is looked
/// up by its slug first and by `slug_s` second.
pub fn sort_facet_results(
    raw: &HashMap<String, Vec<FacetCount>>,
    registry: &FieldRegistry,
) -> Vec<SortedFacet> {
    registry
        .active_facets()
        .into_iter()
        .filter_map(|facet| {
            let suffixed = format!("{}{}", facet.slug, AUTO_FIELD_SUFFIX);
            [facet.slug.clone(), suffixed]
                .into_iter()
                .find_map(|key| raw.get(&key).map(|values| (key, values)))
        })
        .map(|(key, values)| SortedFacet {
            key,
            values: values.clone(),
        })
        .collect()
}

/// Human label for a facet key. Like [`sort_facet_results`], the key is
/// tried as a slug first and with the auto-generated suffix removed second.
pub fn key_to_label<'a>(key: &str, registry: &'a FieldRegistry) -> Result<&'a str> {
    registry
        .find_by_slug(key)
        .or_else(|| {
            key.strip_suffix(AUTO_FIELD_SUFFIX)
                .and_then(|slug| registry.find_by_slug(slug))
        })
        .map(|descriptor| descriptor.label.as_str())
        .ok_or_else(|| IndexError::UnknownField(key.to_string()))
}

/// Like [`key_to_label`], falling back to the raw key for unconfigured fields.
pub fn label_or_key(key: &str, registry: &FieldRegistry) -> String {
    key_to_label(key, registry)
        .map(str::to_string)
        .unwrap_or_else(|_| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDescriptor;

    fn facet(element_id: Option<i64>, slug: &str, label: &str, order: i32) -> FieldDescriptor {
        FieldDescriptor {
            element_id,
            slug: slug.to_string(),
            label: label.to_string(),
            is_displayed: true,
            is_facet: true,
            sort_order: order,
            element_set_name: None,
        }
    }

    fn counts(value: &str, count: u64) -> Vec<FacetCount> {
        vec![FacetCount {
            value: value.to_string(),
            count,
        }]
    }

    fn registry() -> FieldRegistry {
        FieldRegistry::new(vec![
            facet(Some(50), "title", "Title", 0),
            facet(None, "tag", "Tags", 1),
        ])
    }

    #[test]
    fn keeps_configured_facets_in_admin_order() {
        let raw = HashMap::from([
            ("unrelated".to_string(), counts("x", 1)),
            ("tag".to_string(), counts("maps", 4)),
            ("title_s".to_string(), counts("Monticello", 2)),
        ]);

        let sorted = sort_facet_results(&raw, &registry());
        let keys: Vec<&str> = sorted.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["title_s", "tag"]);
        assert_eq!(sorted[1].values, counts("maps", 4));
    }

    #[test]
    fn exact_slug_wins_over_suffixed_key() {
        let raw = HashMap::from([
            ("title".to_string(), counts("a", 1)),
            ("title_s".to_string(), counts("b", 1)),
        ]);

        let sorted = sort_facet_results(&raw, &registry());
        assert_eq!(sorted.len(), 1);
        assert_eq!(sorted[0].key, "title");
    }

    #[test]
    fn inactive_facets_are_not_shown() {
        let mut hidden = facet(Some(49), "subject", "Subject", 2);
        hidden.is_facet = false;
        let registry = FieldRegistry::new(vec![hidden]);
        let raw = HashMap::from([("subject".to_string(), counts("History", 3))]);

        assert!(sort_facet_results(&raw, &registry).is_empty());
    }

    #[test]
    fn labels_ignore_the_auto_suffix() {
        let registry = registry();
        assert_eq!(key_to_label("title_s", &registry).unwrap(), "Title");
        assert_eq!(key_to_label("tag", &registry).unwrap(), "Tags");
    }

    #[test]
    fn unknown_keys_are_an_error_with_a_fallback() {
        let registry = registry();
        assert!(matches!(
            key_to_label("creator_s", &registry),
            Err(IndexError::UnknownField(ref key)) if key == "creator_s"
        ));
        assert_eq!(label_or_key("creator_s", &registry), "creator_s");
    }

    #[test]
    fn slugs_ending_in_the_suffix_keep_their_label() {
        let registry = FieldRegistry::new(vec![
            facet(Some(40), "dates_s", "Dates", 0),
            facet(Some(38), "coverage", "Coverage", 1),
        ]);
        let raw = HashMap::from([
            ("dates_s".to_string(), counts("1820", 1)),
            ("coverage_s".to_string(), counts("Virginia", 2)),
        ]);

        let keys: Vec<String> = sort_facet_results(&raw, &registry)
            .into_iter()
            .map(|f| f.key)
            .collect();
        assert_eq!(keys, vec!["dates_s", "coverage_s"]);

        let labels: Vec<&str> = keys
            .iter()
            .map(|key| key_to_label(key, &registry).unwrap())
            .collect();
        assert_eq!(labels, vec!["Dates", "Coverage"]);
    }
}
