//! Facet filters carried in result URLs.
//!
//! The `facet` request parameter holds `field:"value"` pairs joined by
//! ` AND `, e.g. `subject:"History" AND type:"Photograph"`. Anything that does
//! not match the pair grammar is ignored, so a mangled URL degrades to fewer
//! filters instead of an error page.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::registry::FieldRegistry;
use crate::solr::QueryParams;

pub const FACET_PARAM: &str = "facet";
pub const QUERY_PARAM: &str = "q";
pub const CONJUNCTION: &str = " AND ";

static FACET_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?P<field>\w+):"(?P<value>[^"]+)""#).expect("valid facet regex"));

/// One applied `(field, value)` constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacetFilter {
    pub field: String,
    pub value: String,
}

impl FacetFilter {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// `field:"value"`, usable both in the URL and as a Solr filter query.
    pub fn expression(&self) -> String {
        format!("{}:\"{}\"", self.field, self.value)
    }

    fn matches(&self, field: &str, value: &str) -> bool {
        self.field == field && self.value == value
    }
}

/// Extract every well-formed pair from a raw `facet` value, left to right.
pub fn parse_facets(raw: &str) -> Vec<FacetFilter> {
    FACET_PAIR
        .captures_iter(raw)
        .map(|caps| FacetFilter::new(&caps["field"], &caps["value"]))
        .collect()
}

/// Append `(field, value)` unless it is already applied.
pub fn add_facet(filters: &[FacetFilter], field: &str, value: &str) -> Vec<FacetFilter> {
    let mut added = filters.to_vec();
    if !filters.iter().any(|f| f.matches(field, value)) {
        added.push(FacetFilter::new(field, value));
    }
    added
}

/// Drop every occurrence of `(field, value)`, keeping the rest in order.
pub fn remove_facet(filters: &[FacetFilter], field: &str, value: &str) -> Vec<FacetFilter> {
    filters
        .iter()
        .filter(|f| !f.matches(field, value))
        .cloned()
        .collect()
}

/// The unencoded `facet` parameter value.
pub fn facet_param(filters: &[FacetFilter]) -> String {
    filters
        .iter()
        .map(FacetFilter::expression)
        .collect::<Vec<_>>()
        .join(CONJUNCTION)
}

/// Results URL for a filter set, HTML-escaped for use in markup. `q` is
/// appended as given.
pub fn make_url(filters: &[FacetFilter], base_url: &str, q: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(facet_param(filters).as_bytes()).collect();
    html_escape(&format!(
        "{}?{}={}&{}={}",
        base_url, QUERY_PARAM, q, FACET_PARAM, encoded
    ))
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Free-text query plus applied facets for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetQuery {
    pub q: String,
    pub facets: Vec<FacetFilter>,
}

impl FacetQuery {
    pub fn new(q: Option<&str>, facet: Option<&str>) -> Self {
        Self {
            q: q.unwrap_or_default().to_string(),
            facets: facet.map(parse_facets).unwrap_or_default(),
        }
    }

    /// Read `q` and `facet` from a raw query string. Repeated parameters keep
    /// the last value.
    pub fn from_query_string(query: &str) -> Self {
        let mut q = None;
        let mut facet = None;
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match &*key {
                QUERY_PARAM => q = Some(value.into_owned()),
                FACET_PARAM => facet = Some(value.into_owned()),
                _ => {}
            }
        }
        Self::new(q.as_deref(), facet.as_deref())
    }

    pub fn url(&self, base_url: &str) -> String {
        make_url(&self.facets, base_url, &self.q)
    }

    /// URL with one more facet applied.
    pub fn add_url(&self, base_url: &str, field: &str, value: &str) -> String {
        make_url(&add_facet(&self.facets, field, value), base_url, &self.q)
    }

    /// URL with one facet removed.
    pub fn remove_url(&self, base_url: &str, field: &str, value: &str) -> String {
        make_url(&remove_facet(&self.facets, field, value), base_url, &self.q)
    }

    /// Select parameters: one filter query per applied facet, and facet counts
    /// for every active facet in the registry.
    pub fn to_query_params(&self, registry: &FieldRegistry, rows: u32, start: u32) -> QueryParams {
        QueryParams {
            q: self.q.clone(),
            fq: self.facets.iter().map(FacetFilter::expression).collect(),
            facet_fields: registry
                .active_facets()
                .into_iter()
                .map(|d| d.slug.clone())
                .collect(),
            facet_mincount: 1,
            rows,
            start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_in_order() {
        let facets = parse_facets(r#"subject:"History" AND type:"Photograph""#);
        assert_eq!(
            facets,
            vec![
                FacetFilter::new("subject", "History"),
                FacetFilter::new("type", "Photograph"),
            ]
        );
    }

    #[test]
    fn malformed_tokens_are_dropped() {
        let facets = parse_facets(r#"subject:"History AND :"x" AND type:"" AND tag:"maps""#);
        // `subject:"History AND :"` is well formed as far as the grammar goes
        assert_eq!(
            facets,
            vec![
                FacetFilter::new("subject", "History AND :"),
                FacetFilter::new("tag", "maps"),
            ]
        );
        assert!(parse_facets("garbage").is_empty());
        assert!(parse_facets(r#"subject:"unterminated"#).is_empty());
    }

    #[test]
    fn values_may_contain_spaces_and_punctuation() {
        let facets = parse_facets(r#"creator:"Jefferson, Thomas (1743-1826)""#);
        assert_eq!(facets[0].value, "Jefferson, Thomas (1743-1826)");
    }

    #[test]
    fn make_url_encodes_facets_and_escapes_html() {
        let url = make_url(
            &[
                FacetFilter::new("subject", "History"),
                FacetFilter::new("tag", "maps"),
            ],
            "/solr-search",
            "monticello",
        );

        assert_eq!(
            url,
            "/solr-search?q=monticello&amp;facet=subject%3A%22History%22+AND+tag%3A%22maps%22"
        );
    }

    #[test]
    fn empty_filter_set_has_empty_facet_param() {
        assert_eq!(make_url(&[], "/solr-search", ""), "/solr-search?q=&amp;facet=");
    }

    #[test]
    fn query_string_reading_decodes_plus_and_percent() {
        let query = FacetQuery::from_query_string(
            "?q=slave+trade&facet=subject%3A%22History%22+AND+tag%3A%22maps%22&page=2",
        );
        assert_eq!(query.q, "slave trade");
        assert_eq!(
            query.facets,
            vec![
                FacetFilter::new("subject", "History"),
                FacetFilter::new("tag", "maps"),
            ]
        );
    }
}
