//! Public URL resolution for indexed records.

use crate::records::{RecordKind, SlugRef};

const SHOW_ACTION: &str = "show";

/// Builds record URLs the way the CMS router does, then rewrites them to the
/// public site. `base` is the path prefix of the context doing the indexing,
/// e.g. `""` on the public site or `"/admin"` when run from the dashboard.
#[derive(Debug, Clone, Default)]
pub struct UriResolver {
    base: String,
}

impl UriResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public URL for a record. The first `/admin/` segment is always dropped
    /// so indexed URLs point at the public detail view.
    pub fn resolve(&self, model: &str, id: i64, kind: &RecordKind) -> String {
        let uri = match kind {
            RecordKind::Page { slug } => self.url(slug),
            RecordKind::ExhibitPage { slug, exhibit } => {
                format!("{}/{}", self.slug_uri(exhibit), slug)
            }
            RecordKind::Sluggable { slug } => self.slug_uri(&SlugRef {
                model: model.to_string(),
                slug: slug.clone(),
            }),
            RecordKind::Fallback => self.record_url(model, id),
        };

        strip_admin(&uri)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    fn slug_uri(&self, record: &SlugRef) -> String {
        self.url(&format!(
            "{}/{}/{}",
            controller_name(&record.model),
            SHOW_ACTION,
            record.slug
        ))
    }

    fn record_url(&self, model: &str, id: i64) -> String {
        self.url(&format!("{}/{}/{}", controller_name(model), SHOW_ACTION, id))
    }
}

/// Replace the first `/admin/` segment with `/`.
pub fn strip_admin(uri: &str) -> String {
    uri.replacen("/admin/", "/", 1)
}

/// Controller for a model: `ExhibitPage` -> `exhibit-pages`.
pub fn controller_name(model: &str) -> String {
    let mut dashed = String::with_capacity(model.len() + 4);
    for (i, c) in model.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                dashed.push('-');
            }
            dashed.extend(c.to_lowercase());
        } else {
            dashed.push(c);
        }
    }
    pluralize(&dashed)
}

fn pluralize(word: &str) -> String {
    let ends_with_consonant_y = word.ends_with('y')
        && !word[..word.len() - 1].ends_with(&['a', 'e', 'i', 'o', 'u'][..]);

    if ends_with_consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}
