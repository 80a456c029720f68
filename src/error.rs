//! Error types for indexing and facet resolution.

/// Result type for indexing operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Errors raised by the indexing core.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The record has no id, so no document id can be derived from it
    #[error("{model} record has no id and cannot be indexed")]
    RecordIncomplete { model: String },

    /// Ping against the search engine failed before any write was attempted
    #[error("Search service unavailable: {0}")]
    SearchServiceUnavailable(String),

    /// An addDocuments/commit call failed mid-run
    #[error("Batch submission failed at offset {offset}: {source}")]
    BatchSubmission {
        offset: u64,
        #[source]
        source: Box<IndexError>,
    },

    /// Label lookup for a key with no configured field
    #[error("No field configured for key '{0}'")]
    UnknownField(String),

    /// The record store could not be read
    #[error("Record source error: {0}")]
    RecordSource(String),

    /// Transport failure talking to the search engine
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The search engine answered with a non-success status
    #[error("Solr returned {status}: {body}")]
    Solr { status: u16, body: String },
}

impl From<sqlx::Error> for IndexError {
    fn from(err: sqlx::Error) -> Self {
        IndexError::RecordSource(err.to_string())
    }
}

impl IndexError {
    /// Wrap a submission failure with the cursor offset it happened at.
    pub fn at_offset(self, offset: u64) -> Self {
        IndexError::BatchSubmission {
            offset,
            source: Box::new(self),
        }
    }
}
