use thiserror::Error;

/// Error taxonomy for the ingestion pipeline.
///
/// Recoverable errors are per-item: they are collected into run stats and the
/// batch continues. Fatal errors abort the current source's run only; other
/// sources in a batch run are unaffected.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    #[error("Normalization error: {0}")]
    Normalize(String),

    #[error("Source unreachable: {0}")]
    SourceUnreachable(String),

    #[error("Authentication failed for source {0}")]
    Auth(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl IngestError {
    /// Whether this error is per-item (collect and continue) rather than
    /// per-source fatal (abort the source run).
    pub fn recoverable(&self) -> bool {
        !matches!(
            self,
            IngestError::SourceUnreachable(_) | IngestError::Auth(_) | IngestError::Store(_)
        )
    }
}
