use thiserror::Error;

/// Error taxonomy for the sync and store paths.
///
/// Evaluation-path functions never return these: a missing or malformed
/// flag degrades to `false`/`None` so a request is never failed by the
/// flag store. Sync-path functions raise eagerly; the poll loop is the
/// sole retry boundary.
#[derive(Debug, Error)]
pub enum FlagsError {
    /// A source row does not conform to the expected schema. Carries a
    /// locator (the Notion page URL) and a remediation hint so the row
    /// can be fixed by hand. Fatal for the current sync cycle.
    #[error("schema error at {locator}: {message} ({hint})")]
    Schema {
        message: String,
        locator: String,
        hint: String,
    },

    /// A collaborator read failed. Retried only via the poll loop's next
    /// scheduled cycle.
    #[error("store read failed: {0}")]
    StoreRead(String),

    /// A collaborator write failed. Retried only via the poll loop's next
    /// scheduled cycle.
    #[error("store write failed: {0}")]
    StoreWrite(String),

    /// A required credential or identifier is missing. Fatal, no retry.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FlagsError {
    pub fn schema(message: impl Into<String>, locator: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
            locator: locator.into(),
            hint: hint.into(),
        }
    }
}
