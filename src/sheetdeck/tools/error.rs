use thiserror::Error;

use crate::sheetdeck::tools::sync::SourceReport;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur when the
/// tool fetches a sheet, maps it onto notes, or talks to the host collection.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing the config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the CSV reader.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Transport-level HTTP failures (connection refused, timeouts, bad bodies).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote answered with a non-success status code.
    #[error("request to {url} failed with status {status}")]
    Network { url: String, status: u16 },

    /// The downloaded sheet is not valid UTF-8 text.
    #[error("sheet content is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    /// A quoted cell was opened but never closed.
    #[error("unterminated quoted cell starting on line {line}")]
    UnterminatedQuote { line: usize },

    /// The sheet header does not match the note type fields.
    #[error("CSV headers do not match note type fields.\nheaders: {headers:?}\nrequired note type fields: {expected:?}")]
    SchemaMismatch {
        headers: Vec<String>,
        expected: Vec<String>,
    },

    /// Raised when a field list is empty or repeats a name.
    #[error("invalid field schema: {0}")]
    InvalidSchema(String),

    /// The configured key (or tag) field is not part of the note type.
    #[error("field '{field}' is not one of the note type fields {fields:?}")]
    UnknownKeyField { field: String, fields: Vec<String> },

    /// The target note type does not exist in the host collection.
    #[error("note type '{0}' does not exist in the collection")]
    RecordTypeMissing(String),

    /// The host collection rejected a request.
    #[error("collection error: {0}")]
    HostStorage(String),

    /// Raised when a source URL is not a published CSV export link.
    #[error("invalid source URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Raised when the same URL is configured twice.
    #[error("the deck has already been added before: {0}")]
    DuplicateSource(String),

    /// Raised when no configured source targets the given deck.
    #[error("no remote deck is linked to '{0}'")]
    UnknownDeck(String),

    /// A per-source failure that stopped a sync, annotated with the deck it
    /// belongs to and the reports of the sources synced before it.
    #[error("the following deck failed to sync: {deck}: {source}")]
    SourceFailed {
        deck: String,
        #[source]
        source: Box<ToolError>,
        synced: Vec<SourceReport>,
    },

    /// Raised after a full sync in which some decks failed.
    #[error("{failed} of {total} decks failed to sync")]
    SyncIncomplete { failed: usize, total: usize },

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
