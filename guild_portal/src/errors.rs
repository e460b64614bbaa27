//! Error types for the portal client.

/// Errors that can occur while talking to the portal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The portal served its login page instead of the requested one.
    #[error("Session token rejected: portal redirected to \"{title}\"")]
    Authentication { title: String },
    /// The request could not be sent or the body could not be read.
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// The portal returned a non-success status with a body snippet.
    #[error("Request failed with status {status}")]
    HttpStatus { status: u16, body: String },
    /// The postback was accepted but the report viewer is missing or empty.
    #[error("Failed to load the reports")]
    ReportRender,
    /// The report ran and matched no transactions.
    #[error("No transactions were found")]
    NoData,
    /// The postback response carries no usable export URL.
    #[error("Failed to find the report export url in the response")]
    ExportUrlNotFound,
    /// A configured or derived URL is malformed.
    #[error("Invalid url: {0}")]
    InvalidUrl(String),
    /// Internal parsing machinery failed (selector or pattern compilation).
    #[error("Parse error: {0}")]
    Parse(String),
}
