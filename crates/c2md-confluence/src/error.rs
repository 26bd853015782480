//! Error types for Confluence integration.

/// Error while reading Confluence storage-format XHTML.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum XhtmlError {
    /// XML parsing error.
    #[error("XML parse error")]
    XmlParse(#[from] quick_xml::Error),

    /// Encoding error during XML parsing.
    #[error("encoding error")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}

/// Error from Confluence API operations and page sources.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
    /// HTTP request failed (network error, timeout, etc).
    #[error("HTTP request failed")]
    HttpRequest(#[from] ureq::Error),

    /// HTTP response error (server returned error status).
    #[error("HTTP error: {status} - {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (may contain error details).
        body: String,
    },

    /// I/O error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error")]
    Json(#[from] serde_json::Error),

    /// Storage-format body could not be read.
    #[error("malformed page body")]
    Xhtml(#[from] XhtmlError),

    /// Page hierarchy or document shape is unusable (cycles, empty documents).
    #[error("{0}")]
    Structural(String),

    /// Operation needs the Confluence server but none is available.
    #[error("{0}")]
    Offline(String),
}

impl ConfluenceError {
    /// Whether the server rejected the credentials.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::HttpResponse { status: 401 | 403, .. })
    }
}
