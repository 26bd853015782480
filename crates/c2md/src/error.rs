//! CLI error types.

use c2md_config::ConfigError;
use c2md_confluence::{ConfluenceError, InvalidDepth, PublishError};
use c2md_markdown::ConvertError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Confluence(#[from] ConfluenceError),

    #[error(transparent)]
    Convert(#[from] ConvertError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Depth(#[from] InvalidDepth),

    #[error("{0}")]
    Validation(String),
}

impl CliError {
    /// Whether Confluence rejected the credentials (HTTP 401/403).
    pub(crate) fn is_auth_failure(&self) -> bool {
        match self {
            Self::Confluence(err)
            | Self::Convert(ConvertError::Network(err))
            | Self::Publish(PublishError::Confluence(err)) => err.is_auth_failure(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_error(status: u16) -> ConfluenceError {
        ConfluenceError::HttpResponse {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn test_auth_failure_through_wrappers() {
        assert!(CliError::from(http_error(401)).is_auth_failure());
        assert!(CliError::from(ConvertError::from(http_error(403))).is_auth_failure());
        assert!(CliError::from(PublishError::from(http_error(401))).is_auth_failure());

        assert!(!CliError::from(http_error(404)).is_auth_failure());
        assert!(!CliError::Validation("bad".to_owned()).is_auth_failure());
    }
}
