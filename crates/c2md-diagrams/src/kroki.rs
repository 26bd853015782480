//! Kroki HTTP renderer.

use std::time::Duration;

use ureq::Agent;

use crate::DiagramRenderer;
use crate::consts::{DEFAULT_TIMEOUT, PNG_SIGNATURE};
use crate::error::DiagramError;

/// Renders diagrams by posting them to a Kroki server.
pub struct KrokiRenderer {
    agent: Agent,
    server_url: String,
}

impl KrokiRenderer {
    /// Create a renderer for `server_url` with the default timeout.
    #[must_use]
    pub fn new(server_url: &str) -> Self {
        Self::with_timeout(server_url, DEFAULT_TIMEOUT)
    }

    /// Create a renderer with a custom HTTP timeout.
    #[must_use]
    pub fn with_timeout(server_url: &str, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            server_url: server_url.trim_end_matches('/').to_owned(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/plantuml/png", self.server_url)
    }
}

impl DiagramRenderer for KrokiRenderer {
    fn render_png(&self, source: &str) -> Result<Vec<u8>, DiagramError> {
        let url = self.endpoint();
        tracing::info!("Rendering diagram via {url}");

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .send(source.as_bytes())?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if status >= 400 {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(DiagramError::HttpResponse {
                status,
                body: error_body,
            });
        }

        let data = body.read_to_vec()?;
        ensure_png(data)
    }
}

/// Reject output that does not start with the PNG signature.
pub(crate) fn ensure_png(data: Vec<u8>) -> Result<Vec<u8>, DiagramError> {
    if data.starts_with(PNG_SIGNATURE) {
        Ok(data)
    } else {
        Err(DiagramError::InvalidPng { len: data.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let renderer = KrokiRenderer::new("https://kroki.io/");
        assert_eq!(renderer.endpoint(), "https://kroki.io/plantuml/png");
    }

    #[test]
    fn test_ensure_png_accepts_signature() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend_from_slice(b"IHDR");
        assert!(ensure_png(data).is_ok());
    }

    #[test]
    fn test_ensure_png_rejects_text() {
        let err = ensure_png(b"Syntax Error?".to_vec()).unwrap_err();
        assert!(matches!(err, DiagramError::InvalidPng { len: 13 }));
    }
}
