//! Diagram rendering errors.

/// Error while rendering a diagram.
#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    /// HTTP request to the renderer failed (network error, timeout, etc).
    #[error("diagram request failed")]
    HttpRequest(#[from] ureq::Error),

    /// Renderer returned an error status.
    #[error("diagram renderer returned HTTP {status}: {body}")]
    HttpResponse {
        /// HTTP status code.
        status: u16,
        /// Response body (usually the `PlantUML` error message).
        body: String,
    },

    /// Spawning or talking to the renderer process failed.
    #[error("failed to run '{command}'")]
    Spawn {
        /// Program that was started.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Renderer process exited unsuccessfully.
    #[error("'{command}' exited with {status}: {stderr}")]
    Process {
        /// Program that was started.
        command: String,
        /// Exit status description.
        status: String,
        /// Captured standard error.
        stderr: String,
    },

    /// Renderer produced something that is not a PNG image.
    #[error("renderer output is not a PNG image ({len} bytes)")]
    InvalidPng {
        /// Length of the unexpected output.
        len: usize,
    },
}
