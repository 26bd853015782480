//! Confluence attachment types.

use serde::{Deserialize, Serialize};

use super::Links;

/// Confluence attachment.
///
/// Only includes fields that are actually used.
/// Serde ignores unknown fields from the API response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Attachment {
    /// Attachment ID.
    pub id: String,
    /// Attachment title/filename.
    pub title: String,
    /// Media type and size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<AttachmentExtensions>,
    /// Hypermedia links (`download` is relative to the server).
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl Attachment {
    /// Download link, relative to the server base URL.
    #[must_use]
    pub fn download_link(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.download.as_deref())
    }

    /// Media type reported by the server.
    #[must_use]
    pub fn media_type(&self) -> Option<&str> {
        self.extensions.as_ref().and_then(|e| e.media_type.as_deref())
    }
}

/// Attachment `extensions` block.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AttachmentExtensions {
    /// MIME type.
    #[serde(rename = "mediaType", default)]
    pub media_type: Option<String>,
    /// Size in bytes.
    #[serde(rename = "fileSize", default)]
    pub file_size: Option<u64>,
}
