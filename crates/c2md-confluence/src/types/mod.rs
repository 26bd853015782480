//! Confluence API types.

mod attachment;
mod page;

use serde::{Deserialize, Serialize};

pub use attachment::{Attachment, AttachmentExtensions};
pub use page::{Body, Children, Page, Storage, Version};

/// Paginated content listing (`{"results": [...], "_links": {"next": ...}}`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContentList<T> {
    /// Items on this page of results.
    pub results: Vec<T>,
    /// Number of items in `results`.
    #[serde(default)]
    pub size: usize,
    /// Pagination links.
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

impl<T> ContentList<T> {
    /// Relative link to the next page of results.
    #[must_use]
    pub fn next_link(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.next.as_deref())
    }
}

/// Hypermedia links.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Links {
    /// Web UI link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webui: Option<String>,
    /// API self link.
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    /// Attachment download link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
    /// Next page of a listing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    /// Server base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
}
