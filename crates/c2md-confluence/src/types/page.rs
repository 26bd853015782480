//! Confluence page types.

use serde::{Deserialize, Serialize};

use super::{Attachment, ContentList, Links};

/// Confluence page.
///
/// Deserialized from REST responses as well as exported JSON documents, so
/// everything except `id` and `title` is optional.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Page {
    /// Page ID.
    pub id: String,
    /// Content type ("page" or "blogpost").
    #[serde(rename = "type", default = "default_content_type")]
    pub content_type: String,
    /// Page title.
    pub title: String,
    /// Version information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    /// Page body content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Body>,
    /// Embedded `children` expansion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Children>,
    /// Hypermedia links.
    #[serde(rename = "_links", default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Links>,
}

fn default_content_type() -> String {
    "page".to_owned()
}

impl Page {
    /// Storage-format body, empty when the body was not expanded.
    #[must_use]
    pub fn storage_html(&self) -> &str {
        self.body
            .as_ref()
            .and_then(|b| b.storage.as_ref())
            .map_or("", |s| s.value.as_str())
    }

    /// Current version number (1 when unknown).
    #[must_use]
    pub fn version_number(&self) -> u32 {
        self.version.as_ref().map_or(1, |v| v.number)
    }

    /// Child pages carried inline in the document, if expanded.
    #[must_use]
    pub fn embedded_children(&self) -> Option<&[Page]> {
        self.children
            .as_ref()
            .and_then(|c| c.page.as_ref())
            .map(|list| list.results.as_slice())
    }

    /// Attachments carried inline in the document, if expanded.
    #[must_use]
    pub fn embedded_attachments(&self) -> Option<&[Attachment]> {
        self.children
            .as_ref()
            .and_then(|c| c.attachment.as_ref())
            .map(|list| list.results.as_slice())
    }
}

/// Page version.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Version {
    /// Version number.
    pub number: u32,
    /// Version message/comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Page body content.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Body {
    /// Storage format content.
    #[serde(default)]
    pub storage: Option<Storage>,
}

/// Storage format representation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Storage {
    /// HTML content in Confluence storage format.
    pub value: String,
    /// Content representation (always "storage").
    #[serde(default = "default_representation")]
    pub representation: String,
}

fn default_representation() -> String {
    "storage".to_owned()
}

/// `children` expansion of a page.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Children {
    /// Child pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<ContentList<Page>>,
    /// Attachments of the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<ContentList<Attachment>>,
}
