//! Where pages come from.
//!
//! A conversion starts from one or more root pages loaded from a [`Source`]
//! and continues through a [`PageTree`], which supplies child pages and
//! attachments on demand.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::client::ConfluenceClient;
use crate::error::ConfluenceError;
use crate::types::{Attachment, Page};

/// Expansions requested for a root page in wiki mode.
pub const ROOT_EXPAND: &[&str] = &["body.storage", "version"];

/// How the `input` argument is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Confluence page ID fetched through the REST API.
    #[default]
    Wiki,
    /// Local JSON document.
    File,
    /// URL returning a JSON document.
    Url,
}

/// Origin of the root pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Page ID on the configured server.
    Wiki(String),
    /// JSON document on disk.
    File(PathBuf),
    /// JSON document behind a URL.
    Url(String),
}

impl Source {
    /// Interpret `input` according to `mode`.
    #[must_use]
    pub fn new(mode: InputMode, input: &str) -> Self {
        match mode {
            InputMode::Wiki => Self::Wiki(input.to_owned()),
            InputMode::File => Self::File(PathBuf::from(input)),
            InputMode::Url => Self::Url(input.to_owned()),
        }
    }

    /// Whether loading needs a Confluence server.
    #[must_use]
    pub fn needs_client(&self) -> bool {
        !matches!(self, Self::File(_))
    }

    /// Load the root pages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfluenceError::Offline`] if a wiki or URL source is given
    /// no client, [`ConfluenceError::Structural`] for documents without pages,
    /// and the usual I/O, HTTP and JSON errors.
    pub fn load_roots(&self, client: Option<&ConfluenceClient>) -> Result<Vec<Page>, ConfluenceError> {
        match self {
            Self::Wiki(page_id) => {
                let client = client.ok_or_else(|| {
                    ConfluenceError::Offline("wiki mode requires a Confluence server".to_owned())
                })?;
                Ok(vec![client.get_page(page_id, ROOT_EXPAND)?])
            }
            Self::File(path) => read_document(path),
            Self::Url(url) => {
                let client = client.ok_or_else(|| {
                    ConfluenceError::Offline(format!("no HTTP client available for {url}"))
                })?;
                pages_from_value(client.fetch_document(url)?)
            }
        }
    }
}

/// `scheme://host[:port]` of an absolute URL.
#[must_use]
pub fn url_origin(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")? + 3;
    let host_end = url[scheme_end..]
        .find('/')
        .map_or(url.len(), |i| scheme_end + i);
    (host_end > scheme_end).then(|| &url[..host_end])
}

fn read_document(path: &Path) -> Result<Vec<Page>, ConfluenceError> {
    tracing::info!("Reading {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_document(&content)
}

/// Parse a JSON document holding a single page or `{"results": [...]}`.
pub fn parse_document(json: &str) -> Result<Vec<Page>, ConfluenceError> {
    pages_from_value(serde_json::from_str(json)?)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    List { results: Vec<Page> },
    Single(Box<Page>),
}

fn pages_from_value(value: serde_json::Value) -> Result<Vec<Page>, ConfluenceError> {
    let pages = match serde_json::from_value::<Document>(value) {
        Ok(Document::List { results }) => results,
        Ok(Document::Single(page)) => vec![*page],
        Err(_) => {
            return Err(ConfluenceError::Structural(
                "document is neither a page nor a list of pages".to_owned(),
            ));
        }
    };

    if pages.is_empty() {
        return Err(ConfluenceError::Structural(
            "document contains no pages".to_owned(),
        ));
    }
    Ok(pages)
}

/// Supplies the parts of a page hierarchy that are not embedded in a page.
pub trait PageTree {
    /// Direct children of `page`, in document order.
    fn children(&self, page: &Page) -> Result<Vec<Page>, ConfluenceError>;

    /// Attachments of `page`.
    fn attachments(&self, page: &Page) -> Result<Vec<Attachment>, ConfluenceError>;

    /// Open the content of `attachment`.
    fn download(&self, attachment: &Attachment) -> Result<Box<dyn Read>, ConfluenceError>;
}

impl PageTree for ConfluenceClient {
    fn children(&self, page: &Page) -> Result<Vec<Page>, ConfluenceError> {
        self.get_child_pages(&page.id)
    }

    fn attachments(&self, page: &Page) -> Result<Vec<Attachment>, ConfluenceError> {
        match page.embedded_attachments() {
            Some(embedded) => Ok(embedded.to_vec()),
            None => self.get_attachments(&page.id),
        }
    }

    fn download(&self, attachment: &Attachment) -> Result<Box<dyn Read>, ConfluenceError> {
        self.download_attachment(attachment)
    }
}

/// Page tree for local documents: only what the document embeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTree;

impl PageTree for OfflineTree {
    fn children(&self, _page: &Page) -> Result<Vec<Page>, ConfluenceError> {
        Ok(Vec::new())
    }

    fn attachments(&self, _page: &Page) -> Result<Vec<Attachment>, ConfluenceError> {
        Ok(Vec::new())
    }

    fn download(&self, attachment: &Attachment) -> Result<Box<dyn Read>, ConfluenceError> {
        Err(ConfluenceError::Offline(format!(
            "attachment '{}' cannot be downloaded without a Confluence server",
            attachment.title
        )))
    }
}
