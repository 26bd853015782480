//! Confluence pages to Markdown.
//!
//! [`MarkdownRenderer`] turns one page's storage format into Markdown.
//! [`Converter`] walks page trees, renders every page, and stores the
//! attachments and diagrams the pages reference.
//!
//! # Example
//!
//! ```
//! use c2md_cache::{AttachmentStore, CacheManifest};
//! use c2md_confluence::{OfflineTree, TraversalDepth, parse_document};
//! use c2md_markdown::{Converter, RenderOptions};
//!
//! let roots = parse_document(r#"{
//!     "id": "1",
//!     "title": "Guide - Setup",
//!     "body": {"storage": {"value": "<p>Install <strong>c2md</strong>.</p>"}}
//! }"#)?;
//!
//! let dir = tempfile::tempdir()?;
//! let mut store = AttachmentStore::new(dir.path(), "attachments", CacheManifest::in_memory());
//! let report = Converter::new(&OfflineTree, &mut store, RenderOptions::default(), TraversalDepth::Unbounded)
//!     .convert(&roots)?;
//!
//! assert_eq!(report.markdown, "# Setup\n\nInstall **c2md**.\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod converter;
mod render;

pub use converter::{ConversionReport, ConvertError, Converter, DiagramSettings};
pub use render::{MarkdownRenderer, RenderOptions, ResourceResolver, transform_title};
