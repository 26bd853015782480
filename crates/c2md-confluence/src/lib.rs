//! Confluence integration for c2md.
//!
//! - [`ConfluenceClient`]: REST API client (pages, child pages, attachments)
//! - [`Source`] / [`PageTree`]: where root pages and their hierarchy come from
//! - [`PageWalker`]: bounded-depth pre-order traversal
//! - [`xhtml`]: storage-format reader
//! - [`UmlPublisher`]: renders `PlantUML` macros back into pages
//!
//! # Example
//!
//! ```no_run
//! use c2md_confluence::{InputMode, OfflineTree, PageWalker, Source, TraversalDepth};
//!
//! let roots = Source::new(InputMode::File, "export.json").load_roots(None)?;
//! let walker = PageWalker::new(&OfflineTree, TraversalDepth::Unbounded);
//! for root in &roots {
//!     walker.walk::<c2md_confluence::ConfluenceError, _>(root, |page, level| {
//!         println!("{}{}", "  ".repeat(level as usize), page.title);
//!         Ok(())
//!     })?;
//! }
//! # Ok::<(), c2md_confluence::ConfluenceError>(())
//! ```

mod client;
mod error;
mod publisher;
mod source;
mod types;
mod walker;
pub mod xhtml;

pub use client::ConfluenceClient;
pub use error::{ConfluenceError, XhtmlError};
pub use publisher::{
    PageEditor, PublishError, PublishOptions, PublishResult, UmlMacro, UmlPublisher,
    find_uml_macros, image_tag, insert_image_tags,
};
pub use source::{InputMode, OfflineTree, PageTree, ROOT_EXPAND, Source, parse_document, url_origin};
pub use types::{
    Attachment, AttachmentExtensions, Body, Children, ContentList, Links, Page, Storage, Version,
};
pub use walker::{InvalidDepth, PageWalker, TraversalDepth};
