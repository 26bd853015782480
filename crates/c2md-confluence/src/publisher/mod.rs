//! `PlantUML` publisher.
//!
//! Renders the `plantuml` macros of a page hierarchy and pushes the images
//! back to Confluence:
//!
//! 1. Find `plantuml` macros in each page's storage body
//! 2. Render each diagram to PNG and keep it in the local attachment store
//! 3. Upload PNGs the page does not have yet (`update_attachments`)
//! 4. Add an image tag after each macro and save the page (`update_page`)
//!
//! Diagram file names are derived from the prepared source, so an attachment
//! with the same name always has the same content.

mod macros;

use std::collections::HashSet;
use std::path::PathBuf;

use c2md_cache::AttachmentStore;
use c2md_diagrams::{DEFAULT_DPI, DiagramError, DiagramKey, DiagramRenderer, prepare_diagram_source};
use tracing::{info, warn};

pub use macros::{UmlMacro, find_uml_macros, image_tag, insert_image_tags};

use crate::client::ConfluenceClient;
use crate::error::{ConfluenceError, XhtmlError};
use crate::source::PageTree;
use crate::types::Page;
use crate::walker::{PageWalker, TraversalDepth};

/// Error from publishing diagrams.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Confluence API or page hierarchy error.
    #[error(transparent)]
    Confluence(#[from] ConfluenceError),

    /// Diagram rendering failed.
    #[error("diagram rendering failed on page '{page}'")]
    Diagram {
        /// Title of the page holding the diagram.
        page: String,
        /// Renderer error.
        #[source]
        source: DiagramError,
    },

    /// Local attachment store error.
    #[error("I/O error")]
    Io(#[from] std::io::Error),
}

impl From<XhtmlError> for PublishError {
    fn from(err: XhtmlError) -> Self {
        Self::Confluence(err.into())
    }
}

/// Write access to pages, on top of [`PageTree`].
pub trait PageEditor: PageTree {
    /// Attach `data` to `page` as `file_name`.
    fn upload_attachment(&self, page: &Page, file_name: &str, data: &[u8]) -> Result<(), ConfluenceError>;

    /// Replace the storage body of `page`, creating a new version.
    fn update_body(&self, page: &Page, storage_html: &str) -> Result<(), ConfluenceError>;
}

impl PageEditor for ConfluenceClient {
    fn upload_attachment(&self, page: &Page, file_name: &str, data: &[u8]) -> Result<(), ConfluenceError> {
        ConfluenceClient::upload_attachment(self, &page.id, file_name, data, "image/png").map(|_| ())
    }

    fn update_body(&self, page: &Page, storage_html: &str) -> Result<(), ConfluenceError> {
        self.update_page(page, storage_html).map(|_| ())
    }
}

/// What the publisher is allowed to change.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Upload rendered diagrams missing from the page.
    pub update_attachments: bool,
    /// Add image tags after diagram macros.
    pub update_page: bool,
    /// Report what would change without touching Confluence.
    pub dry_run: bool,
    /// How deep to follow child pages.
    pub depth: TraversalDepth,
    /// Directories searched for `!include` files.
    pub include_dirs: Vec<PathBuf>,
    /// DPI for rendered diagrams.
    pub dpi: u32,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            update_attachments: false,
            update_page: false,
            dry_run: false,
            depth: TraversalDepth::Unbounded,
            include_dirs: Vec::new(),
            dpi: DEFAULT_DPI,
        }
    }
}

/// Outcome for one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishResult {
    /// Page ID.
    pub page_id: String,
    /// Page title.
    pub title: String,
    /// File names of the page's diagrams, in document order.
    pub diagrams: Vec<String>,
    /// Diagrams uploaded (or, in a dry run, that would be uploaded).
    pub uploaded: Vec<String>,
    /// Whether the page body was (or would be) updated.
    pub page_updated: bool,
}

/// Publishes rendered `PlantUML` diagrams to Confluence pages.
pub struct UmlPublisher<'a, T: PageEditor + ?Sized, R: DiagramRenderer + ?Sized> {
    pages: &'a T,
    renderer: &'a R,
    store: &'a mut AttachmentStore,
    options: PublishOptions,
}

impl<'a, T: PageEditor + ?Sized, R: DiagramRenderer + ?Sized> UmlPublisher<'a, T, R> {
    /// Create a publisher.
    pub fn new(
        pages: &'a T,
        renderer: &'a R,
        store: &'a mut AttachmentStore,
        options: PublishOptions,
    ) -> Self {
        Self {
            pages,
            renderer,
            store,
            options,
        }
    }

    /// Publish diagrams for `root` and its descendants.
    ///
    /// # Errors
    ///
    /// Stops at the first failing page: Confluence errors, rendering errors
    /// and local I/O errors are returned as [`PublishError`].
    pub fn publish(&mut self, root: &Page) -> Result<Vec<PublishResult>, PublishError> {
        let walker = PageWalker::new(self.pages, self.options.depth);
        let mut results = Vec::new();

        walker.walk(root, |page, _level| {
            results.push(self.publish_page(page)?);
            Ok::<(), PublishError>(())
        })?;

        Ok(results)
    }

    fn publish_page(&mut self, page: &Page) -> Result<PublishResult, PublishError> {
        let html = page.storage_html();
        let macros = find_uml_macros(html)?;
        let mut result = PublishResult {
            page_id: page.id.clone(),
            title: page.title.clone(),
            ..PublishResult::default()
        };

        if macros.is_empty() {
            return Ok(result);
        }
        info!("Page '{}': {} diagram(s)", page.title, macros.len());

        let mut rendered: Vec<(String, Vec<u8>)> = Vec::new();
        let mut placements = Vec::with_capacity(macros.len());
        for uml in &macros {
            let (file_name, png) = self.render(page, &uml.source)?;
            placements.push((uml.end, file_name.clone()));
            result.diagrams.push(file_name.clone());
            if !rendered.iter().any(|(name, _)| *name == file_name) {
                rendered.push((file_name, png));
            }
        }

        if self.options.update_attachments {
            let attached: HashSet<String> = self
                .pages
                .attachments(page)?
                .into_iter()
                .map(|a| a.title)
                .collect();

            for (file_name, png) in &rendered {
                if attached.contains(file_name) {
                    continue;
                }
                if !self.options.dry_run {
                    self.pages.upload_attachment(page, file_name, png)?;
                }
                result.uploaded.push(file_name.clone());
            }
        }

        if self.options.update_page {
            let (updated, inserted) = insert_image_tags(html, &placements);
            if inserted > 0 {
                if self.options.dry_run {
                    info!("Would add {inserted} image tag(s) to '{}'", page.title);
                } else {
                    self.pages.update_body(page, &updated)?;
                }
                result.page_updated = true;
            }
        }

        Ok(result)
    }

    fn render(&mut self, page: &Page, source: &str) -> Result<(String, Vec<u8>), PublishError> {
        let prepared = prepare_diagram_source(source, &self.options.include_dirs, self.options.dpi);
        for warning in &prepared.warnings {
            warn!("Page '{}': {warning}", page.title);
        }

        let file_name = DiagramKey::new(&prepared.source).file_name();
        let png = self
            .renderer
            .render_png(&prepared.source)
            .map_err(|source| PublishError::Diagram {
                page: page.title.clone(),
                source,
            })?;
        self.store.store_bytes(&file_name, &png)?;

        Ok((file_name, png))
    }
}
