//! Page converter: walk, render, and collect attachments.

use std::collections::HashMap;
use std::path::PathBuf;

use c2md_cache::AttachmentStore;
use c2md_confluence::{
    Attachment, ConfluenceError, Page, PageTree, PageWalker, TraversalDepth, XhtmlError,
};
use c2md_diagrams::{DEFAULT_DPI, DiagramKey, DiagramRenderer, prepare_diagram_source};
use tracing::{info, warn};

use crate::render::{MarkdownRenderer, RenderOptions, ResourceResolver};

/// Error from converting pages.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// Local file could not be read or written.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// Confluence could not be reached or refused the request.
    #[error("network error")]
    Network(#[source] ConfluenceError),

    /// Settings do not allow the conversion.
    #[error("{0}")]
    Configuration(String),

    /// Page hierarchy or content is unusable.
    #[error("{0}")]
    Structural(String),
}

impl From<ConfluenceError> for ConvertError {
    fn from(err: ConfluenceError) -> Self {
        match err {
            ConfluenceError::Io(e) => Self::Io(e),
            ConfluenceError::Structural(msg) => Self::Structural(msg),
            ConfluenceError::Offline(msg) => Self::Configuration(msg),
            ConfluenceError::Json(e) => Self::Structural(format!("malformed JSON: {e}")),
            ConfluenceError::Xhtml(e) => Self::from(e),
            other => Self::Network(other),
        }
    }
}

impl From<XhtmlError> for ConvertError {
    fn from(err: XhtmlError) -> Self {
        let detail = std::error::Error::source(&err)
            .map_or_else(|| err.to_string(), ToString::to_string);
        Self::Structural(format!("malformed page body: {detail}"))
    }
}

/// Diagram rendering settings for a conversion.
pub struct DiagramSettings<'a> {
    /// Renderer producing PNG images.
    pub renderer: &'a dyn DiagramRenderer,
    /// Directories searched for `!include` files.
    pub include_dirs: Vec<PathBuf>,
    /// DPI for rendered diagrams.
    pub dpi: u32,
}

impl<'a> DiagramSettings<'a> {
    /// Settings with no include directories and the default DPI.
    #[must_use]
    pub fn new(renderer: &'a dyn DiagramRenderer) -> Self {
        Self {
            renderer,
            include_dirs: Vec::new(),
            dpi: DEFAULT_DPI,
        }
    }
}

/// Result of a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    /// Markdown of all pages, in walk order.
    pub markdown: String,
    /// Number of pages converted.
    pub pages: usize,
    /// Attachments written to disk.
    pub attachments_written: usize,
    /// Attachments served from the cache.
    pub attachments_reused: usize,
    /// Diagrams rendered to images.
    pub diagrams: usize,
    /// Non-fatal problems.
    pub warnings: Vec<String>,
}

/// Converts page trees to one Markdown document.
pub struct Converter<'a, T: PageTree + ?Sized> {
    tree: &'a T,
    store: &'a mut AttachmentStore,
    renderer: MarkdownRenderer,
    depth: TraversalDepth,
    diagrams: Option<DiagramSettings<'a>>,
    rendered_diagrams: HashMap<String, String>,
}

impl<'a, T: PageTree + ?Sized> Converter<'a, T> {
    /// Create a converter.
    pub fn new(
        tree: &'a T,
        store: &'a mut AttachmentStore,
        options: RenderOptions,
        depth: TraversalDepth,
    ) -> Self {
        Self {
            tree,
            store,
            renderer: MarkdownRenderer::new(options),
            depth,
            diagrams: None,
            rendered_diagrams: HashMap::new(),
        }
    }

    /// Render `PlantUML` macros to images instead of code blocks.
    #[must_use]
    pub fn with_diagrams(mut self, settings: DiagramSettings<'a>) -> Self {
        self.diagrams = Some(settings);
        self
    }

    /// Convert each root page and its descendants.
    ///
    /// # Errors
    ///
    /// Stops at the first page that cannot be fetched, parsed or whose
    /// attachments cannot be stored.
    pub fn convert(&mut self, roots: &[Page]) -> Result<ConversionReport, ConvertError> {
        let walker = PageWalker::new(self.tree, self.depth);
        let mut report = ConversionReport::default();
        let mut sections = Vec::new();

        for root in roots {
            walker.walk(root, |page, level| {
                info!("Converting '{}' (level {level})", page.title);
                let markdown = self.convert_page(page, level, &mut report)?;
                report.pages += 1;
                if !markdown.is_empty() {
                    sections.push(markdown);
                }
                Ok::<(), ConvertError>(())
            })?;
        }

        if !sections.is_empty() {
            report.markdown = sections.join("\n\n");
            report.markdown.push('\n');
        }
        Ok(report)
    }

    fn convert_page(
        &mut self,
        page: &Page,
        level: u32,
        report: &mut ConversionReport,
    ) -> Result<String, ConvertError> {
        let mut resources = PageResources {
            tree: self.tree,
            page,
            store: &mut *self.store,
            diagrams: self.diagrams.as_ref(),
            rendered_diagrams: &mut self.rendered_diagrams,
            listed: None,
            resolved: HashMap::new(),
            report,
        };
        self.renderer.render_page(page, level, &mut resources)
    }
}

/// Resolves the resources of one page.
struct PageResources<'p, T: PageTree + ?Sized> {
    tree: &'p T,
    page: &'p Page,
    store: &'p mut AttachmentStore,
    diagrams: Option<&'p DiagramSettings<'p>>,
    rendered_diagrams: &'p mut HashMap<String, String>,
    listed: Option<Vec<Attachment>>,
    resolved: HashMap<String, String>,
    report: &'p mut ConversionReport,
}

impl<T: PageTree + ?Sized> PageResources<'_, T> {
    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.report.warnings.push(message);
    }

    fn find_attachment(&mut self, file_name: &str) -> Result<Option<Attachment>, ConvertError> {
        if self.listed.is_none() {
            self.listed = Some(self.tree.attachments(self.page)?);
        }
        Ok(self
            .listed
            .iter()
            .flatten()
            .find(|a| a.title == file_name)
            .cloned())
    }
}

impl<T: PageTree + ?Sized> ResourceResolver for PageResources<'_, T> {
    type Error = ConvertError;

    fn attachment(&mut self, file_name: &str) -> Result<String, ConvertError> {
        if let Some(path) = self.resolved.get(file_name) {
            return Ok(path.clone());
        }

        let path = match self.find_attachment(file_name)? {
            Some(attachment) => {
                let reader = self.tree.download(&attachment)?;
                let stored = self.store.store(file_name, reader)?;
                if stored.written {
                    self.report.attachments_written += 1;
                } else {
                    self.report.attachments_reused += 1;
                }
                stored.path
            }
            None => {
                self.warn(format!(
                    "attachment '{file_name}' of page '{}' is not available",
                    self.page.title
                ));
                file_name.to_owned()
            }
        };

        self.resolved.insert(file_name.to_owned(), path.clone());
        Ok(path)
    }

    fn diagram(&mut self, source: &str) -> Result<Option<String>, ConvertError> {
        let Some(settings) = self.diagrams else {
            return Ok(None);
        };

        let prepared = prepare_diagram_source(source, &settings.include_dirs, settings.dpi);
        for warning in prepared.warnings {
            self.warn(format!("page '{}': {warning}", self.page.title));
        }

        let file_name = DiagramKey::new(&prepared.source).file_name();
        if let Some(path) = self.rendered_diagrams.get(&file_name) {
            return Ok(Some(path.clone()));
        }

        match settings.renderer.render_png(&prepared.source) {
            Ok(png) => {
                let stored = self.store.store_bytes(&file_name, &png)?;
                self.report.diagrams += 1;
                self.rendered_diagrams
                    .insert(file_name, stored.path.clone());
                Ok(Some(stored.path))
            }
            Err(err) => {
                self.warn(format!(
                    "diagram on page '{}' kept as source: {err}",
                    self.page.title
                ));
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::{Cursor, Read};

    use c2md_cache::CacheManifest;
    use c2md_diagrams::DiagramError;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    /// In-memory wiki: children by parent ID, attachment bytes by title.
    #[derive(Default)]
    struct FakeWiki {
        children: HashMap<String, Vec<Page>>,
        files: HashMap<String, Vec<u8>>,
    }

    impl FakeWiki {
        fn add(&mut self, parent: &str, child: Page) {
            self.children.entry(parent.to_owned()).or_default().push(child);
        }
    }

    impl PageTree for FakeWiki {
        fn children(&self, page: &Page) -> Result<Vec<Page>, ConfluenceError> {
            Ok(self.children.get(&page.id).cloned().unwrap_or_default())
        }

        fn attachments(&self, _page: &Page) -> Result<Vec<Attachment>, ConfluenceError> {
            let mut titles: Vec<_> = self.files.keys().cloned().collect();
            titles.sort();
            Ok(titles
                .into_iter()
                .map(|title| Attachment {
                    id: format!("att-{title}"),
                    title,
                    extensions: None,
                    links: None,
                })
                .collect())
        }

        fn download(&self, attachment: &Attachment) -> Result<Box<dyn Read>, ConfluenceError> {
            let data = self.files.get(&attachment.title).cloned().unwrap_or_default();
            Ok(Box::new(Cursor::new(data)))
        }
    }

    struct FakeRenderer {
        fail: bool,
    }

    impl DiagramRenderer for FakeRenderer {
        fn render_png(&self, _source: &str) -> Result<Vec<u8>, DiagramError> {
            if self.fail {
                Err(DiagramError::InvalidPng { len: 0 })
            } else {
                Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
            }
        }
    }

    fn page(id: &str, title: &str, body: &str) -> Page {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "title": title,
            "body": {"storage": {"value": body}}
        }))
        .unwrap()
    }

    /// Root -> (A -> A1, B)
    fn three_levels() -> (Page, FakeWiki) {
        let mut wiki = FakeWiki::default();
        wiki.add("root", page("a", "A", "<p>a</p>"));
        wiki.add("root", page("b", "B", "<p>b</p>"));
        wiki.add("a", page("a1", "A1", "<p>a1</p>"));
        (page("root", "Root", "<p>root</p>"), wiki)
    }

    fn store(dir: &TempDir) -> AttachmentStore {
        AttachmentStore::new(dir.path(), "attachments", CacheManifest::in_memory())
    }

    fn convert(wiki: &FakeWiki, roots: &[Page], depth: TraversalDepth) -> ConversionReport {
        let tmp = TempDir::new().unwrap();
        let mut store = store(&tmp);
        Converter::new(wiki, &mut store, RenderOptions::default(), depth)
            .convert(roots)
            .unwrap()
    }

    #[test]
    fn test_depth_zero() {
        let (root, wiki) = three_levels();
        let report = convert(&wiki, &[root], TraversalDepth::Limited(0));
        assert_eq!(report.pages, 1);
        assert_eq!(report.markdown, "# Root\n\nroot\n");
    }

    #[test]
    fn test_depth_one() {
        let (root, wiki) = three_levels();
        let report = convert(&wiki, &[root], TraversalDepth::Limited(1));
        assert_eq!(report.pages, 3);
        assert_eq!(
            report.markdown,
            "# Root\n\nroot\n\n## A\n\na\n\n## B\n\nb\n"
        );
    }

    #[test]
    fn test_unbounded_depth() {
        let (root, wiki) = three_levels();
        let report = convert(&wiki, &[root], TraversalDepth::Unbounded);
        assert_eq!(report.pages, 4);
        assert_eq!(
            report.markdown,
            "# Root\n\nroot\n\n## A\n\na\n\n### A1\n\na1\n\n## B\n\nb\n"
        );
    }

    #[test]
    fn test_multiple_roots_concatenated() {
        let wiki = FakeWiki::default();
        let roots = [page("1", "One", "<p>1</p>"), page("2", "Two", "<p>2</p>")];
        let report = convert(&wiki, &roots, TraversalDepth::Unbounded);
        assert_eq!(report.markdown, "# One\n\n1\n\n# Two\n\n2\n");
    }

    #[test]
    fn test_cycle_is_structural() {
        let mut wiki = FakeWiki::default();
        wiki.add("root", page("a", "A", ""));
        wiki.add("a", page("root", "Root", ""));

        let tmp = TempDir::new().unwrap();
        let mut store = store(&tmp);
        let err = Converter::new(&wiki, &mut store, RenderOptions::default(), TraversalDepth::Unbounded)
            .convert(&[page("root", "Root", "")])
            .unwrap_err();
        assert!(matches!(err, ConvertError::Structural(_)), "{err:?}");
    }

    #[test]
    fn test_same_content_stored_once() {
        let mut wiki = FakeWiki::default();
        wiki.files.insert("logo.png".to_owned(), b"same-bytes".to_vec());
        wiki.files.insert("copy.png".to_owned(), b"same-bytes".to_vec());
        let body = r#"<p><ac:image><ri:attachment ri:filename="logo.png" /></ac:image><ac:image><ri:attachment ri:filename="copy.png" /></ac:image></p>"#;

        let tmp = TempDir::new().unwrap();
        let mut store = store(&tmp);
        let report = Converter::new(&wiki, &mut store, RenderOptions::default(), TraversalDepth::Unbounded)
            .convert(&[page("1", "Images", body)])
            .unwrap();

        assert_eq!(report.attachments_written, 1);
        assert_eq!(report.attachments_reused, 1);
        assert!(report.markdown.contains(
            "![logo.png](attachments/logo.png)![copy.png](attachments/logo.png)"
        ));
        let files: Vec<_> = std::fs::read_dir(tmp.path().join("attachments")).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_cache_persists_between_runs() {
        let mut wiki = FakeWiki::default();
        wiki.files.insert("data.csv".to_owned(), b"a,b\n1,2\n".to_vec());
        let body = r#"<p><ac:link><ri:attachment ri:filename="data.csv" /></ac:link></p>"#;
        let tmp = TempDir::new().unwrap();
        let manifest_path = tmp.path().join("attachments").join(c2md_cache::MANIFEST_FILENAME);

        let run = || {
            let mut store = AttachmentStore::new(
                tmp.path(),
                "attachments",
                CacheManifest::load(&manifest_path),
            );
            Converter::new(&wiki, &mut store, RenderOptions::default(), TraversalDepth::Unbounded)
                .convert(&[page("1", "Data", body)])
                .unwrap()
        };

        let first = run();
        let second = run();

        assert_eq!((first.attachments_written, first.attachments_reused), (1, 0));
        assert_eq!((second.attachments_written, second.attachments_reused), (0, 1));
        assert_eq!(first.markdown, second.markdown);
        assert!(second.markdown.contains("[data.csv](attachments/data.csv)"));
    }

    #[test]
    fn test_missing_attachment_warns() {
        let wiki = FakeWiki::default();
        let body = r#"<p><ac:image><ri:attachment ri:filename="gone.png" /></ac:image></p>"#;
        let report = convert(&wiki, &[page("1", "P", body)], TraversalDepth::Unbounded);

        assert!(report.markdown.contains("![gone.png](gone.png)"));
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].contains("gone.png"));
    }

    const UML: &str = r#"<ac:structured-macro ac:name="plantuml"><ac:plain-text-body><![CDATA[A -> B]]></ac:plain-text-body></ac:structured-macro>"#;

    #[test]
    fn test_diagram_rendered_once() {
        let wiki = FakeWiki::default();
        let renderer = FakeRenderer { fail: false };
        let tmp = TempDir::new().unwrap();
        let mut store = store(&tmp);

        let body = format!("{UML}{UML}");
        let report = Converter::new(&wiki, &mut store, RenderOptions::default(), TraversalDepth::Unbounded)
            .with_diagrams(DiagramSettings::new(&renderer))
            .convert(&[page("1", "Flow", &body)])
            .unwrap();

        let prepared = prepare_diagram_source("A -> B", &[], DEFAULT_DPI);
        let name = DiagramKey::new(&prepared.source).file_name();
        assert_eq!(report.diagrams, 1);
        assert_eq!(
            report.markdown,
            format!("# Flow\n\n![](attachments/{name})\n\n![](attachments/{name})\n")
        );
        assert!(tmp.path().join("attachments").join(&name).exists());
    }

    #[test]
    fn test_failed_diagram_kept_as_source() {
        let wiki = FakeWiki::default();
        let renderer = FakeRenderer { fail: true };
        let tmp = TempDir::new().unwrap();
        let mut store = store(&tmp);

        let report = Converter::new(&wiki, &mut store, RenderOptions::default(), TraversalDepth::Unbounded)
            .with_diagrams(DiagramSettings::new(&renderer))
            .convert(&[page("1", "Flow", UML)])
            .unwrap();

        assert_eq!(report.markdown, "# Flow\n\n```plantuml\nA -> B\n```\n");
        assert_eq!(report.diagrams, 0);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_error_mapping() {
        let network = ConvertError::from(ConfluenceError::HttpResponse {
            status: 401,
            body: String::new(),
        });
        assert!(matches!(network, ConvertError::Network(_)));

        let offline = ConvertError::from(ConfluenceError::Offline("no server".to_owned()));
        assert!(matches!(offline, ConvertError::Configuration(_)));

        let io = ConvertError::from(ConfluenceError::Io(std::io::Error::other("disk")));
        assert!(matches!(io, ConvertError::Io(_)));

        let json = serde_json::from_str::<Page>("{").unwrap_err();
        assert!(matches!(
            ConvertError::from(ConfluenceError::Json(json)),
            ConvertError::Structural(_)
        ));
    }
}
