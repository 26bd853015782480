//! Confluence storage format to Markdown.
//!
//! Pages are rendered one at a time but share a [`MarkdownRenderer`], so
//! footnote labels keep counting up across the pages of one document.
//! Attachments and diagrams are resolved through a [`ResourceResolver`]
//! supplied by the caller.

use c2md_config::OutputConfig;
use c2md_confluence::xhtml::{self, Element, Node};
use c2md_confluence::{Page, XhtmlError};

/// Rendering switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Page title level follows the page's depth in the hierarchy.
    pub hierarchy_headers: bool,
    /// Drop everything up to the first `-` of page titles.
    pub transform_titles: bool,
    /// Emit a title header for root pages.
    pub root_page_title: bool,
    /// External links become footnotes.
    pub footnotes: bool,
    /// Headers deeper than this are rendered as bold text.
    pub max_header_depth: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            hierarchy_headers: true,
            transform_titles: true,
            root_page_title: true,
            footnotes: true,
            max_header_depth: 5,
        }
    }
}

impl From<&OutputConfig> for RenderOptions {
    fn from(config: &OutputConfig) -> Self {
        Self {
            hierarchy_headers: config.hierarchy_headers,
            transform_titles: config.transform_titles,
            root_page_title: config.root_page_title,
            footnotes: config.footnotes,
            max_header_depth: config.max_header_depth,
        }
    }
}

/// Supplies local paths for resources referenced by a page.
pub trait ResourceResolver {
    /// Error aborting the render.
    type Error: From<XhtmlError>;

    /// Path to reference for attachment `file_name` of the current page.
    fn attachment(&mut self, file_name: &str) -> Result<String, Self::Error>;

    /// Path of the rendered image for a `PlantUML` source, or `None` to keep
    /// the source as a code block.
    fn diagram(&mut self, source: &str) -> Result<Option<String>, Self::Error>;
}

/// Renders pages to Markdown.
#[derive(Debug, Default)]
pub struct MarkdownRenderer {
    options: RenderOptions,
    footnote_count: usize,
}

impl MarkdownRenderer {
    /// Create a renderer.
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            footnote_count: 0,
        }
    }

    /// Rendering switches in use.
    #[must_use]
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render `page` found at `level` of the hierarchy (0 = root).
    ///
    /// Returns an empty string for a page with neither title nor content.
    ///
    /// # Errors
    ///
    /// Fails if the body is not readable storage format or the resolver
    /// fails.
    pub fn render_page<R: ResourceResolver>(
        &mut self,
        page: &Page,
        level: u32,
        resolver: &mut R,
    ) -> Result<String, R::Error> {
        let title_level = if self.options.hierarchy_headers {
            level + 1
        } else {
            1
        };

        let mut parts = Vec::new();
        if level > 0 || self.options.root_page_title {
            let title = if self.options.transform_titles {
                transform_title(&page.title)
            } else {
                page.title.as_str()
            };
            parts.push(header(title_level, &escape(title), self.options.max_header_depth));
        }

        let root = xhtml::parse(page.storage_html())?;
        let mut ctx = PageContext {
            options: &self.options,
            title_level,
            resolver,
            footnote_count: &mut self.footnote_count,
            footnotes: Vec::new(),
        };
        parts.extend(ctx.blocks(&root.children)?);

        if !ctx.footnotes.is_empty() {
            let definitions: Vec<String> = ctx
                .footnotes
                .iter()
                .map(|(n, url)| format!("[^{n}]: {url}"))
                .collect();
            parts.push(definitions.join("\n"));
        }

        Ok(parts.join("\n\n"))
    }
}

/// Cut a title through its first `-`: `"Project - Intro"` becomes `"Intro"`.
///
/// Titles without `-`, or with nothing after it, are returned unchanged.
#[must_use]
pub fn transform_title(title: &str) -> &str {
    match title.split_once('-') {
        Some((_, rest)) if !rest.trim().is_empty() => rest.trim(),
        _ => title,
    }
}

fn header(level: u32, text: &str, max_depth: u8) -> String {
    if level > u32::from(max_depth) {
        format!("**{text}**")
    } else {
        format!("{} {text}", "#".repeat(level as usize))
    }
}

/// Per-page rendering state.
struct PageContext<'a, R: ResourceResolver> {
    options: &'a RenderOptions,
    title_level: u32,
    resolver: &'a mut R,
    footnote_count: &'a mut usize,
    footnotes: Vec<(usize, String)>,
}

impl<R: ResourceResolver> PageContext<'_, R> {
    /// Render nodes as Markdown blocks; loose inline content becomes paragraphs.
    fn blocks(&mut self, nodes: &[Node]) -> Result<Vec<String>, R::Error> {
        let mut blocks = Vec::new();
        let mut inline = String::new();

        for node in nodes {
            match node {
                Node::Element(el) if is_block(el) => {
                    flush_paragraph(&mut inline, &mut blocks);
                    blocks.extend(self.block(el)?);
                }
                _ => inline.push_str(&self.inline_node(node)?),
            }
        }
        flush_paragraph(&mut inline, &mut blocks);

        Ok(blocks)
    }

    fn block(&mut self, el: &Element) -> Result<Vec<String>, R::Error> {
        let rendered = match el.name.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let depth: u32 = el.name[1..].parse().unwrap_or(1);
                let text = self.inline_children(el)?;
                let text = text.trim();
                if text.is_empty() {
                    return Ok(Vec::new());
                }
                header(depth + self.title_level, text, self.options.max_header_depth)
            }
            "ul" => self.list(el, false)?,
            "ol" => self.list(el, true)?,
            "table" => self.table(el)?,
            "pre" => fence("", &el.text()),
            "blockquote" => quote(&self.blocks(&el.children)?.join("\n\n")),
            "hr" => "---".to_owned(),
            "ac:structured-macro" => return self.structured_macro(el),
            "ac:task-list" => self.task_list(el)?,
            _ => return self.blocks(&el.children),
        };

        Ok(if rendered.is_empty() {
            Vec::new()
        } else {
            vec![rendered]
        })
    }

    fn inline_node(&mut self, node: &Node) -> Result<String, R::Error> {
        match node {
            Node::Text(text) => Ok(escape(&collapse_whitespace(text))),
            Node::Element(el) => self.inline_element(el),
        }
    }

    fn inline_children(&mut self, el: &Element) -> Result<String, R::Error> {
        let mut out = String::new();
        for node in &el.children {
            out.push_str(&self.inline_node(node)?);
        }
        Ok(out)
    }

    fn inline_element(&mut self, el: &Element) -> Result<String, R::Error> {
        Ok(match el.name.as_str() {
            "strong" | "b" => wrap(&self.inline_children(el)?, "**"),
            "em" | "i" => wrap(&self.inline_children(el)?, "*"),
            "s" | "del" | "strike" => wrap(&self.inline_children(el)?, "~~"),
            "code" | "tt" => code_span(&collapse_whitespace(&el.text())),
            "br" => "  \n".to_owned(),
            "a" => {
                let label = self.inline_children(el)?;
                self.link(label.trim(), el.attr("href").unwrap_or_default())
            }
            "img" => image(
                el.attr("alt").unwrap_or_default(),
                el.attr("src").unwrap_or_default(),
            ),
            "ac:image" => self.confluence_image(el)?,
            "ac:link" => self.confluence_link(el)?,
            "ac:structured-macro" => match el.attr("ac:name") {
                Some("status") => el
                    .macro_parameter("title")
                    .map(|title| wrap(&escape(&title), "**"))
                    .unwrap_or_default(),
                _ => String::new(),
            },
            "ac:emoticon" | "ac:placeholder" | "ac:parameter" => String::new(),
            _ => self.inline_children(el)?,
        })
    }

    fn link(&mut self, label: &str, href: &str) -> String {
        if href.is_empty() || href.starts_with('#') {
            return label.to_owned();
        }
        if label.is_empty() {
            return format!("<{href}>");
        }
        if self.options.footnotes && is_external(href) {
            *self.footnote_count += 1;
            let n = *self.footnote_count;
            self.footnotes.push((n, href.to_owned()));
            return format!("{label}[^{n}]");
        }
        format!("[{label}]({})", link_target(href))
    }

    fn confluence_image(&mut self, el: &Element) -> Result<String, R::Error> {
        let alt = el.attr("ac:alt").or_else(|| el.attr("ac:title"));

        if let Some(name) = el.child("ri:attachment").and_then(|a| a.attr("ri:filename")) {
            let path = self.resolver.attachment(name)?;
            return Ok(image(&escape(alt.unwrap_or(name)), &path));
        }
        if let Some(url) = el.child("ri:url").and_then(|u| u.attr("ri:value")) {
            return Ok(image(&escape(alt.unwrap_or_default()), url));
        }
        Ok(String::new())
    }

    fn confluence_link(&mut self, el: &Element) -> Result<String, R::Error> {
        let body = match (el.child("ac:link-body"), el.child("ac:plain-text-link-body")) {
            (Some(rich), _) => self.inline_children(rich)?.trim().to_owned(),
            (None, Some(plain)) => escape(plain.text().trim()),
            (None, None) => String::new(),
        };
        let label = |fallback: Option<&str>| {
            if body.is_empty() {
                escape(fallback.unwrap_or_default())
            } else {
                body.clone()
            }
        };

        if let Some(name) = el.child("ri:attachment").and_then(|a| a.attr("ri:filename")) {
            let path = self.resolver.attachment(name)?;
            return Ok(format!("[{}]({})", label(Some(name)), link_target(&path)));
        }
        if let Some(target) = el.child("ri:page") {
            return Ok(label(target.attr("ri:content-title")));
        }
        if let Some(url) = el.child("ri:url").and_then(|u| u.attr("ri:value")) {
            let text = label(Some(url));
            return Ok(self.link(&text, url));
        }
        if let Some(user) = el.child("ri:user") {
            return Ok(label(user.attr("ri:username")));
        }
        Ok(label(el.attr("ac:anchor")))
    }

    fn structured_macro(&mut self, el: &Element) -> Result<Vec<String>, R::Error> {
        let name = el.attr("ac:name").unwrap_or_default();
        let plain_body = el.child("ac:plain-text-body").map(Element::text);
        let rich_body = el.child("ac:rich-text-body");

        let rendered = match name {
            "code" | "noformat" | "plantuml" => {
                let source = plain_body.unwrap_or_default();
                let language = match name {
                    "code" => el.macro_parameter("language").unwrap_or_default(),
                    "plantuml" => "plantuml".to_owned(),
                    _ => String::new(),
                };
                if language.eq_ignore_ascii_case("plantuml") {
                    match self.resolver.diagram(&source)? {
                        Some(path) => image("", &path),
                        None => fence("plantuml", &source),
                    }
                } else {
                    fence(&language, &source)
                }
            }
            "info" | "note" | "tip" | "warning" | "panel" => {
                let mut blocks = Vec::new();
                if let Some(title) = el.macro_parameter("title").filter(|t| !t.trim().is_empty()) {
                    blocks.push(wrap(&escape(title.trim()), "**"));
                }
                if let Some(body) = rich_body {
                    blocks.extend(self.blocks(&body.children)?);
                }
                quote(&blocks.join("\n\n"))
            }
            _ => {
                if let Some(body) = rich_body {
                    return self.blocks(&body.children);
                }
                match plain_body {
                    Some(text) if !text.trim().is_empty() => fence("", &text),
                    _ => String::new(),
                }
            }
        };

        Ok(if rendered.is_empty() {
            Vec::new()
        } else {
            vec![rendered]
        })
    }

    fn list(&mut self, el: &Element, ordered: bool) -> Result<String, R::Error> {
        let mut items = Vec::new();
        for (index, item) in el.elements().filter(|e| e.name == "li").enumerate() {
            let marker = if ordered {
                format!("{}. ", index + 1)
            } else {
                "- ".to_owned()
            };
            let content = self.blocks(&item.children)?.join("\n");
            items.push(list_item(&marker, &content));
        }
        Ok(items.join("\n"))
    }

    fn task_list(&mut self, el: &Element) -> Result<String, R::Error> {
        let mut items = Vec::new();
        for task in el.elements().filter(|e| e.name == "ac:task") {
            let done = task
                .child("ac:task-status")
                .is_some_and(|s| s.text().trim() == "complete");
            let body = match task.child("ac:task-body") {
                Some(body) => self.inline_children(body)?.trim().to_owned(),
                None => String::new(),
            };
            let marker = if done { "- [x] " } else { "- [ ] " };
            items.push(format!("{marker}{body}").trim_end().to_owned());
        }
        Ok(items.join("\n"))
    }

    fn table(&mut self, el: &Element) -> Result<String, R::Error> {
        let mut rows = Vec::new();
        collect_rows(el, &mut rows);

        let mut cells: Vec<Vec<String>> = Vec::with_capacity(rows.len());
        for row in rows {
            let mut rendered = Vec::new();
            for cell in row.elements().filter(|e| e.name == "th" || e.name == "td") {
                let text = self.blocks(&cell.children)?.join(" ");
                rendered.push(text.replace('\n', " ").replace('|', "\\|"));
            }
            cells.push(rendered);
        }

        let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return Ok(String::new());
        }

        let mut lines = Vec::with_capacity(cells.len() + 1);
        for (index, mut row) in cells.into_iter().enumerate() {
            row.resize(columns, String::new());
            lines.push(format!("| {} |", row.join(" | ")));
            if index == 0 {
                lines.push(format!("|{}", " --- |".repeat(columns)));
            }
        }
        Ok(lines.join("\n"))
    }
}

fn is_block(el: &Element) -> bool {
    match el.name.as_str() {
        "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "ul" | "ol" | "table" | "pre"
        | "blockquote" | "hr" | "div" | "section" | "ac:task-list" | "ac:layout"
        | "ac:layout-section" | "ac:layout-cell" | "ac:rich-text-body" => true,
        "ac:structured-macro" => !matches!(el.attr("ac:name"), Some("status" | "anchor")),
        "strong" | "b" | "em" | "i" | "s" | "del" | "strike" | "u" | "code" | "tt" | "span"
        | "a" | "sub" | "sup" | "br" | "img" | "ac:image" | "ac:link" | "ac:emoticon"
        | "ac:placeholder" => false,
        _ => el.elements().any(is_block),
    }
}

fn collect_rows<'e>(el: &'e Element, rows: &mut Vec<&'e Element>) {
    for child in el.elements() {
        match child.name.as_str() {
            "tr" => rows.push(child),
            "thead" | "tbody" | "tfoot" => collect_rows(child, rows),
            _ => {}
        }
    }
}

fn flush_paragraph(inline: &mut String, blocks: &mut Vec<String>) {
    let text = inline.trim();
    if !text.is_empty() {
        blocks.push(text.to_owned());
    }
    inline.clear();
}

/// First line after `marker`, continuation lines indented by four spaces.
fn list_item(marker: &str, content: &str) -> String {
    let mut lines = content.lines();
    let mut out = format!("{marker}{}", lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str("    ");
            out.push_str(line);
        }
    }
    out.trim_end().to_owned()
}

fn quote(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    text.lines()
        .map(|line| {
            if line.is_empty() {
                ">".to_owned()
            } else {
                format!("> {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fence(language: &str, code: &str) -> String {
    let longest_run = code
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    let ticks = "`".repeat(longest_run.max(2) + 1);
    format!(
        "{ticks}{}\n{}\n{ticks}",
        language.trim(),
        code.trim_matches(|c| c == '\n' || c == '\r')
    )
}

fn code_span(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    if code.contains('`') {
        format!("`` {code} ``")
    } else {
        format!("`{code}`")
    }
}

fn image(alt: &str, target: &str) -> String {
    format!("![{alt}]({})", link_target(target))
}

fn link_target(target: &str) -> String {
    if target.contains(' ') {
        format!("<{target}>")
    } else {
        target.to_owned()
    }
}

fn is_external(href: &str) -> bool {
    ["http://", "https://", "ftp://", "mailto:"]
        .iter()
        .any(|scheme| href.starts_with(scheme))
}

/// Wrap `inner` in `marker`, keeping surrounding whitespace outside.
fn wrap(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return inner.to_owned();
    }
    let lead = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if inner.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{marker}{trimmed}{marker}{trail}")
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Backslash-escape Markdown emphasis, code and link characters.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
