//! Confluence storage-format reader.
//!
//! Turns a page body into a small element tree. Namespace prefixes (`ac:`,
//! `ri:`) are kept in element and attribute names, so a macro is simply an
//! element named `ac:structured-macro`.

mod entities;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

pub use entities::convert_html_entities;

use crate::error::XhtmlError;

/// Confluence XML namespaces.
const NAMESPACES: &[(&str, &str)] = &[
    ("ac", "http://www.atlassian.com/schema/confluence/4/ac/"),
    ("ri", "http://www.atlassian.com/schema/confluence/4/ri/"),
];

/// Name of the synthetic element wrapping a parsed body.
pub const ROOT_TAG: &str = "root";

/// Node of a parsed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Element with attributes and children.
    Element(Element),
    /// Character data (entities and CDATA already decoded).
    Text(String),
}

/// Element of a parsed body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Qualified name, e.g. `p` or `ac:parameter`.
    pub name: String,
    /// Attributes in document order.
    pub attrs: Vec<(String, String)>,
    /// Child nodes in document order.
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
        }
    }

    /// Value of attribute `name`.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First child element named `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|el| el.name == name)
    }

    /// Concatenated text of all descendants.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    /// For `ac:structured-macro`: the value of `<ac:parameter ac:name="{name}">`.
    #[must_use]
    pub fn macro_parameter(&self, name: &str) -> Option<String> {
        self.elements()
            .find(|el| el.name == "ac:parameter" && el.attr("ac:name") == Some(name))
            .map(Element::text)
    }
}

fn collect_text(element: &Element, out: &mut String) {
    for node in &element.children {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Element(child) => collect_text(child, out),
        }
    }
}

/// Parse a storage-format body.
///
/// The result is a synthetic [`ROOT_TAG`] element holding the body's nodes.
/// Mismatched end tags are tolerated: an end tag closes the nearest open
/// element with the same name, and unknown end tags are ignored.
pub fn parse(html: &str) -> Result<Element, XhtmlError> {
    let html = convert_html_entities(html);
    let namespace_decls = NAMESPACES
        .iter()
        .map(|(prefix, uri)| format!(r#"xmlns:{prefix}="{uri}""#))
        .collect::<Vec<_>>()
        .join(" ");
    let wrapped = format!("<{ROOT_TAG} {namespace_decls}>{html}</{ROOT_TAG}>");

    let mut reader = Reader::from_str(&wrapped);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;

    // Open elements; index 0 is the synthetic root once it has been read.
    let mut stack: Vec<Element> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(open_element(&reader, &e)),
            Event::Empty(e) => push_node(&mut stack, Node::Element(open_element(&reader, &e))),
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?.into_owned();
                push_text(&mut stack, &text);
            }
            Event::GeneralRef(e) => {
                let entity = reader.decoder().decode(&e)?.into_owned();
                push_text(&mut stack, &entities::decode_reference(&entity));
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                push_text(&mut stack, &text);
            }
            Event::End(e) => {
                let name = decode_name(&reader, e.name().as_ref());
                let Some(open_at) = stack.iter().rposition(|el| el.name == name) else {
                    continue;
                };
                while stack.len() > open_at + 1 {
                    close_top(&mut stack);
                }
                if stack.len() == 1 {
                    break;
                }
                close_top(&mut stack);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    while stack.len() > 1 {
        close_top(&mut stack);
    }
    Ok(stack.pop().unwrap_or_default())
}

fn close_top(stack: &mut Vec<Element>) {
    if let Some(done) = stack.pop() {
        push_node(stack, Node::Element(done));
    }
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    if let Some(Node::Text(existing)) = parent.children.last_mut() {
        existing.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_owned()));
    }
}

fn open_element(reader: &Reader<&[u8]>, e: &BytesStart) -> Element {
    Element::new(
        decode_name(reader, e.name().as_ref()),
        decode_attrs(reader, e),
    )
}

fn decode_name(reader: &Reader<&[u8]>, name: &[u8]) -> String {
    reader.decoder().decode(name).map_or_else(
        |_| String::from_utf8_lossy(name).into_owned(),
        std::borrow::Cow::into_owned,
    )
}

fn decode_attrs(reader: &Reader<&[u8]>, e: &BytesStart) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    for attr in e.attributes().flatten() {
        let key = decode_name(reader, attr.key.as_ref());

        // Skip namespace declarations
        if key.starts_with("xmlns") {
            continue;
        }

        let value = attr.unescape_value().map_or_else(
            |_| String::from_utf8_lossy(&attr.value).into_owned(),
            std::borrow::Cow::into_owned,
        );
        attrs.push((key, value));
    }
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn first(root: &Element) -> &Element {
        root.elements().next().unwrap()
    }

    #[test]
    fn test_parse_simple_element() {
        let root = parse("<p>Hello</p>").unwrap();
        assert_eq!(root.name, ROOT_TAG);
        let p = first(&root);
        assert_eq!(p.name, "p");
        assert_eq!(p.children, vec![Node::Text("Hello".to_owned())]);
    }

    #[test]
    fn test_parse_nested_and_tail_text() {
        let root = parse("<p><strong>Bold</strong> text</p>").unwrap();
        let p = first(&root);
        assert_eq!(p.children.len(), 2);
        assert_eq!(first(p).name, "strong");
        assert_eq!(p.children[1], Node::Text(" text".to_owned()));
        assert_eq!(p.text(), "Bold text");
    }

    #[test]
    fn test_parse_html_and_xml_entities() {
        let root = parse("<p>a&nbsp;b &amp; c&#33;</p>").unwrap();
        assert_eq!(first(&root).text(), "a\u{00a0}b & c!");
    }

    #[test]
    fn test_parse_macro_with_cdata() {
        let html = r#"<ac:structured-macro ac:name="code"><ac:parameter ac:name="language">rust</ac:parameter><ac:plain-text-body><![CDATA[fn main() { 1 < 2; }]]></ac:plain-text-body></ac:structured-macro>"#;
        let root = parse(html).unwrap();
        let macro_el = first(&root);

        assert_eq!(macro_el.name, "ac:structured-macro");
        assert_eq!(macro_el.attr("ac:name"), Some("code"));
        assert_eq!(macro_el.macro_parameter("language"), Some("rust".to_owned()));
        assert_eq!(
            macro_el.child("ac:plain-text-body").unwrap().text(),
            "fn main() { 1 < 2; }"
        );
    }

    #[test]
    fn test_parse_self_closing() {
        let html = r#"<p>Before<br />After<ri:attachment ri:filename="a b.png" /></p>"#;
        let root = parse(html).unwrap();
        let p = first(&root);
        let names: Vec<_> = p.elements().map(|el| el.name.as_str()).collect();
        assert_eq!(names, vec!["br", "ri:attachment"]);

        let attachment = p.child("ri:attachment").unwrap();
        assert_eq!(attachment.attr("ri:filename"), Some("a b.png"));
    }

    #[test]
    fn test_mismatched_end_tags_tolerated() {
        let root = parse("<ul><li>one<li>two</ul><p>after</p>").unwrap();
        let names: Vec<_> = root.elements().map(|el| el.name.as_str()).collect();
        assert_eq!(names, vec!["ul", "p"]);
        assert_eq!(root.child("p").unwrap().text(), "after");
    }

    #[test]
    fn test_empty_body() {
        let root = parse("").unwrap();
        assert_eq!(root.name, ROOT_TAG);
        assert!(root.children.is_empty());
    }
}
