//! Locating `PlantUML` macros in raw storage format and adding image tags.
//!
//! Offsets refer to the unmodified page body, so the body can be edited
//! without re-serializing it.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::XhtmlError;

const MACRO_TAG: &[u8] = b"ac:structured-macro";
const BODY_TAG: &[u8] = b"ac:plain-text-body";
const ROOT_OPEN: &str = r#"<root xmlns:ac="http://www.atlassian.com/schema/confluence/4/ac/" xmlns:ri="http://www.atlassian.com/schema/confluence/4/ri/">"#;

/// A `plantuml` structured macro found in a page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UmlMacro {
    /// Diagram source from the plain-text body.
    pub source: String,
    /// Byte offset just past `</ac:structured-macro>`.
    pub end: usize,
}

struct OpenMacro {
    is_uml: bool,
    in_body: bool,
    source: String,
}

/// Find all `plantuml` macros, in document order.
pub fn find_uml_macros(html: &str) -> Result<Vec<UmlMacro>, XhtmlError> {
    let wrapped = format!("{ROOT_OPEN}{html}</root>");
    let mut reader = Reader::from_str(&wrapped);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;

    let mut open: Vec<OpenMacro> = Vec::new();
    let mut found = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == MACRO_TAG => open.push(OpenMacro {
                is_uml: is_uml_macro(&e),
                in_body: false,
                source: String::new(),
            }),
            Event::Start(e) if e.name().as_ref() == BODY_TAG => {
                if let Some(current) = open.last_mut() {
                    current.in_body = true;
                }
            }
            Event::End(e) if e.name().as_ref() == BODY_TAG => {
                if let Some(current) = open.last_mut() {
                    current.in_body = false;
                }
            }
            Event::End(e) if e.name().as_ref() == MACRO_TAG => {
                let Some(done) = open.pop() else { continue };
                if done.is_uml {
                    let position = usize::try_from(reader.buffer_position()).unwrap_or(wrapped.len());
                    found.push(UmlMacro {
                        source: done.source,
                        end: position.saturating_sub(ROOT_OPEN.len()).min(html.len()),
                    });
                }
            }
            Event::CData(e) => {
                if let Some(current) = open.last_mut().filter(|m| m.in_body) {
                    current.source.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Text(e) => {
                if let Some(current) = open.last_mut().filter(|m| m.in_body) {
                    current.source.push_str(&reader.decoder().decode(&e)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(found)
}

fn is_uml_macro(e: &BytesStart) -> bool {
    e.try_get_attribute("ac:name")
        .ok()
        .flatten()
        .is_some_and(|attr| attr.value.as_ref() == b"plantuml")
}

/// Storage-format tag showing an attached image.
#[must_use]
pub fn image_tag(file_name: &str) -> String {
    format!(r#"<ac:image><ri:attachment ri:filename="{file_name}" /></ac:image>"#)
}

/// Insert an image tag after each macro unless the same tag already follows it.
///
/// `placements` pairs macro end offsets with attachment file names. Returns
/// the new body and the number of inserted tags.
#[must_use]
pub fn insert_image_tags(html: &str, placements: &[(usize, String)]) -> (String, usize) {
    let mut result = String::with_capacity(html.len() + placements.len() * 80);
    let mut copied = 0;
    let mut inserted = 0;

    for (end, file_name) in placements {
        let tag = image_tag(file_name);
        if html[*end..].trim_start().starts_with(&tag) {
            continue;
        }
        result.push_str(&html[copied..*end]);
        result.push_str(&tag);
        copied = *end;
        inserted += 1;
    }
    result.push_str(&html[copied..]);

    (result, inserted)
}
