//! Named HTML entities.
//!
//! Storage format is XHTML but Confluence happily emits HTML entities such as
//! `&nbsp;` that an XML reader does not know. They are replaced by their
//! characters before parsing; the five XML entities are left for the reader.
//! CDATA sections hold literal text and are never touched.

use std::sync::LazyLock;

use regex::Regex;

static ENTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&([a-zA-Z][a-zA-Z0-9]*);").unwrap());

const ENTITIES: &[(&str, char)] = &[
    ("nbsp", '\u{00a0}'),
    ("shy", '\u{00ad}'),
    ("mdash", '\u{2014}'),
    ("ndash", '\u{2013}'),
    ("hellip", '\u{2026}'),
    ("bull", '\u{2022}'),
    ("middot", '\u{00b7}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("bdquo", '\u{201e}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("sbquo", '\u{201a}'),
    ("laquo", '\u{00ab}'),
    ("raquo", '\u{00bb}'),
    ("rarr", '\u{2192}'),
    ("larr", '\u{2190}'),
    ("harr", '\u{2194}'),
    ("uarr", '\u{2191}'),
    ("darr", '\u{2193}'),
    ("rArr", '\u{21d2}'),
    ("lArr", '\u{21d0}'),
    ("le", '\u{2264}'),
    ("ge", '\u{2265}'),
    ("ne", '\u{2260}'),
    ("plusmn", '\u{00b1}'),
    ("times", '\u{00d7}'),
    ("divide", '\u{00f7}'),
    ("deg", '\u{00b0}'),
    ("micro", '\u{00b5}'),
    ("copy", '\u{00a9}'),
    ("reg", '\u{00ae}'),
    ("trade", '\u{2122}'),
    ("euro", '\u{20ac}'),
    ("pound", '\u{00a3}'),
    ("yen", '\u{00a5}'),
    ("cent", '\u{00a2}'),
    ("sect", '\u{00a7}'),
    ("para", '\u{00b6}'),
    ("auml", '\u{00e4}'),
    ("ouml", '\u{00f6}'),
    ("uuml", '\u{00fc}'),
    ("Auml", '\u{00c4}'),
    ("Ouml", '\u{00d6}'),
    ("Uuml", '\u{00dc}'),
    ("szlig", '\u{00df}'),
    ("eacute", '\u{00e9}'),
    ("egrave", '\u{00e8}'),
    ("agrave", '\u{00e0}'),
    ("ccedil", '\u{00e7}'),
];

const CDATA_START: &str = "<![CDATA[";
const CDATA_END: &str = "]]>";

/// Replace named HTML entities with Unicode characters.
///
/// Unknown names and the XML entities (`amp`, `lt`, `gt`, `quot`, `apos`)
/// are kept as written, and so is everything inside `<![CDATA[...]]>`.
pub fn convert_html_entities(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(CDATA_START) {
        out.push_str(&replace_entities(&rest[..start]));
        let section = &rest[start..];
        // An unterminated section runs to the end; the reader reports it.
        let end = section
            .find(CDATA_END)
            .map_or(section.len(), |idx| idx + CDATA_END.len());
        out.push_str(&section[..end]);
        rest = &section[end..];
    }
    out.push_str(&replace_entities(rest));
    out
}

fn replace_entities(text: &str) -> std::borrow::Cow<'_, str> {
    ENTITY_PATTERN.replace_all(text, |caps: &regex::Captures| {
        lookup(&caps[1]).map_or_else(|| caps[0].to_owned(), String::from)
    })
}

fn lookup(name: &str) -> Option<char> {
    ENTITIES
        .iter()
        .find(|(entity, _)| *entity == name)
        .map(|(_, ch)| *ch)
}

/// Value of an entity reference the XML reader reported verbatim.
pub fn decode_reference(entity: &str) -> String {
    match entity {
        "lt" => "<".to_owned(),
        "gt" => ">".to_owned(),
        "amp" => "&".to_owned(),
        "apos" => "'".to_owned(),
        "quot" => "\"".to_owned(),
        s if s.starts_with('#') => {
            let code = if let Some(hex) = s.strip_prefix("#x").or_else(|| s.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()
            } else {
                s[1..].parse::<u32>().ok()
            };
            code.and_then(char::from_u32)
                .map_or_else(|| format!("&{entity};"), |c| c.to_string())
        }
        other => lookup(other).map_or_else(|| format!("&{entity};"), String::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_entities_converted() {
        assert_eq!(
            convert_html_entities("a&nbsp;b&mdash;c &copy;"),
            "a\u{00a0}b\u{2014}c \u{00a9}"
        );
    }

    #[test]
    fn test_xml_and_unknown_entities_kept() {
        assert_eq!(
            convert_html_entities("&amp;&lt;&gt;&quot;&bogus;"),
            "&amp;&lt;&gt;&quot;&bogus;"
        );
    }

    #[test]
    fn test_cdata_sections_kept_verbatim() {
        assert_eq!(
            convert_html_entities("&nbsp;<![CDATA[<p>&nbsp;&copy;</p>]]>&copy;<![CDATA[&mdash;]]>"),
            "\u{00a0}<![CDATA[<p>&nbsp;&copy;</p>]]>\u{00a9}<![CDATA[&mdash;]]>"
        );
        assert_eq!(
            convert_html_entities("<![CDATA[&hellip; no end"),
            "<![CDATA[&hellip; no end"
        );
    }

    #[test]
    fn test_decode_reference() {
        assert_eq!(decode_reference("lt"), "<");
        assert_eq!(decode_reference("#65"), "A");
        assert_eq!(decode_reference("#x263A"), "\u{263a}");
        assert_eq!(decode_reference("nbsp"), "\u{00a0}");
        assert_eq!(decode_reference("what"), "&what;");
    }
}
