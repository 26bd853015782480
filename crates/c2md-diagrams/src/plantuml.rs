//! `PlantUML` source preparation.
//!
//! Before rendering, a diagram source found in a Confluence page is:
//! - wrapped in `@startuml`/`@enduml` if the author left them out
//! - stripped of `!include` indirection by inlining files from include directories
//! - given a `skinparam dpi` line right after `@startuml`

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

static INCLUDE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^([ \t]*)!include\s+(.+?)\s*$").unwrap());

/// Maximum nesting of `!include` files.
const MAX_INCLUDE_DEPTH: usize = 10;

/// Prepared diagram source with any warnings produced on the way.
#[derive(Debug)]
pub struct PrepareResult {
    /// Source ready for the renderer.
    pub source: String,
    /// Non-fatal problems (unresolved includes, include depth exceeded).
    pub warnings: Vec<String>,
}

/// Whether `source` looks like a `PlantUML` diagram.
#[must_use]
pub fn is_plantuml_source(source: &str) -> bool {
    source.trim_start().starts_with("@start")
}

/// Prepare `PlantUML` source for rendering.
///
/// # Arguments
/// * `source` - Raw diagram source from the page
/// * `include_dirs` - Directories searched for `!include` files
/// * `dpi` - DPI setting for rendering
#[must_use]
pub fn prepare_diagram_source(source: &str, include_dirs: &[PathBuf], dpi: u32) -> PrepareResult {
    let mut warnings = Vec::new();

    let trimmed = source.trim();
    let wrapped = if is_plantuml_source(trimmed) {
        trimmed.to_owned()
    } else {
        format!("@startuml\n{trimmed}\n@enduml")
    };

    let resolved = resolve_includes(&wrapped, include_dirs, 0, &mut warnings);
    let source = inject_dpi(&resolved, dpi);

    PrepareResult { source, warnings }
}

/// Insert `skinparam dpi` after the first `@start...` line.
fn inject_dpi(source: &str, dpi: u32) -> String {
    let setting = format!("skinparam dpi {dpi}\n");
    match source.find("@start") {
        Some(pos) => match source[pos..].find('\n') {
            Some(newline) => {
                let insert_at = pos + newline + 1;
                let mut result = String::with_capacity(source.len() + setting.len());
                result.push_str(&source[..insert_at]);
                result.push_str(&setting);
                result.push_str(&source[insert_at..]);
                result
            }
            None => format!("{source}\n{setting}"),
        },
        None => format!("{setting}{source}"),
    }
}

fn resolve_includes(
    source: &str,
    include_dirs: &[PathBuf],
    depth: usize,
    warnings: &mut Vec<String>,
) -> String {
    if depth > MAX_INCLUDE_DEPTH {
        warnings.push(format!(
            "Include depth exceeded maximum of {MAX_INCLUDE_DEPTH}"
        ));
        return source.to_owned();
    }

    INCLUDE_PATTERN
        .replace_all(source, |caps: &regex::Captures| {
            let indent = &caps[1];
            let target = caps[2].trim();

            // Standard library includes are resolved by PlantUML itself
            if target.starts_with('<') && target.ends_with('>') {
                return caps[0].to_owned();
            }

            let found = include_dirs
                .iter()
                .find_map(|dir| std::fs::read_to_string(dir.join(target)).ok());

            match found {
                Some(content) => {
                    let resolved = resolve_includes(&content, include_dirs, depth + 1, warnings);
                    indent_lines(resolved.trim_end(), indent)
                }
                None => {
                    warnings.push(format!("Include file not found: '{target}'"));
                    caps[0].to_owned()
                }
            }
        })
        .into_owned()
}

/// Prefix every non-empty line with `indent`.
fn indent_lines(content: &str, indent: &str) -> String {
    if indent.is_empty() {
        return content.to_owned();
    }
    content
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{indent}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DEFAULT_DPI;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_dpi_injected_after_startuml() {
        let result = prepare_diagram_source("@startuml\nAlice -> Bob\n@enduml", &[], DEFAULT_DPI);
        assert_eq!(
            result.source,
            "@startuml\nskinparam dpi 192\nAlice -> Bob\n@enduml"
        );
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_missing_startuml_is_wrapped() {
        let result = prepare_diagram_source("  Alice -> Bob  \n", &[], 96);
        assert_eq!(
            result.source,
            "@startuml\nskinparam dpi 96\nAlice -> Bob\n@enduml"
        );
    }

    #[test]
    fn test_is_plantuml_source() {
        assert!(is_plantuml_source("\n@startuml\nA -> B\n@enduml"));
        assert!(is_plantuml_source("@startmindmap\n* root\n@endmindmap"));
        assert!(!is_plantuml_source("fn main() {}"));
    }

    #[test]
    fn test_include_resolved_and_indented() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("actors.iuml"), "actor User\n\nactor Admin\n").unwrap();

        let source = "@startuml\n  !include actors.iuml\nUser -> Admin\n@enduml";
        let result = prepare_diagram_source(source, &[tmp.path().to_path_buf()], DEFAULT_DPI);

        assert!(result.warnings.is_empty());
        assert!(result.source.contains("  actor User\n\n  actor Admin\n"));
        assert!(!result.source.contains("!include"));
    }

    #[test]
    fn test_nested_includes() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("inner.iuml"), "InnerContent").unwrap();
        std::fs::write(tmp.path().join("outer.iuml"), "Before\n!include inner.iuml\nAfter").unwrap();

        let result = prepare_diagram_source(
            "@startuml\n!include outer.iuml\n@enduml",
            &[tmp.path().to_path_buf()],
            DEFAULT_DPI,
        );

        assert!(result.warnings.is_empty());
        assert!(result.source.contains("Before\nInnerContent\nAfter"));
    }

    #[test]
    fn test_unresolved_include_warns() {
        let result = prepare_diagram_source("@startuml\n!include missing.iuml\n@enduml", &[], DEFAULT_DPI);
        assert_eq!(result.warnings, vec!["Include file not found: 'missing.iuml'".to_owned()]);
        assert!(result.source.contains("!include missing.iuml"));
    }

    #[test]
    fn test_stdlib_include_untouched() {
        let result = prepare_diagram_source(
            "@startuml\n!include <C4/C4_Context>\n@enduml",
            &[],
            DEFAULT_DPI,
        );
        assert!(result.warnings.is_empty());
        assert!(result.source.contains("!include <C4/C4_Context>"));
    }

    #[test]
    fn test_recursive_include_stops() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("loop.iuml"), "!include loop.iuml\nX").unwrap();

        let result = prepare_diagram_source(
            "@startuml\n!include loop.iuml\n@enduml",
            &[tmp.path().to_path_buf()],
            DEFAULT_DPI,
        );

        assert!(result.warnings.iter().any(|w| w.contains("depth exceeded")));
    }
}
