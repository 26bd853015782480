//! Bounded-depth pre-order traversal of a page hierarchy.

use std::collections::HashSet;

use crate::error::ConfluenceError;
use crate::source::PageTree;
use crate::types::Page;

/// How far below the root a traversal descends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalDepth {
    /// Whole hierarchy.
    #[default]
    Unbounded,
    /// At most this many levels below the root (0 = root only).
    Limited(u32),
}

/// Depth below -1 given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid depth {0}: expected -1 (unlimited) or a non-negative number")]
pub struct InvalidDepth(pub i64);

impl TryFrom<i64> for TraversalDepth {
    type Error = InvalidDepth;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Unbounded),
            n => u32::try_from(n).map(Self::Limited).map_err(|_| InvalidDepth(n)),
        }
    }
}

impl TraversalDepth {
    /// Whether pages at `level` get their children visited.
    #[must_use]
    pub fn descends_below(self, level: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Limited(max) => level < max,
        }
    }
}

/// Visits a page and its descendants, parents before children.
///
/// Children embedded in a page (`children.page` expansion) are used as they
/// are; otherwise they are requested from the [`PageTree`]. Visiting a page
/// ID twice during one walk is reported as a cycle.
pub struct PageWalker<'a, T: PageTree + ?Sized> {
    tree: &'a T,
    depth: TraversalDepth,
}

impl<'a, T: PageTree + ?Sized> PageWalker<'a, T> {
    /// Create a walker over `tree`.
    #[must_use]
    pub fn new(tree: &'a T, depth: TraversalDepth) -> Self {
        Self { tree, depth }
    }

    /// Walk from `root`, calling `visit(page, level)` for every page.
    ///
    /// The root has level 0. The walk stops at the first error, whether it
    /// comes from the visitor or from fetching children.
    pub fn walk<E, F>(&self, root: &Page, mut visit: F) -> Result<(), E>
    where
        E: From<ConfluenceError>,
        F: FnMut(&Page, u32) -> Result<(), E>,
    {
        let mut visited = HashSet::new();
        self.walk_page(root, 0, &mut visited, &mut visit)
    }

    fn walk_page<E, F>(
        &self,
        page: &Page,
        level: u32,
        visited: &mut HashSet<String>,
        visit: &mut F,
    ) -> Result<(), E>
    where
        E: From<ConfluenceError>,
        F: FnMut(&Page, u32) -> Result<(), E>,
    {
        if !visited.insert(page.id.clone()) {
            return Err(ConfluenceError::Structural(format!(
                "page hierarchy contains a cycle at page {} '{}'",
                page.id, page.title
            ))
            .into());
        }

        visit(page, level)?;

        if !self.depth.descends_below(level) {
            return Ok(());
        }

        let fetched;
        let children = if let Some(embedded) = page.embedded_children() {
            embedded
        } else {
            fetched = self.tree.children(page)?;
            fetched.as_slice()
        };

        for child in children {
            self.walk_page(child, level + 1, visited, visit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::io::Read;

    use super::*;
    use crate::types::Attachment;
    use pretty_assertions::assert_eq;

    /// In-memory hierarchy keyed by parent ID.
    #[derive(Default)]
    pub(crate) struct FakeTree {
        pub(crate) children: HashMap<String, Vec<Page>>,
    }

    pub(crate) fn page(id: &str, title: &str) -> Page {
        serde_json::from_value(serde_json::json!({"id": id, "title": title})).unwrap()
    }

    impl FakeTree {
        pub(crate) fn add(&mut self, parent: &str, child: Page) {
            self.children.entry(parent.to_owned()).or_default().push(child);
        }
    }

    impl PageTree for FakeTree {
        fn children(&self, page: &Page) -> Result<Vec<Page>, ConfluenceError> {
            Ok(self.children.get(&page.id).cloned().unwrap_or_default())
        }

        fn attachments(&self, _page: &Page) -> Result<Vec<Attachment>, ConfluenceError> {
            Ok(Vec::new())
        }

        fn download(&self, attachment: &Attachment) -> Result<Box<dyn Read>, ConfluenceError> {
            Err(ConfluenceError::Offline(attachment.title.clone()))
        }
    }

    /// root -> (a -> a1, b)
    fn three_levels() -> (Page, FakeTree) {
        let mut tree = FakeTree::default();
        tree.add("root", page("a", "A"));
        tree.add("root", page("b", "B"));
        tree.add("a", page("a1", "A1"));
        (page("root", "Root"), tree)
    }

    fn visit_all(tree: &FakeTree, root: &Page, depth: TraversalDepth) -> Vec<(String, u32)> {
        let mut seen = Vec::new();
        PageWalker::new(tree, depth)
            .walk::<ConfluenceError, _>(root, |page, level| {
                seen.push((page.title.clone(), level));
                Ok(())
            })
            .unwrap();
        seen
    }

    fn titled(pairs: &[(&str, u32)]) -> Vec<(String, u32)> {
        pairs.iter().map(|(t, l)| ((*t).to_owned(), *l)).collect()
    }

    #[test]
    fn test_depth_zero_visits_root_only() {
        let (root, tree) = three_levels();
        assert_eq!(
            visit_all(&tree, &root, TraversalDepth::Limited(0)),
            titled(&[("Root", 0)])
        );
    }

    #[test]
    fn test_depth_one_visits_children() {
        let (root, tree) = three_levels();
        assert_eq!(
            visit_all(&tree, &root, TraversalDepth::Limited(1)),
            titled(&[("Root", 0), ("A", 1), ("B", 1)])
        );
    }

    #[test]
    fn test_unbounded_is_pre_order() {
        let (root, tree) = three_levels();
        assert_eq!(
            visit_all(&tree, &root, TraversalDepth::Unbounded),
            titled(&[("Root", 0), ("A", 1), ("A1", 2), ("B", 1)])
        );
    }

    #[test]
    fn test_embedded_children_preferred() {
        let root: Page = serde_json::from_value(serde_json::json!({
            "id": "root",
            "title": "Root",
            "children": {"page": {"results": [{"id": "e", "title": "Embedded"}]}}
        }))
        .unwrap();
        let (_, tree) = three_levels();

        assert_eq!(
            visit_all(&tree, &root, TraversalDepth::Limited(1)),
            titled(&[("Root", 0), ("Embedded", 1)])
        );
    }

    #[test]
    fn test_cycle_is_structural_error() {
        let mut tree = FakeTree::default();
        tree.add("root", page("a", "A"));
        tree.add("a", page("root", "Root again"));

        let result = PageWalker::new(&tree, TraversalDepth::Unbounded)
            .walk::<ConfluenceError, _>(&page("root", "Root"), |_, _| Ok(()));
        assert!(matches!(result, Err(ConfluenceError::Structural(_))));
    }

    #[test]
    fn test_visitor_error_stops_walk() {
        let (root, tree) = three_levels();
        let mut count = 0;
        let result = PageWalker::new(&tree, TraversalDepth::Unbounded).walk(&root, |page, _| {
            count += 1;
            if page.title == "A" {
                return Err(ConfluenceError::Structural("stop".to_owned()));
            }
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(count, 2);
    }

    #[test]
    fn test_depth_from_cli_value() {
        assert_eq!(TraversalDepth::try_from(-1), Ok(TraversalDepth::Unbounded));
        assert_eq!(TraversalDepth::try_from(0), Ok(TraversalDepth::Limited(0)));
        assert_eq!(TraversalDepth::try_from(3), Ok(TraversalDepth::Limited(3)));
        assert_eq!(TraversalDepth::try_from(-2), Err(InvalidDepth(-2)));
    }
}
