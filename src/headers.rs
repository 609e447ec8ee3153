//! Heading collection.
//!
//! Walks a content subtree and returns its section headings in document
//! order. `h1` is not collected: it duplicates the page title.

/// Heading tags in rank order. A heading's level is its 1-based position.
pub const HEADING_TAGS: [&str; 5] = ["h2", "h3", "h4", "h5", "h6"];

/// A tree of nodes with tag names, abstracted away from any concrete DOM.
pub trait ElementTree {
    type Node: Copy;

    /// Child nodes of `node`, in document order.
    fn child_nodes(&self, node: Self::Node) -> &[Self::Node];

    /// Tag name of an element node, `None` for text and other non-elements.
    fn tag_name(&self, node: Self::Node) -> Option<&str>;
}

/// A collected heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeadingNode<N> {
    /// 1 for `h2` through 5 for `h6`.
    pub level: u8,
    pub element: N,
    /// Dense, zero-based position in document order.
    pub index: usize,
}

/// Heading level for a tag name, matched case-insensitively.
pub fn heading_level(tag: &str) -> Option<u8> {
    HEADING_TAGS
        .iter()
        .position(|h| h.eq_ignore_ascii_case(tag))
        .map(|pos| pos as u8 + 1)
}

/// Collect the headings below `root`.
///
/// Non-heading children that have children of their own are recursed into;
/// headings are not.
pub fn collect<T: ElementTree>(tree: &T, root: T::Node) -> Vec<HeadingNode<T::Node>> {
    let mut headings = Vec::new();
    walk(tree, root, &mut headings);
    headings
}

fn walk<T: ElementTree>(tree: &T, node: T::Node, out: &mut Vec<HeadingNode<T::Node>>) {
    for &child in tree.child_nodes(node) {
        let Some(tag) = tree.tag_name(child) else {
            continue;
        };
        match heading_level(tag) {
            Some(level) => out.push(HeadingNode {
                level,
                element: child,
                index: out.len(),
            }),
            None => {
                if !tree.child_nodes(child).is_empty() {
                    walk(tree, child, out);
                }
            }
        }
    }
}
