//! In-memory element tree.
//!
//! A small arena-backed document standing in for the browser DOM. Nodes are
//! addressed by [`NodeId`] and never freed; detaching a node only unlinks it
//! from its parent, so ids handed out earlier stay valid for the life of the
//! document.

use crate::headers::ElementTree;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Identity of a node inside a [`Document`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Payload of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Element(ElementData),
    /// Plain text, escaped on serialization.
    Text(String),
    /// Pre-rendered markup, emitted verbatim on serialization.
    Raw(String),
}

/// Tag name and attributes of an element node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    /// Lower-cased tag name.
    pub tag: String,
    /// Attributes in insertion order. `class` is kept in `classes` instead.
    pub attributes: Vec<(String, String)>,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// An arena of nodes rooted at a document element (`<html>`).
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
}

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link"];

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

/// Minimal HTML entity escaping for text content and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create a document containing only the `<html>` document element.
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        doc.root = doc.create_element("html");
        doc
    }

    /// The document element (`<html>`).
    pub fn document_element(&self) -> NodeId {
        self.root
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0]
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.node_mut(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.node(id).kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Create a detached element. The tag name is lower-cased.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: Vec::new(),
            classes: Vec::new(),
        }))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_owned()))
    }

    /// Create a detached node holding pre-rendered markup.
    pub fn create_raw(&mut self, markup: &str) -> NodeId {
        self.push(NodeKind::Raw(markup.to_owned()))
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Unlink `id` from its parent, if it has one.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node_mut(id).parent.take() {
            self.node_mut(parent).children.retain(|&c| c != id);
        }
    }

    /// Append `child` as the last child of `parent`.
    ///
    /// A child that is already attached somewhere is moved: it is removed from
    /// its old parent first, exactly like `Node.appendChild` in a browser.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert_ne!(parent, child, "a node cannot be its own child");
        self.detach(child);
        self.node_mut(child).parent = Some(parent);
        self.node_mut(parent).children.push(child);
    }

    /// Replace every child of `parent` with `new_children`, in order.
    pub fn replace_children(&mut self, parent: NodeId, new_children: &[NodeId]) {
        let old = std::mem::take(&mut self.node_mut(parent).children);
        for child in old {
            self.node_mut(child).parent = None;
        }
        for &child in new_children {
            self.append_child(parent, child);
        }
    }

    /// Replace the children of `parent` with a single raw-markup node.
    pub fn set_inner_markup(&mut self, parent: NodeId, markup: &str) {
        let raw = self.create_raw(markup);
        self.replace_children(parent, &[raw]);
    }

    /// Deep-copy `id` and everything below it. The copy is detached.
    pub fn clone_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.node(id).kind.clone();
        let copy = self.push(kind);
        let children = self.node(id).children.clone();
        for child in children {
            let child_copy = self.clone_subtree(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Replace the children of `dst` with deep copies of the children of `src`.
    pub fn clone_children(&mut self, src: NodeId, dst: NodeId) {
        let copies: Vec<NodeId> = self
            .node(src)
            .children
            .clone()
            .into_iter()
            .map(|child| self.clone_subtree(child))
            .collect();
        self.replace_children(dst, &copies);
    }

    /// Lower-cased tag name, `None` for text and raw nodes.
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        if name == "class" {
            return None;
        }
        self.element(id)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute on an element. Setting `class` replaces the class list.
    /// Calls on non-element nodes are ignored.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        if name == "class" {
            el.classes = value.split_whitespace().map(str::to_owned).collect();
            return;
        }
        match el.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_owned(),
            None => el.attributes.push((name.to_owned(), value.to_owned())),
        }
    }

    /// The element's `id` attribute.
    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.attribute(id, "id")
    }

    pub fn set_element_id(&mut self, id: NodeId, value: &str) {
        self.set_attribute(id, "id", value);
    }

    /// Read a `data-*` attribute (`key` without the prefix).
    pub fn dataset(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attribute(id, &format!("data-{key}"))
    }

    pub fn set_dataset(&mut self, id: NodeId, key: &str, value: &str) {
        self.set_attribute(id, &format!("data-{key}"), value);
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.element(id)
            .is_some_and(|el| el.classes.iter().any(|c| c == class))
    }

    /// Add a class unless already present.
    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            if !el.classes.iter().any(|c| c == class) {
                el.classes.push(class.to_owned());
            }
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if let Some(el) = self.element_mut(id) {
            el.classes.retain(|c| c != class);
        }
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev());
        }
        out
    }

    /// First element attached under the document element whose id is `value`.
    pub fn get_element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|&n| self.element_id(n) == Some(value))
    }

    /// Attached elements carrying `class`, in document order.
    pub fn get_elements_by_class_name(&self, class: &str) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|&n| self.has_class(n, class))
            .collect()
    }

    /// Elements below `scope` (excluding `scope`) with the given tag.
    pub fn get_elements_by_tag_name(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .skip(1)
            .filter(|&n| self.tag_name(n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    /// Concatenated text of every text node below `id`.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        for n in self.descendants(id) {
            if let NodeKind::Text(t) = self.kind(n) {
                text.push_str(t);
            }
        }
        text
    }

    /// Serialized markup of the children of `id`.
    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for &child in self.children(id) {
            self.write_node(child, &mut out);
        }
        out
    }

    /// Serialized markup of `id` itself.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Text(t) => out.push_str(&html_escape(t)),
            NodeKind::Raw(markup) => out.push_str(markup),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attributes {
                    out.push_str(&format!(" {name}=\"{}\"", html_escape(value)));
                }
                if !el.classes.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", html_escape(&el.classes.join(" "))));
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.tag.as_str()) {
                    return;
                }
                for &child in self.children(id) {
                    self.write_node(child, out);
                }
                out.push_str(&format!("</{}>", el.tag));
            }
        }
    }
}

impl ElementTree for Document {
    type Node = NodeId;

    fn child_nodes(&self, node: NodeId) -> &[NodeId] {
        self.children(node)
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        Document::tag_name(self, node)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
