//! Parsed-document abstraction.
//!
//! The candidate extractor only needs to walk elements: tag names, parents,
//! children and attributes. [`Document`] is that surface; any concrete markup
//! parser is adapted behind it. [`ElementTree`] is the owned arena
//! implementation every adapter in this workspace converts into, which keeps
//! parsed pages `Send` across await points.

use std::fmt::Write as _;

/// Index of an element inside a [`Document`].
pub type NodeId = usize;

/// Read-only view of an element tree.
pub trait Document: Send + Sync {
    /// Elements with the given tag name, in document order.
    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId>;

    fn tag_name(&self, node: NodeId) -> Option<&str>;

    /// Parent element, or `None` for a root element (or an unknown node).
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Direct element children, optionally restricted to one tag name.
    fn children(&self, node: NodeId, tag: Option<&str>) -> Vec<NodeId>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Serialized markup of the element.
    fn markup(&self, node: NodeId) -> Option<String>;
}

#[derive(Debug, Clone)]
struct ElementNode {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    markup: Option<String>,
}

/// Arena-backed element tree.
///
/// Nodes are addressed by their insertion index. Tag and attribute names are
/// stored lowercase.
#[derive(Debug, Clone, Default)]
pub struct ElementTree {
    nodes: Vec<ElementNode>,
    roots: Vec<NodeId>,
}

impl ElementTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element as the last child of `parent` (or as a new root).
    ///
    /// An unknown `parent` id makes the element a root.
    pub fn push(
        &mut self,
        parent: Option<NodeId>,
        tag: &str,
        attributes: &[(&str, &str)],
    ) -> NodeId {
        let id = self.nodes.len();
        let parent = parent.filter(|p| *p < self.nodes.len());

        self.nodes.push(ElementNode {
            tag: tag.to_ascii_lowercase(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), (*v).to_string()))
                .collect(),
            parent,
            children: Vec::new(),
            markup: None,
        });

        match parent {
            Some(p) => self.nodes[p].children.push(id),
            None => self.roots.push(id),
        }
        id
    }

    /// Records the exact serialized markup for an element.
    pub fn set_markup(&mut self, node: NodeId, markup: impl Into<String>) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.markup = Some(markup.into());
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Preorder traversal over all roots.
    fn document_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        order
    }

    /// Renders the start tag. For void elements such as `img` this is the
    /// complete serialization.
    fn render_start_tag(node: &ElementNode) -> String {
        let mut out = format!("<{}", node.tag);
        for (name, value) in &node.attributes {
            let escaped = value.replace('&', "&amp;").replace('"', "&quot;");
            let _ = write!(out, " {name}=\"{escaped}\"");
        }
        out.push('>');
        out
    }
}

impl Document for ElementTree {
    fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        self.document_order()
            .into_iter()
            .filter(|id| self.nodes[*id].tag.eq_ignore_ascii_case(tag))
            .collect()
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node).map(|n| n.tag.as_str())
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId, tag: Option<&str>) -> Vec<NodeId> {
        let Some(n) = self.nodes.get(node) else {
            return Vec::new();
        };
        n.children
            .iter()
            .copied()
            .filter(|c| tag.is_none_or(|t| self.nodes[*c].tag.eq_ignore_ascii_case(t)))
            .collect()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes.get(node).and_then(|n| {
            n.attributes
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.as_str())
        })
    }

    fn markup(&self, node: NodeId) -> Option<String> {
        self.nodes.get(node).map(|n| {
            n.markup
                .clone()
                .unwrap_or_else(|| Self::render_start_tag(n))
        })
    }
}
