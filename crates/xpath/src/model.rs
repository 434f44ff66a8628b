//! Tree accessor contract consumed by the evaluator.
//!
//! The engine never owns nodes. It walks a [`DocumentTree`] one [`NodeHandle`] at a time
//! through a handful of primitive navigation calls, so any immutable tree representation
//! can be queried as long as it can hand out stable integer handles.
use core::cmp::Ordering;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Opaque identifier of a node inside one [`DocumentTree`].
///
/// Handles are only meaningful for the tree that produced them. Ordering between two
/// handles is established through [`DocumentTree::is_node_after`], never by comparing the
/// raw index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u32);

impl NodeHandle {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

impl NodeKind {
    /// Attribute and namespace nodes hang off an element but are not its children.
    pub fn is_child_tree(self) -> bool {
        !matches!(self, NodeKind::Attribute | NodeKind::Namespace)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    pub prefix: Option<String>,
    pub local: String,
    pub ns_uri: Option<String>,
}

impl QName {
    pub fn local(local: impl Into<String>) -> Self {
        Self { prefix: None, local: local.into(), ns_uri: None }
    }

    /// Split a lexical `prefix:local` name; the namespace URI stays unresolved.
    pub fn parse_lexical(lexical: &str) -> Self {
        match lexical.split_once(':') {
            Some((prefix, local)) => Self {
                prefix: Some(prefix.to_string()),
                local: local.to_string(),
                ns_uri: None,
            },
            None => Self::local(lexical),
        }
    }
}

/// Read-only navigation over a document.
///
/// Implementations must be side-effect free and stable for the duration of a query.
/// Document order places a node before its namespace nodes, those before its attribute
/// nodes, and those before its children. `parent` of an attribute or namespace node is the
/// owning element even though it is not one of that element's children.
pub trait DocumentTree {
    fn kind(&self, node: NodeHandle) -> NodeKind;
    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;
    fn first_child(&self, node: NodeHandle) -> Option<NodeHandle>;
    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle>;
    fn first_attribute(&self, node: NodeHandle) -> Option<NodeHandle>;
    fn next_attribute(&self, attr: NodeHandle) -> Option<NodeHandle>;
    /// Namespace nodes declared directly on `node` (not the inherited ones).
    fn first_namespace(&self, node: NodeHandle) -> Option<NodeHandle>;
    fn next_namespace(&self, ns: NodeHandle) -> Option<NodeHandle>;

    /// Local part of the expanded name. For processing instructions this is the target and
    /// for namespace nodes the prefix; unnamed nodes return the empty string.
    fn local_name(&self, node: NodeHandle) -> &str;
    fn namespace_uri(&self, node: NodeHandle) -> Option<&str>;
    fn prefix(&self, node: NodeHandle) -> Option<&str>;
    fn string_value(&self, node: NodeHandle) -> String;

    /// `true` when `b` comes after `a` in document order.
    fn is_node_after(&self, a: NodeHandle, b: NodeHandle) -> bool;

    fn previous_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        if !self.kind(node).is_child_tree() {
            return None;
        }
        let mut cur = self.first_child(self.parent(node)?)?;
        if cur == node {
            return None;
        }
        loop {
            let next = self.next_sibling(cur)?;
            if next == node {
                return Some(cur);
            }
            cur = next;
        }
    }

    fn last_child(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut cur = self.first_child(node)?;
        while let Some(next) = self.next_sibling(cur) {
            cur = next;
        }
        Some(cur)
    }

    fn root(&self, node: NodeHandle) -> NodeHandle {
        let mut cur = node;
        while let Some(parent) = self.parent(cur) {
            cur = parent;
        }
        cur
    }

    /// Strict ancestry test; attribute and namespace nodes count as descendants of their owner.
    fn is_ancestor_of(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// Last node of the subtree rooted at `node` (the node itself when it has no children).
    fn last_descendant(&self, node: NodeHandle) -> NodeHandle {
        let mut cur = node;
        while let Some(last) = self.last_child(cur) {
            cur = last;
        }
        cur
    }

    /// First node after the whole subtree of `node`, skipping attributes and namespaces.
    fn following_subtree(&self, node: NodeHandle) -> Option<NodeHandle> {
        let mut cur = if self.kind(node).is_child_tree() { node } else { self.parent(node)? };
        loop {
            if let Some(sibling) = self.next_sibling(cur) {
                return Some(sibling);
            }
            cur = self.parent(cur)?;
        }
    }

    /// Preorder successor over the child tree. For an attribute or namespace node this is
    /// the first child of the owning element.
    fn next_in_document(&self, node: NodeHandle) -> Option<NodeHandle> {
        let owner = if self.kind(node).is_child_tree() { node } else { self.parent(node)? };
        self.first_child(owner).or_else(|| self.following_subtree(owner))
    }

    /// Preorder predecessor over the child tree.
    fn previous_in_document(&self, node: NodeHandle) -> Option<NodeHandle> {
        match self.previous_sibling(node) {
            Some(sibling) => Some(self.last_descendant(sibling)),
            None => self.parent(node),
        }
    }

    fn compare_document_order(&self, a: NodeHandle, b: NodeHandle) -> Ordering {
        if a == b {
            Ordering::Equal
        } else if self.is_node_after(a, b) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    /// Qualified name as written in the document (`prefix:local` or `local`).
    fn name(&self, node: NodeHandle) -> String {
        let local = self.local_name(node);
        match self.prefix(node) {
            Some(prefix) if !prefix.is_empty() && self.kind(node) != NodeKind::Namespace => {
                format!("{prefix}:{local}")
            }
            _ => local.to_string(),
        }
    }

    /// Element carrying the given unique ID in the document containing `root`.
    fn element_by_id(&self, root: NodeHandle, id: &str) -> Option<NodeHandle> {
        let _ = (root, id);
        None
    }
}
