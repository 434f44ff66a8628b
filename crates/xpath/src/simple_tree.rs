//! Simple in-memory arena tree implementing [`DocumentTree`], used in tests, benchmarks and
//! the command-line tool.
//!
//! Focus:
//! - Ergonomic builder for quick test tree creation
//! - Handles are assigned in document order, so `is_node_after` is an index comparison and
//!   the subtree test is a range check
//! - Loading real documents through `quick-xml`
//!
//! Example:
//! ```
//! use arbor_xpath::simple_tree::{doc, elem, text, attr};
//! use arbor_xpath::DocumentTree;
//!
//! // <root id="r"><child>Hello</child><child world="yes"/></root>
//! let tree = doc()
//!     .child(
//!         elem("root")
//!             .attr(attr("id", "r"))
//!             .child(elem("child").child(text("Hello")))
//!             .child(elem("child").attr(attr("world", "yes"))),
//!     )
//!     .build();
//!
//! let root = tree.first_child(tree.document()).unwrap();
//! assert_eq!(tree.local_name(root), "root");
//! assert_eq!(tree.string_value(root), "Hello");
//! ```
use std::collections::HashMap;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::engine::runtime::{Error, ErrorCode};
use crate::model::{DocumentTree, NodeHandle, NodeKind, QName};

pub use crate::model::XML_NS;

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    parent: Option<u32>,
    first_child: Option<u32>,
    first_attr: Option<u32>,
    first_ns: Option<u32>,
    // next/previous among siblings of the same group (children, attributes or namespaces)
    next: Option<u32>,
    prev: Option<u32>,
    // exclusive upper bound of the handles inside this node's subtree
    end: u32,
}

/// Immutable arena whose handles follow document order.
#[derive(Debug, Clone)]
pub struct SimpleTree {
    nodes: Vec<NodeData>,
    ids: HashMap<String, u32>,
}

impl SimpleTree {
    /// Handle of the first node in the arena (the document node for trees built with [`doc`]).
    pub fn document(&self) -> NodeHandle {
        NodeHandle::new(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every handle in document order.
    pub fn handles(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        (0..self.nodes.len()).filter_map(|i| u32::try_from(i).ok().map(NodeHandle::new))
    }

    /// Parse an XML document into a tree rooted at a document node.
    ///
    /// # Errors
    /// Returns `err:FODC0002` when the input is not well-formed or uses an undeclared prefix.
    pub fn parse(xml: &str) -> Result<SimpleTree, Error> {
        XmlLoader::default().load(xml)
    }

    fn data(&self, node: NodeHandle) -> &NodeData {
        &self.nodes[node.index() as usize]
    }

    fn handle(index: Option<u32>) -> Option<NodeHandle> {
        index.map(NodeHandle::new)
    }
}

impl DocumentTree for SimpleTree {
    fn kind(&self, node: NodeHandle) -> NodeKind {
        self.data(node).kind
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        Self::handle(self.data(node).parent)
    }

    fn first_child(&self, node: NodeHandle) -> Option<NodeHandle> {
        Self::handle(self.data(node).first_child)
    }

    fn next_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        let data = self.data(node);
        if data.kind.is_child_tree() { Self::handle(data.next) } else { None }
    }

    fn previous_sibling(&self, node: NodeHandle) -> Option<NodeHandle> {
        let data = self.data(node);
        if data.kind.is_child_tree() { Self::handle(data.prev) } else { None }
    }

    fn first_attribute(&self, node: NodeHandle) -> Option<NodeHandle> {
        Self::handle(self.data(node).first_attr)
    }

    fn next_attribute(&self, attr: NodeHandle) -> Option<NodeHandle> {
        let data = self.data(attr);
        if data.kind == NodeKind::Attribute { Self::handle(data.next) } else { None }
    }

    fn first_namespace(&self, node: NodeHandle) -> Option<NodeHandle> {
        Self::handle(self.data(node).first_ns)
    }

    fn next_namespace(&self, ns: NodeHandle) -> Option<NodeHandle> {
        let data = self.data(ns);
        if data.kind == NodeKind::Namespace { Self::handle(data.next) } else { None }
    }

    fn local_name(&self, node: NodeHandle) -> &str {
        self.data(node).name.as_ref().map_or("", |q| q.local.as_str())
    }

    fn namespace_uri(&self, node: NodeHandle) -> Option<&str> {
        let data = self.data(node);
        if data.kind == NodeKind::Namespace {
            return None;
        }
        data.name.as_ref().and_then(|q| q.ns_uri.as_deref())
    }

    fn prefix(&self, node: NodeHandle) -> Option<&str> {
        self.data(node).name.as_ref().and_then(|q| q.prefix.as_deref())
    }

    fn string_value(&self, node: NodeHandle) -> String {
        let data = self.data(node);
        match data.kind {
            NodeKind::Document | NodeKind::Element => {
                let mut out = String::new();
                for n in &self.nodes[node.index() as usize + 1..data.end as usize] {
                    if n.kind == NodeKind::Text {
                        out.push_str(n.value.as_deref().unwrap_or_default());
                    }
                }
                out
            }
            _ => data.value.clone().unwrap_or_default(),
        }
    }

    fn is_node_after(&self, a: NodeHandle, b: NodeHandle) -> bool {
        b.index() > a.index()
    }

    fn is_ancestor_of(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        ancestor.index() < node.index() && node.index() < self.data(ancestor).end
    }

    fn element_by_id(&self, root: NodeHandle, id: &str) -> Option<NodeHandle> {
        let found = self.ids.get(id).copied().map(NodeHandle::new)?;
        (self.root(found) == root).then_some(found)
    }
}

/// Pending attribute for [`SimpleTreeBuilder::attr`].
#[derive(Debug, Clone)]
pub struct PendingAttr {
    name: QName,
    value: String,
}

/// Pending namespace declaration for [`SimpleTreeBuilder::namespace`].
#[derive(Debug, Clone)]
pub struct PendingNamespace {
    prefix: String,
    uri: String,
}

#[derive(Debug, Clone)]
pub struct SimpleTreeBuilder {
    kind: NodeKind,
    name: Option<QName>,
    value: Option<String>,
    namespaces: Vec<PendingNamespace>,
    attributes: Vec<PendingAttr>,
    children: Vec<SimpleTreeBuilder>,
}

impl SimpleTreeBuilder {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        Self { kind, name, value, namespaces: Vec::new(), attributes: Vec::new(), children: Vec::new() }
    }

    pub fn child(mut self, child: SimpleTreeBuilder) -> Self {
        self.push_child(child);
        self
    }

    pub fn children<I: IntoIterator<Item = SimpleTreeBuilder>>(mut self, it: I) -> Self {
        for c in it {
            self.push_child(c);
        }
        self
    }

    pub fn attr(mut self, attr: PendingAttr) -> Self {
        debug_assert!(self.kind == NodeKind::Element);
        self.attributes.push(attr);
        self
    }

    pub fn namespace(mut self, ns: PendingNamespace) -> Self {
        debug_assert!(self.kind == NodeKind::Element);
        self.namespaces.push(ns);
        self
    }

    // Adjacent text children collapse into one node.
    fn push_child(&mut self, child: SimpleTreeBuilder) {
        if child.kind == NodeKind::Text {
            if let Some(last) = self.children.last_mut().filter(|c| c.kind == NodeKind::Text) {
                let v = last.value.get_or_insert_with(String::new);
                v.push_str(child.value.as_deref().unwrap_or_default());
                return;
            }
        }
        self.children.push(child);
    }

    /// Finalize into an arena; the builder's node becomes handle 0.
    pub fn build(self) -> SimpleTree {
        let mut tree = SimpleTree { nodes: Vec::new(), ids: HashMap::new() };
        flatten(&mut tree, self, None);
        tree
    }
}

fn index_of(tree: &SimpleTree) -> u32 {
    u32::try_from(tree.nodes.len()).unwrap_or(u32::MAX)
}

fn push_node(tree: &mut SimpleTree, kind: NodeKind, name: Option<QName>, value: Option<String>, parent: Option<u32>) -> u32 {
    let idx = index_of(tree);
    tree.nodes.push(NodeData {
        kind,
        name,
        value,
        parent,
        first_child: None,
        first_attr: None,
        first_ns: None,
        next: None,
        prev: None,
        end: idx + 1,
    });
    idx
}

fn link_group(tree: &mut SimpleTree, members: &[u32]) {
    for pair in members.windows(2) {
        tree.nodes[pair[0] as usize].next = Some(pair[1]);
        tree.nodes[pair[1] as usize].prev = Some(pair[0]);
    }
}

fn flatten(tree: &mut SimpleTree, b: SimpleTreeBuilder, parent: Option<u32>) -> u32 {
    let idx = push_node(tree, b.kind, b.name, b.value, parent);

    let mut ns_nodes = Vec::with_capacity(b.namespaces.len());
    for ns in b.namespaces {
        let name = QName { prefix: Some(ns.prefix.clone()), local: ns.prefix, ns_uri: None };
        ns_nodes.push(push_node(tree, NodeKind::Namespace, Some(name), Some(ns.uri), Some(idx)));
    }
    link_group(tree, &ns_nodes);
    tree.nodes[idx as usize].first_ns = ns_nodes.first().copied();

    let mut attr_nodes = Vec::with_capacity(b.attributes.len());
    for a in b.attributes {
        let is_id = a.name.local == "id"
            && (a.name.ns_uri.is_none() || a.name.ns_uri.as_deref() == Some(XML_NS));
        if is_id {
            tree.ids.entry(a.value.trim().to_string()).or_insert(idx);
        }
        attr_nodes.push(push_node(tree, NodeKind::Attribute, Some(a.name), Some(a.value), Some(idx)));
    }
    link_group(tree, &attr_nodes);
    tree.nodes[idx as usize].first_attr = attr_nodes.first().copied();

    let mut child_nodes = Vec::with_capacity(b.children.len());
    for c in b.children {
        child_nodes.push(flatten(tree, c, Some(idx)));
    }
    link_group(tree, &child_nodes);
    tree.nodes[idx as usize].first_child = child_nodes.first().copied();
    tree.nodes[idx as usize].end = index_of(tree);
    idx
}

pub fn doc() -> SimpleTreeBuilder {
    SimpleTreeBuilder::new(NodeKind::Document, None, None)
}

pub fn elem(name: &str) -> SimpleTreeBuilder {
    SimpleTreeBuilder::new(NodeKind::Element, Some(QName::parse_lexical(name)), None)
}

/// Element in a namespace; `name` may carry a prefix (`p:item`).
pub fn elem_ns(uri: &str, name: &str) -> SimpleTreeBuilder {
    let mut q = QName::parse_lexical(name);
    q.ns_uri = Some(uri.to_string());
    SimpleTreeBuilder::new(NodeKind::Element, Some(q), None)
}

pub fn text(v: &str) -> SimpleTreeBuilder {
    SimpleTreeBuilder::new(NodeKind::Text, None, Some(v.to_string()))
}

pub fn comment(v: &str) -> SimpleTreeBuilder {
    SimpleTreeBuilder::new(NodeKind::Comment, None, Some(v.to_string()))
}

pub fn pi(target: &str, data: &str) -> SimpleTreeBuilder {
    SimpleTreeBuilder::new(NodeKind::ProcessingInstruction, Some(QName::local(target)), Some(data.to_string()))
}

pub fn attr(name: &str, v: &str) -> PendingAttr {
    PendingAttr { name: QName::parse_lexical(name), value: v.to_string() }
}

pub fn attr_ns(uri: &str, name: &str, v: &str) -> PendingAttr {
    let mut q = QName::parse_lexical(name);
    q.ns_uri = Some(uri.to_string());
    PendingAttr { name: q, value: v.to_string() }
}

/// Namespace declaration; an empty prefix declares the default namespace.
pub fn ns(prefix: &str, uri: &str) -> PendingNamespace {
    PendingNamespace { prefix: prefix.to_string(), uri: uri.to_string() }
}

#[derive(Default)]
struct XmlLoader {
    stack: Vec<SimpleTreeBuilder>,
    scopes: Vec<Vec<(String, String)>>,
}

fn load_err(msg: impl Into<String>) -> Error {
    Error::from_code(ErrorCode::FODC0002, msg)
}

fn utf8(bytes: &[u8]) -> Result<&str, Error> {
    std::str::from_utf8(bytes).map_err(|e| load_err(format!("invalid UTF-8: {e}")))
}

fn unescape(raw: &[u8]) -> Result<String, Error> {
    let s = utf8(raw)?;
    quick_xml::escape::unescape(s)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| load_err(format!("invalid escape: {e}")))
}

impl XmlLoader {
    fn load(mut self, xml: &str) -> Result<SimpleTree, Error> {
        let mut reader = Reader::from_str(xml);
        self.stack.push(doc());
        loop {
            let event = reader
                .read_event()
                .map_err(|e| load_err(format!("malformed XML at byte {}: {e}", reader.buffer_position())))?;
            match event {
                Event::Start(e) => {
                    let element = self.open_element(&e)?;
                    self.stack.push(element);
                }
                Event::Empty(e) => {
                    let element = self.open_element(&e)?;
                    self.scopes.pop();
                    self.attach(element);
                }
                Event::End(_) => {
                    self.scopes.pop();
                    let Some(done) = self.stack.pop() else {
                        return Err(load_err("unbalanced end tag"));
                    };
                    self.attach(done);
                }
                Event::Text(t) => {
                    let v = unescape(&t)?;
                    self.append_text(&v);
                }
                Event::GeneralRef(r) => {
                    let v = unescape(format!("&{};", utf8(&r)?).as_bytes())?;
                    self.append_text(&v);
                }
                Event::CData(t) => {
                    let v = utf8(&t)?.to_string();
                    self.append_text(&v);
                }
                Event::Comment(t) => {
                    let v = utf8(&t)?.to_string();
                    self.attach(comment(&v));
                }
                Event::PI(p) => {
                    let target = utf8(p.target())?.to_string();
                    let data = utf8(p.content())?.trim_start().to_string();
                    self.attach(pi(&target, &data));
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if self.stack.len() != 1 {
            return Err(load_err("unexpected end of document: unclosed element"));
        }
        let document = self.stack.pop().ok_or_else(|| load_err("empty document"))?;
        if !document.children.iter().any(|c| c.kind == NodeKind::Element) {
            return Err(load_err("document has no root element"));
        }
        Ok(document.build())
    }

    fn append_text(&mut self, v: &str) {
        // character data outside the root element is not part of the tree
        if self.stack.len() > 1 && !v.is_empty() {
            self.attach(text(v));
        }
    }

    fn attach(&mut self, node: SimpleTreeBuilder) {
        if let Some(parent) = self.stack.last_mut() {
            parent.push_child(node);
        }
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    fn resolve(&self, lexical: &str, use_default: bool) -> Result<QName, Error> {
        let mut q = QName::parse_lexical(lexical);
        q.ns_uri = match &q.prefix {
            Some(p) => Some(
                self.lookup(p)
                    .filter(|uri| !uri.is_empty())
                    .ok_or_else(|| load_err(format!("undeclared namespace prefix '{p}'")))?
                    .to_string(),
            ),
            None if use_default => self.lookup("").filter(|uri| !uri.is_empty()).map(str::to_string),
            None => None,
        };
        Ok(q)
    }

    // Pushes the element's namespace scope; the caller pops it when the element closes.
    fn open_element(&mut self, start: &BytesStart<'_>) -> Result<SimpleTreeBuilder, Error> {
        let mut decls = Vec::new();
        let mut raw_attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| load_err(format!("bad attribute: {e}")))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = unescape(&attr.value)?;
            if key == "xmlns" {
                decls.push((String::new(), value));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                decls.push((prefix.to_string(), value));
            } else {
                raw_attrs.push((key, value));
            }
        }
        self.scopes.push(decls.clone());

        let name = self.resolve(utf8(start.name().as_ref())?, true)?;
        let mut element = SimpleTreeBuilder::new(NodeKind::Element, Some(name), None);
        for (prefix, uri) in decls {
            element = element.namespace(PendingNamespace { prefix, uri });
        }
        for (key, value) in raw_attrs {
            let name = self.resolve(&key, false)?;
            element = element.attr(PendingAttr { name, value });
        }
        Ok(element)
    }
}
