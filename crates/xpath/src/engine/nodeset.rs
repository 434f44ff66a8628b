//! Node-set values: either a live location-path iterator or a materialized node vector.
use core::cmp::Ordering;
use std::rc::Rc;

use crate::engine::context::ExecutionContext;
use crate::engine::location::LocationPathIterator;
use crate::engine::runtime::Error;
use crate::model::{DocumentTree, NodeHandle};

/// Growable list of nodes that remembers whether it is known to be in document order
/// without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeVector {
    nodes: Vec<NodeHandle>,
    doc_ordered: bool,
}

impl Default for NodeVector {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeVector {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), doc_ordered: true }
    }

    /// Wrap nodes the caller guarantees to be distinct and in document order.
    pub fn from_sorted(nodes: Vec<NodeHandle>) -> Self {
        Self { nodes, doc_ordered: true }
    }

    /// Append without keeping order; call [`Self::sort_and_dedup`] before relying on it.
    pub fn push(&mut self, node: NodeHandle) {
        if self.doc_ordered && !self.nodes.is_empty() {
            self.doc_ordered = false;
        }
        self.nodes.push(node);
    }

    /// Insert at the document-order position, ignoring duplicates. Only valid on an
    /// ordered vector.
    pub fn add_node_in_doc_order<T: DocumentTree + ?Sized>(&mut self, tree: &T, node: NodeHandle) {
        debug_assert!(self.doc_ordered, "ordered insert into an unordered node vector");
        match self.nodes.binary_search_by(|probe| tree.compare_document_order(*probe, node)) {
            Ok(_) => {}
            Err(at) => self.nodes.insert(at, node),
        }
    }

    pub fn sort_and_dedup<T: DocumentTree + ?Sized>(&mut self, tree: &T) {
        if !self.doc_ordered {
            self.nodes.sort_by(|a, b| tree.compare_document_order(*a, *b));
            self.nodes.dedup();
            self.doc_ordered = true;
        }
    }

    /// Linear merge of two ordered vectors.
    pub fn union<T: DocumentTree + ?Sized>(mut self, mut other: NodeVector, tree: &T) -> NodeVector {
        self.sort_and_dedup(tree);
        other.sort_and_dedup(tree);
        let mut merged = Vec::with_capacity(self.nodes.len() + other.nodes.len());
        let (mut a, mut b) = (self.nodes.into_iter().peekable(), other.nodes.into_iter().peekable());
        loop {
            let next = match (a.peek(), b.peek()) {
                (Some(x), Some(y)) => match tree.compare_document_order(*x, *y) {
                    Ordering::Less => a.next(),
                    Ordering::Greater => b.next(),
                    Ordering::Equal => {
                        b.next();
                        a.next()
                    }
                },
                (Some(_), None) => a.next(),
                (None, Some(_)) => b.next(),
                (None, None) => break,
            };
            merged.extend(next);
        }
        NodeVector::from_sorted(merged)
    }

    pub fn is_doc_ordered(&self) -> bool {
        self.doc_ordered
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<NodeHandle> {
        self.nodes.get(index).copied()
    }

    pub fn as_slice(&self) -> &[NodeHandle] {
        &self.nodes
    }

    pub fn into_vec(self) -> Vec<NodeHandle> {
        self.nodes
    }
}

#[derive(Debug)]
enum NodeSource<'a> {
    Path(Box<LocationPathIterator<'a>>),
    List { nodes: Rc<NodeVector>, next: usize },
}

/// A node-set value. Sequential access streams; anything needing the whole set (sorting,
/// counting, random access) materializes or replays from a reset clone.
#[derive(Debug)]
pub struct NodeSet<'a> {
    source: NodeSource<'a>,
    fresh: bool,
}

impl<'a> NodeSet<'a> {
    pub fn empty() -> Self {
        Self::from_vector(NodeVector::new())
    }

    pub fn from_vector(nodes: NodeVector) -> Self {
        Self { source: NodeSource::List { nodes: Rc::new(nodes), next: 0 }, fresh: true }
    }

    pub fn from_path(iter: LocationPathIterator<'a>) -> Self {
        Self { source: NodeSource::Path(Box::new(iter)), fresh: true }
    }

    /// `true` until the first node has been pulled.
    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub fn is_doc_ordered(&self) -> bool {
        match &self.source {
            NodeSource::Path(iter) => iter.is_doc_ordered(),
            NodeSource::List { nodes, .. } => nodes.is_doc_ordered(),
        }
    }

    /// Enable node caching on a path-backed set so it supports [`Self::item`]. Must be
    /// called before the first node is pulled.
    pub fn set_should_cache_nodes(&mut self, cache: bool) {
        if let NodeSource::Path(iter) = &mut self.source {
            iter.set_should_cache_nodes(cache);
        }
    }

    pub fn next_node<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) -> Result<Option<NodeHandle>, Error> {
        self.fresh = false;
        match &mut self.source {
            NodeSource::Path(iter) => iter.next_node(ctx),
            NodeSource::List { nodes, next } => {
                let node = nodes.get(*next);
                if node.is_some() {
                    *next += 1;
                }
                Ok(node)
            }
        }
    }

    /// First node in document order.
    pub fn first_node<T: DocumentTree + ?Sized>(self, ctx: &ExecutionContext<'a, T>) -> Result<Option<NodeHandle>, Error> {
        if !self.is_doc_ordered() {
            return Ok(self.materialize(ctx)?.get(0));
        }
        let mut set = if self.fresh { self } else { self.clone_with_reset(ctx) };
        set.next_node(ctx)
    }

    /// All nodes, distinct and in document order.
    pub fn materialize<T: DocumentTree + ?Sized>(self, ctx: &ExecutionContext<'a, T>) -> Result<NodeVector, Error> {
        let fresh = self.fresh;
        match self.source {
            NodeSource::List { nodes, .. } => {
                let mut out = Rc::try_unwrap(nodes).unwrap_or_else(|shared| (*shared).clone());
                out.sort_and_dedup(ctx.tree());
                Ok(out)
            }
            NodeSource::Path(iter) => {
                let mut iter = if fresh { *iter } else { iter.clone_with_reset(ctx) };
                let mut out = Vec::new();
                while let Some(node) = iter.next_node(ctx)? {
                    out.push(node);
                }
                Ok(NodeVector::from_sorted(out))
            }
        }
    }

    /// Total number of nodes, independent of how many have been pulled.
    pub fn get_length<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) -> Result<usize, Error> {
        match &mut self.source {
            NodeSource::Path(iter) => iter.get_length(ctx),
            NodeSource::List { nodes, .. } => Ok(nodes.len()),
        }
    }

    /// Zero-based random access. Path-backed sets need caching enabled.
    pub fn item<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>, index: usize) -> Result<Option<NodeHandle>, Error> {
        match &mut self.source {
            NodeSource::Path(iter) => iter.item(ctx, index),
            NodeSource::List { nodes, .. } => Ok(nodes.get(index)),
        }
    }

    /// An independent set positioned before the first node.
    pub fn clone_with_reset<T: DocumentTree + ?Sized>(&self, ctx: &ExecutionContext<'a, T>) -> Self {
        let source = match &self.source {
            NodeSource::Path(iter) => NodeSource::Path(Box::new(iter.clone_with_reset(ctx))),
            NodeSource::List { nodes, .. } => NodeSource::List { nodes: Rc::clone(nodes), next: 0 },
        };
        Self { source, fresh: true }
    }

    /// Lazy iterator over the remaining nodes.
    pub fn into_sequence<'c, T: DocumentTree + ?Sized>(self, ctx: &'c ExecutionContext<'a, T>) -> NodeSequence<'c, 'a, T> {
        NodeSequence { set: self, ctx, done: false }
    }
}

/// Iterator adapter over a [`NodeSet`]; stops after the first error.
pub struct NodeSequence<'c, 'a, T: DocumentTree + ?Sized> {
    set: NodeSet<'a>,
    ctx: &'c ExecutionContext<'a, T>,
    done: bool,
}

impl<T: DocumentTree + ?Sized> Iterator for NodeSequence<'_, '_, T> {
    type Item = Result<NodeHandle, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.set.next_node(self.ctx) {
            Ok(Some(node)) => Some(Ok(node)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
