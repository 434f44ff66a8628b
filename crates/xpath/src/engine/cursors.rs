//! Axis cursors: resumable enumerations of one axis from one start node.
//!
//! A cursor knows nothing about node tests or predicates; it only walks the tree in the
//! axis' natural direction. Forward axes yield document order, reverse axes yield nodes
//! nearest to the start node first. Cursors are cheap to clone and a clone continues
//! independently from the same position.
use std::rc::Rc;

use smallvec::SmallVec;

use crate::compiler::ir::Axis;
use crate::model::{DocumentTree, NodeHandle, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisState {
    // self, parent, root, and descendant-or-self from a node without children
    Once(Option<NodeHandle>),
    // child, following-sibling, preceding-sibling
    Siblings(Option<NodeHandle>),
    Attributes(Option<NodeHandle>),
    // preorder walk that stops at the first node after the start node's subtree
    Descend { next: Option<NodeHandle>, boundary: Option<NodeHandle> },
    Following(Option<NodeHandle>),
    // reverse preorder walk; `skip` counts ancestors still to be stepped over
    Preceding { next: Option<NodeHandle>, skip: usize },
    // ancestor chain, namespace nodes, filtered list
    Indexed(usize),
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct AxisCursor {
    axis: Axis,
    start: Option<NodeHandle>,
    buffer: SmallVec<[NodeHandle; 16]>,
    list: Option<Rc<[NodeHandle]>>,
    initial: AxisState,
    state: AxisState,
    mark: AxisState,
}

impl AxisCursor {
    /// An unstarted cursor; it yields nothing until [`Self::set_start_node`] is called.
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            start: None,
            buffer: SmallVec::new(),
            list: None,
            initial: AxisState::Exhausted,
            state: AxisState::Exhausted,
            mark: AxisState::Exhausted,
        }
    }

    /// Cursor of a [`Axis::FilteredList`] step over an already evaluated, document-ordered
    /// node list. The start node is ignored.
    pub fn over_list(list: Rc<[NodeHandle]>) -> Self {
        let mut cursor = Self::new(Axis::FilteredList);
        cursor.list = Some(list);
        cursor
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn start_node(&self) -> Option<NodeHandle> {
        self.start
    }

    pub fn is_reverse(&self) -> bool {
        self.axis.is_reverse()
    }

    /// Re-target the cursor and rewind it. Nodes are produced lazily by [`Self::next`].
    pub fn set_start_node<T: DocumentTree + ?Sized>(&mut self, tree: &T, node: NodeHandle) -> &mut Self {
        self.start = Some(node);
        self.buffer.clear();
        let kind = tree.kind(node);
        let initial = match self.axis {
            Axis::SelfAxis => AxisState::Once(Some(node)),
            Axis::Parent => AxisState::Once(tree.parent(node)),
            Axis::Root => AxisState::Once(Some(tree.root(node))),
            Axis::Child => AxisState::Siblings(tree.first_child(node)),
            Axis::FollowingSibling => AxisState::Siblings(tree.next_sibling(node)),
            Axis::PrecedingSibling => AxisState::Siblings(tree.previous_sibling(node)),
            Axis::Attribute => AxisState::Attributes(if kind == NodeKind::Element {
                tree.first_attribute(node)
            } else {
                None
            }),
            Axis::Descendant if kind.is_child_tree() => {
                AxisState::Descend { next: tree.first_child(node), boundary: tree.following_subtree(node) }
            }
            Axis::Descendant => AxisState::Exhausted,
            Axis::DescendantOrSelf if kind.is_child_tree() => {
                AxisState::Descend { next: Some(node), boundary: tree.following_subtree(node) }
            }
            Axis::DescendantOrSelf => AxisState::Once(Some(node)),
            Axis::Following if kind.is_child_tree() => AxisState::Following(tree.following_subtree(node)),
            Axis::Following => AxisState::Following(tree.next_in_document(node)),
            Axis::Ancestor | Axis::AncestorOrSelf => {
                if self.axis == Axis::AncestorOrSelf {
                    self.buffer.push(node);
                }
                let mut cur = tree.parent(node);
                while let Some(p) = cur {
                    self.buffer.push(p);
                    cur = tree.parent(p);
                }
                AxisState::Indexed(0)
            }
            Axis::Preceding => {
                let mut cur = tree.parent(node);
                while let Some(p) = cur {
                    self.buffer.push(p);
                    cur = tree.parent(p);
                }
                if kind.is_child_tree() {
                    AxisState::Preceding { next: tree.previous_in_document(node), skip: 0 }
                } else {
                    // the owner element precedes its attributes but is also their parent
                    match tree.parent(node) {
                        Some(owner) => AxisState::Preceding { next: tree.previous_in_document(owner), skip: 1 },
                        None => AxisState::Exhausted,
                    }
                }
            }
            Axis::Namespace => {
                if kind == NodeKind::Element {
                    self.collect_namespaces(tree, node);
                }
                AxisState::Indexed(0)
            }
            Axis::FilteredList => AxisState::Indexed(0),
        };
        self.initial = initial;
        self.state = initial;
        self.mark = initial;
        self
    }

    // In-scope namespace nodes: the nearest declaration of each prefix wins and an empty
    // URI undeclares the prefix.
    fn collect_namespaces<T: DocumentTree + ?Sized>(&mut self, tree: &T, element: NodeHandle) {
        let mut seen: SmallVec<[&str; 8]> = SmallVec::new();
        let mut cur = Some(element);
        while let Some(e) = cur {
            if tree.kind(e) != NodeKind::Element {
                break;
            }
            let mut decl = tree.first_namespace(e);
            while let Some(ns) = decl {
                let prefix = tree.local_name(ns);
                if !seen.contains(&prefix) {
                    seen.push(prefix);
                    if !tree.string_value(ns).is_empty() {
                        self.buffer.push(ns);
                    }
                }
                decl = tree.next_namespace(ns);
            }
            cur = tree.parent(e);
        }
        self.buffer.sort_by(|a, b| tree.compare_document_order(*a, *b));
    }

    pub fn next<T: DocumentTree + ?Sized>(&mut self, tree: &T) -> Option<NodeHandle> {
        let (out, next_state) = match self.state {
            AxisState::Exhausted => return None,
            AxisState::Once(node) => (node, AxisState::Exhausted),
            AxisState::Siblings(node) => match node {
                Some(n) => {
                    let next = if self.axis == Axis::PrecedingSibling {
                        tree.previous_sibling(n)
                    } else {
                        tree.next_sibling(n)
                    };
                    (Some(n), AxisState::Siblings(next))
                }
                None => (None, AxisState::Exhausted),
            },
            AxisState::Attributes(node) => match node {
                Some(n) => (Some(n), AxisState::Attributes(tree.next_attribute(n))),
                None => (None, AxisState::Exhausted),
            },
            AxisState::Descend { next, boundary } => match next {
                Some(n) if Some(n) != boundary => {
                    (Some(n), AxisState::Descend { next: tree.next_in_document(n), boundary })
                }
                _ => (None, AxisState::Exhausted),
            },
            AxisState::Following(node) => match node {
                Some(n) => (Some(n), AxisState::Following(tree.next_in_document(n))),
                None => (None, AxisState::Exhausted),
            },
            AxisState::Preceding { mut next, mut skip } => loop {
                let Some(n) = next else {
                    break (None, AxisState::Exhausted);
                };
                // ancestors come up in the same order as the buffered parent chain
                if self.buffer.get(skip) == Some(&n) {
                    skip += 1;
                    next = tree.previous_in_document(n);
                    continue;
                }
                break (Some(n), AxisState::Preceding { next: tree.previous_in_document(n), skip });
            },
            AxisState::Indexed(i) => {
                let source: &[NodeHandle] = match &self.list {
                    Some(list) => list,
                    None => &self.buffer,
                };
                match source.get(i) {
                    Some(n) => (Some(*n), AxisState::Indexed(i + 1)),
                    None => (None, AxisState::Exhausted),
                }
            }
        };
        self.state = next_state;
        out
    }

    /// Rewind to the first node for the current start node.
    pub fn reset(&mut self) -> &mut Self {
        self.state = self.initial;
        self
    }

    pub fn set_mark(&mut self) {
        self.mark = self.state;
    }

    pub fn goto_mark(&mut self) {
        self.state = self.mark;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_tree::{SimpleTree, attr, doc, elem, text};

    fn sample() -> SimpleTree {
        // <r><a id="1"><b/>t</a><c/></r>
        doc().child(elem("r").child(elem("a").attr(attr("id", "1")).child(elem("b")).child(text("t"))).child(elem("c"))).build()
    }

    fn names(tree: &SimpleTree, cursor: &mut AxisCursor) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(n) = cursor.next(tree) {
            out.push(tree.name(n));
        }
        out
    }

    fn find(tree: &SimpleTree, name: &str) -> NodeHandle {
        tree.handles().find(|h| tree.kind(*h) == NodeKind::Element && tree.local_name(*h) == name).unwrap()
    }

    #[test]
    fn descendant_stops_at_subtree_boundary() {
        let tree = sample();
        let a = find(&tree, "a");
        let mut cursor = AxisCursor::new(Axis::Descendant);
        cursor.set_start_node(&tree, a);
        assert_eq!(names(&tree, &mut cursor), ["b", ""]);
    }

    #[test]
    fn preceding_skips_ancestors() {
        let tree = sample();
        let c = find(&tree, "c");
        let mut cursor = AxisCursor::new(Axis::Preceding);
        cursor.set_start_node(&tree, c);
        assert_eq!(names(&tree, &mut cursor), ["", "b", "a"]);
    }

    #[test]
    fn mark_and_reset_rewind() {
        let tree = sample();
        let r = find(&tree, "r");
        let mut cursor = AxisCursor::new(Axis::DescendantOrSelf);
        cursor.set_start_node(&tree, r);
        cursor.next(&tree);
        cursor.set_mark();
        let rest = names(&tree, &mut cursor);
        assert!(cursor.next(&tree).is_none());
        cursor.goto_mark();
        assert_eq!(names(&tree, &mut cursor), rest);
        cursor.reset();
        assert_eq!(names(&tree, &mut cursor).len(), rest.len() + 1);
    }

    #[test]
    fn attribute_start_has_no_descendants_or_siblings() {
        let tree = sample();
        let a = find(&tree, "a");
        let id = tree.first_attribute(a).unwrap();
        for axis in [Axis::Child, Axis::Descendant, Axis::FollowingSibling, Axis::PrecedingSibling, Axis::Attribute] {
            let mut cursor = AxisCursor::new(axis);
            cursor.set_start_node(&tree, id);
            assert!(cursor.next(&tree).is_none(), "{axis}");
        }
        let mut following = AxisCursor::new(Axis::Following);
        following.set_start_node(&tree, id);
        assert_eq!(names(&tree, &mut following), ["b", "", "c"]);
    }
}
