//! Location-path iteration.
//!
//! A compiled path is instantiated against a context node as a chain of [`StepInstance`]s,
//! one per step. Single-step paths bypass the chain: a forward step streams straight from
//! its cursor and a reverse step is buffered once and replayed backwards. Paths whose
//! nested enumeration is not known to be in document order are drained, sorted and
//! de-duplicated before the first node is handed out.
use std::rc::Rc;

use smallvec::SmallVec;

use crate::compiler::ir::{Axis, LocationPath, PathOrder, Step};
use crate::engine::context::ExecutionContext;
use crate::engine::cursors::AxisCursor;
use crate::engine::evaluator;
use crate::engine::node_test::NodeMatcher;
use crate::engine::nodeset::NodeVector;
use crate::engine::predicate::{self, StepSeed};
use crate::engine::runtime::Error;
use crate::model::{DocumentTree, NodeHandle};

/// Runtime state of one compiled step.
#[derive(Debug)]
pub(crate) struct StepInstance<'a> {
    matcher: NodeMatcher<'a>,
    cursor: AxisCursor,
    positions: SmallVec<[usize; 2]>,
    seed: Option<Rc<StepSeed<'a>>>,
    marked_positions: SmallVec<[usize; 2]>,
}

impl<'a> StepInstance<'a> {
    fn new<T: DocumentTree + ?Sized>(
        step: &'a Step,
        ctx: &ExecutionContext<'a, T>,
        list: Option<Rc<[NodeHandle]>>,
    ) -> Result<Self, Error> {
        let cursor = match list {
            Some(list) => AxisCursor::over_list(list),
            None => AxisCursor::new(step.axis),
        };
        let positions = SmallVec::from_elem(0, step.predicates.len());
        let matcher = NodeMatcher::new(&step.test, step.axis, ctx)?;
        let seed = (!step.predicates.is_empty())
            .then(|| Rc::new(StepSeed::new(step, matcher.clone(), cursor.clone())));
        Ok(Self { matcher, cursor, marked_positions: positions.clone(), positions, seed })
    }

    fn set_start<T: DocumentTree + ?Sized>(&mut self, tree: &T, node: NodeHandle) {
        self.cursor.set_start_node(tree, node);
        self.positions.iter_mut().for_each(|p| *p = 0);
        if let Some(seed) = &self.seed {
            seed.restart(node);
        }
    }

    fn set_mark(&mut self) {
        self.cursor.set_mark();
        self.marked_positions.clone_from(&self.positions);
    }

    fn goto_mark(&mut self) {
        self.cursor.goto_mark();
        self.positions.clone_from(&self.marked_positions);
    }

    /// Next candidate that passes the node test and every predicate.
    fn next_accepted<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) -> Result<Option<NodeHandle>, Error> {
        let tree = ctx.tree();
        'candidates: while let Some(node) = self.cursor.next(tree) {
            if !self.matcher.matches(tree, node) {
                continue;
            }
            if let Some(seed) = &self.seed {
                for (index, position) in self.positions.iter_mut().enumerate() {
                    *position += 1;
                    if !predicate::accepts(ctx, seed, index, node, *position)? {
                        continue 'candidates;
                    }
                }
            }
            return Ok(Some(node));
        }
        Ok(None)
    }
}

impl Clone for StepInstance<'_> {
    // The seed is per instance; a clone restarted elsewhere must not retarget the original.
    fn clone(&self) -> Self {
        Self {
            matcher: self.matcher.clone(),
            cursor: self.cursor.clone(),
            positions: self.positions.clone(),
            seed: self.seed.as_ref().map(|seed| Rc::new(seed.detached())),
            marked_positions: self.marked_positions.clone(),
        }
    }
}

// Nested-loop walk over a chain of steps; `active` is the deepest started step.
#[derive(Debug, Clone)]
struct Walk<'a> {
    steps: Vec<StepInstance<'a>>,
    active: usize,
}

impl<'a> Walk<'a> {
    fn restart<T: DocumentTree + ?Sized>(&mut self, tree: &T, context: NodeHandle) {
        self.active = 0;
        if let Some(first) = self.steps.first_mut() {
            first.set_start(tree, context);
        }
    }

    fn next<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) -> Result<Option<NodeHandle>, Error> {
        let last = self.steps.len().saturating_sub(1);
        loop {
            let Some(step) = self.steps.get_mut(self.active) else {
                return Ok(None);
            };
            match step.next_accepted(ctx)? {
                Some(node) if self.active == last => return Ok(Some(node)),
                Some(node) => {
                    self.active += 1;
                    self.steps[self.active].set_start(ctx.tree(), node);
                }
                None if self.active == 0 => return Ok(None),
                None => self.active -= 1,
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Traversal<'a> {
    Forward(StepInstance<'a>),
    Reverse { step: StepInstance<'a>, pending: Option<Vec<NodeHandle>> },
    Walking(Walk<'a>),
    Sorted { walk: Walk<'a>, sorted: Option<std::vec::IntoIter<NodeHandle>> },
}

impl<'a> Traversal<'a> {
    fn restart<T: DocumentTree + ?Sized>(&mut self, tree: &T, context: NodeHandle) {
        match self {
            Traversal::Forward(step) => step.set_start(tree, context),
            Traversal::Reverse { step, pending } => {
                step.set_start(tree, context);
                *pending = None;
            }
            Traversal::Walking(walk) => walk.restart(tree, context),
            Traversal::Sorted { walk, sorted } => {
                walk.restart(tree, context);
                *sorted = None;
            }
        }
    }

    fn next<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) -> Result<Option<NodeHandle>, Error> {
        match self {
            Traversal::Forward(step) => step.next_accepted(ctx),
            Traversal::Reverse { step, pending } => {
                if pending.is_none() {
                    let mut nodes = Vec::new();
                    while let Some(node) = step.next_accepted(ctx)? {
                        nodes.push(node);
                    }
                    *pending = Some(nodes);
                }
                // nearest-first buffer, so popping yields document order
                Ok(pending.as_mut().and_then(Vec::pop))
            }
            Traversal::Walking(walk) => walk.next(ctx),
            Traversal::Sorted { walk, sorted } => {
                if sorted.is_none() {
                    let mut nodes = NodeVector::new();
                    while let Some(node) = walk.next(ctx)? {
                        nodes.push(node);
                    }
                    nodes.sort_and_dedup(ctx.tree());
                    tracing::trace!(count = nodes.len(), "sorted location path");
                    *sorted = Some(nodes.into_vec().into_iter());
                }
                Ok(sorted.as_mut().and_then(Iterator::next))
            }
        }
    }

    // Nodes left to yield, when that is known without walking the tree.
    fn buffered_remaining(&self) -> Option<usize> {
        match self {
            Traversal::Reverse { pending: Some(nodes), .. } => Some(nodes.len()),
            Traversal::Sorted { sorted: Some(nodes), .. } => Some(nodes.len()),
            _ => None,
        }
    }
}

/// Lazy iterator over the nodes selected by a location path, in document order.
#[derive(Debug, Clone)]
pub struct LocationPathIterator<'a> {
    context: NodeHandle,
    traversal: Traversal<'a>,
    cache: Option<Vec<NodeHandle>>,
    position: usize,
    started: bool,
    exhausted: bool,
}

impl<'a> LocationPathIterator<'a> {
    /// Instantiate `path` against `context`. A leading filter expression is evaluated here,
    /// once.
    ///
    /// # Errors
    /// `err:XPTY0004` when a filter expression does not yield a node-set, `err:XPST0081` for
    /// an unresolvable prefix, and any error raised by the filter expression itself.
    pub fn new<T: DocumentTree + ?Sized>(
        path: &'a LocationPath,
        context: NodeHandle,
        ctx: &ExecutionContext<'a, T>,
    ) -> Result<Self, Error> {
        let mut steps = Vec::with_capacity(path.steps.len());
        for (i, step) in path.steps.iter().enumerate() {
            let list = if i == 0 && step.axis == Axis::FilteredList {
                Some(filtered_list(step, context, ctx)?)
            } else {
                None
            };
            steps.push(StepInstance::new(step, ctx, list)?);
        }
        let mut traversal = if steps.len() == 1 && path.order != PathOrder::Unordered {
            let step = steps.remove(0);
            if path.order == PathOrder::Reverse {
                Traversal::Reverse { step, pending: None }
            } else {
                Traversal::Forward(step)
            }
        } else if path.order == PathOrder::Document {
            Traversal::Walking(Walk { steps, active: 0 })
        } else {
            Traversal::Sorted { walk: Walk { steps, active: 0 }, sorted: None }
        };
        traversal.restart(ctx.tree(), context);
        Ok(Self { context, traversal, cache: None, position: 0, started: false, exhausted: false })
    }

    /// Keep every yielded node so the iterator supports [`Self::item`] and cheap replays.
    ///
    /// # Panics
    /// When called after the first node has been requested.
    pub fn set_should_cache_nodes(&mut self, cache: bool) {
        assert!(!self.started, "node caching must be configured before iteration starts");
        self.cache = cache.then(Vec::new);
    }

    pub fn is_caching(&self) -> bool {
        self.cache.is_some()
    }

    /// Every traversal mode yields distinct nodes in document order.
    pub fn is_doc_ordered(&self) -> bool {
        true
    }

    /// Number of nodes handed out by [`Self::next_node`] since the last reset.
    pub fn current_position(&self) -> usize {
        self.position
    }

    /// Next node, or `None` once exhausted; further calls keep returning `None`.
    pub fn next_node<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) -> Result<Option<NodeHandle>, Error> {
        self.started = true;
        if self.cache.is_some() {
            self.run_to(ctx, Some(self.position))?;
            let node = self.cache.as_ref().and_then(|c| c.get(self.position).copied());
            if node.is_some() {
                self.position += 1;
            }
            return Ok(node);
        }
        if self.exhausted {
            return Ok(None);
        }
        match self.traversal.next(ctx)? {
            Some(node) => {
                self.position += 1;
                Ok(Some(node))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Fill the cache up to and including `index`, or completely for `None`. Does not
    /// move the position of [`Self::next_node`]. No-op without caching.
    pub fn run_to<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>, index: Option<usize>) -> Result<(), Error> {
        let Some(cache) = self.cache.as_mut() else {
            return Ok(());
        };
        while !self.exhausted && index.is_none_or(|i| cache.len() <= i) {
            match self.traversal.next(ctx)? {
                Some(node) => cache.push(node),
                None => self.exhausted = true,
            }
        }
        Ok(())
    }

    /// Zero-based random access.
    ///
    /// # Panics
    /// When caching was not enabled.
    pub fn item<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>, index: usize) -> Result<Option<NodeHandle>, Error> {
        assert!(self.cache.is_some(), "random access needs node caching");
        self.run_to(ctx, Some(index))?;
        Ok(self.cache.as_ref().and_then(|c| c.get(index).copied()))
    }

    /// Total number of nodes. Never less than the number already returned.
    pub fn get_length<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) -> Result<usize, Error> {
        if self.cache.is_some() {
            self.run_to(ctx, None)?;
            return Ok(self.cache.as_ref().map_or(0, Vec::len));
        }
        if self.exhausted {
            return Ok(self.position);
        }
        if let Some(remaining) = self.traversal.buffered_remaining() {
            return Ok(self.position + remaining);
        }
        if let Traversal::Forward(step) = &mut self.traversal {
            step.set_mark();
            let mut remaining = 0;
            let counted = loop {
                match step.next_accepted(ctx) {
                    Ok(Some(_)) => remaining += 1,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e),
                }
            };
            step.goto_mark();
            counted?;
            return Ok(self.position + remaining);
        }
        tracing::trace!("counting location path on a reset clone");
        let mut clone = self.clone_with_reset(ctx);
        let mut length = 0;
        while clone.next_node(ctx)?.is_some() {
            length += 1;
        }
        Ok(length)
    }

    /// Independent iterator positioned before the first node. A caching iterator takes a
    /// copy of what it has cached so far and continues from the same traversal state.
    pub fn clone_with_reset<T: DocumentTree + ?Sized>(&self, ctx: &ExecutionContext<'a, T>) -> Self {
        let mut clone = self.clone();
        clone.position = 0;
        clone.started = false;
        if clone.cache.is_none() {
            clone.traversal.restart(ctx.tree(), self.context);
            clone.exhausted = false;
        }
        clone
    }

    /// Rewind to the first node. A caching iterator replays its cache.
    pub fn reset<T: DocumentTree + ?Sized>(&mut self, ctx: &ExecutionContext<'a, T>) {
        self.position = 0;
        if self.cache.is_none() {
            self.started = false;
            self.exhausted = false;
            self.traversal.restart(ctx.tree(), self.context);
        }
    }
}

fn filtered_list<'a, T: DocumentTree + ?Sized>(
    step: &'a Step,
    context: NodeHandle,
    ctx: &ExecutionContext<'a, T>,
) -> Result<Rc<[NodeHandle]>, Error> {
    let Some(filter) = &step.filter else {
        return Ok(Rc::from(Vec::new()));
    };
    let value = {
        let _node = ctx.push_node(context);
        evaluator::eval(filter, ctx)?
    };
    let nodes = value.into_node_set()?.materialize(ctx)?;
    Ok(Rc::from(nodes.into_vec()))
}
