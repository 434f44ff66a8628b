//! Predicate filtering and proximity positions.
//!
//! Forward positions are counted while a step streams. `last()` needs the size of the
//! whole candidate list, which is found by replaying an unstarted copy of the step's cursor
//! from the current start node. The count is computed the first time `last()` asks for it and
//! memoized per predicate until the step is restarted.
use core::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::compiler::ir::{Expr, Step};
use crate::engine::context::ExecutionContext;
use crate::engine::cursors::AxisCursor;
use crate::engine::evaluator;
use crate::engine::node_test::NodeMatcher;
use crate::engine::runtime::{Error, ErrorCode};
use crate::engine::value::XPathValue;
use crate::model::{DocumentTree, NodeHandle};

/// Per-instance state of a predicated step that its predicates can see: the start node of
/// the current run and the proximity sizes counted for it.
#[derive(Debug)]
pub(crate) struct StepSeed<'a> {
    step: &'a Step,
    matcher: NodeMatcher<'a>,
    // never started; cloned and pointed at `start` when a size is needed
    template: AxisCursor,
    start: Cell<Option<NodeHandle>>,
    sizes: RefCell<Vec<Option<usize>>>,
    // shared with copies so a step warns once however often it is cloned or restarted
    warned: Rc<Cell<bool>>,
}

/// Active sub-context: which predicate of which step is running, and the candidate's
/// proximity position.
#[derive(Debug, Clone)]
pub(crate) struct ProximityFrame<'a> {
    pub(crate) seed: Rc<StepSeed<'a>>,
    pub(crate) predicate: usize,
    pub(crate) position: usize,
}

impl<'a> StepSeed<'a> {
    pub(crate) fn new(step: &'a Step, matcher: NodeMatcher<'a>, template: AxisCursor) -> Self {
        Self {
            step,
            matcher,
            template,
            start: Cell::new(None),
            sizes: RefCell::new(vec![None; step.predicates.len()]),
            warned: Rc::new(Cell::new(false)),
        }
    }

    /// Point the seed at a new start node and forget the sizes counted for the previous one.
    pub(crate) fn restart(&self, start: NodeHandle) {
        self.start.set(Some(start));
        self.sizes.borrow_mut().iter_mut().for_each(|size| *size = None);
    }

    /// Copy for a cloned step instance. Start node and sizes are copied, the warning flag
    /// is shared.
    pub(crate) fn detached(&self) -> Self {
        Self {
            step: self.step,
            matcher: self.matcher.clone(),
            template: self.template.clone(),
            start: Cell::new(self.start.get()),
            sizes: RefCell::new(self.sizes.borrow().clone()),
            warned: Rc::clone(&self.warned),
        }
    }

    /// Number of candidates that pass the node test and every predicate before `predicate`.
    pub(crate) fn proximity_size<T: DocumentTree + ?Sized>(
        self: &Rc<Self>,
        ctx: &ExecutionContext<'a, T>,
        predicate: usize,
    ) -> Result<usize, Error> {
        let cached = self.sizes.borrow().get(predicate).copied().flatten();
        if let Some(size) = cached {
            return Ok(size);
        }
        let Some(start) = self.start.get() else {
            return Ok(0);
        };
        tracing::trace!(axis = %self.step.axis, predicate, "counting proximity size");
        let tree = ctx.tree();
        let mut cursor = self.template.clone();
        cursor.set_start_node(tree, start);
        let mut positions = vec![0usize; predicate];
        let mut size = 0;
        'candidates: while let Some(node) = cursor.next(tree) {
            if !self.matcher.matches(tree, node) {
                continue;
            }
            for (index, position) in positions.iter_mut().enumerate() {
                *position += 1;
                if !accepts(ctx, self, index, node, *position)? {
                    continue 'candidates;
                }
            }
            size += 1;
        }
        if let Some(slot) = self.sizes.borrow_mut().get_mut(predicate) {
            *slot = Some(size);
        }
        Ok(size)
    }

    fn position_matches<T: DocumentTree + ?Sized>(&self, ctx: &ExecutionContext<'a, T>, n: f64, position: usize) -> bool {
        if (n.is_nan() || n.fract() != 0.0) && !self.warned.replace(true) {
            ctx.warn(&Error::dynamic_err(
                ErrorCode::FOER0000,
                format!("numeric predicate {n} can never equal a position on the {} axis", self.step.axis),
            ));
        }
        #[allow(clippy::cast_precision_loss)]
        let position = position as f64;
        n == position
    }
}

/// Apply predicate `index` of the seed's step to `node` at proximity `position`.
pub(crate) fn accepts<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    seed: &Rc<StepSeed<'a>>,
    index: usize,
    node: NodeHandle,
    position: usize,
) -> Result<bool, Error> {
    let predicate = &seed.step.predicates[index];
    if let Expr::Number(n) = predicate {
        return Ok(seed.position_matches(ctx, *n, position));
    }
    let _scope = ctx.enter_predicate(node, ProximityFrame { seed: Rc::clone(seed), predicate: index, position });
    match evaluator::eval(predicate, ctx)? {
        XPathValue::Number(n) => Ok(seed.position_matches(ctx, n, position)),
        other => other.into_boolean(ctx),
    }
}

/// `position()`
pub(crate) fn context_position<T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'_, T>) -> Result<usize, Error> {
    Ok(ctx.sub_context()?.position)
}

/// `last()`
pub(crate) fn context_size<T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'_, T>) -> Result<usize, Error> {
    let frame = ctx.sub_context()?;
    frame.seed.proximity_size(ctx, frame.predicate)
}
