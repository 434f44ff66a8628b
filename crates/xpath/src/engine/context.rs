//! Per-evaluation dynamic context.
//!
//! All mutable evaluation state that is not owned by an iterator lives here: the current
//! node, the predicate position, the namespace resolvers and the proximity frames that
//! `position()` and `last()` read. Every stack is pushed through a scope guard that pops on
//! drop, so the stacks stay balanced when evaluation unwinds through `?`.
use core::cell::RefCell;
use core::fmt;

use crate::compiler::ir::CompiledXPath;
use crate::engine::evaluator;
use crate::engine::predicate::ProximityFrame;
use crate::engine::runtime::{Error, ErrorCode, ErrorSink, NamespaceResolver, PropagateErrors, VariableBindings};
use crate::engine::value::{XPathResult, XPathValue};
use crate::model::{DocumentTree, NodeHandle};

static PROPAGATE: PropagateErrors = PropagateErrors;

/// Depth of each context stack. Between evaluations only the resolvers installed through
/// [`ExecutionContext::with_resolver`] and live [`ResolverScope`]s remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackDepths {
    pub current_nodes: usize,
    pub predicate_positions: usize,
    pub resolvers: usize,
    pub sub_contexts: usize,
}

pub struct ExecutionContext<'a, T: DocumentTree + ?Sized> {
    tree: &'a T,
    variables: Option<&'a VariableBindings>,
    sink: &'a dyn ErrorSink,
    current_nodes: RefCell<Vec<NodeHandle>>,
    predicate_positions: RefCell<Vec<usize>>,
    resolvers: RefCell<Vec<&'a dyn NamespaceResolver>>,
    sub_contexts: RefCell<Vec<ProximityFrame<'a>>>,
}

impl<T: DocumentTree + ?Sized> fmt::Debug for ExecutionContext<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext").field("depths", &self.stack_depths()).finish_non_exhaustive()
    }
}

impl<'a, T: DocumentTree + ?Sized> ExecutionContext<'a, T> {
    pub fn new(tree: &'a T) -> Self {
        Self {
            tree,
            variables: None,
            sink: &PROPAGATE,
            current_nodes: RefCell::new(Vec::new()),
            predicate_positions: RefCell::new(Vec::new()),
            resolvers: RefCell::new(Vec::new()),
            sub_contexts: RefCell::new(Vec::new()),
        }
    }

    /// Bottom resolver for prefixes left unbound at compile time.
    pub fn with_resolver(self, resolver: &'a dyn NamespaceResolver) -> Self {
        self.resolvers.borrow_mut().insert(0, resolver);
        self
    }

    pub fn with_variables(mut self, variables: &'a VariableBindings) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn with_error_sink(mut self, sink: &'a dyn ErrorSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn tree(&self) -> &'a T {
        self.tree
    }

    /// Evaluate `compiled` with `context_node` as the initial current node.
    ///
    /// A returned node-set is still lazy but caches what it yields, so it supports
    /// `item()` and `get_length()` without re-running the path.
    ///
    /// # Errors
    /// Any dynamic error raised during evaluation; it is also reported to the error sink.
    pub fn execute(&self, compiled: &'a CompiledXPath, context_node: NodeHandle) -> Result<XPathValue<'a>, Error> {
        tracing::debug!(expr = %compiled.source, "evaluating");
        let result = {
            let _node = self.push_node(context_node);
            evaluator::eval(&compiled.root, self)
        };
        match result {
            Ok(mut value) => {
                if let XPathValue::NodeSet(set) = &mut value {
                    set.set_should_cache_nodes(true);
                }
                Ok(value)
            }
            Err(e) => {
                self.sink.error(&e);
                Err(e)
            }
        }
    }

    /// [`Self::execute`] followed by full materialization.
    ///
    /// # Errors
    /// See [`Self::execute`].
    pub fn execute_to_result(&self, compiled: &'a CompiledXPath, context_node: NodeHandle) -> Result<XPathResult, Error> {
        let value = self.execute(compiled, context_node)?;
        value.materialize(self).inspect_err(|e| self.sink.error(e))
    }

    pub fn stack_depths(&self) -> StackDepths {
        StackDepths {
            current_nodes: self.current_nodes.borrow().len(),
            predicate_positions: self.predicate_positions.borrow().len(),
            resolvers: self.resolvers.borrow().len(),
            sub_contexts: self.sub_contexts.borrow().len(),
        }
    }

    pub(crate) fn current_node(&self) -> Result<NodeHandle, Error> {
        self.current_nodes
            .borrow()
            .last()
            .copied()
            .ok_or_else(|| Error::dynamic_err(ErrorCode::XPDY0002, "no context node"))
    }

    pub(crate) fn push_node(&self, node: NodeHandle) -> NodeScope<'_, 'a, T> {
        self.current_nodes.borrow_mut().push(node);
        NodeScope { ctx: self }
    }

    /// Make `node` current and `frame` the active sub-context for one predicate evaluation.
    pub(crate) fn enter_predicate(&self, node: NodeHandle, frame: ProximityFrame<'a>) -> PredicateScope<'_, 'a, T> {
        self.current_nodes.borrow_mut().push(node);
        self.predicate_positions.borrow_mut().push(frame.predicate);
        self.sub_contexts.borrow_mut().push(frame);
        PredicateScope { ctx: self }
    }

    /// Layer `resolver` over the existing ones until the returned scope is dropped.
    pub fn push_resolver(&self, resolver: &'a dyn NamespaceResolver) -> ResolverScope<'_, 'a, T> {
        self.resolvers.borrow_mut().push(resolver);
        ResolverScope { ctx: self }
    }

    /// Innermost resolver wins.
    ///
    /// # Errors
    /// `err:XPST0081` when no resolver knows the prefix.
    pub(crate) fn resolve_prefix(&self, prefix: &str) -> Result<String, Error> {
        let resolved = self.resolvers.borrow().iter().rev().find_map(|r| r.resolve(prefix));
        resolved.ok_or_else(|| Error::dynamic_err(ErrorCode::XPST0081, format!("unbound namespace prefix '{prefix}'")))
    }

    pub(crate) fn variable(&self, ns: Option<&str>, local: &str) -> Result<&'a XPathResult, Error> {
        self.variables.and_then(|v| v.get(ns, local)).ok_or_else(|| {
            let name = match ns {
                Some(uri) => format!("{{{uri}}}{local}"),
                None => local.to_string(),
            };
            Error::dynamic_err(ErrorCode::XPST0008, format!("unbound variable ${name}"))
        })
    }

    /// Active proximity frame, cloned out so the stack is not borrowed while it is used.
    pub(crate) fn sub_context(&self) -> Result<ProximityFrame<'a>, Error> {
        self.sub_contexts.borrow().last().cloned().ok_or_else(|| {
            Error::dynamic_err(ErrorCode::XPDY0002, "position() and last() need an enclosing predicate")
        })
    }

    pub(crate) fn warn(&self, warning: &Error) {
        tracing::warn!(code = %warning.code, "{}", warning.message);
        self.sink.warning(warning);
    }
}

pub(crate) struct NodeScope<'c, 'a, T: DocumentTree + ?Sized> {
    ctx: &'c ExecutionContext<'a, T>,
}

impl<T: DocumentTree + ?Sized> Drop for NodeScope<'_, '_, T> {
    fn drop(&mut self) {
        self.ctx.current_nodes.borrow_mut().pop();
    }
}

pub(crate) struct PredicateScope<'c, 'a, T: DocumentTree + ?Sized> {
    ctx: &'c ExecutionContext<'a, T>,
}

impl<T: DocumentTree + ?Sized> Drop for PredicateScope<'_, '_, T> {
    fn drop(&mut self) {
        self.ctx.sub_contexts.borrow_mut().pop();
        self.ctx.predicate_positions.borrow_mut().pop();
        self.ctx.current_nodes.borrow_mut().pop();
    }
}

#[must_use = "the resolver is popped when the scope is dropped"]
pub struct ResolverScope<'c, 'a, T: DocumentTree + ?Sized> {
    ctx: &'c ExecutionContext<'a, T>,
}

impl<T: DocumentTree + ?Sized> Drop for ResolverScope<'_, '_, T> {
    fn drop(&mut self) {
        self.ctx.resolvers.borrow_mut().pop();
    }
}
