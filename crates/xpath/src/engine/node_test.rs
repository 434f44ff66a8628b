use std::borrow::Cow;

use crate::compiler::ir::{Axis, NamespaceMatch, NodeTest};
use crate::engine::context::ExecutionContext;
use crate::engine::runtime::Error;
use crate::model::{DocumentTree, NodeHandle, NodeKind};

/// A node test with its namespace prefix resolved, ready to be applied to candidates.
#[derive(Debug, Clone)]
pub(crate) struct NodeMatcher<'a> {
    test: &'a NodeTest,
    principal: NodeKind,
    ns: Option<Cow<'a, str>>,
}

impl<'a> NodeMatcher<'a> {
    /// # Errors
    /// `err:XPST0081` when the test uses a prefix no resolver in `ctx` binds.
    pub(crate) fn new<T: DocumentTree + ?Sized>(
        test: &'a NodeTest,
        axis: Axis,
        ctx: &ExecutionContext<'a, T>,
    ) -> Result<Self, Error> {
        let ns = match test {
            NodeTest::Name { ns, .. } | NodeTest::NamespaceWildcard(ns) => match ns {
                NamespaceMatch::NoNamespace => None,
                NamespaceMatch::Uri(uri) => Some(Cow::Borrowed(uri.as_str())),
                NamespaceMatch::Deferred(prefix) => Some(Cow::Owned(ctx.resolve_prefix(prefix)?)),
            },
            _ => None,
        };
        Ok(Self { test, principal: axis.principal_kind(), ns })
    }

    pub(crate) fn matches<T: DocumentTree + ?Sized>(&self, tree: &T, node: NodeHandle) -> bool {
        let kind = tree.kind(node);
        match self.test {
            NodeTest::AnyNode => true,
            NodeTest::Text => kind == NodeKind::Text,
            NodeTest::Comment => kind == NodeKind::Comment,
            NodeTest::ProcessingInstruction(target) => {
                kind == NodeKind::ProcessingInstruction && target.as_deref().is_none_or(|t| tree.local_name(node) == t)
            }
            NodeTest::Principal => kind == self.principal,
            NodeTest::NamespaceWildcard(_) => {
                kind == self.principal && tree.namespace_uri(node) == self.ns.as_deref()
            }
            NodeTest::Name { local, .. } => {
                kind == self.principal
                    && tree.local_name(node) == local
                    && tree.namespace_uri(node) == self.ns.as_deref()
            }
        }
    }
}
