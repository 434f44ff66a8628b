//! Recursive evaluation of the compiled expression tree.
use crate::compiler::ir::{ArithOp, CompiledXPath, Expr, NamespaceMatch};
use crate::engine::comparison;
use crate::engine::context::ExecutionContext;
use crate::engine::functions;
use crate::engine::location::LocationPathIterator;
use crate::engine::nodeset::{NodeSet, NodeVector};
use crate::engine::runtime::{Error, NamespaceResolver};
use crate::engine::value::{XPathResult, XPathValue};
use crate::model::{DocumentTree, NodeHandle};

/// Evaluates a compiled expression against `context_node` and materializes the result.
///
/// Node-sets come back as distinct nodes in document order. For lazy node-sets, build an
/// [`ExecutionContext`] and call [`ExecutionContext::execute`].
///
/// # Example
///
/// ```
/// use arbor_xpath::{compile, evaluate, simple_tree::{doc, elem}};
/// let tree = doc().child(elem("r").child(elem("a")).child(elem("a"))).build();
/// let compiled = compile("count(/r/a)").unwrap();
/// let result = evaluate(&compiled, &tree, tree.document(), None).unwrap();
/// assert_eq!(result.as_number(&tree), 2.0);
/// ```
///
/// # Errors
///
/// Returns an error if an operand has the wrong type, a variable or namespace prefix is
/// unbound, or `position()`/`last()` is used outside a predicate.
pub fn evaluate<T: DocumentTree + ?Sized>(
    compiled: &CompiledXPath,
    tree: &T,
    context_node: NodeHandle,
    resolver: Option<&dyn NamespaceResolver>,
) -> Result<XPathResult, Error> {
    let mut ctx = ExecutionContext::new(tree);
    if let Some(resolver) = resolver {
        ctx = ctx.with_resolver(resolver);
    }
    ctx.execute_to_result(compiled, context_node)
}

pub(crate) fn eval<'a, T: DocumentTree + ?Sized>(expr: &'a Expr, ctx: &ExecutionContext<'a, T>) -> Result<XPathValue<'a>, Error> {
    match expr {
        Expr::Number(n) => Ok(XPathValue::Number(*n)),
        Expr::String(s) => Ok(XPathValue::String(s.clone())),
        Expr::Variable { ns, local } => variable(ctx, ns, local),
        Expr::Function { func, args } => functions::call(*func, args, ctx),
        Expr::Or(left, right) => {
            let value = eval(left, ctx)?.into_boolean(ctx)? || eval(right, ctx)?.into_boolean(ctx)?;
            Ok(XPathValue::Boolean(value))
        }
        Expr::And(left, right) => {
            let value = eval(left, ctx)?.into_boolean(ctx)? && eval(right, ctx)?.into_boolean(ctx)?;
            Ok(XPathValue::Boolean(value))
        }
        Expr::Compare { op, left, right } => {
            let l = eval(left, ctx)?;
            let r = eval(right, ctx)?;
            comparison::compare(ctx, *op, l, r).map(XPathValue::Boolean)
        }
        Expr::Arith { op, left, right } => {
            let a = eval(left, ctx)?.into_number(ctx)?;
            let b = eval(right, ctx)?.into_number(ctx)?;
            Ok(XPathValue::Number(arithmetic(*op, a, b)))
        }
        Expr::Negate(inner) => Ok(XPathValue::Number(-eval(inner, ctx)?.into_number(ctx)?)),
        Expr::Union(left, right) => {
            let l = eval(left, ctx)?.into_node_set()?.materialize(ctx)?;
            let r = eval(right, ctx)?.into_node_set()?.materialize(ctx)?;
            Ok(XPathValue::NodeSet(NodeSet::from_vector(l.union(r, ctx.tree()))))
        }
        Expr::Path(path) => {
            let context = ctx.current_node()?;
            Ok(XPathValue::NodeSet(NodeSet::from_path(LocationPathIterator::new(path, context, ctx)?)))
        }
    }
}

// `%` on f64 is the truncating remainder XPath's `mod` asks for.
fn arithmetic(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
    }
}

fn variable<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    ns: &NamespaceMatch,
    local: &str,
) -> Result<XPathValue<'a>, Error> {
    let uri = match ns {
        NamespaceMatch::NoNamespace => None,
        NamespaceMatch::Uri(uri) => Some(uri.clone()),
        NamespaceMatch::Deferred(prefix) => Some(ctx.resolve_prefix(prefix)?),
    };
    Ok(match ctx.variable(uri.as_deref(), local)? {
        XPathResult::Boolean(b) => XPathValue::Boolean(*b),
        XPathResult::Number(n) => XPathValue::Number(*n),
        XPathResult::String(s) => XPathValue::String(s.clone()),
        XPathResult::NodeSet(nodes) => {
            let mut vector = NodeVector::new();
            for node in nodes {
                vector.push(*node);
            }
            vector.sort_and_dedup(ctx.tree());
            XPathValue::NodeSet(NodeSet::from_vector(vector))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::arithmetic;
    use crate::compiler::ir::ArithOp;

    #[test]
    fn mod_truncates_towards_zero() {
        assert_eq!(arithmetic(ArithOp::Mod, 5.0, 2.0), 1.0);
        assert_eq!(arithmetic(ArithOp::Mod, 5.0, -2.0), 1.0);
        assert_eq!(arithmetic(ArithOp::Mod, -5.0, 2.0), -1.0);
        assert_eq!(arithmetic(ArithOp::Mod, -5.0, -2.0), -1.0);
        assert!(arithmetic(ArithOp::Mod, 1.0, 0.0).is_nan());
    }

    #[test]
    fn division_follows_ieee() {
        assert_eq!(arithmetic(ArithOp::Div, 1.0, 0.0), f64::INFINITY);
        assert_eq!(arithmetic(ArithOp::Div, -1.0, 0.0), f64::NEG_INFINITY);
        assert!(arithmetic(ArithOp::Div, 0.0, 0.0).is_nan());
    }
}
