use super::{FnResult, node_or_context, node_set_arg, string_arg};
use crate::compiler::ir::Expr;
use crate::engine::context::ExecutionContext;
use crate::engine::evaluator::eval;
use crate::engine::nodeset::{NodeSet, NodeVector};
use crate::engine::predicate;
use crate::engine::value::{XPathValue, is_xml_whitespace};
use crate::model::{DocumentTree, NodeKind, XML_NS};

#[allow(clippy::cast_precision_loss)]
fn count_value(n: usize) -> f64 {
    n as f64
}

pub(super) fn last_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, _args: &'a [Expr]) -> FnResult<'a> {
    Ok(XPathValue::Number(count_value(predicate::context_size(ctx)?)))
}

pub(super) fn position_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, _args: &'a [Expr]) -> FnResult<'a> {
    Ok(XPathValue::Number(count_value(predicate::context_position(ctx)?)))
}

pub(super) fn count_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let mut set = node_set_arg(ctx, args, 0)?;
    Ok(XPathValue::Number(count_value(set.get_length(ctx)?)))
}

/// Whitespace-separated IDs, taken from the string-value of every node of a node-set
/// argument or from the string form of any other argument.
pub(super) fn id_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let tree = ctx.tree();
    let root = tree.root(ctx.current_node()?);
    let mut tokens = String::new();
    match eval(&args[0], ctx)? {
        XPathValue::NodeSet(mut set) => {
            while let Some(node) = set.next_node(ctx)? {
                tokens.push_str(&tree.string_value(node));
                tokens.push(' ');
            }
        }
        other => tokens = other.into_string(ctx)?,
    }
    let mut found = NodeVector::new();
    for id in tokens.split(is_xml_whitespace).filter(|t| !t.is_empty()) {
        if let Some(element) = tree.element_by_id(root, id) {
            found.push(element);
        }
    }
    found.sort_and_dedup(tree);
    Ok(XPathValue::NodeSet(NodeSet::from_vector(found)))
}

pub(super) fn local_name_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let name = node_or_context(ctx, args)?.map(|n| ctx.tree().local_name(n).to_string()).unwrap_or_default();
    Ok(XPathValue::String(name))
}

pub(super) fn namespace_uri_fn<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    args: &'a [Expr],
) -> FnResult<'a> {
    let uri = node_or_context(ctx, args)?
        .and_then(|n| ctx.tree().namespace_uri(n))
        .unwrap_or_default()
        .to_string();
    Ok(XPathValue::String(uri))
}

pub(super) fn name_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let name = node_or_context(ctx, args)?.map(|n| ctx.tree().name(n)).unwrap_or_default();
    Ok(XPathValue::String(name))
}

/// `xml:lang` of the nearest ancestor-or-self element equals the argument or starts with
/// it followed by `-`, ignoring case.
pub(super) fn lang_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let wanted = string_arg(ctx, args, 0)?.to_ascii_lowercase();
    let tree = ctx.tree();
    let mut cur = Some(ctx.current_node()?);
    while let Some(node) = cur {
        if tree.kind(node) == NodeKind::Element {
            let mut attr = tree.first_attribute(node);
            while let Some(a) = attr {
                if tree.local_name(a) == "lang" && tree.namespace_uri(a) == Some(XML_NS) {
                    let lang = tree.string_value(a).to_ascii_lowercase();
                    let matches = lang == wanted
                        || lang.strip_prefix(wanted.as_str()).is_some_and(|rest| rest.starts_with('-'));
                    return Ok(XPathValue::Boolean(matches));
                }
                attr = tree.next_attribute(a);
            }
        }
        cur = tree.parent(node);
    }
    Ok(XPathValue::Boolean(false))
}
