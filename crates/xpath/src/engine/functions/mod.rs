//! XPath 1.0 core function library.
//!
//! Arity is checked by the compiler, so every `*_fn` may index its arguments directly.
//! Arguments are evaluated on demand, in order.
use crate::compiler::ir::{Expr, Function};
use crate::engine::context::ExecutionContext;
use crate::engine::evaluator::eval;
use crate::engine::nodeset::NodeSet;
use crate::engine::runtime::Error;
use crate::engine::value::XPathValue;
use crate::model::{DocumentTree, NodeHandle};

mod nodes;
mod numeric;
mod strings;

type FnResult<'a> = Result<XPathValue<'a>, Error>;

pub(crate) fn call<'a, T: DocumentTree + ?Sized>(
    func: Function,
    args: &'a [Expr],
    ctx: &ExecutionContext<'a, T>,
) -> FnResult<'a> {
    match func {
        Function::Last => nodes::last_fn(ctx, args),
        Function::Position => nodes::position_fn(ctx, args),
        Function::Count => nodes::count_fn(ctx, args),
        Function::Id => nodes::id_fn(ctx, args),
        Function::LocalName => nodes::local_name_fn(ctx, args),
        Function::NamespaceUri => nodes::namespace_uri_fn(ctx, args),
        Function::Name => nodes::name_fn(ctx, args),
        Function::Lang => nodes::lang_fn(ctx, args),
        Function::String => strings::string_fn(ctx, args),
        Function::Concat => strings::concat_fn(ctx, args),
        Function::StartsWith => strings::starts_with_fn(ctx, args),
        Function::Contains => strings::contains_fn(ctx, args),
        Function::SubstringBefore => strings::substring_before_fn(ctx, args),
        Function::SubstringAfter => strings::substring_after_fn(ctx, args),
        Function::Substring => strings::substring_fn(ctx, args),
        Function::StringLength => strings::string_length_fn(ctx, args),
        Function::NormalizeSpace => strings::normalize_space_fn(ctx, args),
        Function::Translate => strings::translate_fn(ctx, args),
        Function::Boolean => Ok(XPathValue::Boolean(boolean_arg(ctx, args, 0)?)),
        Function::Not => Ok(XPathValue::Boolean(!boolean_arg(ctx, args, 0)?)),
        Function::True => Ok(XPathValue::Boolean(true)),
        Function::False => Ok(XPathValue::Boolean(false)),
        Function::Number => numeric::number_fn(ctx, args),
        Function::Sum => numeric::sum_fn(ctx, args),
        Function::Floor => numeric::floor_fn(ctx, args),
        Function::Ceiling => numeric::ceiling_fn(ctx, args),
        Function::Round => numeric::round_fn(ctx, args),
    }
}

fn boolean_arg<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr], i: usize) -> Result<bool, Error> {
    eval(&args[i], ctx)?.into_boolean(ctx)
}

fn number_arg<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr], i: usize) -> Result<f64, Error> {
    eval(&args[i], ctx)?.into_number(ctx)
}

fn string_arg<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr], i: usize) -> Result<String, Error> {
    eval(&args[i], ctx)?.into_string(ctx)
}

fn node_set_arg<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    args: &'a [Expr],
    i: usize,
) -> Result<NodeSet<'a>, Error> {
    eval(&args[i], ctx)?.into_node_set()
}

/// String argument, defaulting to the string-value of the context node.
fn string_or_context<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> Result<String, Error> {
    if args.is_empty() {
        Ok(ctx.tree().string_value(ctx.current_node()?))
    } else {
        string_arg(ctx, args, 0)
    }
}

/// First node of the node-set argument in document order, defaulting to the context node.
fn node_or_context<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    args: &'a [Expr],
) -> Result<Option<NodeHandle>, Error> {
    if args.is_empty() {
        ctx.current_node().map(Some)
    } else {
        node_set_arg(ctx, args, 0)?.first_node(ctx)
    }
}
