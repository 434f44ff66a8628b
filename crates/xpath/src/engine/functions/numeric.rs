use super::{FnResult, node_set_arg, number_arg};
use crate::compiler::ir::Expr;
use crate::engine::context::ExecutionContext;
use crate::engine::value::{XPathValue, string_to_number};
use crate::model::DocumentTree;

/// Nearest integer, halves rounding towards positive infinity. Keeps NaN, infinities and
/// the sign of zero, and maps `[-0.5, -0)` to `-0`.
pub(crate) fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() || n == 0.0 {
        return n;
    }
    if (-0.5..0.0).contains(&n) {
        return -0.0;
    }
    (n + 0.5).floor()
}

pub(super) fn number_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let n = if args.is_empty() {
        string_to_number(&ctx.tree().string_value(ctx.current_node()?))
    } else {
        number_arg(ctx, args, 0)?
    };
    Ok(XPathValue::Number(n))
}

pub(super) fn sum_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let mut set = node_set_arg(ctx, args, 0)?;
    let mut total = 0.0;
    while let Some(node) = set.next_node(ctx)? {
        total += string_to_number(&ctx.tree().string_value(node));
    }
    Ok(XPathValue::Number(total))
}

pub(super) fn floor_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    Ok(XPathValue::Number(number_arg(ctx, args, 0)?.floor()))
}

pub(super) fn ceiling_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    Ok(XPathValue::Number(number_arg(ctx, args, 0)?.ceil()))
}

pub(super) fn round_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    Ok(XPathValue::Number(xpath_round(number_arg(ctx, args, 0)?)))
}
