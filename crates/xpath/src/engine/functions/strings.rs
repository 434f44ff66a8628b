use super::{FnResult, number_arg, string_arg, string_or_context};
use crate::compiler::ir::Expr;
use crate::engine::context::ExecutionContext;
use crate::engine::value::{XPathValue, is_xml_whitespace};
use crate::model::DocumentTree;

use super::numeric::xpath_round;

pub(super) fn string_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    Ok(XPathValue::String(string_or_context(ctx, args)?))
}

pub(super) fn concat_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let mut out = String::new();
    for i in 0..args.len() {
        out.push_str(&string_arg(ctx, args, i)?);
    }
    Ok(XPathValue::String(out))
}

pub(super) fn starts_with_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let s = string_arg(ctx, args, 0)?;
    let prefix = string_arg(ctx, args, 1)?;
    Ok(XPathValue::Boolean(s.starts_with(&prefix)))
}

pub(super) fn contains_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let s = string_arg(ctx, args, 0)?;
    let needle = string_arg(ctx, args, 1)?;
    Ok(XPathValue::Boolean(s.contains(&needle)))
}

pub(super) fn substring_before_fn<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    args: &'a [Expr],
) -> FnResult<'a> {
    let s = string_arg(ctx, args, 0)?;
    let needle = string_arg(ctx, args, 1)?;
    let out = s.find(&needle).map(|at| s[..at].to_string()).unwrap_or_default();
    Ok(XPathValue::String(out))
}

pub(super) fn substring_after_fn<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    args: &'a [Expr],
) -> FnResult<'a> {
    let s = string_arg(ctx, args, 0)?;
    let needle = string_arg(ctx, args, 1)?;
    let out = s.find(&needle).map(|at| s[at + needle.len()..].to_string()).unwrap_or_default();
    Ok(XPathValue::String(out))
}

/// Characters at 1-based positions `p` with `round(start) <= p < round(start) + round(len)`.
/// NaN and infinite bounds fall out of the float comparisons.
pub(super) fn substring_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let s = string_arg(ctx, args, 0)?;
    let start = xpath_round(number_arg(ctx, args, 1)?);
    let end = if args.len() > 2 { start + xpath_round(number_arg(ctx, args, 2)?) } else { f64::INFINITY };
    let out: String = s
        .chars()
        .enumerate()
        .filter(|(i, _)| {
            #[allow(clippy::cast_precision_loss)]
            let p = (*i + 1) as f64;
            p >= start && p < end
        })
        .map(|(_, c)| c)
        .collect();
    Ok(XPathValue::String(out))
}

pub(super) fn string_length_fn<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    args: &'a [Expr],
) -> FnResult<'a> {
    let s = string_or_context(ctx, args)?;
    #[allow(clippy::cast_precision_loss)]
    let len = s.chars().count() as f64;
    Ok(XPathValue::Number(len))
}

pub(super) fn normalize_space_fn<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    args: &'a [Expr],
) -> FnResult<'a> {
    let s = string_or_context(ctx, args)?;
    let words: Vec<&str> = s.split(is_xml_whitespace).filter(|w| !w.is_empty()).collect();
    Ok(XPathValue::String(words.join(" ")))
}

/// The first occurrence of a character in `from` decides its mapping; characters of
/// `from` past the end of `to` are removed.
pub(super) fn translate_fn<'a, T: DocumentTree + ?Sized>(ctx: &ExecutionContext<'a, T>, args: &'a [Expr]) -> FnResult<'a> {
    let s = string_arg(ctx, args, 0)?;
    let from: Vec<char> = string_arg(ctx, args, 1)?.chars().collect();
    let to: Vec<char> = string_arg(ctx, args, 2)?.chars().collect();
    let out = s
        .chars()
        .filter_map(|c| match from.iter().position(|f| *f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect();
    Ok(XPathValue::String(out))
}
