//! `=`, `!=`, `<`, `<=`, `>`, `>=` over typed values.
//!
//! A node-set operand makes the comparison existential: it holds when any member (or pair
//! of members) satisfies the scalar test. Node-sets are streamed so equality stops at the
//! first matching node.
use crate::compiler::ir::ComparisonOp;
use crate::engine::context::ExecutionContext;
use crate::engine::nodeset::NodeSet;
use crate::engine::runtime::Error;
use crate::engine::value::{
    XPathValue, boolean_to_number, number_to_boolean, number_to_string, string_to_number,
};
use crate::model::DocumentTree;

pub(crate) fn compare<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    op: ComparisonOp,
    left: XPathValue<'a>,
    right: XPathValue<'a>,
) -> Result<bool, Error> {
    match (left, right) {
        (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => compare_sets(ctx, op, l, r),
        (XPathValue::NodeSet(set), other) => compare_set_scalar(ctx, op, set, &Scalar::from_value(other)),
        (other, XPathValue::NodeSet(set)) => compare_set_scalar(ctx, op.swapped(), set, &Scalar::from_value(other)),
        (l, r) => Ok(compare_scalars(op, &Scalar::from_value(l), &Scalar::from_value(r))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl Scalar {
    // Only called on non-node-set values.
    fn from_value(value: XPathValue<'_>) -> Self {
        match value {
            XPathValue::Boolean(b) => Scalar::Boolean(b),
            XPathValue::Number(n) => Scalar::Number(n),
            XPathValue::String(s) => Scalar::String(s),
            XPathValue::NodeSet(_) => Scalar::Boolean(false),
        }
    }

    fn boolean(&self) -> bool {
        match self {
            Scalar::Boolean(b) => *b,
            Scalar::Number(n) => number_to_boolean(*n),
            Scalar::String(s) => !s.is_empty(),
        }
    }

    fn number(&self) -> f64 {
        match self {
            Scalar::Boolean(b) => boolean_to_number(*b),
            Scalar::Number(n) => *n,
            Scalar::String(s) => string_to_number(s),
        }
    }

    fn string(&self) -> String {
        match self {
            Scalar::Boolean(b) => b.to_string(),
            Scalar::Number(n) => number_to_string(*n),
            Scalar::String(s) => s.clone(),
        }
    }
}

fn compare_numbers(op: ComparisonOp, a: f64, b: f64) -> bool {
    match op {
        ComparisonOp::Eq => a == b,
        ComparisonOp::Ne => a != b,
        ComparisonOp::Lt => a < b,
        ComparisonOp::Le => a <= b,
        ComparisonOp::Gt => a > b,
        ComparisonOp::Ge => a >= b,
    }
}

fn compare_strings(op: ComparisonOp, a: &str, b: &str) -> bool {
    if op.is_equality() {
        (a == b) == (op == ComparisonOp::Eq)
    } else {
        compare_numbers(op, string_to_number(a), string_to_number(b))
    }
}

fn compare_scalars(op: ComparisonOp, l: &Scalar, r: &Scalar) -> bool {
    if !op.is_equality() {
        return compare_numbers(op, l.number(), r.number());
    }
    let equal = match (l, r) {
        (Scalar::Boolean(_), _) | (_, Scalar::Boolean(_)) => l.boolean() == r.boolean(),
        (Scalar::Number(_), _) | (_, Scalar::Number(_)) => {
            // NaN is unequal to everything, itself included
            return compare_numbers(op, l.number(), r.number());
        }
        _ => l.string() == r.string(),
    };
    equal == (op == ComparisonOp::Eq)
}

// `set op scalar`, with the set on the left.
fn compare_set_scalar<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    op: ComparisonOp,
    mut set: NodeSet<'a>,
    scalar: &Scalar,
) -> Result<bool, Error> {
    let tree = ctx.tree();
    match scalar {
        Scalar::Boolean(b) => {
            let non_empty = set.first_node(ctx)?.is_some();
            Ok(compare_scalars(op, &Scalar::Boolean(non_empty), &Scalar::Boolean(*b)))
        }
        Scalar::Number(n) => {
            while let Some(node) = set.next_node(ctx)? {
                if compare_numbers(op, string_to_number(&tree.string_value(node)), *n) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Scalar::String(s) => {
            while let Some(node) = set.next_node(ctx)? {
                if compare_strings(op, &tree.string_value(node), s) {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

fn compare_sets<'a, T: DocumentTree + ?Sized>(
    ctx: &ExecutionContext<'a, T>,
    op: ComparisonOp,
    mut left: NodeSet<'a>,
    right: NodeSet<'a>,
) -> Result<bool, Error> {
    let tree = ctx.tree();
    let right: Vec<String> = right.materialize(ctx)?.as_slice().iter().map(|n| tree.string_value(*n)).collect();
    if right.is_empty() {
        return Ok(false);
    }
    if op.is_equality() {
        while let Some(node) = left.next_node(ctx)? {
            let value = tree.string_value(node);
            if right.iter().any(|r| compare_strings(op, &value, r)) {
                return Ok(true);
            }
        }
        return Ok(false);
    }
    let right: Vec<f64> = right.iter().map(|s| string_to_number(s)).collect();
    while let Some(node) = left.next_node(ctx)? {
        let value = string_to_number(&tree.string_value(node));
        if right.iter().any(|r| compare_numbers(op, value, *r)) {
            return Ok(true);
        }
    }
    Ok(false)
}
