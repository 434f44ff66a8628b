//! Typed values and the XPath 1.0 coercion rules.
use crate::engine::context::ExecutionContext;
use crate::engine::nodeset::NodeSet;
use crate::engine::runtime::Error;
use crate::model::{DocumentTree, NodeHandle};

/// Result of evaluating an expression. Node-sets may still be streaming.
#[derive(Debug)]
pub enum XPathValue<'a> {
    Boolean(bool),
    Number(f64),
    String(String),
    NodeSet(NodeSet<'a>),
}

impl<'a> XPathValue<'a> {
    pub fn type_name(&self) -> &'static str {
        match self {
            XPathValue::Boolean(_) => "boolean",
            XPathValue::Number(_) => "number",
            XPathValue::String(_) => "string",
            XPathValue::NodeSet(_) => "node-set",
        }
    }

    /// Number: false iff zero or NaN. String: false iff empty. Node-set: false iff empty.
    pub fn into_boolean<T: DocumentTree + ?Sized>(self, ctx: &ExecutionContext<'a, T>) -> Result<bool, Error> {
        Ok(match self {
            XPathValue::Boolean(b) => b,
            XPathValue::Number(n) => number_to_boolean(n),
            XPathValue::String(s) => !s.is_empty(),
            XPathValue::NodeSet(ns) => ns.first_node(ctx)?.is_some(),
        })
    }

    pub fn into_number<T: DocumentTree + ?Sized>(self, ctx: &ExecutionContext<'a, T>) -> Result<f64, Error> {
        Ok(match self {
            XPathValue::Boolean(b) => boolean_to_number(b),
            XPathValue::Number(n) => n,
            XPathValue::String(s) => string_to_number(&s),
            XPathValue::NodeSet(ns) => match ns.first_node(ctx)? {
                Some(n) => string_to_number(&ctx.tree().string_value(n)),
                None => f64::NAN,
            },
        })
    }

    pub fn into_string<T: DocumentTree + ?Sized>(self, ctx: &ExecutionContext<'a, T>) -> Result<String, Error> {
        Ok(match self {
            XPathValue::Boolean(b) => boolean_to_string(b).to_string(),
            XPathValue::Number(n) => number_to_string(n),
            XPathValue::String(s) => s,
            XPathValue::NodeSet(ns) => match ns.first_node(ctx)? {
                Some(n) => ctx.tree().string_value(n),
                None => String::new(),
            },
        })
    }

    /// # Errors
    /// `err:XPTY0004` when the value is not a node-set; there is no conversion to node-sets.
    pub fn into_node_set(self) -> Result<NodeSet<'a>, Error> {
        match self {
            XPathValue::NodeSet(ns) => Ok(ns),
            other => Err(Error::type_error(format!("expected a node-set, found a {}", other.type_name()))),
        }
    }

    /// Drain any streaming node-set into a document-ordered list.
    pub fn materialize<T: DocumentTree + ?Sized>(self, ctx: &ExecutionContext<'a, T>) -> Result<XPathResult, Error> {
        Ok(match self {
            XPathValue::Boolean(b) => XPathResult::Boolean(b),
            XPathValue::Number(n) => XPathResult::Number(n),
            XPathValue::String(s) => XPathResult::String(s),
            XPathValue::NodeSet(ns) => XPathResult::NodeSet(ns.materialize(ctx)?.into_vec()),
        })
    }
}

/// A fully evaluated value, detached from the evaluation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathResult {
    Boolean(bool),
    Number(f64),
    String(String),
    /// Distinct nodes in document order.
    NodeSet(Vec<NodeHandle>),
}

impl XPathResult {
    pub fn type_name(&self) -> &'static str {
        match self {
            XPathResult::Boolean(_) => "boolean",
            XPathResult::Number(_) => "number",
            XPathResult::String(_) => "string",
            XPathResult::NodeSet(_) => "node-set",
        }
    }

    pub fn as_boolean(&self) -> bool {
        match self {
            XPathResult::Boolean(b) => *b,
            XPathResult::Number(n) => number_to_boolean(*n),
            XPathResult::String(s) => !s.is_empty(),
            XPathResult::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    pub fn as_number<T: DocumentTree + ?Sized>(&self, tree: &T) -> f64 {
        match self {
            XPathResult::Boolean(b) => boolean_to_number(*b),
            XPathResult::Number(n) => *n,
            XPathResult::String(s) => string_to_number(s),
            XPathResult::NodeSet(nodes) => nodes.first().map_or(f64::NAN, |n| string_to_number(&tree.string_value(*n))),
        }
    }

    pub fn as_string<T: DocumentTree + ?Sized>(&self, tree: &T) -> String {
        match self {
            XPathResult::Boolean(b) => boolean_to_string(*b).to_string(),
            XPathResult::Number(n) => number_to_string(*n),
            XPathResult::String(s) => s.clone(),
            XPathResult::NodeSet(nodes) => nodes.first().map(|n| tree.string_value(*n)).unwrap_or_default(),
        }
    }

    pub fn nodes(&self) -> Option<&[NodeHandle]> {
        match self {
            XPathResult::NodeSet(nodes) => Some(nodes),
            _ => None,
        }
    }
}

pub fn number_to_boolean(n: f64) -> bool {
    !(n == 0.0 || n.is_nan())
}

pub fn boolean_to_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

pub fn boolean_to_string(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

/// XPath whitespace: space, tab, carriage return, line feed.
pub fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Format a number the way `string()` does.
///
/// `NaN`, `Infinity` and `-Infinity` are literal tokens, both zeros print as `0`,
/// integers carry no fraction and everything else uses the shortest decimal that round
/// trips, never an exponent.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == 0.0 {
        "0".to_string()
    } else {
        // f64's Display is shortest-round-trip and never switches to exponent form
        format!("{n}")
    }
}

/// Parse a string the way `number()` does: optional surrounding whitespace, an optional
/// minus sign, then `Digits ('.' Digits?)?` or `'.' Digits`. Anything else is NaN.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(is_xml_whitespace);
    let body = t.strip_prefix('-').unwrap_or(t);
    let (int, frac) = match body.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (body, None),
    };
    let digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let valid = digits(int)
        && frac.is_none_or(digits)
        && (!int.is_empty() || frac.is_some_and(|f| !f.is_empty()));
    if !valid {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_special_values() {
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.0), "0");
    }

    #[test]
    fn formats_without_exponent() {
        assert_eq!(number_to_string(1.0), "1");
        assert_eq!(number_to_string(-42.0), "-42");
        assert_eq!(number_to_string(0.5), "0.5");
        assert_eq!(number_to_string(1e21), "1000000000000000000000");
        assert_eq!(number_to_string(1e-7), "0.0000001");
        assert_eq!(number_to_string(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn parses_only_xpath_number_syntax() {
        assert_eq!(string_to_number(" 12 "), 12.0);
        assert_eq!(string_to_number("\n-3.5\t"), -3.5);
        assert_eq!(string_to_number(".5"), 0.5);
        assert_eq!(string_to_number("7."), 7.0);
        for bad in ["", " ", "-", ".", "+1", "1e3", "0x10", "1 2", "Infinity", "NaN", "--1"] {
            assert!(string_to_number(bad).is_nan(), "{bad:?} should be NaN");
        }
    }
}
