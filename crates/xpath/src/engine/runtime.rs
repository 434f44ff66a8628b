use core::fmt;
use std::collections::HashMap;

use crate::engine::value::XPathResult;
use crate::model::{DocumentTree, NodeHandle, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised while compiling; evaluation never starts.
    Static,
    /// Raised while evaluating; aborts the current call.
    Dynamic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Static => f.write_str("static error"),
            ErrorKind::Dynamic => f.write_str("dynamic error"),
        }
    }
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    XPST0003, // syntax error
    XPST0008, // unbound variable
    XPST0017, // unknown function or wrong number of arguments
    XPST0081, // unbound namespace prefix
    XPTY0004, // type error
    XPDY0002, // context undefined (position()/last() outside a predicate)
    FODC0002, // document could not be loaded
    FOER0000, // generic
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        use ErrorCode::*;
        match self {
            XPST0003 => "err:XPST0003",
            XPST0008 => "err:XPST0008",
            XPST0017 => "err:XPST0017",
            XPST0081 => "err:XPST0081",
            XPTY0004 => "err:XPTY0004",
            XPDY0002 => "err:XPDY0002",
            FODC0002 => "err:FODC0002",
            FOER0000 => "err:FOER0000",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        use ErrorCode::*;
        let code = match s.strip_prefix("err:").unwrap_or(s) {
            "XPST0003" => XPST0003,
            "XPST0008" => XPST0008,
            "XPST0017" => XPST0017,
            "XPST0081" => XPST0081,
            "XPTY0004" => XPTY0004,
            "XPDY0002" => XPDY0002,
            "FODC0002" => FODC0002,
            "FOER0000" => FOER0000,
            _ => return None,
        };
        Some(code)
    }

    /// Static codes (`XPST*`) are compile-time faults, everything else is dynamic.
    pub fn kind(&self) -> ErrorKind {
        if self.as_str().starts_with("err:XPST") { ErrorKind::Static } else { ErrorKind::Dynamic }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message} ({code})")]
pub struct Error {
    pub kind: ErrorKind,
    pub code: ErrorCode,
    pub message: String,
    /// Character offset into the expression for compile-time errors.
    pub offset: Option<usize>,
}

impl Error {
    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self { kind: code.kind(), code, message: msg.into(), offset: None }
    }

    pub fn static_err(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Static, code, message: msg.into(), offset: None }
    }

    pub fn dynamic_err(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Dynamic, code, message: msg.into(), offset: None }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::dynamic_err(ErrorCode::XPTY0004, msg)
    }
}

/// Prefix to namespace URI lookup.
pub trait NamespaceResolver {
    fn resolve(&self, prefix: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct NamespaceBindings {
    pub by_prefix: HashMap<String, String>,
}

impl NamespaceBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.by_prefix.insert(prefix.into(), uri.into());
        self
    }

    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.by_prefix.insert(prefix.into(), uri.into());
    }
}

impl NamespaceResolver for NamespaceBindings {
    fn resolve(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(crate::model::XML_NS.to_string());
        }
        self.by_prefix.get(prefix).cloned()
    }
}

impl NamespaceResolver for HashMap<String, String> {
    fn resolve(&self, prefix: &str) -> Option<String> {
        self.get(prefix).cloned()
    }
}

/// Resolves prefixes from the namespace declarations in scope at a tree node.
pub struct TreeNamespaceResolver<'t, T: DocumentTree + ?Sized> {
    tree: &'t T,
    node: NodeHandle,
}

impl<'t, T: DocumentTree + ?Sized> TreeNamespaceResolver<'t, T> {
    pub fn new(tree: &'t T, node: NodeHandle) -> Self {
        Self { tree, node }
    }
}

impl<T: DocumentTree + ?Sized> NamespaceResolver for TreeNamespaceResolver<'_, T> {
    fn resolve(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(crate::model::XML_NS.to_string());
        }
        let mut cur = Some(self.node);
        while let Some(n) = cur {
            if self.tree.kind(n) == NodeKind::Element {
                let mut ns = self.tree.first_namespace(n);
                while let Some(decl) = ns {
                    if self.tree.local_name(decl) == prefix {
                        let uri = self.tree.string_value(decl);
                        return (!uri.is_empty()).then_some(uri);
                    }
                    ns = self.tree.next_namespace(decl);
                }
            }
            cur = self.tree.parent(n);
        }
        None
    }
}

/// Materialized variable values keyed by expanded name.
#[derive(Debug, Clone, Default)]
pub struct VariableBindings {
    values: HashMap<(Option<String>, String), XPathResult>,
}

impl VariableBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, local: impl Into<String>, value: XPathResult) {
        self.values.insert((None, local.into()), value);
    }

    pub fn set_ns(&mut self, ns_uri: impl Into<String>, local: impl Into<String>, value: XPathResult) {
        self.values.insert((Some(ns_uri.into()), local.into()), value);
    }

    pub fn get(&self, ns_uri: Option<&str>, local: &str) -> Option<&XPathResult> {
        self.values.get(&(ns_uri.map(str::to_string), local.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Receives recoverable diagnostics raised during evaluation.
///
/// Errors are always propagated to the caller through `Result`; the sink only observes them.
pub trait ErrorSink {
    fn warning(&self, _warning: &Error) {}
    fn error(&self, _error: &Error) {}
}

/// Default sink: observes nothing, errors travel through the return value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropagateErrors;

impl ErrorSink for PropagateErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_code() {
        let e = Error::from_code(ErrorCode::XPST0017, "unknown function 'foo'");
        assert_eq!(e.kind, ErrorKind::Static);
        assert_eq!(e.to_string(), "static error: unknown function 'foo' (err:XPST0017)");
    }

    #[test]
    fn codes_round_trip_through_strings() {
        for code in [ErrorCode::XPTY0004, ErrorCode::XPDY0002, ErrorCode::FOER0000] {
            assert_eq!(ErrorCode::from_code(code.as_str()), Some(code));
        }
        assert_eq!(ErrorCode::from_code("err:NOPE"), None);
    }
}
