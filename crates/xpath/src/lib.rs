//! Streaming XPath 1.0 evaluation over immutable document trees.
//!
//! Expressions are compiled once into an immutable [`CompiledXPath`] and evaluated against
//! any [`DocumentTree`] implementation. Location paths stream node handles through chains
//! of axis cursors; node-sets are only materialized when a result needs the whole set.
pub mod compiler;
pub mod engine;
pub mod model;
pub mod parser;
pub mod simple_tree;

pub use compiler::{CompiledXPath, compile, compile_with_resolver};
pub use engine::context::{ExecutionContext, ResolverScope, StackDepths};
pub use engine::cursors::AxisCursor;
pub use engine::evaluator::evaluate;
pub use engine::location::LocationPathIterator;
pub use engine::nodeset::{NodeSequence, NodeSet, NodeVector};
pub use engine::runtime::{
    Error, ErrorCode, ErrorKind, ErrorSink, NamespaceBindings, NamespaceResolver, PropagateErrors,
    TreeNamespaceResolver, VariableBindings,
};
pub use engine::value::{XPathResult, XPathValue};
pub use model::{DocumentTree, NodeHandle, NodeKind, QName, XML_NS};
pub use parser::parse_xpath;
pub use simple_tree::SimpleTree;
