mod comparison;
pub mod context;
pub mod cursors;
pub mod evaluator;
mod functions;
pub mod location;
mod node_test;
pub mod nodeset;
mod predicate;
pub mod runtime;
pub mod value;
