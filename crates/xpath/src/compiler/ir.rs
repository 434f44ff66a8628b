//! Immutable compiled expression tree.
//!
//! Everything here is plain data and `Send + Sync`; per-evaluation state (axis cursors,
//! proximity caches, node buffers) lives in the engine and is created fresh for every
//! evaluation, so one [`CompiledXPath`] can be shared across threads.
use core::fmt;

use crate::model::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
    Namespace,
    SelfAxis,
    /// Synthetic first step of absolute paths: yields the root of the context node.
    Root,
    /// Synthetic first step of filter-expression paths: yields the nodes of the evaluated
    /// filter expression in document order.
    FilteredList,
}

impl Axis {
    /// Reverse axes enumerate in reverse document order; proximity positions count from
    /// the context node outwards.
    pub fn is_reverse(self) -> bool {
        matches!(self, Axis::Ancestor | Axis::AncestorOrSelf | Axis::Preceding | Axis::PrecedingSibling)
    }

    pub fn principal_kind(self) -> NodeKind {
        match self {
            Axis::Attribute => NodeKind::Attribute,
            Axis::Namespace => NodeKind::Namespace,
            _ => NodeKind::Element,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Following => "following",
            Axis::Preceding => "preceding",
            Axis::Attribute => "attribute",
            Axis::Namespace => "namespace",
            Axis::SelfAxis => "self",
            Axis::Root => "root",
            Axis::FilteredList => "filtered-list",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Namespace part of a name test or variable name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamespaceMatch {
    /// Unprefixed: the null namespace.
    NoNamespace,
    Uri(String),
    /// Prefix not bound at compile time; resolved through the execution context.
    Deferred(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeTest {
    /// `node()`
    AnyNode,
    /// `text()`
    Text,
    /// `comment()`
    Comment,
    /// `processing-instruction('target'?)`
    ProcessingInstruction(Option<String>),
    /// `*`: any node of the axis' principal kind
    Principal,
    /// `prefix:*`
    NamespaceWildcard(NamespaceMatch),
    Name { ns: NamespaceMatch, local: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    /// Operator to use when the operands trade places (`a < b` is `b > a`).
    pub fn swapped(self) -> Self {
        match self {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Le => ComparisonOp::Ge,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Ge => ComparisonOp::Le,
            other => other,
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, ComparisonOp::Eq | ComparisonOp::Ne)
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// The XPath 1.0 core function library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Last,
    Position,
    Count,
    Id,
    LocalName,
    NamespaceUri,
    Name,
    String,
    Concat,
    StartsWith,
    Contains,
    SubstringBefore,
    SubstringAfter,
    Substring,
    StringLength,
    NormalizeSpace,
    Translate,
    Boolean,
    Not,
    True,
    False,
    Lang,
    Number,
    Sum,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    pub const ALL: [Function; 27] = [
        Function::Last,
        Function::Position,
        Function::Count,
        Function::Id,
        Function::LocalName,
        Function::NamespaceUri,
        Function::Name,
        Function::String,
        Function::Concat,
        Function::StartsWith,
        Function::Contains,
        Function::SubstringBefore,
        Function::SubstringAfter,
        Function::Substring,
        Function::StringLength,
        Function::NormalizeSpace,
        Function::Translate,
        Function::Boolean,
        Function::Not,
        Function::True,
        Function::False,
        Function::Lang,
        Function::Number,
        Function::Sum,
        Function::Floor,
        Function::Ceiling,
        Function::Round,
    ];

    pub fn from_name(name: &str) -> Option<Function> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Last => "last",
            Function::Position => "position",
            Function::Count => "count",
            Function::Id => "id",
            Function::LocalName => "local-name",
            Function::NamespaceUri => "namespace-uri",
            Function::Name => "name",
            Function::String => "string",
            Function::Concat => "concat",
            Function::StartsWith => "starts-with",
            Function::Contains => "contains",
            Function::SubstringBefore => "substring-before",
            Function::SubstringAfter => "substring-after",
            Function::Substring => "substring",
            Function::StringLength => "string-length",
            Function::NormalizeSpace => "normalize-space",
            Function::Translate => "translate",
            Function::Boolean => "boolean",
            Function::Not => "not",
            Function::True => "true",
            Function::False => "false",
            Function::Lang => "lang",
            Function::Number => "number",
            Function::Sum => "sum",
            Function::Floor => "floor",
            Function::Ceiling => "ceiling",
            Function::Round => "round",
        }
    }

    /// Accepted argument count as `(min, max)`; `None` means unbounded.
    pub fn arity(self) -> (usize, Option<usize>) {
        match self {
            Function::Last | Function::Position | Function::True | Function::False => (0, Some(0)),
            Function::Count
            | Function::Id
            | Function::Boolean
            | Function::Not
            | Function::Lang
            | Function::Sum
            | Function::Floor
            | Function::Ceiling
            | Function::Round => (1, Some(1)),
            Function::LocalName
            | Function::NamespaceUri
            | Function::Name
            | Function::String
            | Function::StringLength
            | Function::NormalizeSpace
            | Function::Number => (0, Some(1)),
            Function::StartsWith
            | Function::Contains
            | Function::SubstringBefore
            | Function::SubstringAfter => (2, Some(2)),
            Function::Substring => (2, Some(3)),
            Function::Translate => (3, Some(3)),
            Function::Concat => (2, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    String(String),
    Variable { ns: NamespaceMatch, local: String },
    Function { func: Function, args: Vec<Expr> },
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare { op: ComparisonOp, left: Box<Expr>, right: Box<Expr> },
    Arith { op: ArithOp, left: Box<Expr>, right: Box<Expr> },
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(LocationPath),
}

/// How the nested enumeration of a location path relates to document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathOrder {
    /// Already yields distinct nodes in document order.
    Document,
    /// A single reverse step from the context node: distinct nodes in reverse document order.
    Reverse,
    /// Must be sorted and de-duplicated.
    Unordered,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
    /// Source expression of a [`Axis::FilteredList`] step.
    pub filter: Option<Box<Expr>>,
}

impl Step {
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        Self { axis, test, predicates: Vec::new(), filter: None }
    }
}

/// Steps run root-to-leaf; the first step starts at the context node.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    pub steps: Vec<Step>,
    pub order: PathOrder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledXPath {
    pub root: Expr,
    pub source: String,
}
