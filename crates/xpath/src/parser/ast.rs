//! AST for XPath 1.0 expressions as produced by the pest grammar.
//! Lowering into the evaluable form happens in [`crate::compiler`].

pub use crate::model::QName;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    VarRef(QName),
    /// `offset` is the byte position of the function name in the source.
    FunctionCall { name: QName, args: Vec<Expr>, offset: usize },
    Binary { left: Box<Expr>, op: BinaryOp, right: Box<Expr> },
    Negate(Box<Expr>),
    /// `primary[p1][p2]...`
    Filter { primary: Box<Expr>, predicates: Vec<Expr> },
    Path(PathExpr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStart {
    Root,
    Relative,
    /// Path continuing from a filter expression, e.g. `$nodes/child::a`.
    Filter(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    pub start: PathStart,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Child,
    Descendant,
    Attribute,
    SelfAxis,
    DescendantOrSelf,
    FollowingSibling,
    Following,
    Namespace,
    Parent,
    Ancestor,
    PrecedingSibling,
    Preceding,
    AncestorOrSelf,
}

impl Axis {
    pub fn from_name(name: &str) -> Option<Axis> {
        let axis = match name {
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "attribute" => Axis::Attribute,
            "self" => Axis::SelfAxis,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "following" => Axis::Following,
            "namespace" => Axis::Namespace,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "preceding-sibling" => Axis::PrecedingSibling,
            "preceding" => Axis::Preceding,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            _ => return None,
        };
        Some(axis)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    pub fn any_node(axis: Axis) -> Self {
        Self { axis, test: NodeTest::Kind(KindTest::AnyKind), predicates: vec![] }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    Name(NameTest),
    Kind(KindTest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NameTest {
    QName(QName),
    /// `*`
    Any,
    /// `prefix:*`
    NsWildcard(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum KindTest {
    AnyKind,
    Text,
    Comment,
    ProcessingInstruction(Option<String>),
}
