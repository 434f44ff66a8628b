use crate::engine::runtime::{Error, ErrorCode, NamespaceResolver};
use crate::parser::{ast, parse_xpath};

pub mod ir;

pub use ir::CompiledXPath;

/// Compile an expression; prefixed names are resolved later through the execution
/// context's namespace resolvers.
///
/// # Errors
/// `err:XPST0003` for syntax errors and `err:XPST0017` for unknown functions or wrong
/// argument counts, both carrying the character offset of the offending token.
pub fn compile(expr: &str) -> Result<CompiledXPath, Error> {
    compile_inner(expr, None)
}

/// Compile with prefixes bound at compile time where `resolver` knows them.
pub fn compile_with_resolver(expr: &str, resolver: &dyn NamespaceResolver) -> Result<CompiledXPath, Error> {
    compile_inner(expr, Some(resolver))
}

fn compile_inner(expr: &str, resolver: Option<&dyn NamespaceResolver>) -> Result<CompiledXPath, Error> {
    let ast = parse_xpath(expr)?;
    let c = Compiler { resolver, source: expr };
    let root = c.lower_expr(&ast)?;
    tracing::debug!(source = expr, "compiled xpath expression");
    Ok(CompiledXPath { root, source: expr.to_string() })
}

struct Compiler<'a> {
    resolver: Option<&'a dyn NamespaceResolver>,
    source: &'a str,
}

type CResult<T> = Result<T, Error>;

impl Compiler<'_> {
    fn lower_expr(&self, e: &ast::Expr) -> CResult<ir::Expr> {
        use ast::Expr as E;
        match e {
            E::Literal(ast::Literal::Number(n)) => Ok(ir::Expr::Number(*n)),
            E::Literal(ast::Literal::String(s)) => Ok(ir::Expr::String(s.clone())),
            E::VarRef(q) => Ok(ir::Expr::Variable {
                ns: self.namespace_match(q.prefix.as_deref()),
                local: q.local.clone(),
            }),
            E::FunctionCall { name, args, offset } => self.lower_function(name, args, *offset),
            E::Binary { left, op, right } => {
                let l = Box::new(self.lower_expr(left)?);
                let r = Box::new(self.lower_expr(right)?);
                Ok(Self::lower_binary(*op, l, r))
            }
            E::Negate(inner) => Ok(ir::Expr::Negate(Box::new(self.lower_expr(inner)?))),
            E::Filter { primary, predicates } => {
                let step = self.filter_step(primary, predicates)?;
                Ok(ir::Expr::Path(ir::LocationPath { steps: vec![step], order: ir::PathOrder::Document }))
            }
            E::Path(p) => self.lower_path(p).map(ir::Expr::Path),
        }
    }

    fn lower_binary(op: ast::BinaryOp, left: Box<ir::Expr>, right: Box<ir::Expr>) -> ir::Expr {
        use ast::BinaryOp as B;
        use ir::{ArithOp, ComparisonOp};
        match op {
            B::Or => ir::Expr::Or(left, right),
            B::And => ir::Expr::And(left, right),
            B::Union => ir::Expr::Union(left, right),
            B::Eq | B::Ne | B::Lt | B::Le | B::Gt | B::Ge => {
                let op = match op {
                    B::Eq => ComparisonOp::Eq,
                    B::Ne => ComparisonOp::Ne,
                    B::Lt => ComparisonOp::Lt,
                    B::Le => ComparisonOp::Le,
                    B::Gt => ComparisonOp::Gt,
                    _ => ComparisonOp::Ge,
                };
                ir::Expr::Compare { op, left, right }
            }
            B::Add | B::Sub | B::Mul | B::Div | B::Mod => {
                let op = match op {
                    B::Add => ArithOp::Add,
                    B::Sub => ArithOp::Sub,
                    B::Mul => ArithOp::Mul,
                    B::Div => ArithOp::Div,
                    _ => ArithOp::Mod,
                };
                ir::Expr::Arith { op, left, right }
            }
        }
    }

    fn char_offset(&self, byte: usize) -> usize {
        self.source.get(..byte).map_or(byte, |s| s.chars().count())
    }

    fn lower_function(&self, name: &ast::QName, args: &[ast::Expr], offset: usize) -> CResult<ir::Expr> {
        let at = self.char_offset(offset);
        let lexical = match &name.prefix {
            Some(p) => format!("{p}:{}", name.local),
            None => name.local.clone(),
        };
        let func = name
            .prefix
            .is_none()
            .then(|| ir::Function::from_name(&name.local))
            .flatten()
            .ok_or_else(|| Error::static_err(ErrorCode::XPST0017, format!("unknown function '{lexical}'")).with_offset(at))?;
        let (min, max) = func.arity();
        if args.len() < min || max.is_some_and(|m| args.len() > m) {
            let expected = match max {
                Some(m) if m == min => format!("{min}"),
                Some(m) => format!("{min} to {m}"),
                None => format!("at least {min}"),
            };
            return Err(Error::static_err(
                ErrorCode::XPST0017,
                format!("{lexical}() expects {expected} argument(s), got {}", args.len()),
            )
            .with_offset(at));
        }
        let args = args.iter().map(|a| self.lower_expr(a)).collect::<CResult<Vec<_>>>()?;
        Ok(ir::Expr::Function { func, args })
    }

    fn namespace_match(&self, prefix: Option<&str>) -> ir::NamespaceMatch {
        match prefix {
            None => ir::NamespaceMatch::NoNamespace,
            Some(p) => match self.resolver.and_then(|r| r.resolve(p)) {
                Some(uri) => ir::NamespaceMatch::Uri(uri),
                None => ir::NamespaceMatch::Deferred(p.to_string()),
            },
        }
    }

    fn filter_step(&self, primary: &ast::Expr, predicates: &[ast::Expr]) -> CResult<ir::Step> {
        let mut step = ir::Step::new(ir::Axis::FilteredList, ir::NodeTest::AnyNode);
        step.filter = Some(Box::new(self.lower_expr(primary)?));
        step.predicates = predicates.iter().map(|p| self.lower_expr(p)).collect::<CResult<Vec<_>>>()?;
        Ok(step)
    }

    fn lower_path(&self, p: &ast::PathExpr) -> CResult<ir::LocationPath> {
        let mut steps = Vec::with_capacity(p.steps.len() + 1);
        match &p.start {
            ast::PathStart::Root => steps.push(ir::Step::new(ir::Axis::Root, ir::NodeTest::AnyNode)),
            ast::PathStart::Relative => {}
            ast::PathStart::Filter(e) => match e.as_ref() {
                ast::Expr::Filter { primary, predicates } => steps.push(self.filter_step(primary, predicates)?),
                other => steps.push(self.filter_step(other, &[])?),
            },
        }
        for s in &p.steps {
            steps.push(ir::Step {
                axis: Self::map_axis(s.axis),
                test: self.map_node_test(&s.test),
                predicates: s.predicates.iter().map(|e| self.lower_expr(e)).collect::<CResult<Vec<_>>>()?,
                filter: None,
            });
        }
        let steps = Self::collapse_descendant_steps(steps);
        let order = analyze_order(&steps);
        Ok(ir::LocationPath { steps, order })
    }

    /// `descendant-or-self::node()/child::T` selects the same nodes as `descendant::T` as long
    /// as neither step filters by position.
    fn collapse_descendant_steps(steps: Vec<ir::Step>) -> Vec<ir::Step> {
        let mut out: Vec<ir::Step> = Vec::with_capacity(steps.len());
        for step in steps {
            let collapsible = step.axis == ir::Axis::Child
                && step.predicates.is_empty()
                && out.last().is_some_and(|prev| {
                    prev.axis == ir::Axis::DescendantOrSelf
                        && prev.test == ir::NodeTest::AnyNode
                        && prev.predicates.is_empty()
                });
            if collapsible {
                out.pop();
                out.push(ir::Step { axis: ir::Axis::Descendant, ..step });
            } else {
                out.push(step);
            }
        }
        out
    }

    fn map_axis(a: ast::Axis) -> ir::Axis {
        use ast::Axis as A;
        match a {
            A::Child => ir::Axis::Child,
            A::Descendant => ir::Axis::Descendant,
            A::Attribute => ir::Axis::Attribute,
            A::SelfAxis => ir::Axis::SelfAxis,
            A::DescendantOrSelf => ir::Axis::DescendantOrSelf,
            A::FollowingSibling => ir::Axis::FollowingSibling,
            A::Following => ir::Axis::Following,
            A::Namespace => ir::Axis::Namespace,
            A::Parent => ir::Axis::Parent,
            A::Ancestor => ir::Axis::Ancestor,
            A::PrecedingSibling => ir::Axis::PrecedingSibling,
            A::Preceding => ir::Axis::Preceding,
            A::AncestorOrSelf => ir::Axis::AncestorOrSelf,
        }
    }

    fn map_node_test(&self, t: &ast::NodeTest) -> ir::NodeTest {
        match t {
            ast::NodeTest::Name(ast::NameTest::Any) => ir::NodeTest::Principal,
            ast::NodeTest::Name(ast::NameTest::NsWildcard(prefix)) => {
                ir::NodeTest::NamespaceWildcard(self.namespace_match(Some(prefix)))
            }
            ast::NodeTest::Name(ast::NameTest::QName(q)) => ir::NodeTest::Name {
                ns: self.namespace_match(q.prefix.as_deref()),
                local: q.local.clone(),
            },
            ast::NodeTest::Kind(ast::KindTest::AnyKind) => ir::NodeTest::AnyNode,
            ast::NodeTest::Kind(ast::KindTest::Text) => ir::NodeTest::Text,
            ast::NodeTest::Kind(ast::KindTest::Comment) => ir::NodeTest::Comment,
            ast::NodeTest::Kind(ast::KindTest::ProcessingInstruction(target)) => {
                ir::NodeTest::ProcessingInstruction(target.clone())
            }
        }
    }
}

/// Shape of the node sequence produced after each step of a nested enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    /// At most one node.
    Single,
    /// Distinct, in document order, no node an ancestor of another.
    Flat,
    /// Distinct and in document order.
    Nested,
    Unordered,
}

fn next_shape(shape: Shape, axis: ir::Axis) -> Shape {
    use Shape::*;
    use ir::Axis as A;
    match (axis, shape) {
        (_, Unordered) => Unordered,
        (A::SelfAxis, s) => s,
        (A::Root | A::Parent, Single) => Single,
        (A::Child | A::Attribute, Single | Flat) => Flat,
        (A::Namespace | A::FollowingSibling, Single) => Flat,
        (A::Descendant | A::DescendantOrSelf, Single | Flat) => Nested,
        (A::Following | A::FilteredList, Single) => Nested,
        _ => Unordered,
    }
}

/// Decide whether the nested enumeration of `steps` needs a sort pass.
pub(crate) fn analyze_order(steps: &[ir::Step]) -> ir::PathOrder {
    if let [only] = steps {
        if only.axis.is_reverse() {
            return ir::PathOrder::Reverse;
        }
    }
    let shape = steps.iter().fold(Shape::Single, |shape, s| next_shape(shape, s.axis));
    if shape == Shape::Unordered { ir::PathOrder::Unordered } else { ir::PathOrder::Document }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::runtime::NamespaceBindings;
    use ir::{Axis, Expr, PathOrder};

    fn path(src: &str) -> ir::LocationPath {
        match compile(src).unwrap().root {
            Expr::Path(p) => p,
            other => panic!("expected path, got {other:?}"),
        }
    }

    #[test]
    fn double_slash_child_collapses_to_descendant() {
        let p = path("//x");
        let axes: Vec<_> = p.steps.iter().map(|s| s.axis).collect();
        assert_eq!(axes, vec![Axis::Root, Axis::Descendant]);
        assert_eq!(p.order, PathOrder::Document);
    }

    #[test]
    fn positional_predicate_blocks_collapse() {
        let p = path("//x[1]");
        let axes: Vec<_> = p.steps.iter().map(|s| s.axis).collect();
        assert_eq!(axes, vec![Axis::Root, Axis::DescendantOrSelf, Axis::Child]);
        assert_eq!(p.order, PathOrder::Unordered);
    }

    #[test]
    fn order_analysis() {
        assert_eq!(path("a/b/c").order, PathOrder::Document);
        assert_eq!(path("preceding-sibling::a").order, PathOrder::Reverse);
        assert_eq!(path("a/preceding-sibling::b").order, PathOrder::Unordered);
        assert_eq!(path("../a").order, PathOrder::Document);
        assert_eq!(path("a/..").order, PathOrder::Unordered);
        assert_eq!(path("//a//b").order, PathOrder::Unordered);
        assert_eq!(path("$v/a").order, PathOrder::Unordered);
    }

    #[test]
    fn filter_expression_becomes_filtered_list_step() {
        let p = path("(//a)[2]");
        assert_eq!(p.steps.len(), 1);
        assert_eq!(p.steps[0].axis, Axis::FilteredList);
        assert!(p.steps[0].filter.is_some());
        assert_eq!(p.steps[0].predicates.len(), 1);
    }

    #[test]
    fn resolves_prefixes_at_compile_time_when_bound() {
        let ns = NamespaceBindings::new().with("p", "urn:p");
        let c = compile_with_resolver("p:a/q:b", &ns).unwrap();
        let Expr::Path(p) = c.root else { panic!() };
        assert_eq!(
            p.steps[0].test,
            ir::NodeTest::Name { ns: ir::NamespaceMatch::Uri("urn:p".into()), local: "a".into() }
        );
        assert_eq!(
            p.steps[1].test,
            ir::NodeTest::Name { ns: ir::NamespaceMatch::Deferred("q".into()), local: "b".into() }
        );
    }

    #[test]
    fn unknown_function_and_arity_errors_carry_offsets() {
        let e = compile("1 + frob(2)").unwrap_err();
        assert_eq!(e.code, ErrorCode::XPST0017);
        assert_eq!(e.offset, Some(4));
        let e = compile("count()").unwrap_err();
        assert_eq!(e.code, ErrorCode::XPST0017);
        assert_eq!(e.offset, Some(0));
    }
}
