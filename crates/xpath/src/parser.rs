use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;

use crate::engine::runtime::{Error, ErrorCode};

pub mod ast;

#[derive(pest_derive::Parser)]
#[grammar = "xpath1.pest"]
pub struct XPathParser;

/// Parse an XPath 1.0 expression into its AST.
///
/// # Errors
/// Returns `err:XPST0003` with the character offset of the failure.
pub fn parse_xpath(input: &str) -> Result<ast::Expr, Error> {
    XPathParser::parse_to_ast(input)
}

type BuildResult<T> = Result<T, Error>;

fn syntax_error_at(byte_offset: usize, msg: impl Into<String>) -> Error {
    Error::static_err(ErrorCode::XPST0003, msg).with_offset(byte_offset)
}

fn unexpected(pair: &Pair<Rule>) -> Error {
    syntax_error_at(pair.as_span().start(), format!("unexpected '{}'", pair.as_str()))
}

fn next_inner<'i>(it: &mut pest::iterators::Pairs<'i, Rule>, parent: &Pair<'i, Rule>) -> BuildResult<Pair<'i, Rule>> {
    it.next().ok_or_else(|| syntax_error_at(parent.as_span().end(), "incomplete expression"))
}

impl XPathParser {
    /// Build the AST for the XPath input.
    pub fn parse_to_ast(input: &str) -> Result<ast::Expr, Error> {
        let result = Self::parse(Rule::xpath, input)
            .map_err(|e| {
                let at = match e.location {
                    InputLocation::Pos(p) => p,
                    InputLocation::Span((s, _)) => s,
                };
                syntax_error_at(at, format!("syntax error: {}", e.variant.message()))
            })
            .and_then(|mut pairs| {
                let root = pairs.next().ok_or_else(|| syntax_error_at(0, "empty expression"))?;
                debug_assert_eq!(root.as_rule(), Rule::xpath);
                let mut inner = root.clone().into_inner();
                let expr = next_inner(&mut inner, &root)?;
                Self::build_expr(&expr)
            });
        // offsets are reported in characters, pest works in bytes
        result.map_err(|mut e| {
            if let Some(byte) = e.offset {
                let byte = byte.min(input.len());
                e.offset = Some(input.get(..byte).map_or(byte, |s| s.chars().count()));
            }
            e
        })
    }

    fn build_expr(pair: &Pair<Rule>) -> BuildResult<ast::Expr> {
        match pair.as_rule() {
            Rule::expr | Rule::path_expr | Rule::primary_expr | Rule::paren_expr => {
                let mut inner = pair.clone().into_inner();
                Self::build_expr(&next_inner(&mut inner, pair)?)
            }
            Rule::or_expr
            | Rule::and_expr
            | Rule::equality_expr
            | Rule::relational_expr
            | Rule::additive_expr
            | Rule::multiplicative_expr
            | Rule::union_expr => Self::fold_chain(pair),
            Rule::unary_expr => {
                let mut negations = 0usize;
                let mut operand = None;
                for p in pair.clone().into_inner() {
                    match p.as_rule() {
                        Rule::OP_MINUS => negations += 1,
                        _ => operand = Some(Self::build_expr(&p)?),
                    }
                }
                let mut expr = operand.ok_or_else(|| unexpected(pair))?;
                for _ in 0..negations {
                    expr = ast::Expr::Negate(Box::new(expr));
                }
                Ok(expr)
            }
            Rule::filter_path => Self::build_filter_path(pair),
            Rule::filter_expr => Self::build_filter_expr(pair),
            Rule::location_path => {
                let mut inner = pair.clone().into_inner();
                let first = next_inner(&mut inner, pair)?;
                match first.as_rule() {
                    Rule::absolute_location_path => Self::build_absolute_path(&first),
                    _ => Ok(ast::Expr::Path(ast::PathExpr {
                        start: ast::PathStart::Relative,
                        steps: Self::collect_steps(&first)?,
                    })),
                }
            }
            Rule::literal => {
                let content = pair.clone().into_inner().next().map_or("", |p| p.as_str());
                Ok(ast::Expr::Literal(ast::Literal::String(content.to_string())))
            }
            Rule::number => {
                let v = pair.as_str().parse::<f64>().map_err(|_| unexpected(pair))?;
                Ok(ast::Expr::Literal(ast::Literal::Number(v)))
            }
            Rule::var_ref => {
                let mut inner = pair.clone().into_inner();
                let name = next_inner(&mut inner, pair)?;
                Ok(ast::Expr::VarRef(ast::QName::parse_lexical(name.as_str())))
            }
            Rule::function_call => {
                let mut inner = pair.clone().into_inner();
                let name = next_inner(&mut inner, pair)?;
                let args = inner.map(|a| Self::build_expr(&a)).collect::<BuildResult<Vec<_>>>()?;
                Ok(ast::Expr::FunctionCall {
                    name: ast::QName::parse_lexical(name.as_str()),
                    args,
                    offset: name.as_span().start(),
                })
            }
            _ => Err(unexpected(pair)),
        }
    }

    fn binary_op(token: Rule) -> Option<ast::BinaryOp> {
        use ast::BinaryOp as B;
        Some(match token {
            Rule::K_OR => B::Or,
            Rule::K_AND => B::And,
            Rule::OP_EQ => B::Eq,
            Rule::OP_NE => B::Ne,
            Rule::OP_LT => B::Lt,
            Rule::OP_LTE => B::Le,
            Rule::OP_GT => B::Gt,
            Rule::OP_GTE => B::Ge,
            Rule::OP_PLUS => B::Add,
            Rule::OP_MINUS => B::Sub,
            Rule::OP_STAR => B::Mul,
            Rule::K_DIV => B::Div,
            Rule::K_MOD => B::Mod,
            Rule::OP_PIPE => B::Union,
            _ => return None,
        })
    }

    // operand (op operand)* folded to the left
    fn fold_chain(pair: &Pair<Rule>) -> BuildResult<ast::Expr> {
        let mut inner = pair.clone().into_inner();
        let mut expr = Self::build_expr(&next_inner(&mut inner, pair)?)?;
        while let Some(op_pair) = inner.next() {
            let op = Self::binary_op(op_pair.as_rule()).ok_or_else(|| unexpected(&op_pair))?;
            let right = Self::build_expr(&next_inner(&mut inner, &op_pair)?)?;
            expr = ast::Expr::Binary { left: Box::new(expr), op, right: Box::new(right) };
        }
        Ok(expr)
    }

    fn build_filter_expr(pair: &Pair<Rule>) -> BuildResult<ast::Expr> {
        let mut inner = pair.clone().into_inner();
        let primary = Self::build_expr(&next_inner(&mut inner, pair)?)?;
        let predicates = inner.map(|p| Self::build_predicate(&p)).collect::<BuildResult<Vec<_>>>()?;
        if predicates.is_empty() {
            Ok(primary)
        } else {
            Ok(ast::Expr::Filter { primary: Box::new(primary), predicates })
        }
    }

    fn build_filter_path(pair: &Pair<Rule>) -> BuildResult<ast::Expr> {
        let mut inner = pair.clone().into_inner();
        let filter = Self::build_filter_expr(&next_inner(&mut inner, pair)?)?;
        let Some(sep) = inner.next() else {
            return Ok(filter);
        };
        let mut steps = Vec::new();
        if sep.as_rule() == Rule::OP_DSLASH {
            steps.push(ast::Step::any_node(ast::Axis::DescendantOrSelf));
        }
        steps.extend(Self::collect_steps(&next_inner(&mut inner, &sep)?)?);
        Ok(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Filter(Box::new(filter)), steps }))
    }

    fn build_absolute_path(pair: &Pair<Rule>) -> BuildResult<ast::Expr> {
        let mut inner = pair.clone().into_inner();
        let first = next_inner(&mut inner, pair)?;
        let mut steps = Vec::new();
        if first.as_rule() == Rule::OP_DSLASH {
            steps.push(ast::Step::any_node(ast::Axis::DescendantOrSelf));
        }
        if let Some(rel) = inner.next() {
            steps.extend(Self::collect_steps(&rel)?);
        }
        Ok(ast::Expr::Path(ast::PathExpr { start: ast::PathStart::Root, steps }))
    }

    fn collect_steps(pair: &Pair<Rule>) -> BuildResult<Vec<ast::Step>> {
        debug_assert_eq!(pair.as_rule(), Rule::relative_location_path);
        let mut out = Vec::new();
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::step => out.push(Self::build_step(&p)?),
                Rule::OP_DSLASH => out.push(ast::Step::any_node(ast::Axis::DescendantOrSelf)),
                Rule::OP_SLASH => {}
                _ => return Err(unexpected(&p)),
            }
        }
        Ok(out)
    }

    fn build_step(pair: &Pair<Rule>) -> BuildResult<ast::Step> {
        let mut axis = ast::Axis::Child;
        let mut test = None;
        let mut predicates = Vec::new();
        for p in pair.clone().into_inner() {
            match p.as_rule() {
                Rule::abbreviated_step => {
                    let dots = p.as_str().trim();
                    let axis = if dots == ".." { ast::Axis::Parent } else { ast::Axis::SelfAxis };
                    return Ok(ast::Step::any_node(axis));
                }
                Rule::axis_specifier => {
                    let mut inner = p.clone().into_inner();
                    let spec = next_inner(&mut inner, &p)?;
                    axis = match spec.as_rule() {
                        Rule::OP_AT => ast::Axis::Attribute,
                        _ => ast::Axis::from_name(spec.as_str()).ok_or_else(|| unexpected(&spec))?,
                    };
                }
                Rule::node_test => test = Some(Self::build_node_test(&p)?),
                Rule::predicate => predicates.push(Self::build_predicate(&p)?),
                _ => return Err(unexpected(&p)),
            }
        }
        let test = test.ok_or_else(|| unexpected(pair))?;
        Ok(ast::Step { axis, test, predicates })
    }

    fn build_predicate(pair: &Pair<Rule>) -> BuildResult<ast::Expr> {
        debug_assert_eq!(pair.as_rule(), Rule::predicate);
        let mut inner = pair.clone().into_inner();
        Self::build_expr(&next_inner(&mut inner, pair)?)
    }

    fn build_node_test(pair: &Pair<Rule>) -> BuildResult<ast::NodeTest> {
        let mut inner = pair.clone().into_inner();
        let test = next_inner(&mut inner, pair)?;
        match test.as_rule() {
            Rule::name_test => {
                let s = test.as_str();
                let name = if s == "*" {
                    ast::NameTest::Any
                } else if let Some(prefix) = s.strip_suffix(":*") {
                    ast::NameTest::NsWildcard(prefix.to_string())
                } else {
                    ast::NameTest::QName(ast::QName::parse_lexical(s))
                };
                Ok(ast::NodeTest::Name(name))
            }
            Rule::kind_test => {
                let mut kind_inner = test.clone().into_inner();
                let kind = next_inner(&mut kind_inner, &test)?;
                let k = match kind.as_rule() {
                    Rule::pi_test => {
                        let target = kind
                            .clone()
                            .into_inner()
                            .find(|p| p.as_rule() == Rule::literal)
                            .and_then(|lit| lit.into_inner().next())
                            .map(|p| p.as_str().to_string());
                        ast::KindTest::ProcessingInstruction(target)
                    }
                    Rule::node_type => match kind.as_str() {
                        "comment" => ast::KindTest::Comment,
                        "text" => ast::KindTest::Text,
                        _ => ast::KindTest::AnyKind,
                    },
                    _ => return Err(unexpected(&kind)),
                };
                Ok(ast::NodeTest::Kind(k))
            }
            _ => Err(unexpected(&test)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ast::*;
    use super::*;

    fn steps(input: &str) -> Vec<Step> {
        match parse_xpath(input).unwrap() {
            Expr::Path(p) => p.steps,
            other => panic!("expected path, got {other:?}"),
        }
    }

    #[test]
    fn abbreviations_expand_to_axes() {
        let s = steps(".//@id/..");
        let axes: Vec<_> = s.iter().map(|s| s.axis).collect();
        assert_eq!(
            axes,
            vec![Axis::SelfAxis, Axis::DescendantOrSelf, Axis::Attribute, Axis::Parent]
        );
    }

    #[test]
    fn star_is_multiplication_after_an_operand() {
        let e = parse_xpath("2 * *").unwrap();
        let Expr::Binary { op, right, .. } = e else { panic!("expected binary") };
        assert_eq!(op, BinaryOp::Mul);
        assert!(matches!(*right, Expr::Path(_)));
    }

    #[test]
    fn keyword_prefix_names_stay_names() {
        let s = steps("order/divider");
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].test, NodeTest::Name(NameTest::QName(QName::local("order"))));
    }

    #[test]
    fn node_type_tests_are_not_function_calls() {
        let s = steps("child::text()");
        assert_eq!(s[0].test, NodeTest::Kind(KindTest::Text));
        let s = steps("processing-instruction('xml-stylesheet')");
        assert_eq!(
            s[0].test,
            NodeTest::Kind(KindTest::ProcessingInstruction(Some("xml-stylesheet".into())))
        );
    }

    #[test]
    fn reports_character_offset() {
        let err = parse_xpath("ä[").unwrap_err();
        assert_eq!(err.code, ErrorCode::XPST0003);
        assert_eq!(err.offset, Some(2));
    }
}
