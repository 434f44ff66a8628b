//! Proximity positions, `last()` and predicate filtering.

use std::cell::RefCell;

use arbor_xpath::{
    DocumentTree, Error, ErrorCode, ErrorSink, ExecutionContext, NodeHandle, SimpleTree, StackDepths, compile, evaluate,
};
use rstest::rstest;

fn texts(tree: &SimpleTree, xpath: &str) -> Vec<String> {
    let compiled = compile(xpath).unwrap();
    let result = evaluate(&compiled, tree, tree.document(), None).unwrap();
    result.nodes().expect("node-set").iter().map(|n| tree.string_value(*n)).collect()
}

fn four_p() -> SimpleTree {
    SimpleTree::parse("<r><p>1</p><p k='y'>2</p><p k='y'>3</p><p>4</p></r>").unwrap()
}

#[test]
fn last_is_scoped_per_axis_invocation() {
    let tree = SimpleTree::parse("<root><a><x>2</x></a><b><x>3</x><x>4</x></b></root>").unwrap();
    assert_eq!(texts(&tree, "//x[position()=last()]"), ["2", "4"]);
    assert_eq!(texts(&tree, "//x[last()]"), ["2", "4"]);
    assert_eq!(texts(&tree, "//x[2]"), ["4"]);
    assert_eq!(texts(&tree, "(//x)[last()]"), ["4"]);
    assert_eq!(texts(&tree, "(//x)[2]"), ["3"]);
}

#[rstest]
#[case("//p[position()=2]", &["2"])]
#[case("//p[last()]", &["4"])]
#[case("//p[position()!=2]", &["1", "3", "4"])]
#[case("//p[1]", &["1"])]
#[case("//p[last() - 1]", &["3"])]
#[case("//p[position() > 1][position() < 3]", &["2", "3"])]
#[case("//p[@k='y'][2]", &["3"])]
#[case("//p[@k='y'][last()]", &["3"])]
#[case("//p[position() = last() - position() + 1]", &[])]
#[case("/r/p[position() mod 2 = 0]", &["2", "4"])]
#[case("/r[p[3] = '3']/p[1]", &["1"])]
fn proximity_positions_on_forward_axes(#[case] xpath: &str, #[case] expected: &[&str]) {
    assert_eq!(texts(&four_p(), xpath), expected);
}

#[rstest]
#[case("/r/p[4]/preceding-sibling::*[1]", &["3"])]
#[case("/r/p[4]/preceding-sibling::*[last()]", &["1"])]
#[case("/r/p[4]/preceding-sibling::*[position() <= 2]", &["2", "3"])]
#[case("/r/p[4]/preceding-sibling::p[@k][1]", &["3"])]
#[case("/r/p[4]/preceding::p[2]", &["2"])]
#[case("/r/p[2]/ancestor-or-self::*[1]", &["2"])]
#[case("/r/p[2]/ancestor-or-self::*[2]", &["1234"])]
fn reverse_axes_count_from_the_context_node(#[case] xpath: &str, #[case] expected: &[&str]) {
    assert_eq!(texts(&four_p(), xpath), expected);
}

#[test]
fn reverse_step_from_context_is_returned_in_document_order() {
    let tree = four_p();
    let compiled = compile("preceding-sibling::*").unwrap();
    let p4 = evaluate(&compile("/r/p[4]").unwrap(), &tree, tree.document(), None).unwrap();
    let p4: NodeHandle = p4.nodes().unwrap()[0];
    let result = evaluate(&compiled, &tree, p4, None).unwrap();
    let values: Vec<_> = result.nodes().unwrap().iter().map(|n| tree.string_value(*n)).collect();
    assert_eq!(values, ["1", "2", "3"]);
}

#[test]
fn nested_predicates_keep_their_own_positions() {
    let tree = SimpleTree::parse("<r><s><i>a</i><i>b</i></s><s><i>c</i></s><s><i>d</i><i>e</i><i>f</i></s></r>").unwrap();
    assert_eq!(texts(&tree, "/r/s[i[last()] = 'f']/i[2]"), ["e"]);
    assert_eq!(texts(&tree, "/r/s[count(i) > 1][last()]/i[position() = last()]"), ["f"]);
    assert_eq!(texts(&tree, "/r/s[2]/i"), ["c"]);
    assert_eq!(texts(&tree, "/r/s/i[last()][. != 'c']"), ["b", "f"]);
}

#[derive(Default)]
struct Recorder {
    warnings: RefCell<Vec<Error>>,
    errors: RefCell<Vec<Error>>,
}

impl ErrorSink for Recorder {
    fn warning(&self, warning: &Error) {
        self.warnings.borrow_mut().push(warning.clone());
    }

    fn error(&self, error: &Error) {
        self.errors.borrow_mut().push(error.clone());
    }
}

#[test]
fn non_integral_numeric_predicate_warns_once_and_selects_nothing() {
    let tree = four_p();
    let sink = Recorder::default();
    let compiled = compile("/r/p[1.5]").unwrap();
    let ctx = ExecutionContext::new(&tree).with_error_sink(&sink);
    let result = ctx.execute_to_result(&compiled, tree.document()).unwrap();
    assert_eq!(result.nodes().unwrap().len(), 0);
    assert_eq!(sink.warnings.borrow().len(), 1);
    assert!(sink.errors.borrow().is_empty());
}

#[test]
fn numeric_predicate_warning_is_raised_once_per_step() {
    let tree = SimpleTree::parse("<r><s><i/><i/></s><s><i/></s><s><i/><i/></s></r>").unwrap();
    let sink = Recorder::default();
    let compiled = compile("/r/s/i[1.5]").unwrap();
    let ctx = ExecutionContext::new(&tree).with_error_sink(&sink);
    let result = ctx.execute_to_result(&compiled, tree.document()).unwrap();
    assert!(result.nodes().unwrap().is_empty());
    assert_eq!(sink.warnings.borrow().len(), 1);
    assert_eq!(sink.warnings.borrow()[0].code, ErrorCode::FOER0000);
}

#[test]
fn position_outside_a_predicate_is_an_error() {
    let tree = four_p();
    let sink = Recorder::default();
    let compiled: Vec<_> = ["position()", "last() + 1"].into_iter().map(|src| compile(src).unwrap()).collect();
    let ctx = ExecutionContext::new(&tree).with_error_sink(&sink);
    for expr in &compiled {
        let err = ctx.execute_to_result(expr, tree.document()).unwrap_err();
        assert_eq!(err.code, ErrorCode::XPDY0002);
    }
    assert_eq!(sink.errors.borrow().len(), 2);
    assert_eq!(ctx.stack_depths(), StackDepths::default());
}

#[rstest]
#[case("/r/p[$missing]")]
#[case("/r/p[position() = 2][count(1)]")]
#[case("/r/p[last()][q:x]")]
fn stacks_stay_balanced_when_a_predicate_fails(#[case] src: &str) {
    let tree = four_p();
    let compiled = compile(src).unwrap();
    let ok = compile("count(/r/p)").unwrap();
    let ctx = ExecutionContext::new(&tree);
    assert!(ctx.execute_to_result(&compiled, tree.document()).is_err());
    assert_eq!(ctx.stack_depths(), StackDepths::default());
    // the context stays usable afterwards
    assert_eq!(ctx.execute_to_result(&ok, tree.document()).unwrap().as_number(&tree), 4.0);
}
