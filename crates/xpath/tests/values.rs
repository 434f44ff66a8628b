//! Type coercions and comparison semantics, including existential node-set comparison.

use arbor_xpath::engine::value::{number_to_string, string_to_number};
use arbor_xpath::simple_tree::{doc, elem, text};
use arbor_xpath::{DocumentTree, NodeVector, SimpleTree, XPathResult, compile, evaluate};
use proptest::prelude::*;
use rstest::rstest;

fn sets_tree() -> SimpleTree {
    SimpleTree::parse("<r><a>1</a><a>2</a><b>2</b><b>3</b><e/><w> 7 </w><s>abc</s></r>").unwrap()
}

fn eval(tree: &SimpleTree, xpath: &str) -> XPathResult {
    let compiled = compile(xpath).unwrap();
    evaluate(&compiled, tree, tree.document(), None).unwrap()
}

fn truth(tree: &SimpleTree, xpath: &str) -> bool {
    match eval(tree, xpath) {
        XPathResult::Boolean(b) => b,
        other => panic!("{xpath} returned {}", other.type_name()),
    }
}

#[test]
fn overlapping_sets_are_both_equal_and_unequal() {
    let tree = sets_tree();
    assert!(truth(&tree, "/r/a = /r/b"));
    assert!(truth(&tree, "/r/a != /r/b"));
    assert!(truth(&tree, "/r/a < /r/b"));
    assert!(!truth(&tree, "/r/a > /r/b"));
    assert!(truth(&tree, "/r/b > /r/a"));
}

#[rstest]
#[case("/r/a = 2", true)]
#[case("2 = /r/a", true)]
#[case("/r/a = 5", false)]
#[case("/r/a != 1", true)]
#[case("/r/a < 2", true)]
#[case("2 > /r/a", true)]
#[case("/r/a >= 3", false)]
#[case("3 <= /r/b", true)]
#[case("/r/a = '1'", true)]
#[case("/r/a = ' 1'", false)]
#[case("/r/w = 7", true)]
#[case("/r/w = '7'", false)]
#[case("/r/missing = /r/a", false)]
#[case("/r/missing != /r/a", false)]
#[case("/r/missing = 0", false)]
#[case("/r/missing != ''", false)]
#[case("/r/missing = false()", true)]
#[case("/r/a = true()", true)]
#[case("true() = /r/missing", false)]
#[case("/r/e = ''", true)]
#[case("/r/s < 1", false)]
fn node_set_against_scalars(#[case] xpath: &str, #[case] expected: bool) {
    assert_eq!(truth(&sets_tree(), xpath), expected, "{xpath}");
}

#[rstest]
#[case("1 = 1.0", true)]
#[case("'1' = 1", true)]
#[case("'1.0' = '1'", false)]
#[case("true() = 'x'", true)]
#[case("false() = ''", true)]
#[case("true() = 2", true)]
#[case("0 = false()", true)]
#[case("'abc' < 'abd'", false)]
#[case("'2' < '10'", true)]
#[case("true() > false()", true)]
#[case("number('x') = number('x')", false)]
#[case("number('x') != number('x')", true)]
#[case("number('x') < 1 or number('x') >= 1", false)]
#[case("1 div 0 = 2 div 0", true)]
#[case("-1 div 0 < 1 div 0", true)]
#[case("0 = -0", true)]
fn scalar_comparisons(#[case] xpath: &str, #[case] expected: bool) {
    assert_eq!(truth(&sets_tree(), xpath), expected, "{xpath}");
}

#[rstest]
#[case("string(1 div 0)", "Infinity")]
#[case("string(-1 div 0)", "-Infinity")]
#[case("string(0 div 0)", "NaN")]
#[case("string(-0)", "0")]
#[case("string(2.50)", "2.5")]
#[case("string(1000000)", "1000000")]
#[case("string(0.1 + 0.2)", "0.30000000000000004")]
#[case("string(true())", "true")]
#[case("string(/r/a)", "1")]
#[case("string(/r/missing)", "")]
#[case("string(number(' 12 '))", "12")]
#[case("string(number('+1'))", "NaN")]
#[case("string(number('1e3'))", "NaN")]
#[case("string(number('.5'))", "0.5")]
#[case("string(number('-.5'))", "-0.5")]
#[case("string(number('5.'))", "5")]
#[case("string(number(''))", "NaN")]
#[case("string(number(true()))", "1")]
#[case("string(boolean('false'))", "true")]
#[case("string(boolean(0 div 0))", "false")]
#[case("string(boolean(/r/e))", "true")]
#[case("string(boolean(/r/missing))", "false")]
#[case("string(-(/r/w))", "-7")]
fn coercions(#[case] xpath: &str, #[case] expected: &str) {
    let tree = sets_tree();
    assert_eq!(eval(&tree, xpath).as_string(&tree), expected, "{xpath}");
}

#[test]
fn results_convert_after_materializing() {
    let tree = sets_tree();
    let result = eval(&tree, "/r/b");
    assert_eq!(result.type_name(), "node-set");
    assert!(result.as_boolean());
    assert_eq!(result.as_number(&tree), 2.0);
    assert_eq!(result.as_string(&tree), "2");
    let empty = eval(&tree, "/r/none");
    assert!(!empty.as_boolean());
    assert!(empty.as_number(&tree).is_nan());
}

#[test]
fn union_is_sorted_and_distinct() {
    let tree = sets_tree();
    let result = eval(&tree, "/r/b | /r/a | /r/a[2] | /r/*[1]");
    let nodes = result.nodes().unwrap();
    let values: Vec<_> = nodes.iter().map(|n| tree.string_value(*n)).collect();
    assert_eq!(values, ["1", "2", "2", "3"]);
    for pair in nodes.windows(2) {
        assert!(tree.is_node_after(pair[1], pair[0]));
    }
}

// A flat list of `n` text-bearing elements; handle order matches document order.
fn flat_tree(n: usize) -> SimpleTree {
    doc().child(elem("r").children((0..n).map(|i| elem("i").child(text(&i.to_string()))))).build()
}

fn items(tree: &SimpleTree) -> Vec<arbor_xpath::NodeHandle> {
    eval(tree, "/r/i").nodes().unwrap().to_vec()
}

proptest! {
    #[test]
    fn finite_numbers_survive_string_round_trip(n in proptest::num::f64::NORMAL | proptest::num::f64::SUBNORMAL) {
        let s = number_to_string(n);
        prop_assert!(!s.contains('e') && !s.contains('E'));
        prop_assert_eq!(string_to_number(&s), n);
    }

    #[test]
    fn integers_print_without_fraction(n in -1_000_000_000i64..1_000_000_000) {
        #[allow(clippy::cast_precision_loss)]
        let f = n as f64;
        prop_assert_eq!(number_to_string(f), n.to_string());
    }

    #[test]
    fn sorting_restores_document_order(picks in proptest::collection::vec(0usize..12, 0..30)) {
        let tree = flat_tree(12);
        let all = items(&tree);
        let mut vector = NodeVector::new();
        for &p in &picks {
            vector.push(all[p]);
        }
        vector.sort_and_dedup(&tree);
        let mut expected: Vec<usize> = picks.clone();
        expected.sort_unstable();
        expected.dedup();
        let expected: Vec<_> = expected.into_iter().map(|p| all[p]).collect();
        prop_assert_eq!(vector.as_slice(), expected.as_slice());
    }

    #[test]
    fn union_of_sorted_vectors_is_their_sorted_merge(
        left in proptest::collection::btree_set(0usize..16, 0..10),
        right in proptest::collection::btree_set(0usize..16, 0..10),
    ) {
        let tree = flat_tree(16);
        let all = items(&tree);
        let l = NodeVector::from_sorted(left.iter().map(|&i| all[i]).collect());
        let r = NodeVector::from_sorted(right.iter().map(|&i| all[i]).collect());
        let merged = l.union(r, &tree);
        let expected: Vec<_> = left.union(&right).map(|&i| all[i]).collect();
        prop_assert_eq!(merged.as_slice(), expected.as_slice());
        prop_assert!(merged.is_doc_ordered());
    }
}
