//! Every axis, evaluated from fixed context nodes of one small document.

use arbor_xpath::{DocumentTree, NodeHandle, NodeKind, SimpleTree, compile, evaluate};
use rstest::{fixture, rstest};

#[fixture]
fn tree() -> SimpleTree {
    SimpleTree::parse(
        r#"<r xmlns:p="urn:p"><a id="a1" p:x="1"><b/><c/></a><d>t</d><?pi data?><!--note--><e xmlns:q="urn:q"/></r>"#,
    )
    .expect("well-formed")
}

fn select(tree: &SimpleTree, context: NodeHandle, xpath: &str) -> Vec<NodeHandle> {
    let compiled = compile(xpath).unwrap();
    let result = evaluate(&compiled, tree, context, None).unwrap();
    result.nodes().expect("node-set").to_vec()
}

fn label(tree: &SimpleTree, node: NodeHandle) -> String {
    match tree.kind(node) {
        NodeKind::Document => "/".to_string(),
        NodeKind::Element => tree.name(node),
        NodeKind::Attribute => format!("@{}", tree.name(node)),
        NodeKind::Text => "#text".to_string(),
        NodeKind::Comment => "#comment".to_string(),
        NodeKind::ProcessingInstruction => format!("?{}", tree.local_name(node)),
        NodeKind::Namespace => format!("ns:{}", tree.local_name(node)),
    }
}

fn labels_from(tree: &SimpleTree, context: &str, xpath: &str) -> Vec<String> {
    let start = select(tree, tree.document(), context);
    assert_eq!(start.len(), 1, "context path {context} must select one node");
    select(tree, start[0], xpath).into_iter().map(|n| label(tree, n)).collect()
}

#[rstest]
#[case("/r/a", "child::node()", &["b", "c"])]
#[case("/r/a", "descendant::node()", &["b", "c"])]
#[case("/r/a", "descendant-or-self::*", &["a", "b", "c"])]
#[case("/r/a/b", "parent::node()", &["a"])]
#[case("/r/a/b", "ancestor::*", &["r", "a"])]
#[case("/r/a/b", "ancestor-or-self::node()", &["/", "r", "a", "b"])]
#[case("/r/a/b", "following-sibling::*", &["c"])]
#[case("/r/a/c", "preceding-sibling::*", &["b"])]
#[case("/r/a/b", "following::node()", &["c", "d", "#text", "?pi", "#comment", "e"])]
#[case("/r/e", "preceding::node()", &["a", "b", "c", "d", "#text", "?pi", "#comment"])]
#[case("/r/a/b", "self::b", &["b"])]
#[case("/r/a/b", "self::c", &[])]
#[case("/r/a", "attribute::*", &["@id", "@p:x"])]
#[case("/r/a", "namespace::*", &["ns:p"])]
#[case("/r/e", "namespace::node()", &["ns:p", "ns:q"])]
#[case("/r", "processing-instruction('pi')", &["?pi"])]
#[case("/r", "comment() | text()", &["#comment"])]
#[case("/r/d", "text()", &["#text"])]
fn axis_selects_in_document_order(
    tree: SimpleTree,
    #[case] context: &str,
    #[case] xpath: &str,
    #[case] expected: &[&str],
) {
    assert_eq!(labels_from(&tree, context, xpath), expected);
}

#[rstest]
#[case("@id/parent::*", &["a"])]
#[case("@id/ancestor::*", &["r", "a"])]
#[case("@id/following::*", &["b", "c", "d", "e"])]
#[case("@id/preceding::node()", &[])]
#[case("@id/following-sibling::node()", &[])]
#[case("@id/child::node()", &[])]
#[case("@id/descendant-or-self::node()", &["@id"])]
fn attribute_context_node(tree: SimpleTree, #[case] xpath: &str, #[case] expected: &[&str]) {
    assert_eq!(labels_from(&tree, "/r/a", xpath), expected);
}

#[rstest]
fn descendant_excludes_attributes_and_namespaces(tree: SimpleTree) {
    let all = select(&tree, tree.document(), "//node()");
    assert!(all.iter().all(|n| tree.kind(*n).is_child_tree()));
    // document node is not a descendant of itself
    assert!(!all.contains(&tree.document()));
}

#[rstest]
fn root_step_reaches_the_document_from_any_node(tree: SimpleTree) {
    let deep = select(&tree, tree.document(), "/r/a/b")[0];
    assert_eq!(select(&tree, deep, "/"), vec![tree.document()]);
    assert_eq!(labels_from(&tree, "/r/a/b", "/r/e"), ["e"]);
}

#[rstest]
#[case("ancestor::*", 2)]
#[case("preceding::*", 0)]
#[case("following::*", 3)]
fn reverse_and_forward_counts(tree: SimpleTree, #[case] xpath: &str, #[case] count: usize) {
    let b = select(&tree, tree.document(), "/r/a/b")[0];
    assert_eq!(select(&tree, b, xpath).len(), count);
}
