//! The core function library, checked through the string form of each result.

use arbor_xpath::{SimpleTree, compile, evaluate};
use rstest::{fixture, rstest};

#[fixture]
fn tree() -> SimpleTree {
    SimpleTree::parse(concat!(
        r#"<r xmlns:p="urn:p" xml:lang="en-GB">"#,
        r#"<n>3</n><n>4.5</n><n>x</n>"#,
        r#"<item id="i1">one</item><item id="i2">two</item><ref>i2 i1 nope</ref>"#,
        r#"<t xml:lang="de">  padded   words  </t>"#,
        r#"<p:q p:attr="v"/>"#,
        r#"</r>"#
    ))
    .unwrap()
}

fn string_of(tree: &SimpleTree, xpath: &str) -> String {
    let compiled = compile(xpath).unwrap();
    evaluate(&compiled, tree, tree.document(), None).unwrap().as_string(tree)
}

#[rstest]
#[case("concat('a', 1, true())", "a1true")]
#[case("starts-with('abc', 'ab')", "true")]
#[case("starts-with('abc', '')", "true")]
#[case("contains('abc', 'd')", "false")]
#[case("substring-before('1999/04/01', '/')", "1999")]
#[case("substring-after('1999/04/01', '/')", "04/01")]
#[case("substring-after('abc', '')", "abc")]
#[case("substring-before('abc', 'z')", "")]
#[case("substring('12345', 2, 3)", "234")]
#[case("substring('12345', 2)", "2345")]
#[case("substring('12345', 1.5, 2.6)", "234")]
#[case("substring('12345', 0, 3)", "12")]
#[case("substring('12345', 0 div 0, 3)", "")]
#[case("substring('12345', 1, 0 div 0)", "")]
#[case("substring('12345', -42, 1 div 0)", "12345")]
#[case("substring('12345', -1 div 0, 1 div 0)", "")]
#[case("substring('héllo', 2, 3)", "éll")]
#[case("string-length('héllo')", "5")]
#[case("string-length(/r/item)", "3")]
#[case("normalize-space(/r/t)", "padded words")]
#[case("normalize-space('')", "")]
#[case("translate('bar', 'abc', 'ABC')", "BAr")]
#[case("translate('--aaa--', 'abc-', 'ABC')", "AAA")]
#[case("translate('aba', 'aa', 'xy')", "xbx")]
fn string_functions(tree: SimpleTree, #[case] xpath: &str, #[case] expected: &str) {
    assert_eq!(string_of(&tree, xpath), expected, "{xpath}");
}

#[rstest]
#[case("number('12')", "12")]
#[case("sum(/r/n[position() < 3])", "7.5")]
#[case("sum(/r/n)", "NaN")]
#[case("sum(/r/missing)", "0")]
#[case("floor(2.7)", "2")]
#[case("floor(-2.2)", "-3")]
#[case("ceiling(2.1)", "3")]
#[case("ceiling(-0.5)", "0")]
#[case("round(2.5)", "3")]
#[case("round(-2.5)", "-2")]
#[case("round(0 div 0)", "NaN")]
#[case("round(1 div 0)", "Infinity")]
#[case("1 div round(-0.2)", "-Infinity")]
#[case("count(/r/n)", "3")]
#[case("count(//*)", "9")]
#[case("count(/r/n | /r/n)", "3")]
fn number_functions(tree: SimpleTree, #[case] xpath: &str, #[case] expected: &str) {
    assert_eq!(string_of(&tree, xpath), expected, "{xpath}");
}

#[rstest]
#[case("boolean(/r/n)", "true")]
#[case("not(/r/missing)", "true")]
#[case("true() and false()", "false")]
#[case("false() or 1", "true")]
#[case("/r/t[lang('de')] = /r/t", "true")]
#[case("count(/r/n[lang('en')])", "3")]
#[case("count(/r/n[lang('EN-gb')])", "3")]
#[case("count(/r/n[lang('e')])", "0")]
#[case("count(/r/t[lang('en')])", "0")]
fn boolean_functions(tree: SimpleTree, #[case] xpath: &str, #[case] expected: &str) {
    assert_eq!(string_of(&tree, xpath), expected, "{xpath}");
}

#[rstest]
#[case("name(/r/*[last()])", "p:q")]
#[case("local-name(/r/*[last()])", "q")]
#[case("namespace-uri(/r/*[last()])", "urn:p")]
#[case("name(/r/*[last()]/@*)", "p:attr")]
#[case("namespace-uri(/r/n)", "")]
#[case("name(/r/missing)", "")]
#[case("local-name(/r/comment())", "")]
#[case("name(/r/item[1]/@id)", "id")]
#[case("name(/)", "")]
fn name_functions(tree: SimpleTree, #[case] xpath: &str, #[case] expected: &str) {
    assert_eq!(string_of(&tree, xpath), expected, "{xpath}");
}

#[rstest]
#[case("string(id('i2'))", "two")]
#[case("count(id('i2 i1 i2'))", "2")]
#[case("string(id('i2 i1'))", "one")]
#[case("count(id(/r/ref))", "2")]
#[case("count(id('nope'))", "0")]
#[case("string(id('i1')/following-sibling::*[1])", "two")]
fn id_function(tree: SimpleTree, #[case] xpath: &str, #[case] expected: &str) {
    assert_eq!(string_of(&tree, xpath), expected, "{xpath}");
}

#[rstest]
fn context_defaults_use_the_context_node(tree: SimpleTree) {
    assert_eq!(string_of(&tree, "string(/r/item[string() = 'two'])"), "two");
    assert_eq!(string_of(&tree, "count(/r/*[string-length() = 3])"), "3");
    assert_eq!(string_of(&tree, "string(/r/n[number() = 3])"), "3");
    assert_eq!(string_of(&tree, "string(/r/*[local-name() = 'ref'])"), "i2 i1 nope");
    assert_eq!(string_of(&tree, "normalize-space(/r/t/text())"), "padded words");
}
