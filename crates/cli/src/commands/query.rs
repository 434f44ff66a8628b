use crate::OutputFormat;
use crate::util::{CliResult, describe_compile_error, parse_namespace_bindings, parse_variables};
use anyhow::Context;
use arbor_xpath::{
    DocumentTree, ExecutionContext, NodeHandle, NodeKind, SimpleTree, TreeNamespaceResolver, XPathResult, compile,
};
use clap::Args;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;
use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

const PREVIEW_CHARS: usize = 60;

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(value_name = "XPATH")]
    pub expression: String,
    /// XML document to query.
    #[arg(long, short = 'f', value_name = "PATH")]
    pub file: PathBuf,
    /// Bind a namespace prefix (`prefix=uri`), shadowing declarations on the document element.
    #[arg(long = "namespace", value_name = "PREFIX=URI")]
    pub namespaces: Vec<String>,
    /// Bind a string variable (`name=value`).
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub variables: Vec<String>,
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum QueryItemSummary {
    Node { kind: &'static str, path: String, name: String, value: String },
    Value { xpath_type: &'static str, value: String },
}

pub fn run(args: &QueryArgs) -> CliResult<String> {
    let xml = fs::read_to_string(&args.file).with_context(|| format!("cannot read {}", args.file.display()))?;
    let tree = SimpleTree::parse(&xml).with_context(|| format!("cannot load {}", args.file.display()))?;
    let bindings = parse_namespace_bindings(&args.namespaces)?;
    let variables = parse_variables(&args.variables)?;
    let compiled = compile(&args.expression).map_err(|e| describe_compile_error(&args.expression, e))?;

    let document = tree.document();
    let in_scope = TreeNamespaceResolver::new(&tree, document_element(&tree).unwrap_or(document));
    let ctx = ExecutionContext::new(&tree).with_variables(&variables).with_resolver(&in_scope);
    let result = {
        let _explicit = ctx.push_resolver(&bindings);
        ctx.execute_to_result(&compiled, document)?
    };
    tracing::info!(file = %args.file.display(), result_type = result.type_name(), "query evaluated");

    let summaries = summarize_query_result(&tree, &result);
    let output = match args.format {
        OutputFormat::Text => render_query_text(&summaries),
        OutputFormat::Json => render_query_json(&summaries)?,
    };
    Ok(output)
}

fn document_element(tree: &SimpleTree) -> Option<NodeHandle> {
    let mut child = tree.first_child(tree.document());
    while let Some(node) = child {
        if tree.kind(node) == NodeKind::Element {
            return Some(node);
        }
        child = tree.next_sibling(node);
    }
    None
}

pub(crate) fn summarize_query_result(tree: &SimpleTree, result: &XPathResult) -> Vec<QueryItemSummary> {
    match result {
        XPathResult::NodeSet(nodes) => nodes
            .iter()
            .map(|&node| QueryItemSummary::Node {
                kind: kind_name(tree.kind(node)),
                path: node_path(tree, node),
                name: tree.name(node),
                value: tree.string_value(node),
            })
            .collect(),
        scalar => vec![QueryItemSummary::Value { xpath_type: scalar.type_name(), value: scalar.as_string(tree) }],
    }
}

fn kind_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Document => "document",
        NodeKind::Element => "element",
        NodeKind::Attribute => "attribute",
        NodeKind::Text => "text",
        NodeKind::Comment => "comment",
        NodeKind::ProcessingInstruction => "processing-instruction",
        NodeKind::Namespace => "namespace",
    }
}

/// Absolute location path that selects exactly `node`, e.g. `/r/a[2]/@id`.
pub(crate) fn node_path(tree: &SimpleTree, node: NodeHandle) -> String {
    let mut segments = Vec::new();
    let mut cur = Some(node);
    while let Some(n) = cur {
        match tree.kind(n) {
            NodeKind::Document => break,
            NodeKind::Attribute => segments.push(format!("@{}", tree.name(n))),
            NodeKind::Namespace => segments.push(format!("namespace::{}", tree.local_name(n))),
            kind => segments.push(format!("{}[{}]", node_test(tree, n, kind), sibling_position(tree, n))),
        }
        cur = tree.parent(n);
    }
    segments.reverse();
    format!("/{}", segments.join("/"))
}

fn node_test(tree: &SimpleTree, node: NodeHandle, kind: NodeKind) -> String {
    match kind {
        NodeKind::Element => tree.name(node),
        NodeKind::Text => "text()".to_string(),
        NodeKind::Comment => "comment()".to_string(),
        NodeKind::ProcessingInstruction => format!("processing-instruction('{}')", tree.local_name(node)),
        _ => "node()".to_string(),
    }
}

// 1-based among preceding siblings the same node test would select
fn sibling_position(tree: &SimpleTree, node: NodeHandle) -> usize {
    let kind = tree.kind(node);
    let named = matches!(kind, NodeKind::Element | NodeKind::ProcessingInstruction);
    let mut position = 1;
    let mut sibling = tree.previous_sibling(node);
    while let Some(s) = sibling {
        if tree.kind(s) == kind && (!named || tree.name(s) == tree.name(node)) {
            position += 1;
        }
        sibling = tree.previous_sibling(s);
    }
    position
}

fn preview(value: &str) -> String {
    let quoted = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.replace('"', "\\\"")));
    if value.chars().count() <= PREVIEW_CHARS {
        return quoted(value);
    }
    let head: String = value.chars().take(PREVIEW_CHARS - 3).collect();
    format!("{}...", quoted(&head))
}

fn colorize_path(path: &str) -> String {
    path.if_supports_color(Stream::Stdout, |text| text.bold().fg_rgb::<79, 166, 255>().to_string()).to_string()
}

fn colorize_value(value: &str) -> String {
    value.if_supports_color(Stream::Stdout, |text| text.fg_rgb::<136, 192, 74>().to_string()).to_string()
}

fn colorize_type(name: &str) -> String {
    name.if_supports_color(Stream::Stdout, |text| text.dimmed().to_string()).to_string()
}

pub(crate) fn render_query_text(items: &[QueryItemSummary]) -> String {
    let mut output = String::new();
    for item in items {
        match item {
            QueryItemSummary::Node { kind: _, path, name: _, value } => {
                let colored_path = colorize_path(path);
                if value.is_empty() {
                    let _ = writeln!(&mut output, "{colored_path}");
                } else {
                    let colored_value = colorize_value(&preview(value));
                    let _ = writeln!(&mut output, "{colored_path} = {colored_value}");
                }
            }
            QueryItemSummary::Value { xpath_type, value } => {
                let _ = writeln!(&mut output, "{} ({})", colorize_value(value), colorize_type(xpath_type));
            }
        }
    }
    output.trim_end().to_owned()
}

pub(crate) fn render_query_json(items: &[QueryItemSummary]) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(items)?)
}
