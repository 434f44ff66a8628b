use crate::util::{CliResult, describe_compile_error, parse_namespace_bindings};
use arbor_xpath::{compile_with_resolver, parse_xpath};
use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(value_name = "XPATH")]
    pub expression: String,
    /// Bind a prefix at compile time (`prefix=uri`); may be repeated.
    #[arg(long = "namespace", value_name = "PREFIX=URI")]
    pub namespaces: Vec<String>,
    /// Print the syntax tree.
    #[arg(long, conflicts_with = "ir")]
    pub ast: bool,
    /// Print the compiled expression tree.
    #[arg(long)]
    pub ir: bool,
}

pub fn run(args: &CheckArgs) -> CliResult<String> {
    let bindings = parse_namespace_bindings(&args.namespaces)?;
    if args.ast {
        let ast = parse_xpath(&args.expression).map_err(|e| describe_compile_error(&args.expression, e))?;
        return Ok(format!("{ast:#?}"));
    }
    let compiled =
        compile_with_resolver(&args.expression, &bindings).map_err(|e| describe_compile_error(&args.expression, e))?;
    if args.ir {
        return Ok(format!("{:#?}", compiled.root));
    }
    Ok(format!("ok: {}", compiled.source))
}
