use anyhow::bail;
use arbor_xpath::{Error, NamespaceBindings, VariableBindings, XPathResult};

pub type CliResult<T> = anyhow::Result<T>;

/// Split `key=value`, rejecting an empty key.
pub fn split_assignment<'s>(value: &'s str, what: &str) -> CliResult<(&'s str, &'s str)> {
    let Some((key, rest)) = value.split_once('=') else {
        bail!("{what} must look like name=value, got '{value}'");
    };
    if key.trim().is_empty() {
        bail!("{what} has an empty name: '{value}'");
    }
    Ok((key.trim(), rest))
}

pub fn parse_namespace_bindings(values: &[String]) -> CliResult<NamespaceBindings> {
    let mut bindings = NamespaceBindings::new();
    for value in values {
        let (prefix, uri) = split_assignment(value, "namespace binding")?;
        bindings.insert(prefix, uri);
    }
    Ok(bindings)
}

/// Variables are bound as strings; expressions convert them as needed.
pub fn parse_variables(values: &[String]) -> CliResult<VariableBindings> {
    let mut vars = VariableBindings::new();
    for value in values {
        let (name, text) = split_assignment(value, "variable")?;
        vars.set(name, XPathResult::String(text.to_string()));
    }
    Ok(vars)
}

/// Attach the expression and a caret under the failing character to compile errors.
pub fn describe_compile_error(expression: &str, error: Error) -> anyhow::Error {
    let Some(offset) = error.offset else {
        return anyhow::Error::new(error);
    };
    let caret = format!("{expression}\n{}^", " ".repeat(offset));
    anyhow::Error::new(error).context(caret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_xpath::NamespaceResolver;
    use rstest::rstest;

    #[rstest]
    #[case("p=urn:p", ("p", "urn:p"))]
    #[case(" p =urn:a=b", ("p", "urn:a=b"))]
    #[case("v=", ("v", ""))]
    fn splits_on_first_equals(#[case] input: &str, #[case] expected: (&str, &str)) {
        assert_eq!(split_assignment(input, "binding").unwrap(), expected);
    }

    #[rstest]
    #[case("novalue")]
    #[case("=urn:p")]
    fn rejects_malformed_assignments(#[case] input: &str) {
        assert!(split_assignment(input, "binding").is_err());
    }

    #[rstest]
    fn namespace_bindings_resolve() {
        let bindings = parse_namespace_bindings(&["a=urn:a".to_string(), "b=urn:b".to_string()]).unwrap();
        assert_eq!(bindings.resolve("b").as_deref(), Some("urn:b"));
        assert_eq!(bindings.resolve("c"), None);
    }

    #[rstest]
    fn compile_errors_point_at_the_offset() {
        let err = arbor_xpath::compile("1 + frob()").unwrap_err();
        let described = format!("{:#}", describe_compile_error("1 + frob()", err));
        assert!(described.starts_with("1 + frob()\n    ^"), "{described}");
        assert!(described.contains("err:XPST0017"));
    }
}
