//! Parses `defmacro` / `macro` forms into [`MacroDefinition`]s and checks
//! invocation arity.

use std::{collections::HashSet, sync::Arc};

use crate::{
    errors::{CompileError, ErrorContext},
    macros::{MacroDefinition, MacroParams, MacroRegistry, Visibility},
    source::{SourceFile, SourceMap},
    syntax::{AstNode, Expr},
};

/// Visibility a top-level form would define, if it is a macro definition.
pub fn is_macro_definition(node: &AstNode) -> Option<Visibility> {
    match node.value.head_symbol()? {
        "defmacro" => Some(Visibility::Local),
        "macro" => Some(Visibility::Global),
        _ => None,
    }
}

/// Parses `(defmacro name "doc"? (params) body)` or the `macro` equivalent.
pub fn parse_macro_definition(
    node: &AstNode,
    file: &SourceFile,
    origin: &str,
) -> Result<MacroDefinition, CompileError> {
    let invalid = |message: String, at: &AstNode| {
        CompileError::macro_definition(message, ErrorContext::at(file, at.span))
    };

    let visibility = is_macro_definition(node)
        .ok_or_else(|| invalid("not a macro definition".to_string(), node))?;
    let items = node.value.as_list().unwrap_or_default();
    let keyword = items[0].value.as_symbol().unwrap_or("defmacro");

    let name_node = items
        .get(1)
        .ok_or_else(|| invalid(format!("`{keyword}` needs a name"), node))?;
    let name = name_node
        .value
        .as_symbol()
        .ok_or_else(|| invalid(format!("macro name must be a symbol, found {}", name_node.value.type_name()), name_node))?
        .to_string();

    // Optional docstring between the name and the parameters.
    let rest = &items[2..];
    let rest = match rest.first().map(|n| &*n.value) {
        Some(Expr::String(_)) if rest.len() > 2 => &rest[1..],
        _ => rest,
    };

    let (params_node, body) = match rest {
        [params, body] => (params, body),
        [] | [_] => return Err(invalid(format!("macro `{name}` needs a parameter list and a body"), node)),
        [_, _, extra, ..] => {
            return Err(invalid(format!("macro `{name}` body must be a single form"), extra));
        }
    };

    let params = parse_params(params_node, &name, file)?;

    Ok(MacroDefinition {
        name,
        params,
        body: body.clone(),
        visibility,
        span: node.span,
        origin: origin.to_string(),
    })
}

fn parse_params(node: &AstNode, macro_name: &str, file: &SourceFile) -> Result<MacroParams, CompileError> {
    let items = node.value.as_sequence().ok_or_else(|| {
        CompileError::macro_definition(
            format!("parameters of `{macro_name}` must be a list or vector"),
            ErrorContext::at(file, node.span),
        )
    })?;

    let mut required = Vec::new();
    let mut rest = None;
    let mut seen = HashSet::new();
    let mut iter = items.iter();

    while let Some(item) = iter.next() {
        let Some(param) = item.value.as_symbol() else {
            return Err(CompileError::macro_definition(
                format!("parameter of `{macro_name}` must be a symbol"),
                ErrorContext::at(file, item.span),
            ));
        };
        if param == "&" {
            let (Some(rest_node), None) = (iter.next(), iter.next()) else {
                return Err(CompileError::macro_definition(
                    format!("`&` in `{macro_name}` must be followed by exactly one parameter"),
                    ErrorContext::at(file, item.span),
                ));
            };
            let rest_name = rest_node.value.as_symbol().ok_or_else(|| {
                CompileError::macro_definition(
                    format!("rest parameter of `{macro_name}` must be a symbol"),
                    ErrorContext::at(file, rest_node.span),
                )
            })?;
            if !seen.insert(rest_name.to_string()) {
                return Err(duplicate_param(macro_name, rest_name, file, rest_node));
            }
            rest = Some(rest_name.to_string());
            break;
        }
        if !seen.insert(param.to_string()) {
            return Err(duplicate_param(macro_name, param, file, item));
        }
        required.push(param.to_string());
    }

    Ok(MacroParams {
        required,
        rest,
        span: node.span,
    })
}

fn duplicate_param(macro_name: &str, param: &str, file: &SourceFile, at: &AstNode) -> CompileError {
    CompileError::macro_definition(
        format!("duplicate parameter `{param}` in `{macro_name}`"),
        ErrorContext::at(file, at.span),
    )
}

/// Collects every top-level macro definition of one module. A name defined
/// twice in the same module is an error.
pub fn collect_macro_definitions(
    forms: &[AstNode],
    file: &SourceFile,
    origin: &str,
) -> Result<MacroRegistry, CompileError> {
    let mut registry = MacroRegistry::new();
    for form in forms.iter().filter(|f| is_macro_definition(f).is_some()) {
        let def = parse_macro_definition(form, file, origin)?;
        if let Some(first) = registry.get(&def.name) {
            let ctx = ErrorContext::at(file, def.span)
                .with_related(first.span, "first defined here")
                .with_help("rename one of the definitions");
            return Err(CompileError::macro_definition(
                format!("macro `{}` is defined twice", def.name),
                ctx,
            ));
        }
        let name = def.name.clone();
        registry.register(&name, Arc::new(def));
    }
    Ok(registry)
}

/// Checks the number of arguments of an invocation against `def`.
pub fn check_arity(
    def: &MacroDefinition,
    args_len: usize,
    call: &AstNode,
    sources: &SourceMap,
) -> Result<(), CompileError> {
    let required = def.params.required.len();
    let ok = match def.params.rest {
        Some(_) => args_len >= required,
        None => args_len == required,
    };
    if ok {
        return Ok(());
    }
    let ctx = ErrorContext::locate(sources, call.span)
        .with_help(format!(
            "`{}` is defined in {} with parameters {}",
            def.name,
            def.origin,
            describe_params(&def.params)
        ))
        .with_related(def.span, "macro defined here");
    Err(CompileError::MacroArity {
        macro_name: def.name.clone(),
        expected: def.params.arity(),
        actual: args_len,
        ctx,
    })
}

pub(crate) fn describe_params(params: &MacroParams) -> String {
    let mut parts: Vec<String> = params.required.clone();
    if let Some(rest) = &params.rest {
        parts.push(format!("& {rest}"));
    }
    format!("({})", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::ErrorType, syntax::read_all};

    fn parse_one(src: &str) -> Result<MacroDefinition, CompileError> {
        let mut sources = SourceMap::new();
        let file = sources.add("m.sprig", src);
        let forms = read_all(&file).unwrap();
        parse_macro_definition(&forms[0], &file, "m.sprig")
    }

    #[test]
    fn parses_fixed_and_rest_params() {
        let def = parse_one("(defmacro my-when (c & body) `(if ~c (do ~@body)))").unwrap();
        assert_eq!(def.name, "my-when");
        assert_eq!(def.params.required, vec!["c"]);
        assert_eq!(def.params.rest.as_deref(), Some("body"));
        assert_eq!(def.visibility, Visibility::Local);
        assert_eq!(def.params.arity(), "at least 1");
    }

    #[test]
    fn global_macros_and_docstrings() {
        let def = parse_one(r#"(macro twice "doubles" [x] (list '+ x x))"#).unwrap();
        assert_eq!(def.visibility, Visibility::Global);
        assert_eq!(def.params.required, vec!["x"]);
        assert_eq!(describe_params(&def.params), "(x)");
    }

    #[test]
    fn rejects_malformed_definitions() {
        for src in [
            "(defmacro)",
            "(defmacro 5 (x) x)",
            "(defmacro m x x)",
            "(defmacro m (x x) x)",
            "(defmacro m (x &) x)",
            "(defmacro m (& a b) a)",
            "(defmacro m (x) x x)",
        ] {
            let err = parse_one(src).unwrap_err();
            assert_eq!(err.error_type(), ErrorType::Macro, "{src}");
        }
    }

    #[test]
    fn duplicate_names_in_one_module_fail() {
        let mut sources = SourceMap::new();
        let file = sources.add("dup.sprig", "(defmacro a (x) x)\n(macro a (y) y)");
        let forms = read_all(&file).unwrap();
        let err = collect_macro_definitions(&forms, &file, "dup.sprig").unwrap_err();
        assert!(err.to_string().contains("defined twice"));
    }

    #[test]
    fn arity_mismatch_reports_both_sites() {
        let mut sources = SourceMap::new();
        let file = sources.add("a.sprig", "(defmacro twice (x) (list '+ x x))\n(twice 1 2)");
        let forms = read_all(&file).unwrap();
        let def = parse_macro_definition(&forms[0], &file, "a.sprig").unwrap();
        let err = check_arity(&def, 2, &forms[1], &sources).unwrap_err();
        match &err {
            CompileError::MacroArity { expected, actual, ctx, .. } => {
                assert_eq!(expected, "1");
                assert_eq!(*actual, 2);
                assert_eq!(ctx.span, Some(forms[1].span));
                assert_eq!(ctx.related[0].span, def.span);
            }
            other => panic!("unexpected {other}"),
        }
        assert!(check_arity(&def, 1, &forms[1], &sources).is_ok());
    }
}
