//! Scans a module's top-level `import` / `export` declarations.
//!
//! ```text
//! (import [a b (c as d) e as f] from "./lib.sprig")
//! (import ns from "./lib.sprig")
//! (import "./setup.sprig")
//! (export [a b twice])
//! (export default expr)
//! ```

use crate::{
    errors::{CompileError, ErrorContext},
    macros::MacroRegistry,
    modules::ModuleId,
    source::SourceFile,
    syntax::{AstNode, Expr, Span},
};

#[derive(Debug, Clone, PartialEq)]
pub struct ImportBinding {
    pub imported: String,
    pub local: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportKind {
    Named(Vec<ImportBinding>),
    Namespace { alias: String },
    SideEffect,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSpec {
    /// The specifier as written in the source.
    pub specifier: String,
    pub kind: ImportKind,
    pub span: Span,
    /// Arena slot of the imported source module, once resolved. `None` for
    /// external JavaScript specifiers.
    pub target: Option<ModuleId>,
}

impl ImportSpec {
    pub fn bindings(&self) -> &[ImportBinding] {
        match &self.kind {
            ImportKind::Named(bindings) => bindings,
            _ => &[],
        }
    }
}

/// All declarations found at the top level of one module.
#[derive(Debug, Clone, Default)]
pub struct ModuleDecls {
    pub imports: Vec<ImportSpec>,
    pub exports: Vec<(String, Span)>,
    pub default_export: Option<Span>,
}

pub fn is_declaration(form: &AstNode) -> bool {
    matches!(form.value.head_symbol(), Some("import" | "export"))
}

/// Whether `specifier` names a source module rather than external JavaScript.
pub fn is_source_specifier(specifier: &str, extension: &str) -> bool {
    specifier
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext == extension)
}

pub fn scan_declarations(forms: &[AstNode], file: &SourceFile) -> Result<ModuleDecls, CompileError> {
    let mut decls = ModuleDecls::default();
    for form in forms {
        let Some(items) = form.value.as_list() else {
            continue;
        };
        match form.value.head_symbol() {
            Some("import") => decls.imports.push(parse_import(form, items, file)?),
            Some("export") => parse_export(form, items, file, &mut decls)?,
            _ => {}
        }
    }
    Ok(decls)
}

fn malformed(file: &SourceFile, at: &AstNode, expected: &str) -> CompileError {
    CompileError::Syntax {
        file: file.name.clone(),
        offset: at.span.start,
        expected: expected.to_string(),
        ctx: ErrorContext::at(file, at.span),
    }
}

fn string_literal(node: &AstNode) -> Option<&str> {
    match &*node.value {
        Expr::String(s) => Some(s),
        _ => None,
    }
}

fn parse_import(form: &AstNode, items: &[AstNode], file: &SourceFile) -> Result<ImportSpec, CompileError> {
    let spec = |specifier: &AstNode, kind| -> Result<ImportSpec, CompileError> {
        let specifier = string_literal(specifier)
            .ok_or_else(|| malformed(file, specifier, "an import path string"))?;
        Ok(ImportSpec {
            specifier: specifier.to_string(),
            kind,
            span: form.span,
            target: None,
        })
    };

    match items {
        [_, path] => spec(path, ImportKind::SideEffect),
        [_, what, from, path] if from.value.is_symbol("from") => {
            let kind = match &*what.value {
                Expr::Symbol(alias) => ImportKind::Namespace { alias: alias.clone() },
                Expr::Vector(bindings) => ImportKind::Named(parse_bindings(bindings, file)?),
                _ => return Err(malformed(file, what, "a namespace name or a vector of imported names")),
            };
            spec(path, kind)
        }
        [_, _, other, ..] => Err(malformed(file, other, "`from`")),
        _ => Err(malformed(file, form, "`(import [names] from \"path\")`")),
    }
}

fn parse_bindings(items: &[AstNode], file: &SourceFile) -> Result<Vec<ImportBinding>, CompileError> {
    let mut bindings = Vec::new();
    let mut i = 0;
    while i < items.len() {
        let item = &items[i];
        match &*item.value {
            Expr::Symbol(name) => {
                let aliased = items.get(i + 1).is_some_and(|n| n.value.is_symbol("as"));
                if aliased {
                    let alias = items
                        .get(i + 2)
                        .and_then(|n| n.value.as_symbol())
                        .ok_or_else(|| malformed(file, &items[i + 1], "an alias after `as`"))?;
                    bindings.push(ImportBinding {
                        imported: name.clone(),
                        local: alias.to_string(),
                        span: item.span.join(items[i + 2].span),
                    });
                    i += 3;
                } else {
                    bindings.push(ImportBinding {
                        imported: name.clone(),
                        local: name.clone(),
                        span: item.span,
                    });
                    i += 1;
                }
            }
            Expr::List(parts) => match parts.as_slice() {
                [name, as_kw, alias] if as_kw.value.is_symbol("as") => {
                    let (Some(name), Some(alias)) = (name.value.as_symbol(), alias.value.as_symbol()) else {
                        return Err(malformed(file, item, "`(name as alias)`"));
                    };
                    bindings.push(ImportBinding {
                        imported: name.to_string(),
                        local: alias.to_string(),
                        span: item.span,
                    });
                    i += 1;
                }
                _ => return Err(malformed(file, item, "`(name as alias)`")),
            },
            _ => return Err(malformed(file, item, "an imported name")),
        }
    }
    Ok(bindings)
}

fn parse_export(
    form: &AstNode,
    items: &[AstNode],
    file: &SourceFile,
    decls: &mut ModuleDecls,
) -> Result<(), CompileError> {
    match items {
        [_, kw, _value] if kw.value.is_symbol("default") => {
            if decls.default_export.is_some() {
                return Err(malformed(file, form, "at most one default export"));
            }
            decls.default_export = Some(form.span);
            Ok(())
        }
        [_, names] => {
            let Expr::Vector(names) = &*names.value else {
                return Err(malformed(file, names, "a vector of exported names"));
            };
            for name in names {
                let symbol = name
                    .value
                    .as_symbol()
                    .ok_or_else(|| malformed(file, name, "an exported name"))?;
                if !decls.exports.iter().any(|(n, _)| n == symbol) {
                    decls.exports.push((symbol.to_string(), name.span));
                }
            }
            Ok(())
        }
        _ => Err(malformed(file, form, "`(export [names])` or `(export default expr)`")),
    }
}

/// Rejects exported names bound both by a macro definition and by a value in
/// the same module. The export could only publish one of them.
pub fn check_export_kinds(
    forms: &[AstNode],
    exports: &[(String, Span)],
    macros: &MacroRegistry,
    file: &SourceFile,
) -> Result<(), CompileError> {
    let values = top_level_bindings(forms);
    for (name, export_span) in exports {
        let Some(def) = macros.get(name) else {
            continue;
        };
        let Some((_, value_span)) = values.iter().find(|(v, _)| v == name) else {
            continue;
        };
        let ctx = ErrorContext::at(file, *export_span)
            .with_help(format!("rename either the macro or the value so `{name}` names one thing"))
            .with_related(def.span, "macro defined here")
            .with_related(*value_span, "value bound here");
        return Err(CompileError::macro_definition(
            format!("`{name}` is exported but is both a macro and a value in {}", file.name),
            ctx,
        ));
    }
    Ok(())
}

/// Names bound at module level by `def`, `var`, `let` and `defn`, including
/// those inside top-level `do` forms.
pub fn top_level_bindings(forms: &[AstNode]) -> Vec<(String, Span)> {
    let mut out = Vec::new();
    for form in forms {
        collect_binding(form, &mut out);
    }
    out
}

fn collect_binding(form: &AstNode, out: &mut Vec<(String, Span)>) {
    let Some(items) = form.value.as_list() else {
        return;
    };
    match form.value.head_symbol() {
        Some("def" | "var" | "let" | "defn") => {
            if let Some(name) = items.get(1).and_then(|n| n.value.as_symbol()) {
                out.push((name.to_string(), items[1].span));
            }
        }
        Some("do") => {
            for item in &items[1..] {
                collect_binding(item, out);
            }
        }
        _ => {}
    }
}
