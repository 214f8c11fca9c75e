//! # Code Generation
//!
//! Lowers one fully expanded module to ES module text plus its export
//! manifest. Generation is syntax directed: every special form has a fixed
//! translation in [`expr`], everything else is a call.
//!
//! ## Module layout
//!
//! ```text
//! // Generated by sprig from main.sprig
//! import { __sprig_get } from "./sprig-runtime.js";
//! import { add } from "./math.js";
//!
//! <statements>
//!
//! export { add, double_five as "double-five" };
//! export default { "add": add, "double-five": double_five };
//! ```
//!
//! Value exports use ES string export names so source names survive
//! mangling. Without an explicit `(export default ..)` the default export is
//! an aggregate object of exactly the declared value exports.

use std::{
    collections::{BTreeSet, HashSet},
    path::{Component, Path, PathBuf},
};

use crate::{
    config::CompileOptions,
    errors::{CompileError, ErrorContext, Warning},
    macros::is_macro_definition,
    modules::{ImportKind, ModuleArtifact, ModuleManifest},
    source::SourceFile,
    syntax::{AstNode, Span},
};

mod expr;
pub mod names;
pub mod runtime;
mod scope;

pub use names::{export_name, js_string, mangle};
pub use runtime::runtime_module_source;

use scope::{BindingKind, Scopes};

/// An import as it appears in generated code.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleImport {
    /// Specifier of the generated target module, or an external specifier as
    /// written.
    pub specifier: String,
    /// Bindings that name macros are already removed.
    pub kind: ImportKind,
}

/// Everything the generator needs to know about one module.
#[derive(Debug)]
pub struct ModuleInput<'a> {
    pub file: &'a SourceFile,
    pub module: String,
    /// Output location relative to the output directory.
    pub output_path: PathBuf,
    /// Fully expanded top-level forms.
    pub forms: &'a [AstNode],
    pub imports: Vec<ModuleImport>,
    pub value_exports: Vec<(String, Span)>,
    pub macro_exports: Vec<String>,
    /// Every macro name visible to the module. Such names are never reported
    /// as unresolved.
    pub macro_names: HashSet<String>,
}

#[derive(Debug)]
pub struct GeneratedModule {
    pub artifact: ModuleArtifact,
    pub warnings: Vec<Warning>,
}

pub(crate) struct Generator<'a> {
    file: &'a SourceFile,
    module: &'a str,
    macro_names: &'a HashSet<String>,
    scopes: Scopes,
    helpers: BTreeSet<&'static str>,
    warnings: Vec<Warning>,
    warned: HashSet<String>,
}

impl<'a> Generator<'a> {
    fn new(input: &'a ModuleInput<'a>) -> Self {
        Self {
            file: input.file,
            module: &input.module,
            macro_names: &input.macro_names,
            scopes: Scopes::default(),
            helpers: BTreeSet::new(),
            warnings: Vec::new(),
            warned: HashSet::new(),
        }
    }

    fn use_helper(&mut self, name: &'static str) -> &'static str {
        self.helpers.insert(name);
        name
    }
}

pub fn generate_module(input: &ModuleInput<'_>, options: &CompileOptions) -> Result<GeneratedModule, CompileError> {
    let mut gen = Generator::new(input);

    for import in &input.imports {
        match &import.kind {
            ImportKind::Named(bindings) => {
                for binding in bindings {
                    gen.scopes.declare(&binding.local, BindingKind::Import);
                }
            }
            ImportKind::Namespace { alias } => gen.scopes.declare(alias, BindingKind::Namespace),
            ImportKind::SideEffect => {}
        }
    }
    for (name, _) in crate::modules::decls::top_level_bindings(input.forms) {
        gen.scopes.declare(&name, BindingKind::Module);
    }
    for (name, span) in &input.value_exports {
        if !gen.scopes.is_bound(name) {
            return Err(CompileError::UnknownExport {
                module: input.module.clone(),
                name: name.clone(),
                ctx: ErrorContext::at(input.file, *span)
                    .with_help("define it with `def` or `defn`, or import it, before exporting it"),
            });
        }
    }

    let mut body = Vec::new();
    let mut default_export = None;
    for form in input.forms {
        if is_macro_definition(form).is_some() {
            continue;
        }
        match form.value.head_symbol() {
            Some("import") => {}
            Some("export") => {
                if let Some([_, kw, value]) = form.value.as_list() {
                    if kw.value.is_symbol("default") {
                        default_export = Some(gen.expression(value)?);
                    }
                }
            }
            _ => body.extend(gen.statement(form)?),
        }
    }

    let text = render(input, options, &gen.helpers, &body, default_export.as_deref());
    let manifest = ModuleManifest {
        module: input.module.clone(),
        output_path: slash_path(&input.output_path),
        exports: input.value_exports.iter().map(|(n, _)| n.clone()).collect(),
        macros: input.macro_exports.clone(),
        has_default_export: default_export.is_some(),
        imports: input.imports.iter().map(|i| i.specifier.clone()).collect(),
        runtime_helpers: gen.helpers.iter().map(|h| h.to_string()).collect(),
    };
    Ok(GeneratedModule {
        artifact: ModuleArtifact { text, manifest },
        warnings: gen.warnings,
    })
}

fn render(
    input: &ModuleInput<'_>,
    options: &CompileOptions,
    helpers: &BTreeSet<&'static str>,
    body: &[String],
    default_export: Option<&str>,
) -> String {
    let mut out = format!("// Generated by sprig from {}\n", input.module);

    if !helpers.is_empty() {
        if options.inline_runtime {
            for name in helpers {
                if let Some(source) = runtime::helper_source(name) {
                    out.push_str(source);
                    out.push('\n');
                }
            }
        } else {
            let names: Vec<&str> = helpers.iter().copied().collect();
            out.push_str(&format!(
                "import {{ {} }} from {};\n",
                names.join(", "),
                js_string(&runtime_specifier(&options.runtime_module, &input.output_path))
            ));
        }
    }
    for import in &input.imports {
        out.push_str(&import_line(import));
        out.push('\n');
    }

    if !body.is_empty() {
        out.push('\n');
        out.push_str(&body.join("\n"));
        out.push('\n');
    }

    out.push('\n');
    if !input.value_exports.is_empty() {
        let names: Vec<String> = input
            .value_exports
            .iter()
            .map(|(name, _)| {
                let local = mangle(name);
                let external = export_name(name);
                if local == external {
                    local
                } else {
                    format!("{local} as {external}")
                }
            })
            .collect();
        out.push_str(&format!("export {{ {} }};\n", names.join(", ")));
    }
    match default_export {
        Some(expr) => out.push_str(&format!("export default {expr};\n")),
        None => {
            let entries: Vec<String> = input
                .value_exports
                .iter()
                .map(|(name, _)| format!("{}: {}", js_string(name), mangle(name)))
                .collect();
            if entries.is_empty() {
                out.push_str("export default {};\n");
            } else {
                out.push_str(&format!("export default {{ {} }};\n", entries.join(", ")));
            }
        }
    }
    out
}

fn import_line(import: &ModuleImport) -> String {
    let from = js_string(&import.specifier);
    match &import.kind {
        ImportKind::Named(bindings) if !bindings.is_empty() => {
            let names: Vec<String> = bindings
                .iter()
                .map(|b| {
                    let external = export_name(&b.imported);
                    let local = mangle(&b.local);
                    if external == local {
                        local
                    } else {
                        format!("{external} as {local}")
                    }
                })
                .collect();
            format!("import {{ {} }} from {from};", names.join(", "))
        }
        ImportKind::Namespace { alias } => format!("import * as {} from {from};", mangle(alias)),
        _ => format!("import {from};"),
    }
}

/// The runtime specifier as seen from a module generated at `output_path`.
/// Relative specifiers are taken relative to the output directory.
pub fn runtime_specifier(runtime_module: &str, output_path: &Path) -> String {
    let depth = output_path
        .parent()
        .map(|p| p.components().filter(|c| matches!(c, Component::Normal(_))).count())
        .unwrap_or(0);
    if depth == 0 {
        return runtime_module.to_string();
    }
    let up = "../".repeat(depth);
    if let Some(rest) = runtime_module.strip_prefix("./") {
        format!("{up}{rest}")
    } else if runtime_module.starts_with("../") {
        format!("{up}{runtime_module}")
    } else {
        runtime_module.to_string()
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modules::ImportBinding,
        source::SourceMap,
        syntax::{read_all, Span},
    };

    fn generate_with(src: &str, setup: impl FnOnce(&mut ModuleInput<'_>)) -> Result<GeneratedModule, CompileError> {
        let mut sources = SourceMap::new();
        let file = sources.add("main.sprig", src);
        let forms = read_all(&file).unwrap();
        let decls = crate::modules::decls::scan_declarations(&forms, &file).unwrap();
        let mut input = ModuleInput {
            file: &file,
            module: "main.sprig".to_string(),
            output_path: PathBuf::from("main.js"),
            forms: &forms,
            imports: Vec::new(),
            value_exports: decls.exports,
            macro_exports: Vec::new(),
            macro_names: HashSet::new(),
        };
        setup(&mut input);
        generate_module(&input, &CompileOptions::default())
    }

    fn generate(src: &str) -> GeneratedModule {
        generate_with(src, |_| {}).unwrap()
    }

    #[test]
    fn exports_use_string_names_and_aggregate_default() {
        let out = generate("(defn add (a b) (+ a b)) (def double-five 10) (export [add double-five])");
        let text = &out.artifact.text;
        assert!(text.contains("function add(a, b) {\n  return (a + b);\n}"), "{text}");
        assert!(text.contains("const double_five = 10;"));
        assert!(text.contains("export { add, double_five as \"double-five\" };"));
        assert!(text.contains("export default { \"add\": add, \"double-five\": double_five };"));
        assert_eq!(out.artifact.manifest.exports, vec!["add", "double-five"]);
        assert!(!out.artifact.manifest.has_default_export);
    }

    #[test]
    fn nothing_exported_yields_empty_default() {
        let out = generate("(def x 1)");
        assert!(out.artifact.text.ends_with("export default {};\n"));
    }

    #[test]
    fn explicit_default_replaces_aggregate() {
        let out = generate("(def x 1) (export default (fn () x))");
        assert!(out.artifact.text.contains("export default function () {\n  return x;\n};"));
        assert!(out.artifact.manifest.has_default_export);
    }

    #[test]
    fn exporting_an_undefined_name_fails() {
        let err = generate_with("(export [ghost])", |_| {}).unwrap_err();
        assert!(matches!(err, CompileError::UnknownExport { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn imports_render_with_aliases() {
        let out = generate_with("(f double-five m)", |input| {
            input.imports = vec![
                ModuleImport {
                    specifier: "./math.js".into(),
                    kind: ImportKind::Named(vec![
                        ImportBinding {
                            imported: "add".into(),
                            local: "f".into(),
                            span: Span::default(),
                        },
                        ImportBinding {
                            imported: "double-five".into(),
                            local: "double-five".into(),
                            span: Span::default(),
                        },
                    ]),
                },
                ModuleImport {
                    specifier: "./m.js".into(),
                    kind: ImportKind::Namespace { alias: "m".into() },
                },
            ];
        })
        .unwrap();
        let text = &out.artifact.text;
        assert!(text.contains("import { add as f, \"double-five\" as double_five } from \"./math.js\";"), "{text}");
        assert!(text.contains("import * as m from \"./m.js\";"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn runtime_helpers_are_imported_relative_to_the_module() {
        let out = generate_with("(get {} :a)", |input| input.output_path = PathBuf::from("lib/deep/x.js")).unwrap();
        assert!(out
            .artifact
            .text
            .contains("import { __sprig_get } from \"../../sprig-runtime.js\";"));
        assert_eq!(out.artifact.manifest.runtime_helpers, vec!["__sprig_get"]);
        assert_eq!(out.artifact.manifest.output_path, "lib/deep/x.js");
    }

    #[test]
    fn inline_runtime_embeds_helpers() {
        let mut sources = SourceMap::new();
        let file = sources.add("main.sprig", "(str \"a\" 1)");
        let forms = read_all(&file).unwrap();
        let input = ModuleInput {
            file: &file,
            module: "main.sprig".into(),
            output_path: PathBuf::from("main.js"),
            forms: &forms,
            imports: Vec::new(),
            value_exports: Vec::new(),
            macro_exports: Vec::new(),
            macro_names: HashSet::new(),
        };
        let options = CompileOptions {
            inline_runtime: true,
            ..CompileOptions::default()
        };
        let out = generate_module(&input, &options).unwrap();
        assert!(out.artifact.text.contains("function __sprig_str(...parts)"));
        assert!(!out.artifact.text.contains("sprig-runtime.js"));
    }

    #[test]
    fn macro_definitions_and_declarations_are_not_emitted() {
        let out = generate("(defmacro twice (x) (list '+ x x)) (import \"./setup.js\") (def y 2)");
        let text = &out.artifact.text;
        assert!(!text.contains("twice"));
        assert!(text.contains("const y = 2;"));
    }

    #[test]
    fn runtime_specifier_depth() {
        assert_eq!(runtime_specifier("./rt.js", Path::new("a.js")), "./rt.js");
        assert_eq!(runtime_specifier("./rt.js", Path::new("x/a.js")), "../rt.js");
        assert_eq!(runtime_specifier("@sprig/runtime", Path::new("x/a.js")), "@sprig/runtime");
    }
}
