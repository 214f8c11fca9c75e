//! # Compilation Engine
//!
//! [`CompilationSession`] owns everything one compiler run accumulates: the
//! module graph and source map ([`Workspace`]), the session's global macro
//! tier, the expansion trace and the collected warnings. The module resolver
//! drives the pipeline and hands each module, in compilation order, to the
//! session's backend, which expands and generates it.
//!
//! The free functions at the bottom are the public entry points used by
//! adapters: [`compile_to_text`], [`compile_project`] and [`run`].

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    codegen::{generate_module, GeneratedModule, ModuleImport, ModuleInput},
    config::CompileOptions,
    errors::{CompileError, ErrorContext, Warning},
    macros::{
        collect_macro_definitions, std::register_std_macros, MacroExpander, MacroExpansionStep,
        MacroRegistry, MacroScope, Visibility,
    },
    modules::{
        decls::{check_export_kinds, is_source_specifier, scan_declarations},
        import_specifier, resolve, CompileEvent, DependencyEdge, FsLoader, ImportKind,
        MemoryLoader, ModuleArtifact, ModuleCompiler, ModuleId, ModuleRecord, SourceLoader,
        Workspace,
    },
    syntax::{read_all, AstNode},
};

pub use crate::syntax::is_source_language;

// ============================================================================
// SESSION
// ============================================================================

/// One generated module of a project.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub id: ModuleId,
    pub name: String,
    /// Output location relative to the output directory.
    pub output_path: PathBuf,
    pub artifact: Arc<ModuleArtifact>,
}

/// Expansion and generation state shared by every module of a session.
#[derive(Debug)]
struct Backend {
    options: CompileOptions,
    globals: MacroRegistry,
    trace: Vec<MacroExpansionStep>,
    warnings: Vec<Warning>,
}

pub struct CompilationSession<L: SourceLoader = FsLoader> {
    workspace: Workspace,
    loader: L,
    backend: Backend,
}

impl CompilationSession<FsLoader> {
    /// A session reading modules from the file system.
    pub fn new(options: CompileOptions) -> Result<Self, CompileError> {
        Self::with_loader(FsLoader, options)
    }
}

impl<L: SourceLoader> CompilationSession<L> {
    pub fn with_loader(loader: L, options: CompileOptions) -> Result<Self, CompileError> {
        let mut workspace = Workspace::default();
        let mut globals = MacroRegistry::new();
        if options.include_prelude {
            register_std_macros(&mut globals, &mut workspace.sources)?;
        }
        Ok(Self {
            workspace,
            loader,
            backend: Backend {
                options,
                globals,
                trace: Vec::new(),
                warnings: Vec::new(),
            },
        })
    }

    /// Fixes the directory module names and output paths are relative to.
    /// Without it the first entry's directory is used.
    pub fn set_root(&mut self, dir: &Path) -> Result<(), CompileError> {
        let canonical = self.loader.canonicalize(dir).map_err(|error| CompileError::Io {
            path: dir.display().to_string(),
            error,
        })?;
        self.workspace.graph.set_root_once(&canonical);
        Ok(())
    }

    /// Resolves, expands and generates every module reachable from `entry`.
    /// Modules already compiled in this session are reused.
    pub fn compile(&mut self, entry: impl AsRef<Path>) -> Result<Vec<CompiledModule>, CompileError> {
        let extension = self.backend.options.source_extension.clone();
        let order = resolve(
            &mut self.workspace,
            &mut self.loader,
            &extension,
            &mut self.backend,
            entry.as_ref(),
        )?;
        Ok(order
            .into_iter()
            .filter_map(|id| {
                let record = self.workspace.graph.get(id);
                let artifact = record.output.clone()?;
                Some(CompiledModule {
                    id,
                    name: record.name(),
                    output_path: record.output_path(),
                    artifact,
                })
            })
            .collect())
    }

    /// Compiles a single source text without resolving its imports. Source
    /// module imports become ES imports of the corresponding `.js` file.
    pub fn compile_source(&mut self, name: &str, text: &str) -> Result<ModuleArtifact, CompileError> {
        let file = self.workspace.sources.add(name, text);
        let forms = read_all(&file)?;
        let decls = scan_declarations(&forms, &file)?;
        let local = collect_macro_definitions(&forms, &file, name)?;
        check_export_kinds(&forms, &decls.exports, &local, &file)?;
        let imported = MacroRegistry::new();
        let expanded = self.backend.expand(&self.workspace, &local, &imported, &forms)?;

        let extension = &self.backend.options.source_extension;
        let imports = decls
            .imports
            .iter()
            .map(|import| ModuleImport {
                specifier: if is_source_specifier(&import.specifier, extension) {
                    with_js_extension(&import.specifier)
                } else {
                    import.specifier.clone()
                },
                kind: import.kind.clone(),
            })
            .collect();
        let (value_exports, macro_exports): (Vec<_>, Vec<_>) =
            decls.exports.into_iter().partition(|(n, _)| !local.contains(n));

        let mut output_path = PathBuf::from(name);
        output_path.set_extension("js");
        let input = ModuleInput {
            file: &file,
            module: name.to_string(),
            output_path,
            forms: &expanded,
            imports,
            value_exports,
            macro_exports: macro_exports.into_iter().map(|(n, _)| n).collect(),
            macro_names: self.backend.visible_macro_names(&local, &imported),
        };
        let generated = generate_module(&input, &self.backend.options)?;
        self.backend.publish_globals(&local);
        Ok(self.backend.finish(generated))
    }

    /// Macro-expands a single source text, recording the expansion trace.
    pub fn expand_source(&mut self, name: &str, text: &str) -> Result<Vec<AstNode>, CompileError> {
        let file = self.workspace.sources.add(name, text);
        let forms = read_all(&file)?;
        let local = collect_macro_definitions(&forms, &file, name)?;
        let expanded = self.backend.expand(&self.workspace, &local, &MacroRegistry::new(), &forms)?;
        self.backend.publish_globals(&local);
        Ok(expanded)
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn options(&self) -> &CompileOptions {
        &self.backend.options
    }

    pub fn events(&self) -> &[CompileEvent] {
        &self.workspace.events
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.backend.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.backend.warnings)
    }

    /// Every macro rewrite performed in this session, in order.
    pub fn trace(&self) -> &[MacroExpansionStep] {
        &self.backend.trace
    }

    /// Global macros currently visible to every module.
    pub fn global_macros(&self) -> &MacroRegistry {
        &self.backend.globals
    }

    pub fn module(&self, path: &Path) -> Option<&ModuleRecord> {
        let canonical = self.loader.canonicalize(path).ok()?;
        let id = self.workspace.graph.lookup(&canonical)?;
        Some(self.workspace.graph.get(id))
    }
}

// ============================================================================
// BACKEND - expansion and generation of one module
// ============================================================================

impl Backend {
    fn expand(
        &mut self,
        ws: &Workspace,
        local: &MacroRegistry,
        imported: &MacroRegistry,
        forms: &[AstNode],
    ) -> Result<Vec<AstNode>, CompileError> {
        let scope = MacroScope::new(local, imported, &self.globals);
        let mut expander =
            MacroExpander::new(scope, &ws.sources).with_max_depth(self.options.max_expansion_depth);
        let expanded = expander.expand_program(forms)?;
        self.trace.extend(expander.into_trace());
        Ok(expanded)
    }

    /// `Global` macros defined by a module become visible to every module
    /// compiled after it.
    fn publish_globals(&mut self, local: &MacroRegistry) {
        for (name, def) in local.iter() {
            if def.visibility == Visibility::Global {
                self.globals.register(name, Arc::clone(def));
            }
        }
    }

    fn visible_macro_names(&self, local: &MacroRegistry, imported: &MacroRegistry) -> HashSet<String> {
        local
            .names()
            .into_iter()
            .chain(imported.names())
            .chain(self.globals.names())
            .map(str::to_string)
            .collect()
    }

    fn finish(&mut self, generated: GeneratedModule) -> ModuleArtifact {
        self.warnings.extend(generated.warnings);
        generated.artifact
    }
}

impl ModuleCompiler for Backend {
    fn compile_module(&mut self, ws: &mut Workspace, id: ModuleId) -> Result<(), CompileError> {
        let record = ws.graph.get(id);
        if record.output.is_some() {
            return Ok(());
        }
        let name = record.name();
        let Some(file) = record.source.clone() else {
            return Err(CompileError::generation(
                format!("{name} was never read"),
                ErrorContext::none(),
            ));
        };

        // Step 1: Macros imported by name through direct edges, under their local aliases.
        let mut imported = MacroRegistry::new();
        for import in &record.imports {
            let Some(target) = import.target else {
                continue;
            };
            if !record.edges.contains(&DependencyEdge::Direct(target)) {
                continue;
            }
            for binding in import.bindings() {
                if let Some(def) = ws.graph.get(target).exported_macro(&binding.imported) {
                    imported.register(&binding.local, Arc::clone(def));
                }
            }
        }

        // Step 2: Expand with local ∪ imported ∪ global.
        let trace_start = self.trace.len();
        let expanded = self.expand(ws, &record.macros, &imported, &record.forms)?;
        let steps = self.trace.len() - trace_start;

        // Step 3: Generate.
        let input = ModuleInput {
            file: &file,
            module: name.clone(),
            output_path: record.output_path(),
            forms: &expanded,
            imports: generated_imports(ws, id),
            value_exports: record
                .value_exports
                .iter()
                .map(|e| (e.name.clone(), e.span))
                .collect(),
            macro_exports: record.macro_exports.iter().map(|e| e.name.clone()).collect(),
            macro_names: self.visible_macro_names(&record.macros, &imported),
        };
        let generated = generate_module(&input, &self.options)?;
        let locals = record.macros.clone();
        let artifact = self.finish(generated);

        // Step 4: Publish globals and store the artifact.
        self.publish_globals(&locals);
        let record = ws.graph.get_mut(id);
        record.expanded = expanded;
        record.output = Some(Arc::new(artifact));
        ws.events.push(CompileEvent::Expanded {
            module: name.clone(),
            steps,
        });
        ws.events.push(CompileEvent::Generated { module: name });
        Ok(())
    }
}

/// The module's imports as they appear in its generated code: specifiers of
/// source modules point at their generated files and macro bindings are
/// dropped.
fn generated_imports(ws: &Workspace, id: ModuleId) -> Vec<ModuleImport> {
    let record = ws.graph.get(id);
    let from = record.output_path();
    record
        .imports
        .iter()
        .map(|import| {
            let Some(target_id) = import.target else {
                return ModuleImport {
                    specifier: import.specifier.clone(),
                    kind: import.kind.clone(),
                };
            };
            let target = ws.graph.get(target_id);
            let kind = match &import.kind {
                ImportKind::Named(bindings) => {
                    let values: Vec<_> = bindings
                        .iter()
                        .filter(|b| target.exported_macro(&b.imported).is_none())
                        .cloned()
                        .collect();
                    if values.is_empty() {
                        ImportKind::SideEffect
                    } else {
                        ImportKind::Named(values)
                    }
                }
                other => other.clone(),
            };
            ModuleImport {
                specifier: import_specifier(&from, &target.output_path()),
                kind,
            }
        })
        .collect()
}

fn with_js_extension(specifier: &str) -> String {
    match specifier.rsplit_once('.') {
        Some((stem, _)) => format!("{stem}.js"),
        None => format!("{specifier}.js"),
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Compiles one source text to JavaScript. Imports are not resolved.
pub fn compile_to_text(source: &str, options: &CompileOptions) -> Result<String, CompileError> {
    let mut session = CompilationSession::with_loader(MemoryLoader::new(), options.clone())?;
    Ok(session.compile_source("<input>", source)?.text)
}

/// Compiles the project rooted at `entry`, returning its modules in
/// compilation order.
pub fn compile_project(entry: &Path, options: &CompileOptions) -> Result<Vec<CompiledModule>, CompileError> {
    CompilationSession::new(options.clone())?.compile(entry)
}

/// Executes generated program text in some host environment.
pub trait EvaluationAdapter {
    fn evaluate(&mut self, program: &str) -> Result<(), String>;
}

#[derive(Default)]
pub struct RunOptions<'a> {
    pub compile: CompileOptions,
    pub adapter: Option<&'a mut dyn EvaluationAdapter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The adapter ran the program.
    Evaluated(String),
    /// The adapter rejected the program.
    Failed { program: String, message: String },
    /// No adapter was supplied; the caller evaluates the program itself.
    Unevaluated(String),
}

/// Compiles `source` with the runtime helpers inlined and hands the program to
/// the adapter, if any.
pub fn run(source: &str, options: RunOptions<'_>) -> Result<RunOutcome, CompileError> {
    let compile = CompileOptions {
        inline_runtime: true,
        ..options.compile
    };
    let program = compile_to_text(source, &compile)?;
    Ok(match options.adapter {
        None => RunOutcome::Unevaluated(program),
        Some(adapter) => match adapter.evaluate(&program) {
            Ok(()) => RunOutcome::Evaluated(program),
            Err(message) => RunOutcome::Failed { program, message },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(files: &[(&str, &str)]) -> CompilationSession<MemoryLoader> {
        let mut loader = MemoryLoader::new();
        for (path, text) in files {
            loader.add_file(path, *text);
        }
        CompilationSession::with_loader(loader, CompileOptions::default()).unwrap()
    }

    fn text_of<'m>(modules: &'m [CompiledModule], name: &str) -> &'m str {
        &modules.iter().find(|m| m.name == name).unwrap().artifact.text
    }

    #[test]
    fn imported_function_is_called() {
        let mut s = session(&[
            ("/p/math.sprig", "(defn add (a b) (+ a b)) (export [add])"),
            ("/p/main.sprig", r#"(import [add] from "./math.sprig") (def r (add 5 3))"#),
        ]);
        let modules = s.compile("/p/main.sprig").unwrap();
        assert_eq!(modules.len(), 2);
        let main = text_of(&modules, "main.sprig");
        assert!(main.contains("import { add } from \"./math.js\";"), "{main}");
        assert!(main.contains("const r = add(5, 3);"));
        assert!(s.warnings().is_empty());
    }

    #[test]
    fn imported_macro_expands_and_is_not_imported_at_runtime() {
        let mut s = session(&[
            ("/p/lib.sprig", "(defmacro twice (x) (list '+ x x)) (export [twice])"),
            ("/p/main.sprig", r#"(import [twice] from "./lib.sprig") (def ten (twice 5))"#),
        ]);
        let modules = s.compile("/p/main.sprig").unwrap();
        let main = text_of(&modules, "main.sprig");
        assert!(main.contains("const ten = 5 + 5;"), "{main}");
        assert!(main.contains("import \"./lib.js\";"));
        assert_eq!(s.trace().len(), 1);
    }

    #[test]
    fn global_macros_reach_later_modules() {
        let mut s = session(&[
            ("/p/defs.sprig", "(macro unless2 (c x) `(if ~c nil ~x))"),
            ("/p/use.sprig", "(def y (unless2 false 1))"),
            ("/p/main.sprig", r#"(import "./defs.sprig") (import "./use.sprig")"#),
        ]);
        let modules = s.compile("/p/main.sprig").unwrap();
        assert!(text_of(&modules, "use.sprig").contains("const y = false ? null : 1;"));
        assert!(s.global_macros().contains("unless2"));
    }

    #[test]
    fn second_compile_reuses_artifacts() {
        let mut s = session(&[("/p/a.sprig", "(def a 1) (export [a])")]);
        let first = s.compile("/p/a.sprig").unwrap();
        let second = s.compile("/p/a.sprig").unwrap();
        assert!(Arc::ptr_eq(&first[0].artifact, &second[0].artifact));
        assert_eq!(s.loader().read_count("/p/a.sprig"), 1);
    }

    #[test]
    fn compile_to_text_rewrites_source_imports() {
        let text = compile_to_text(
            r#"(import [x] from "./lib.sprig") (import [y] from "react") (f x y)"#,
            &CompileOptions::default(),
        )
        .unwrap();
        assert!(text.contains("import { x } from \"./lib.js\";"));
        assert!(text.contains("import { y } from \"react\";"));
    }

    struct Capture(Vec<String>);

    impl EvaluationAdapter for Capture {
        fn evaluate(&mut self, program: &str) -> Result<(), String> {
            self.0.push(program.to_string());
            Ok(())
        }
    }

    #[test]
    fn run_hands_program_to_adapter() {
        let mut capture = Capture(Vec::new());
        let outcome = run(
            "(console.log (str \"hi\"))",
            RunOptions {
                adapter: Some(&mut capture),
                ..RunOptions::default()
            },
        )
        .unwrap();
        assert!(matches!(outcome, RunOutcome::Evaluated(_)));
        assert!(capture.0[0].contains("function __sprig_str"));

        let outcome = run("(+ 1 2)", RunOptions::default()).unwrap();
        assert!(matches!(outcome, RunOutcome::Unevaluated(ref t) if t.contains("1 + 2")));
    }
}
