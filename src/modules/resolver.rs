//! Depth-first module discovery with deferred cyclic edges.
//!
//! A module is marked `Resolving`, read, and scanned for declarations and
//! macro definitions. Each imported source module is then visited in source
//! order. Reaching a module that is still `Resolving` closes a cycle, and that
//! edge is recorded as deferred instead of recursing. Once every direct import
//! is resolved the module's import bindings are checked, its export sets are
//! computed, and it is handed to the [`ModuleCompiler`].

use std::path::Path;

use crate::{
    errors::{CompileError, ErrorContext, ImportFailure},
    macros::{collect_macro_definitions, Visibility},
    modules::{
        decls::{check_export_kinds, is_source_specifier, scan_declarations, ImportKind, ImportSpec},
        CompileEvent, DependencyEdge, MacroExport, ModuleGraph, ModuleId, ResolutionState,
        SourceLoader, ValueExport,
    },
    source::{SourceFile, SourceMap},
    syntax::read_all,
};

/// Everything a session accumulates while resolving modules.
#[derive(Debug, Default)]
pub struct Workspace {
    pub graph: ModuleGraph,
    pub sources: SourceMap,
    pub events: Vec<CompileEvent>,
}

/// Expands and generates one module. Called exactly once per module, after
/// all of its direct imports have been compiled.
pub trait ModuleCompiler {
    fn compile_module(&mut self, ws: &mut Workspace, id: ModuleId) -> Result<(), CompileError>;
}

/// Resolves and compiles everything reachable from `entry`, returning the
/// modules in compilation order.
pub fn resolve(
    ws: &mut Workspace,
    loader: &mut dyn SourceLoader,
    extension: &str,
    compiler: &mut dyn ModuleCompiler,
    entry: &Path,
) -> Result<Vec<ModuleId>, CompileError> {
    let canonical = loader.canonicalize(entry).map_err(|error| CompileError::Io {
        path: entry.display().to_string(),
        error,
    })?;
    if let Some(dir) = canonical.parent() {
        ws.graph.set_root_once(dir);
    }
    let mut resolver = Resolver {
        ws,
        loader,
        extension,
        compiler,
    };
    let id = resolver.visit(&canonical)?;
    Ok(resolver.ws.graph.compilation_order(id))
}

struct Resolver<'r> {
    ws: &'r mut Workspace,
    loader: &'r mut dyn SourceLoader,
    extension: &'r str,
    compiler: &'r mut dyn ModuleCompiler,
}

impl Resolver<'_> {
    fn visit(&mut self, path: &Path) -> Result<ModuleId, CompileError> {
        let id = self.ws.graph.intern(path);
        match self.ws.graph.get(id).state {
            ResolutionState::Resolved => {
                let module = self.ws.graph.get(id).name();
                self.ws.events.push(CompileEvent::CacheHit { module });
                return Ok(id);
            }
            ResolutionState::Failed => self.ws.graph.reset(id),
            ResolutionState::Unresolved | ResolutionState::Resolving => {}
        }

        self.ws.graph.get_mut(id).state = ResolutionState::Resolving;
        match self.resolve_module(id) {
            Ok(()) => {
                self.ws.graph.get_mut(id).state = ResolutionState::Resolved;
                Ok(id)
            }
            Err(err) => {
                self.ws.graph.get_mut(id).state = ResolutionState::Failed;
                Err(err)
            }
        }
    }

    fn resolve_module(&mut self, id: ModuleId) -> Result<(), CompileError> {
        let path = self.ws.graph.get(id).path.clone();
        let name = self.ws.graph.get(id).name();

        let text = self.loader.load(&path).map_err(|error| CompileError::Io {
            path: path.display().to_string(),
            error,
        })?;
        let file = self.ws.sources.add(name.clone(), text);
        self.ws.events.push(CompileEvent::Read { module: name.clone() });

        let forms = read_all(&file)?;
        let decls = scan_declarations(&forms, &file)?;
        let macros = collect_macro_definitions(&forms, &file, &name)?;
        check_export_kinds(&forms, &decls.exports, &macros, &file)?;
        {
            let record = self.ws.graph.get_mut(id);
            record.source = Some(file.clone());
            record.forms = forms;
            record.imports = decls.imports;
            record.declared_exports = decls.exports;
            record.default_export = decls.default_export;
            record.macros = macros;
        }

        let base = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        let imports = self.ws.graph.get(id).imports.clone();
        for (index, import) in imports.iter().enumerate() {
            if !is_source_specifier(&import.specifier, self.extension) {
                continue;
            }
            let canonical = self
                .loader
                .canonicalize(&base.join(&import.specifier))
                .map_err(|_| import_error(&file, &name, import, None, ImportFailure::NotFound))?;
            let target = self.ws.graph.intern(&canonical);
            let edge = if self.ws.graph.get(target).state == ResolutionState::Resolving {
                let to = self.ws.graph.get(target).name();
                self.ws.events.push(CompileEvent::Deferred { from: name.clone(), to });
                DependencyEdge::Deferred(target)
            } else {
                self.visit(&canonical)?;
                DependencyEdge::Direct(target)
            };
            let record = self.ws.graph.get_mut(id);
            record.edges.push(edge);
            record.imports[index].target = Some(target);
        }

        bind_imports(&self.ws.graph, id, &file)?;
        compute_exports(&mut self.ws.graph, id);
        self.compiler.compile_module(self.ws, id)
    }
}

/// Checks every named import against the target's declared exports.
fn bind_imports(graph: &ModuleGraph, id: ModuleId, file: &SourceFile) -> Result<(), CompileError> {
    let record = graph.get(id);
    let name = record.name();
    for import in &record.imports {
        let Some(target_id) = import.target else {
            continue;
        };
        let target = graph.get(target_id);
        let deferred = record.edges.contains(&DependencyEdge::Deferred(target_id));
        for binding in import.bindings() {
            let declared = target.declared_exports.iter().any(|(n, _)| n == &binding.imported);
            if !declared {
                let mut err = import_error(file, &name, import, Some(&binding.imported), ImportFailure::MissingExport);
                if let CompileError::UnresolvedImport { ctx, .. } = &mut err {
                    ctx.span = Some(binding.span);
                    let exported: Vec<&str> = target.declared_exports.iter().map(|(n, _)| n.as_str()).collect();
                    ctx.help = Some(if exported.is_empty() {
                        format!("{} exports nothing", target.name())
                    } else {
                        format!("{} exports: {}", target.name(), exported.join(", "))
                    });
                }
                return Err(err);
            }
            if deferred && target.macros.contains(&binding.imported) {
                let mut err = import_error(file, &name, import, Some(&binding.imported), ImportFailure::UndeferrableCycle);
                if let CompileError::UnresolvedImport { ctx, .. } = &mut err {
                    ctx.span = Some(binding.span);
                    ctx.help = Some(format!(
                        "`{}` is a macro and {} is still being compiled; move the macro into a module outside the cycle",
                        binding.imported,
                        target.name()
                    ));
                }
                return Err(err);
            }
        }
    }
    Ok(())
}

/// Splits a module's declared exports into macro and value exports.
fn compute_exports(graph: &mut ModuleGraph, id: ModuleId) {
    let record = graph.get(id);
    let mut values = Vec::new();
    let mut macros = Vec::new();
    for (name, span) in &record.declared_exports {
        if let Some(def) = record.macros.get(name) {
            let definition = match def.visibility {
                Visibility::Local => def.with_visibility(Visibility::Exported),
                Visibility::Exported | Visibility::Global => def.clone(),
            };
            macros.push(MacroExport {
                name: name.clone(),
                definition,
            });
            continue;
        }
        let reexported = record.imports.iter().find_map(|import| {
            let target = import.target?;
            let binding = import.bindings().iter().find(|b| &b.local == name)?;
            graph.get(target).exported_macro(&binding.imported).cloned()
        });
        match reexported {
            Some(definition) => macros.push(MacroExport {
                name: name.clone(),
                definition,
            }),
            None => values.push(ValueExport {
                name: name.clone(),
                span: *span,
            }),
        }
    }
    let record = graph.get_mut(id);
    record.value_exports = values;
    record.macro_exports = macros;
}

fn import_error(
    file: &SourceFile,
    importer: &str,
    import: &ImportSpec,
    name: Option<&str>,
    reason: ImportFailure,
) -> CompileError {
    let exported_name = match (name, &import.kind) {
        (Some(name), _) => name.to_string(),
        (None, ImportKind::Named(bindings)) => bindings
            .iter()
            .map(|b| b.imported.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        (None, ImportKind::Namespace { alias }) => format!("* as {alias}"),
        (None, ImportKind::SideEffect) => "*".to_string(),
    };
    CompileError::UnresolvedImport {
        importer: importer.to_string(),
        exported_name,
        source_path: import.specifier.clone(),
        reason,
        ctx: ErrorContext::at(file, import.span),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::MemoryLoader;

    /// Records the order modules are handed over for compilation.
    #[derive(Default)]
    struct Recorder {
        compiled: Vec<String>,
    }

    impl ModuleCompiler for Recorder {
        fn compile_module(&mut self, ws: &mut Workspace, id: ModuleId) -> Result<(), CompileError> {
            self.compiled.push(ws.graph.get(id).name());
            Ok(())
        }
    }

    fn run(loader: &mut MemoryLoader, entry: &str) -> (Workspace, Recorder, Result<Vec<ModuleId>, CompileError>) {
        let mut ws = Workspace::default();
        let mut recorder = Recorder::default();
        let result = resolve(&mut ws, loader, "sprig", &mut recorder, Path::new(entry));
        (ws, recorder, result)
    }

    #[test]
    fn diamond_reads_shared_module_once() {
        let mut loader = MemoryLoader::new()
            .with_file("/p/main.sprig", r#"(import [b] from "./b.sprig") (import [c] from "./c.sprig")"#)
            .with_file("/p/b.sprig", r#"(import [a] from "./a.sprig") (def b a) (export [b])"#)
            .with_file("/p/c.sprig", r#"(import [a] from "./a.sprig") (def c a) (export [c])"#)
            .with_file("/p/a.sprig", "(def a 1) (export [a])");
        let (ws, recorder, result) = run(&mut loader, "/p/main.sprig");
        let order: Vec<String> = result.unwrap().iter().map(|id| ws.graph.get(*id).name()).collect();
        assert_eq!(order, vec!["a.sprig", "b.sprig", "c.sprig", "main.sprig"]);
        assert_eq!(recorder.compiled, order);
        assert_eq!(loader.read_count("/p/a.sprig"), 1);
        assert!(ws.events.contains(&CompileEvent::CacheHit { module: "a.sprig".into() }));
    }

    #[test]
    fn cycles_are_deferred() {
        let mut loader = MemoryLoader::new()
            .with_file("/p/a.sprig", r#"(import [g] from "./b.sprig") (defn f () (g)) (export [f])"#)
            .with_file("/p/b.sprig", r#"(import [f] from "./a.sprig") (defn g () 1) (export [g])"#);
        let (ws, recorder, result) = run(&mut loader, "/p/a.sprig");
        result.unwrap();
        assert_eq!(recorder.compiled, vec!["b.sprig", "a.sprig"]);
        let b = ws.graph.lookup(Path::new("/p/b.sprig")).unwrap();
        let a = ws.graph.lookup(Path::new("/p/a.sprig")).unwrap();
        assert_eq!(ws.graph.get(b).edges, vec![DependencyEdge::Deferred(a)]);
        assert_eq!(ws.graph.get(a).edges, vec![DependencyEdge::Direct(b)]);
    }

    #[test]
    fn missing_export_names_importer_and_path() {
        let mut loader = MemoryLoader::new()
            .with_file("/p/main.sprig", r#"(import [nope] from "./lib.sprig")"#)
            .with_file("/p/lib.sprig", "(def yes 1) (export [yes])");
        let (ws, _, result) = run(&mut loader, "/p/main.sprig");
        match result.unwrap_err() {
            CompileError::UnresolvedImport { importer, exported_name, source_path, reason, .. } => {
                assert_eq!(importer, "main.sprig");
                assert_eq!(exported_name, "nope");
                assert_eq!(source_path, "./lib.sprig");
                assert_eq!(reason, ImportFailure::MissingExport);
            }
            other => panic!("unexpected {other}"),
        }
        let main = ws.graph.lookup(Path::new("/p/main.sprig")).unwrap();
        let lib = ws.graph.lookup(Path::new("/p/lib.sprig")).unwrap();
        assert_eq!(ws.graph.get(main).state, ResolutionState::Failed);
        assert_eq!(ws.graph.get(lib).state, ResolutionState::Resolved);
    }

    #[test]
    fn unreadable_import_is_not_found() {
        let mut loader = MemoryLoader::new().with_file("/p/main.sprig", r#"(import "./gone.sprig")"#);
        let (_, _, result) = run(&mut loader, "/p/main.sprig");
        assert!(matches!(
            result.unwrap_err(),
            CompileError::UnresolvedImport { reason: ImportFailure::NotFound, .. }
        ));
    }

    #[test]
    fn macro_across_cycle_is_undeferrable() {
        let mut loader = MemoryLoader::new()
            .with_file("/p/a.sprig", r#"(import [b] from "./b.sprig") (defmacro m (x) x) (export [m])"#)
            .with_file("/p/b.sprig", r#"(import [m] from "./a.sprig") (def b 1) (export [b])"#);
        let (_, _, result) = run(&mut loader, "/p/a.sprig");
        assert!(matches!(
            result.unwrap_err(),
            CompileError::UnresolvedImport { reason: ImportFailure::UndeferrableCycle, .. }
        ));
    }

    #[test]
    fn exports_split_into_values_and_macros() {
        let mut loader = MemoryLoader::new()
            .with_file("/p/lib.sprig", "(defmacro twice (x) (list '+ x x)) (defn add (a b) (+ a b)) (export [twice add])")
            .with_file("/p/re.sprig", r#"(import [twice as t] from "./lib.sprig") (export [t])"#);
        let (ws, _, result) = run(&mut loader, "/p/re.sprig");
        result.unwrap();
        let lib = ws.graph.get(ws.graph.lookup(Path::new("/p/lib.sprig")).unwrap());
        assert!(lib.exports_value("add"));
        assert_eq!(lib.exported_macro("twice").map(|d| d.visibility), Some(Visibility::Exported));
        let re = ws.graph.get(ws.graph.lookup(Path::new("/p/re.sprig")).unwrap());
        assert_eq!(re.exported_macro("t").map(|d| d.name.as_str()), Some("twice"));
        assert!(re.value_exports.is_empty());
    }
}
