//! # Module Resolution
//!
//! Modules are kept in an arena ([`ModuleGraph`]) indexed by [`ModuleId`] and
//! keyed by canonical path. A record is created the first time a path is
//! referenced and is never destroyed within a session; its compiled artifact
//! is filled in exactly once.
//!
//! Import edges that would close a cycle are stored as
//! [`DependencyEdge::Deferred`], a handle to the target's arena slot that is
//! not followed when ordering compilation.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    macros::{MacroDefinition, MacroRegistry},
    source::SourceFile,
    syntax::{AstNode, Span},
};

pub mod decls;
pub mod loader;
pub mod resolver;

pub use decls::{ImportBinding, ImportKind, ImportSpec};
pub use loader::{normalize_path, FsLoader, MemoryLoader, SourceLoader};
pub use resolver::{resolve, ModuleCompiler, Workspace};

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    Unresolved,
    Resolving,
    Resolved,
    /// Compilation of this module or one of its imports aborted.
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DependencyEdge {
    Direct(ModuleId),
    /// Closes a cycle; the target was still resolving when the edge was seen.
    Deferred(ModuleId),
}

impl DependencyEdge {
    pub fn target(&self) -> ModuleId {
        match self {
            DependencyEdge::Direct(id) | DependencyEdge::Deferred(id) => *id,
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, DependencyEdge::Deferred(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueExport {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct MacroExport {
    pub name: String,
    pub definition: Arc<MacroDefinition>,
}

/// Export manifest of one generated module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleManifest {
    pub module: String,
    pub output_path: String,
    pub exports: Vec<String>,
    pub macros: Vec<String>,
    pub has_default_export: bool,
    pub imports: Vec<String>,
    pub runtime_helpers: Vec<String>,
}

/// Generated JavaScript for one module.
#[derive(Debug, Clone)]
pub struct ModuleArtifact {
    pub text: String,
    pub manifest: ModuleManifest,
}

#[derive(Debug)]
pub struct ModuleRecord {
    pub id: ModuleId,
    /// Canonical path, the cache key.
    pub path: PathBuf,
    /// Path relative to the project root, used for display and output layout.
    pub relative: PathBuf,
    pub source: Option<Arc<SourceFile>>,
    pub forms: Vec<AstNode>,
    pub expanded: Vec<AstNode>,
    pub imports: Vec<ImportSpec>,
    /// Names listed in `export` forms, in declaration order.
    pub declared_exports: Vec<(String, Span)>,
    pub default_export: Option<Span>,
    /// Macros defined in this module, both local and global.
    pub macros: MacroRegistry,
    pub value_exports: Vec<ValueExport>,
    pub macro_exports: Vec<MacroExport>,
    pub edges: Vec<DependencyEdge>,
    pub output: Option<Arc<ModuleArtifact>>,
    pub state: ResolutionState,
}

impl ModuleRecord {
    fn new(id: ModuleId, path: PathBuf, relative: PathBuf) -> Self {
        Self {
            id,
            path,
            relative,
            source: None,
            forms: Vec::new(),
            expanded: Vec::new(),
            imports: Vec::new(),
            declared_exports: Vec::new(),
            default_export: None,
            macros: MacroRegistry::new(),
            value_exports: Vec::new(),
            macro_exports: Vec::new(),
            edges: Vec::new(),
            output: None,
            state: ResolutionState::Unresolved,
        }
    }

    /// Clears everything derived from the source so the module can be read again.
    fn reset(&mut self) {
        let fresh = ModuleRecord::new(self.id, self.path.clone(), self.relative.clone());
        *self = fresh;
    }

    pub fn name(&self) -> String {
        self.relative.display().to_string()
    }

    /// Where the generated `.js` file goes, relative to the output directory.
    pub fn output_path(&self) -> PathBuf {
        let mut out = PathBuf::new();
        for component in self.relative.components() {
            match component {
                Component::ParentDir => out.push("_up"),
                Component::Normal(part) => out.push(part),
                _ => {}
            }
        }
        out.set_extension("js");
        out
    }

    pub fn exports_value(&self, name: &str) -> bool {
        self.value_exports.iter().any(|e| e.name == name)
    }

    pub fn exported_macro(&self, name: &str) -> Option<&Arc<MacroDefinition>> {
        self.macro_exports
            .iter()
            .find(|e| e.name == name)
            .map(|e| &e.definition)
    }
}

// ============================================================================
// GRAPH
// ============================================================================

#[derive(Debug, Default)]
pub struct ModuleGraph {
    records: Vec<ModuleRecord>,
    by_path: HashMap<PathBuf, ModuleId>,
    root: Option<PathBuf>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory module names and output paths are relative to. Fixed by the
    /// first entry resolved in a session.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn set_root_once(&mut self, root: &Path) {
        if self.root.is_none() {
            self.root = Some(root.to_path_buf());
        }
    }

    /// Returns the id for `path`, creating an `Unresolved` record if needed.
    pub fn intern(&mut self, path: &Path) -> ModuleId {
        if let Some(id) = self.by_path.get(path) {
            return *id;
        }
        let id = ModuleId(self.records.len());
        let relative = match &self.root {
            Some(root) => relative_path(root, path),
            None => path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf()),
        };
        self.records.push(ModuleRecord::new(id, path.to_path_buf(), relative));
        self.by_path.insert(path.to_path_buf(), id);
        id
    }

    pub fn lookup(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    pub fn get(&self, id: ModuleId) -> &ModuleRecord {
        &self.records[id.0]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut ModuleRecord {
        &mut self.records[id.0]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> {
        self.records.iter()
    }

    pub(crate) fn reset(&mut self, id: ModuleId) {
        self.records[id.0].reset();
    }

    /// Post-order over direct edges from `entry`: every module follows all of
    /// its non-deferred imports.
    pub fn compilation_order(&self, entry: ModuleId) -> Vec<ModuleId> {
        fn walk(graph: &ModuleGraph, id: ModuleId, seen: &mut HashSet<ModuleId>, order: &mut Vec<ModuleId>) {
            if !seen.insert(id) {
                return;
            }
            for edge in &graph.get(id).edges {
                if let DependencyEdge::Direct(target) = edge {
                    walk(graph, *target, seen, order);
                }
            }
            order.push(id);
        }
        let mut order = Vec::new();
        walk(self, entry, &mut HashSet::new(), &mut order);
        order
    }
}

/// Lexical path of `path` relative to `base`, using `..` where needed.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    let base: Vec<Component> = base.components().collect();
    let target: Vec<Component> = path.components().collect();
    let common = base.iter().zip(&target).take_while(|(a, b)| a == b).count();
    let mut out = PathBuf::new();
    for _ in common..base.len() {
        out.push("..");
    }
    for part in &target[common..] {
        out.push(part.as_os_str());
    }
    out
}

/// ES import specifier that reaches `to` from a module generated at `from`.
/// Both paths are relative to the output directory.
pub fn import_specifier(from: &Path, to: &Path) -> String {
    let from_dir = from.parent().unwrap_or_else(|| Path::new(""));
    let rel = relative_path(from_dir, to);
    let text = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    if text.starts_with("..") {
        text
    } else {
        format!("./{text}")
    }
}

// ============================================================================
// EVENTS
// ============================================================================

/// Progress notifications recorded by a session; printed by `--verbose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileEvent {
    Read { module: String },
    CacheHit { module: String },
    Deferred { from: String, to: String },
    Expanded { module: String, steps: usize },
    Generated { module: String },
}

impl fmt::Display for CompileEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileEvent::Read { module } => write!(f, "read {module}"),
            CompileEvent::CacheHit { module } => write!(f, "cached {module}"),
            CompileEvent::Deferred { from, to } => write!(f, "deferred {from} -> {to} (cycle)"),
            CompileEvent::Expanded { module, steps } => write!(f, "expanded {module} ({steps} steps)"),
            CompileEvent::Generated { module } => write!(f, "generated {module}"),
        }
    }
}
