//! Shared helpers for the integration suites: in-memory projects, expansion
//! and scratch directories for CLI runs.

#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use sprig::{engine::CompiledModule, modules::MemoryLoader, CompilationSession, CompileOptions};

/// A session over an in-memory project.
pub fn project(files: &[(&str, &str)]) -> CompilationSession<MemoryLoader> {
    project_with(files, CompileOptions::default())
}

pub fn project_with(files: &[(&str, &str)], options: CompileOptions) -> CompilationSession<MemoryLoader> {
    let mut loader = MemoryLoader::new();
    for (path, text) in files {
        loader.add_file(path, *text);
    }
    CompilationSession::with_loader(loader, options).expect("prelude loads")
}

/// Generated text of the module named `name` (relative to the project root).
pub fn text_of<'m>(modules: &'m [CompiledModule], name: &str) -> &'m str {
    &modules
        .iter()
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("no module named {name}"))
        .artifact
        .text
}

/// Fully expanded forms of `source`, printed.
pub fn expand(source: &str) -> Vec<String> {
    let mut session = project(&[]);
    session
        .expand_source("test.sprig", source)
        .unwrap_or_else(|e| panic!("expansion failed: {e}"))
        .iter()
        .map(|form| form.to_string())
        .collect()
}

/// A fresh directory under the system temp dir, unique to this process.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sprig-{name}-{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}

pub fn write(dir: &Path, relative: &str, text: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(&path, text).expect("write source file");
    path
}
