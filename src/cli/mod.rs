//! The Sprig command-line interface.
//!
//! Wires the library entry points to files: every subcommand builds a
//! [`CompilationSession`], and every failure is printed as a miette report
//! before exiting with status 1.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::Parser;
use walkdir::WalkDir;

use crate::{
    cli::args::{Command, SprigArgs},
    codegen::runtime_module_source,
    config::CompileOptions,
    engine::{CompilationSession, CompiledModule},
    errors::{CompileError, ErrorContext},
    modules::{normalize_path, ModuleManifest},
};

pub mod args;
pub mod output;

const DEFAULT_CONFIG: &str = "sprig.json";

/// The main entry point for the CLI.
pub fn run() {
    let args = SprigArgs::parse();

    let result = load_options(args.config.as_deref()).and_then(|options| match args.command {
        Command::Compile {
            entry,
            out_dir,
            inline_runtime,
            verbose,
        } => handle_compile(&entry, &out_dir, inline_runtime, verbose, options),
        Command::Expand { file, trace } => handle_expand(&file, trace, options),
        Command::Check { entry } => handle_check(&entry, options),
        Command::Manifest { entry } => handle_manifest(&entry, options),
    });

    if let Err(e) = result {
        output::print_error(e);
        process::exit(1);
    }
}

// ============================================================================
// SUBCOMMANDS
// ============================================================================

fn handle_compile(
    entry: &Path,
    out_dir: &Path,
    inline_runtime: bool,
    verbose: bool,
    mut options: CompileOptions,
) -> Result<(), CompileError> {
    options.inline_runtime |= inline_runtime;
    let runtime_file = (!options.inline_runtime)
        .then(|| runtime_output_path(&options.runtime_module, out_dir))
        .flatten();

    let mut session = CompilationSession::new(options)?;
    let modules = compile_all(&mut session, entry)?;
    for module in &modules {
        write_file(&out_dir.join(&module.output_path), &module.artifact.text)?;
    }
    if let Some(runtime_file) = runtime_file {
        write_file(&runtime_file, &runtime_module_source())?;
    }

    if verbose {
        output::print_events(session.events());
    }
    output::print_warnings(session.warnings());
    output::print_summary(modules.len(), out_dir);
    Ok(())
}

fn handle_expand(file: &Path, trace: bool, options: CompileOptions) -> Result<(), CompileError> {
    let text = read_file(file)?;
    let mut session = CompilationSession::new(options)?;
    let name = file.display().to_string();
    let expanded = session.expand_source(&name, &text)?;
    if trace {
        output::print_trace(session.trace());
    }
    for form in &expanded {
        println!("{form}");
    }
    Ok(())
}

fn handle_check(entry: &Path, options: CompileOptions) -> Result<(), CompileError> {
    let mut session = CompilationSession::new(options)?;
    let modules = compile_all(&mut session, entry)?;
    output::print_warnings(session.warnings());
    println!(
        "{} module(s) checked, {} warning(s)",
        modules.len(),
        session.warnings().len()
    );
    Ok(())
}

fn handle_manifest(entry: &Path, options: CompileOptions) -> Result<(), CompileError> {
    let mut session = CompilationSession::new(options)?;
    let modules = compile_all(&mut session, entry)?;
    let manifests: Vec<&ModuleManifest> = modules.iter().map(|m| &m.artifact.manifest).collect();
    let json = serde_json::to_string_pretty(&manifests).map_err(|e| {
        CompileError::generation(format!("cannot serialize manifests: {e}"), ErrorContext::none())
    })?;
    println!("{json}");
    Ok(())
}

// ============================================================================
// HELPERS
// ============================================================================

/// Explicit `--config`, else `sprig.json` in the working directory, else
/// defaults.
fn load_options(config: Option<&Path>) -> Result<CompileOptions, CompileError> {
    match config {
        Some(path) => CompileOptions::from_json_file(path),
        None if Path::new(DEFAULT_CONFIG).is_file() => CompileOptions::from_json_file(Path::new(DEFAULT_CONFIG)),
        None => Ok(CompileOptions::default()),
    }
}

/// Compiles `entry`, or every source file below it when it is a directory.
/// Modules shared between entries are compiled once.
fn compile_all(
    session: &mut CompilationSession,
    entry: &Path,
) -> Result<Vec<CompiledModule>, CompileError> {
    if !entry.is_dir() {
        return session.compile(entry);
    }
    session.set_root(entry)?;
    let extension = session.options().source_extension.clone();
    let mut sources: Vec<PathBuf> = WalkDir::new(entry)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.path().extension().is_some_and(|x| x == extension.as_str()))
        .map(|e| e.into_path())
        .collect();
    sources.sort();

    let mut seen = HashSet::new();
    let mut modules = Vec::new();
    for source in sources {
        for module in session.compile(&source)? {
            if seen.insert(module.id) {
                modules.push(module);
            }
        }
    }
    Ok(modules)
}

/// Where the runtime helpers must be written for generated modules to find
/// them. Relative specifiers resolve against `out_dir` the same way the
/// generated imports do; absolute paths are used as is. Package specifiers
/// such as `@sprig/runtime` are resolved by the host, so nothing is written.
fn runtime_output_path(runtime_module: &str, out_dir: &Path) -> Option<PathBuf> {
    if runtime_module.starts_with("./") || runtime_module.starts_with("../") {
        Some(normalize_path(&out_dir.join(runtime_module)))
    } else if Path::new(runtime_module).is_absolute() {
        Some(PathBuf::from(runtime_module))
    } else {
        None
    }
}

fn read_file(path: &Path) -> Result<String, CompileError> {
    fs::read_to_string(path).map_err(|error| CompileError::Io {
        path: path.display().to_string(),
        error,
    })
}

fn write_file(path: &Path, text: &str) -> Result<(), CompileError> {
    let io_error = |error| CompileError::Io {
        path: path.display().to_string(),
        error,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, text).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_file_follows_relative_specifiers() {
        let out = Path::new("/build/out");
        assert_eq!(runtime_output_path("./sprig-runtime.js", out), Some(PathBuf::from("/build/out/sprig-runtime.js")));
        assert_eq!(runtime_output_path("./rt/helpers.js", out), Some(PathBuf::from("/build/out/rt/helpers.js")));
        assert_eq!(runtime_output_path("../shared/rt.js", out), Some(PathBuf::from("/build/shared/rt.js")));
        assert_eq!(runtime_output_path("@sprig/runtime", out), None);
    }
}
