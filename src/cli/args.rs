//! Command-line arguments and subcommands of the `sprig` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "sprig",
    version,
    about = "Compile Sprig, a Lisp with modules and macros, to JavaScript."
)]
pub struct SprigArgs {
    /// JSON file with compile options. Defaults to `sprig.json` when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile a project to one `.js` file per module.
    Compile {
        /// Entry module, or a directory whose source files are all compiled.
        #[arg(required = true)]
        entry: PathBuf,
        #[arg(long, short, default_value = "out")]
        out_dir: PathBuf,
        /// Emit runtime helpers into every module.
        #[arg(long)]
        inline_runtime: bool,
        /// Print every module read, expanded, generated or deferred.
        #[arg(long, short)]
        verbose: bool,
    },
    /// Print the fully macro-expanded forms of a file.
    Expand {
        #[arg(required = true)]
        file: PathBuf,
        /// Show each expansion step with a diff.
        #[arg(long)]
        trace: bool,
    },
    /// Resolve and generate a project without writing anything.
    Check {
        #[arg(required = true)]
        entry: PathBuf,
    },
    /// Print the export manifests of a project as JSON.
    Manifest {
        #[arg(required = true)]
        entry: PathBuf,
    },
}
