//! Sprig: a Lisp-family language with modules and syntactic macros that
//! compiles to JavaScript.
//!
//! The pipeline runs in five stages, each depending only on the ones before it:
//! the reader ([`syntax`]), the macro registry and expander ([`macros`]), the
//! module resolver ([`modules`]), and the code generator ([`codegen`]). The
//! [`engine`] ties them together behind a [`CompilationSession`].

pub use crate::config::CompileOptions;
pub use crate::engine::{
    compile_project, compile_to_text, is_source_language, run, CompilationSession,
    EvaluationAdapter, RunOptions, RunOutcome,
};
pub use crate::errors::{CompileError, ErrorContext, ErrorType, Warning};
pub use crate::source::{SourceFile, SourceId, SourceMap};
pub use crate::syntax::{AstNode, Expr, Span, Spanned};

pub mod cli;
pub mod codegen;
pub mod config;
pub mod engine;
pub mod errors;
pub mod interop;
pub mod macros;
pub mod modules;
pub mod source;
pub mod syntax;
