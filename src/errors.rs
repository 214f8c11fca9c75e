//! Diagnostics for every stage of the compiler.
//!
//! All fatal failures are [`CompileError`] values; the only non-fatal diagnostic
//! is [`Warning::UnresolvedReference`]. Both carry an [`ErrorContext`] and render
//! through `miette`, so a caller can print them with source snippets via
//! `miette::Report`.

use std::{fmt, sync::Arc};

use miette::{Diagnostic, LabeledSpan, NamedSource, Severity, SourceCode};
use thiserror::Error;

use crate::{
    source::{SourceFile, SourceMap},
    syntax::Span,
};

pub type SourceArc = Arc<NamedSource<String>>;

/// Type-safe classification of a [`CompileError`], used by tests and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// Unbalanced delimiters, bad escapes, malformed atoms
    Syntax,
    /// Missing exports, unreadable imports, undeferrable cycles, unknown exports
    Import,
    /// Runaway expansion, arity mismatches, unbound template symbols, malformed definitions
    Macro,
    /// Constructs without a translation rule
    Generation,
    /// File system and configuration failures
    Io,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Syntax => "syntax",
            ErrorType::Import => "import",
            ErrorType::Macro => "macro",
            ErrorType::Generation => "generation",
            ErrorType::Io => "io",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A secondary label. Only rendered when it points into the primary source.
#[derive(Debug, Clone)]
pub struct RelatedLabel {
    pub span: Span,
    pub label: String,
}

/// Source, span, help and secondary labels attached to a diagnostic.
#[derive(Debug, Default)]
pub struct ErrorContext {
    pub source: Option<SourceArc>,
    pub span: Option<Span>,
    pub help: Option<String>,
    pub related: Vec<RelatedLabel>,
}

impl ErrorContext {
    pub fn none() -> Self {
        Self::default()
    }

    /// Context pointing at `span` inside `file`.
    pub fn at(file: &SourceFile, span: Span) -> Self {
        Self {
            source: Some(file.to_named_source()),
            span: Some(span),
            help: None,
            related: vec![],
        }
    }

    /// Context for `span`, looking its file up in `sources`.
    pub fn locate(sources: &SourceMap, span: Span) -> Self {
        match sources.get(span.file) {
            Some(file) => Self::at(file, span),
            None => Self {
                span: Some(span),
                ..Self::default()
            },
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_related(mut self, span: Span, label: impl Into<String>) -> Self {
        self.related.push(RelatedLabel {
            span,
            label: label.into(),
        });
        self
    }
}

/// Why an import could not be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFailure {
    /// The target exists but does not export the name.
    MissingExport,
    /// The target path could not be read.
    NotFound,
    /// A macro was imported across a cyclic edge.
    UndeferrableCycle,
}

impl fmt::Display for ImportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportFailure::MissingExport => write!(f, "not exported"),
            ImportFailure::NotFound => write!(f, "not found"),
            ImportFailure::UndeferrableCycle => write!(f, "cycle cannot be deferred"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("syntax error in {file} at offset {offset}: expected {expected}")]
    Syntax {
        file: String,
        offset: usize,
        expected: String,
        ctx: ErrorContext,
    },

    #[error("cannot import `{exported_name}` from `{source_path}` in {importer}: {reason}")]
    UnresolvedImport {
        importer: String,
        exported_name: String,
        source_path: String,
        reason: ImportFailure,
        ctx: ErrorContext,
    },

    #[error("`{name}` is exported by {module} but never defined")]
    UnknownExport {
        module: String,
        name: String,
        ctx: ErrorContext,
    },

    #[error("macro expansion limit exceeded while expanding `{macro_name}` ({limit})")]
    MacroExpansionLimit {
        macro_name: String,
        limit: String,
        ctx: ErrorContext,
    },

    #[error("macro `{macro_name}` expects {expected} argument(s), got {actual}")]
    MacroArity {
        macro_name: String,
        expected: String,
        actual: usize,
        ctx: ErrorContext,
    },

    #[error("macro `{macro_name}` refers to `{symbol}`, which is not one of its parameters")]
    MacroSubstitution {
        macro_name: String,
        symbol: String,
        ctx: ErrorContext,
    },

    #[error("invalid macro definition: {message}")]
    MacroDefinition { message: String, ctx: ErrorContext },

    #[error("cannot generate JavaScript: {message}")]
    Generation { message: String, ctx: ErrorContext },

    #[error("cannot access `{path}`")]
    Io {
        path: String,
        #[source]
        error: std::io::Error,
    },

    #[error("invalid configuration in `{path}`")]
    Config {
        path: String,
        #[source]
        error: serde_json::Error,
    },
}

impl CompileError {
    pub fn generation(message: impl Into<String>, ctx: ErrorContext) -> Self {
        CompileError::Generation {
            message: message.into(),
            ctx,
        }
    }

    pub fn macro_definition(message: impl Into<String>, ctx: ErrorContext) -> Self {
        CompileError::MacroDefinition {
            message: message.into(),
            ctx,
        }
    }

    pub fn error_type(&self) -> ErrorType {
        match self {
            CompileError::Syntax { .. } => ErrorType::Syntax,
            CompileError::UnresolvedImport { .. } | CompileError::UnknownExport { .. } => {
                ErrorType::Import
            }
            CompileError::MacroExpansionLimit { .. }
            | CompileError::MacroArity { .. }
            | CompileError::MacroSubstitution { .. }
            | CompileError::MacroDefinition { .. } => ErrorType::Macro,
            CompileError::Generation { .. } => ErrorType::Generation,
            CompileError::Io { .. } | CompileError::Config { .. } => ErrorType::Io,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            CompileError::Syntax { ctx, .. }
            | CompileError::UnresolvedImport { ctx, .. }
            | CompileError::UnknownExport { ctx, .. }
            | CompileError::MacroExpansionLimit { ctx, .. }
            | CompileError::MacroArity { ctx, .. }
            | CompileError::MacroSubstitution { ctx, .. }
            | CompileError::MacroDefinition { ctx, .. }
            | CompileError::Generation { ctx, .. } => Some(ctx),
            CompileError::Io { .. } | CompileError::Config { .. } => None,
        }
    }

    /// Primary span, when the failure is tied to a location.
    pub fn span(&self) -> Option<Span> {
        self.context().and_then(|ctx| ctx.span)
    }

    fn code_str(&self) -> &'static str {
        match self {
            CompileError::Syntax { .. } => "sprig::syntax::expected",
            CompileError::UnresolvedImport { reason, .. } => match reason {
                ImportFailure::MissingExport => "sprig::import::missing_export",
                ImportFailure::NotFound => "sprig::import::not_found",
                ImportFailure::UndeferrableCycle => "sprig::import::cycle",
            },
            CompileError::UnknownExport { .. } => "sprig::import::unknown_export",
            CompileError::MacroExpansionLimit { .. } => "sprig::macro::expansion_limit",
            CompileError::MacroArity { .. } => "sprig::macro::arity",
            CompileError::MacroSubstitution { .. } => "sprig::macro::substitution",
            CompileError::MacroDefinition { .. } => "sprig::macro::definition",
            CompileError::Generation { .. } => "sprig::generation::unsupported",
            CompileError::Io { .. } => "sprig::io::access",
            CompileError::Config { .. } => "sprig::io::config",
        }
    }

    fn primary_label(&self) -> String {
        match self {
            CompileError::Syntax { expected, .. } => format!("expected {expected}"),
            CompileError::UnresolvedImport { reason, .. } => reason.to_string(),
            CompileError::UnknownExport { .. } => "exported here".to_string(),
            CompileError::MacroExpansionLimit { .. } => "expansion does not terminate".to_string(),
            CompileError::MacroArity { actual, .. } => format!("called with {actual} argument(s)"),
            CompileError::MacroSubstitution { symbol, .. } => format!("`{symbol}` is unbound"),
            CompileError::MacroDefinition { .. } => "defined here".to_string(),
            CompileError::Generation { .. } => "no translation for this form".to_string(),
            CompileError::Io { .. } | CompileError::Config { .. } => String::new(),
        }
    }
}

impl Diagnostic for CompileError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code_str()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.context()?
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.context()?
            .source
            .as_ref()
            .map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let ctx = self.context()?;
        context_labels(ctx, self.primary_label())
    }
}

/// Non-fatal diagnostics. Compilation continues and the warning is collected
/// by the session.
#[derive(Debug, Error)]
pub enum Warning {
    #[error("unresolved reference `{name}` in {module}; emitted as a host global")]
    UnresolvedReference {
        name: String,
        module: String,
        ctx: ErrorContext,
    },
}

impl Warning {
    fn ctx(&self) -> &ErrorContext {
        match self {
            Warning::UnresolvedReference { ctx, .. } => ctx,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Warning::UnresolvedReference { name, .. } => name,
        }
    }
}

impl Diagnostic for Warning {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("sprig::generation::unresolved_reference"))
    }

    fn severity(&self) -> Option<Severity> {
        Some(Severity::Warning)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.ctx()
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display + 'a>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        self.ctx().source.as_ref().map(|s| s.as_ref() as &dyn SourceCode)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        context_labels(self.ctx(), "not bound in this module".to_string())
    }
}

fn context_labels(
    ctx: &ErrorContext,
    primary: String,
) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
    let span = ctx.span?;
    let mut labels = vec![LabeledSpan::new(Some(primary), span.start, span.len().max(1))];
    for rel in ctx.related.iter().filter(|rel| rel.span.file == span.file) {
        labels.push(LabeledSpan::new(
            Some(rel.label.clone()),
            rel.span.start,
            rel.span.len().max(1),
        ));
    }
    Some(Box::new(labels.into_iter()))
}

#[cfg(test)]
mod tests {
    use miette::Report;

    use super::*;
    use crate::source::{SourceId, SourceMap};

    fn span(start: usize, end: usize) -> Span {
        Span {
            file: SourceId(0),
            start,
            end,
        }
    }

    #[test]
    fn report_includes_code_help_and_related_labels() {
        let mut sources = SourceMap::new();
        let file = sources.add("main.sprig", "(defmacro m (x) ~y)\n(m 1)");
        let ctx = ErrorContext::at(&file, span(20, 25))
            .with_help("`y` is not a parameter of `m`")
            .with_related(span(0, 19), "macro defined here");
        let err = CompileError::MacroSubstitution {
            macro_name: "m".into(),
            symbol: "y".into(),
            ctx,
        };
        assert_eq!(err.error_type(), ErrorType::Macro);
        let output = format!("{:?}", Report::new(err));
        assert!(output.contains("sprig::macro::substitution"));
        assert!(output.contains("macro defined here"));
        assert!(output.contains("not a parameter"));
    }

    #[test]
    fn related_labels_in_other_files_are_skipped() {
        let ctx = ErrorContext::none().with_related(span(0, 1), "elsewhere");
        let mut ctx = ctx;
        ctx.span = Some(Span {
            file: SourceId(3),
            start: 0,
            end: 2,
        });
        let labels: Vec<_> = context_labels(&ctx, "here".into())
            .map(|it| it.collect())
            .unwrap_or_default();
        assert_eq!(labels.len(), 1);
    }

    #[test]
    fn io_errors_have_no_labels() {
        let err = CompileError::Io {
            path: "missing.sprig".into(),
            error: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.error_type(), ErrorType::Io);
        assert!(err.labels().is_none());
        assert!(err.span().is_none());
    }
}
