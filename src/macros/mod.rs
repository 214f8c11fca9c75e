//! # Macro System
//!
//! Macros are purely syntactic: a definition is a template over syntax nodes,
//! and expansion rewrites a module's tree until no macro invocations remain.
//!
//! ## Visibility
//!
//! - `(defmacro ...)` defines a [`Visibility::Local`] macro, visible only in its
//!   own module unless the module lists it in an `export` form, which makes it
//!   [`Visibility::Exported`].
//! - `(macro ...)` defines a [`Visibility::Global`] macro. It becomes visible to
//!   every module compiled after its defining module in the same session.
//!
//! ## Lookup
//!
//! A head symbol is looked up in the module's own macros, then in the macros it
//! imported (by local alias), then in the global tier. See [`MacroScope`].
//!
//! ## Termination
//!
//! The rewrite chain at one position is bounded by the number of visible macro
//! definitions, a rewrite that reproduces an earlier form of its chain fails
//! immediately, and nesting depth is bounded by [`MAX_MACRO_RECURSION_DEPTH`].

use ::std::{fmt, sync::Arc};

use serde::Serialize;

use crate::syntax::{AstNode, Span};

pub mod expander;
pub mod loader;
pub mod registry;
pub mod std;
pub mod template;

pub use expander::MacroExpander;
pub use loader::{check_arity, collect_macro_definitions, is_macro_definition, parse_macro_definition};
pub use registry::{MacroRegistry, MacroScope};

/// Default bound on how deeply expansion may nest.
pub const MAX_MACRO_RECURSION_DEPTH: usize = 128;

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Visibility {
    Local,
    Exported,
    Global,
}

/// Fixed parameters plus an optional rest capture introduced by `&`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroParams {
    pub required: Vec<String>,
    pub rest: Option<String>,
    pub span: Span,
}

impl MacroParams {
    pub fn contains(&self, name: &str) -> bool {
        self.required.iter().any(|p| p == name) || self.rest.as_deref() == Some(name)
    }

    /// Human readable arity, e.g. `2` or `at least 1`.
    pub fn arity(&self) -> String {
        match self.rest {
            Some(_) => format!("at least {}", self.required.len()),
            None => self.required.len().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MacroDefinition {
    pub name: String,
    pub params: MacroParams,
    pub body: AstNode,
    pub visibility: Visibility,
    /// Span of the whole definition form.
    pub span: Span,
    /// Display name of the defining module.
    pub origin: String,
}

impl MacroDefinition {
    /// Same definition with a different visibility class.
    pub fn with_visibility(&self, visibility: Visibility) -> Arc<MacroDefinition> {
        Arc::new(MacroDefinition {
            visibility,
            ..self.clone()
        })
    }
}

/// Which tier of the lookup order a macro was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MacroProvenance {
    Local,
    Imported,
    Global,
}

impl fmt::Display for MacroProvenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroProvenance::Local => write!(f, "local"),
            MacroProvenance::Imported => write!(f, "imported"),
            MacroProvenance::Global => write!(f, "global"),
        }
    }
}

/// A single macro expansion step, for traceability.
#[derive(Debug, Clone)]
pub struct MacroExpansionStep {
    pub macro_name: String,
    pub provenance: MacroProvenance,
    pub input: AstNode,
    pub output: AstNode,
}
