//! Rewrites a module's tree until no macro invocations remain.
//!
//! Expansion is pre-order and left-most outer-most: a form whose head resolves
//! to a macro is rewritten and the result is rescanned at the same position
//! before its children are visited. `quote` bodies are opaque, and inside a
//! `quasiquote` only the `unquote` / `unquote-splicing` payloads are expanded.
//! Macro definition forms stay in the tree untouched, so expanding an already
//! expanded tree is a no-op.

use std::sync::Arc;

use crate::{
    errors::{CompileError, ErrorContext},
    macros::{
        template, MacroDefinition, MacroExpansionStep, MacroProvenance, MacroScope,
        MAX_MACRO_RECURSION_DEPTH,
    },
    source::SourceMap,
    syntax::{make_wrapped, node, same_shape, AstNode, Expr},
};

pub struct MacroExpander<'a> {
    scope: MacroScope<'a>,
    sources: &'a SourceMap,
    max_depth: usize,
    trace: Vec<MacroExpansionStep>,
}

impl<'a> MacroExpander<'a> {
    pub fn new(scope: MacroScope<'a>, sources: &'a SourceMap) -> Self {
        Self {
            scope,
            sources,
            max_depth: MAX_MACRO_RECURSION_DEPTH,
            trace: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Expands every top-level form of a module.
    pub fn expand_program(&mut self, forms: &[AstNode]) -> Result<Vec<AstNode>, CompileError> {
        forms.iter().map(|form| self.expand(form)).collect()
    }

    pub fn expand(&mut self, form: &AstNode) -> Result<AstNode, CompileError> {
        self.expand_at(form, 0)
    }

    pub fn trace(&self) -> &[MacroExpansionStep] {
        &self.trace
    }

    pub fn into_trace(self) -> Vec<MacroExpansionStep> {
        self.trace
    }

    // ========================================================================
    // REWRITING
    // ========================================================================

    fn expand_at(&mut self, form: &AstNode, depth: usize) -> Result<AstNode, CompileError> {
        if depth > self.max_depth {
            let name = form.value.head_symbol().unwrap_or("<form>").to_string();
            return Err(self.limit_error(
                &name,
                format!("more than {} nested expansions", self.max_depth),
                form,
                None,
            ));
        }

        let budget = self.scope.visible_count();
        let mut current = form.clone();
        let mut chain: Vec<AstNode> = Vec::new();

        while let Some((name, provenance, def)) = self.invocation(&current) {
            let expanded = template::instantiate(def, &current, self.sources)?;
            chain.push(current.clone());
            if chain.iter().any(|seen| same_shape(seen, &expanded)) {
                return Err(self.limit_error(&name, "rewrites back to an earlier form".to_string(), form, Some(def)));
            }
            if chain.len() > budget {
                return Err(self.limit_error(
                    &name,
                    format!("more than {budget} rewrites at one position"),
                    form,
                    Some(def),
                ));
            }
            self.trace.push(MacroExpansionStep {
                macro_name: name,
                provenance,
                input: current,
                output: expanded.clone(),
            });
            current = expanded;
        }

        if chain.is_empty() {
            return self.expand_children(&current, depth);
        }
        if let Some(head @ ("import" | "export")) = current.value.head_symbol() {
            let name = form.value.head_symbol().unwrap_or("<form>");
            let ctx = ErrorContext::locate(self.sources, form.span)
                .with_help(format!("write `{head}` forms directly at the top level of the module"));
            return Err(CompileError::generation(
                format!("macro `{name}` expands to an `{head}` form, which cannot be produced by a macro"),
                ctx,
            ));
        }
        // Only forms produced by a rewrite count towards the nesting limit.
        self.expand_children(&current, depth + 1)
    }

    /// The macro `form` invokes, if any.
    fn invocation(&self, form: &AstNode) -> Option<(String, MacroProvenance, &'a Arc<MacroDefinition>)> {
        let name = form.value.head_symbol()?;
        let (provenance, def) = self.scope.lookup(name)?;
        Some((name.to_string(), provenance, def))
    }

    fn expand_children(&mut self, form: &AstNode, depth: usize) -> Result<AstNode, CompileError> {
        match &*form.value {
            Expr::List(items) => {
                match (form.value.head_symbol(), items.len()) {
                    (Some("quote"), _) | (Some("defmacro"), _) | (Some("macro"), _) => return Ok(form.clone()),
                    (Some("quasiquote"), 2) => {
                        let inner = self.expand_quasi(&items[1], depth, 1)?;
                        return Ok(make_wrapped("quasiquote", inner, form.span));
                    }
                    _ => {}
                }
                let items = self.expand_items(items, depth)?;
                Ok(node(Expr::List(items), form.span))
            }
            Expr::Vector(items) => {
                let items = self.expand_items(items, depth)?;
                Ok(node(Expr::Vector(items), form.span))
            }
            Expr::Map(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.push((self.expand_at(k, depth)?, self.expand_at(v, depth)?));
                }
                Ok(node(Expr::Map(out), form.span))
            }
            _ => Ok(form.clone()),
        }
    }

    fn expand_items(&mut self, items: &[AstNode], depth: usize) -> Result<Vec<AstNode>, CompileError> {
        items.iter().map(|item| self.expand_at(item, depth)).collect()
    }

    /// Walks a quasiquoted template, expanding only the unquoted payloads.
    fn expand_quasi(&mut self, form: &AstNode, depth: usize, level: usize) -> Result<AstNode, CompileError> {
        match &*form.value {
            Expr::List(items) => {
                let head = form.value.head_symbol();
                match (head, items.len()) {
                    (Some(h @ ("unquote" | "unquote-splicing")), 2) => {
                        let inner = if level == 1 {
                            self.expand_at(&items[1], depth)?
                        } else {
                            self.expand_quasi(&items[1], depth, level - 1)?
                        };
                        Ok(make_wrapped(h, inner, form.span))
                    }
                    (Some("quasiquote"), 2) => {
                        let inner = self.expand_quasi(&items[1], depth, level + 1)?;
                        Ok(make_wrapped("quasiquote", inner, form.span))
                    }
                    _ => {
                        let items = items
                            .iter()
                            .map(|i| self.expand_quasi(i, depth, level))
                            .collect::<Result<_, _>>()?;
                        Ok(node(Expr::List(items), form.span))
                    }
                }
            }
            Expr::Vector(items) => {
                let items = items
                    .iter()
                    .map(|i| self.expand_quasi(i, depth, level))
                    .collect::<Result<_, _>>()?;
                Ok(node(Expr::Vector(items), form.span))
            }
            Expr::Map(pairs) => {
                let mut out = Vec::with_capacity(pairs.len());
                for (k, v) in pairs {
                    out.push((self.expand_quasi(k, depth, level)?, self.expand_quasi(v, depth, level)?));
                }
                Ok(node(Expr::Map(out), form.span))
            }
            _ => Ok(form.clone()),
        }
    }

    fn limit_error(
        &self,
        macro_name: &str,
        limit: String,
        at: &AstNode,
        def: Option<&Arc<MacroDefinition>>,
    ) -> CompileError {
        let mut ctx = ErrorContext::locate(self.sources, at.span);
        if let Some(def) = def {
            ctx = ctx
                .with_help(format!(
                    "`{}` (defined in {}) keeps producing macro invocations; make sure its expansion reaches a form without it",
                    def.name, def.origin
                ))
                .with_related(def.span, "macro defined here");
        }
        CompileError::MacroExpansionLimit {
            macro_name: macro_name.to_string(),
            limit,
            ctx,
        }
    }
}
