//! Template instantiation: a small compile-time interpreter over syntax.
//!
//! A macro body is evaluated against the invocation's arguments:
//!
//! - parameter symbols evaluate to their bound argument (a rest parameter to a
//!   list of the captured arguments), other atoms to themselves;
//! - `(quote x)` yields `x` verbatim and `(quasiquote x)` yields `x` with its
//!   `unquote` / `unquote-splicing` holes filled in;
//! - `list`, `vector`, `cons`, `concat`, `first`, `rest`, `nth` and `count`
//!   are evaluated at expansion time;
//! - any other list is a plain template whose parameter symbols are
//!   substituted in place.
//!
//! Inside `unquote` and builtin arguments a symbol must be a parameter.

use std::collections::HashMap;

use crate::{
    errors::{CompileError, ErrorContext},
    macros::{loader::{check_arity, describe_params}, MacroDefinition},
    source::SourceMap,
    syntax::{make_list, make_wrapped, node, AstNode, Expr},
};

const BUILTINS: &[&str] = &["list", "vector", "cons", "concat", "first", "rest", "nth", "count"];

/// Expands one invocation of `def`. `call` is the whole `(name args...)` form.
pub fn instantiate(def: &MacroDefinition, call: &AstNode, sources: &SourceMap) -> Result<AstNode, CompileError> {
    let items = call.value.as_list().unwrap_or_default();
    let args = items.get(1..).unwrap_or_default();
    check_arity(def, args.len(), call, sources)?;
    let instance = Instance {
        def,
        call,
        bindings: bind_params(def, args, call),
        sources,
    };
    instance.eval(&def.body)
}

/// Binds parameters to unevaluated arguments.
pub fn bind_params<'d>(def: &'d MacroDefinition, args: &[AstNode], call: &AstNode) -> HashMap<&'d str, AstNode> {
    let mut bindings = HashMap::new();
    for (param, arg) in def.params.required.iter().zip(args) {
        bindings.insert(param.as_str(), arg.clone());
    }
    if let Some(rest) = &def.params.rest {
        let captured = args.get(def.params.required.len()..).unwrap_or_default().to_vec();
        bindings.insert(rest.as_str(), make_list(captured, call.span));
    }
    bindings
}

struct Instance<'a> {
    def: &'a MacroDefinition,
    call: &'a AstNode,
    bindings: HashMap<&'a str, AstNode>,
    sources: &'a SourceMap,
}

impl Instance<'_> {
    /// Evaluates a template position. Unbound symbols are literal.
    fn eval(&self, tpl: &AstNode) -> Result<AstNode, CompileError> {
        match &*tpl.value {
            Expr::Symbol(name) => Ok(self.bindings.get(name.as_str()).cloned().unwrap_or_else(|| tpl.clone())),
            Expr::List(items) => self.eval_list(tpl, items),
            Expr::Vector(_) | Expr::Map(_) => self.substitute(tpl),
            _ => Ok(tpl.clone()),
        }
    }

    /// Evaluates an `unquote` payload or builtin argument. Unbound symbols fail.
    fn eval_strict(&self, tpl: &AstNode) -> Result<AstNode, CompileError> {
        match &*tpl.value {
            Expr::Symbol(name) => self
                .bindings
                .get(name.as_str())
                .cloned()
                .ok_or_else(|| self.unbound(name, tpl)),
            _ => self.eval(tpl),
        }
    }

    fn eval_list(&self, tpl: &AstNode, items: &[AstNode]) -> Result<AstNode, CompileError> {
        let Some(head) = items.first().and_then(|h| h.value.as_symbol()) else {
            return self.substitute(tpl);
        };
        if self.bindings.contains_key(head) {
            return self.substitute(tpl);
        }
        match (head, items.len()) {
            ("quote", 2) => Ok(items[1].clone()),
            ("quasiquote", 2) => self.quasi(&items[1], 1),
            _ if BUILTINS.contains(&head) => self.builtin(head, tpl, &items[1..]),
            _ => self.substitute(tpl),
        }
    }

    // ------------------------------------------------------------------------
    // plain templates
    // ------------------------------------------------------------------------

    fn substitute(&self, tpl: &AstNode) -> Result<AstNode, CompileError> {
        match &*tpl.value {
            Expr::Symbol(name) => Ok(self.bindings.get(name.as_str()).cloned().unwrap_or_else(|| tpl.clone())),
            Expr::List(items) => match items.first().and_then(|h| h.value.as_symbol()) {
                Some("quote") if items.len() == 2 => Ok(tpl.clone()),
                Some("quasiquote") if items.len() == 2 => self.quasi(&items[1], 1),
                _ => {
                    let items = items.iter().map(|i| self.substitute(i)).collect::<Result<_, _>>()?;
                    Ok(node(Expr::List(items), tpl.span))
                }
            },
            Expr::Vector(items) => {
                let items = items.iter().map(|i| self.substitute(i)).collect::<Result<_, _>>()?;
                Ok(node(Expr::Vector(items), tpl.span))
            }
            Expr::Map(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(k, v)| Ok((self.substitute(k)?, self.substitute(v)?)))
                    .collect::<Result<_, CompileError>>()?;
                Ok(node(Expr::Map(pairs), tpl.span))
            }
            _ => Ok(tpl.clone()),
        }
    }

    // ------------------------------------------------------------------------
    // quasiquote
    // ------------------------------------------------------------------------

    fn quasi(&self, tpl: &AstNode, depth: usize) -> Result<AstNode, CompileError> {
        match &*tpl.value {
            Expr::List(items) => {
                let head = items.first().and_then(|h| h.value.as_symbol());
                match (head, items.len()) {
                    (Some("unquote"), 2) if depth == 1 => self.eval_strict(&items[1]),
                    (Some("unquote"), 2) => Ok(make_wrapped("unquote", self.quasi(&items[1], depth - 1)?, tpl.span)),
                    (Some("unquote-splicing"), 2) if depth == 1 => Err(self.template_error(
                        "`~@` can only appear inside a list or vector",
                        tpl,
                    )),
                    (Some("unquote-splicing"), 2) => Ok(make_wrapped(
                        "unquote-splicing",
                        self.quasi(&items[1], depth - 1)?,
                        tpl.span,
                    )),
                    (Some("quasiquote"), 2) => Ok(make_wrapped("quasiquote", self.quasi(&items[1], depth + 1)?, tpl.span)),
                    _ => Ok(node(Expr::List(self.quasi_items(items, depth)?), tpl.span)),
                }
            }
            Expr::Vector(items) => Ok(node(Expr::Vector(self.quasi_items(items, depth)?), tpl.span)),
            Expr::Map(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(k, v)| Ok((self.quasi(k, depth)?, self.quasi(v, depth)?)))
                    .collect::<Result<_, CompileError>>()?;
                Ok(node(Expr::Map(pairs), tpl.span))
            }
            _ => Ok(tpl.clone()),
        }
    }

    fn quasi_items(&self, items: &[AstNode], depth: usize) -> Result<Vec<AstNode>, CompileError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let splice = match item.value.as_list() {
                Some([head, payload]) if depth == 1 && head.value.is_symbol("unquote-splicing") => Some(payload),
                _ => None,
            };
            match splice {
                Some(payload) => {
                    let value = self.eval_strict(payload)?;
                    out.extend(self.elements(&value, item)?);
                }
                None => out.push(self.quasi(item, depth)?),
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // builtins
    // ------------------------------------------------------------------------

    fn builtin(&self, name: &str, tpl: &AstNode, args: &[AstNode]) -> Result<AstNode, CompileError> {
        let values = args.iter().map(|a| self.eval_strict(a)).collect::<Result<Vec<_>, _>>()?;
        let span = self.call.span;
        let expect = |n: usize| -> Result<(), CompileError> {
            if values.len() == n {
                Ok(())
            } else {
                Err(self.template_error(&format!("`{name}` expects {n} argument(s), got {}", values.len()), tpl))
            }
        };
        match name {
            "list" => Ok(make_list(values, span)),
            "vector" => Ok(node(Expr::Vector(values), span)),
            "cons" => {
                expect(2)?;
                let mut items = vec![values[0].clone()];
                items.extend(self.elements(&values[1], tpl)?);
                Ok(make_list(items, span))
            }
            "concat" => {
                let mut items = Vec::new();
                for value in &values {
                    items.extend(self.elements(value, tpl)?);
                }
                Ok(make_list(items, span))
            }
            "first" => {
                expect(1)?;
                let items = self.elements(&values[0], tpl)?;
                Ok(items.into_iter().next().unwrap_or_else(|| node(Expr::Nil, span)))
            }
            "rest" => {
                expect(1)?;
                let items = self.elements(&values[0], tpl)?;
                Ok(make_list(items.into_iter().skip(1).collect(), span))
            }
            "nth" => {
                expect(2)?;
                let Expr::Number(n) = &*values[1].value else {
                    return Err(self.template_error("`nth` needs a number index", tpl));
                };
                let items = self.elements(&values[0], tpl)?;
                let picked = if *n >= 0.0 { items.into_iter().nth(*n as usize) } else { None };
                Ok(picked.unwrap_or_else(|| node(Expr::Nil, span)))
            }
            "count" => {
                expect(1)?;
                let len = match &*values[0].value {
                    Expr::String(s) => s.chars().count(),
                    Expr::Map(pairs) => pairs.len(),
                    _ => self.elements(&values[0], tpl)?.len(),
                };
                Ok(node(Expr::Number(len as f64), span))
            }
            _ => self.substitute(tpl),
        }
    }

    /// Elements of a sequence value; `nil` is the empty sequence.
    fn elements(&self, value: &AstNode, at: &AstNode) -> Result<Vec<AstNode>, CompileError> {
        match &*value.value {
            Expr::List(items) | Expr::Vector(items) => Ok(items.clone()),
            Expr::Nil => Ok(vec![]),
            other => Err(self.template_error(
                &format!("expected a list or vector, found {} `{other}`", other.type_name()),
                at,
            )),
        }
    }

    // ------------------------------------------------------------------------
    // errors
    // ------------------------------------------------------------------------

    fn unbound(&self, symbol: &str, at: &AstNode) -> CompileError {
        let ctx = ErrorContext::locate(self.sources, self.call.span)
            .with_help(format!(
                "`{}` is defined in {} with parameters {}; quote the symbol to use it literally",
                self.def.name,
                self.def.origin,
                describe_params(&self.def.params)
            ))
            .with_related(at.span, "referenced here")
            .with_related(self.def.span, "macro defined here");
        CompileError::MacroSubstitution {
            macro_name: self.def.name.clone(),
            symbol: symbol.to_string(),
            ctx,
        }
    }

    fn template_error(&self, message: &str, at: &AstNode) -> CompileError {
        let ctx = ErrorContext::locate(self.sources, self.call.span)
            .with_help(format!("while expanding `{}` (defined in {})", self.def.name, self.def.origin))
            .with_related(at.span, "in this part of the template");
        CompileError::macro_definition(message.to_string(), ctx)
    }
}
