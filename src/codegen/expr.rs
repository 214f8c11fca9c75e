//! Translation of forms to JavaScript statements and expressions.
//!
//! Three positions are distinguished:
//! - statement: value discarded (`statement`);
//! - tail: last form of a function body, its value is returned (`tail`);
//! - expression: value used (`expression`).
//!
//! `if`, `do` and block `let` become statements where possible and fall back
//! to ternaries or arrow IIFEs in expression position.

use crate::{
    errors::{CompileError, ErrorContext, Warning},
    syntax::{format_number, AstNode, Expr},
};

use super::{
    names::{is_host_global, js_string, mangle},
    runtime,
    scope::BindingKind,
    Generator,
};

type GenResult<T> = Result<T, CompileError>;

/// Heads that are always special forms.
const CORE_FORMS: &[&str] = &[
    "def", "var", "let", "set!", "fn", "defn", "if", "cond", "do", "return", "new", "quote",
    "quasiquote", "unquote", "unquote-splicing", "import", "export", "defmacro", "macro", "and",
    "or", "not", "+", "-", "*", "/", "%", "<", ">", "<=", ">=", "=", "==", "not=", "!=",
];

/// Heads lowered to runtime helpers unless shadowed by a binding.
const HELPER_FORMS: &[&str] = &["list", "vector", "hash-map", "hash-set", "str", "get"];

// ============================================================================
// TEXT HELPERS
// ============================================================================

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| if line.is_empty() { String::new() } else { format!("  {line}") })
        .collect::<Vec<_>>()
        .join("\n")
}

fn block(stmts: &[String]) -> String {
    if stmts.is_empty() {
        "{}".to_string()
    } else {
        format!("{{\n{}\n}}", indent(&stmts.join("\n")))
    }
}

fn iife(stmts: &[String]) -> String {
    format!("(() => {})()", block(stmts))
}

fn number_literal(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else {
        format_number(n)
    }
}

fn is_property_name(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

/// Index of the bracket closing the one at `open`, skipping string literals.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether the whole of `js` is one parenthesised group.
fn is_parenthesized(js: &str) -> bool {
    js.starts_with('(') && matching_close(js, 0) == Some(js.len() - 1)
}

fn is_path(js: &str) -> bool {
    !js.is_empty()
        && !js.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && js.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '.')
}

/// Wraps `js` in parentheses unless it can already be followed by `.name`
/// or `(args)`.
fn member_base(js: String) -> String {
    let call_on_path = js
        .find('(')
        .is_some_and(|open| is_path(&js[..open]) && matching_close(&js, open) == Some(js.len() - 1));
    if is_path(&js) || is_parenthesized(&js) || call_on_path {
        js
    } else {
        format!("({js})")
    }
}

fn strip_parens(js: &str) -> &str {
    if is_parenthesized(js) {
        &js[1..js.len() - 1]
    } else {
        js
    }
}

/// `(let [a 1 b 2] body..)` as opposed to `(let a 1)`.
fn is_let_block(items: &[AstNode]) -> bool {
    items
        .get(1)
        .is_some_and(|n| matches!(&*n.value, Expr::List(_) | Expr::Vector(_)))
}

fn is_else_marker(node: &AstNode) -> bool {
    matches!(&*node.value, Expr::Keyword(k) if k == "else") || node.value.is_symbol("else")
}

// ============================================================================
// POSITIONS
// ============================================================================

impl Generator<'_> {
    fn error(&self, node: &AstNode, message: impl Into<String>) -> CompileError {
        CompileError::generation(message, ErrorContext::at(self.file, node.span))
    }

    fn special_head<'n>(&self, node: &'n AstNode) -> Option<(&'n str, &'n [AstNode])> {
        let items = node.value.as_list()?;
        let head = items.first()?.value.as_symbol()?;
        let special = CORE_FORMS.contains(&head) || (HELPER_FORMS.contains(&head) && !self.scopes.is_bound(head));
        special.then_some((head, items))
    }

    pub(super) fn statement(&mut self, node: &AstNode) -> GenResult<Vec<String>> {
        let Some((head, items)) = self.special_head(node) else {
            return Ok(vec![self.expression_statement(node)?]);
        };
        match head {
            "def" => Ok(vec![self.binding(node, items, "const")?]),
            "var" => Ok(vec![self.binding(node, items, "let")?]),
            "let" if is_let_block(items) => Ok(vec![self.let_block(node, items, false)?]),
            "let" => Ok(vec![self.binding(node, items, "let")?]),
            "defn" => Ok(vec![self.function(node, items, true)?]),
            "if" => self.if_statement(node, items, false),
            "do" => {
                let mut out = Vec::new();
                for item in &items[1..] {
                    out.extend(self.statement(item)?);
                }
                Ok(out)
            }
            "return" => match items {
                [_] => Ok(vec!["return;".to_string()]),
                [_, value] => Ok(vec![format!("return {};", self.expression(value)?)]),
                _ => Err(self.error(node, "`return` expects at most one value")),
            },
            _ => Ok(vec![self.expression_statement(node)?]),
        }
    }

    fn tail(&mut self, node: &AstNode) -> GenResult<Vec<String>> {
        match self.special_head(node) {
            Some(("if", items)) => self.if_statement(node, items, true),
            Some(("do", items)) => self.body(&items[1..]),
            Some(("let", items)) if is_let_block(items) => Ok(vec![self.let_block(node, items, true)?]),
            Some(("def" | "var" | "let" | "defn" | "return", _)) => self.statement(node),
            _ => Ok(vec![format!("return {};", self.expression(node)?)]),
        }
    }

    /// Statements for `forms`, returning the value of the last one.
    fn body(&mut self, forms: &[AstNode]) -> GenResult<Vec<String>> {
        let mut out = Vec::new();
        if let Some((last, init)) = forms.split_last() {
            for form in init {
                out.extend(self.statement(form)?);
            }
            out.extend(self.tail(last)?);
        }
        Ok(out)
    }

    fn expression_statement(&mut self, node: &AstNode) -> GenResult<String> {
        let js = self.expression(node)?;
        if js.starts_with("function") || js.starts_with('{') {
            Ok(format!("({js});"))
        } else {
            Ok(format!("{js};"))
        }
    }

    pub(super) fn expression(&mut self, node: &AstNode) -> GenResult<String> {
        match &*node.value {
            Expr::Number(n) => Ok(number_literal(*n)),
            Expr::String(s) | Expr::Keyword(s) => Ok(js_string(s)),
            Expr::Bool(b) => Ok(b.to_string()),
            Expr::Nil => Ok("null".to_string()),
            Expr::Symbol(name) => self.symbol(node, name),
            Expr::Vector(items) => Ok(format!("[{}]", self.expressions(items)?)),
            Expr::Map(pairs) => self.map_literal(pairs),
            Expr::List(items) => self.list(node, items),
        }
    }

    fn expressions(&mut self, items: &[AstNode]) -> GenResult<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            parts.push(self.expression(item)?);
        }
        Ok(parts.join(", "))
    }

    // ========================================================================
    // SYMBOLS
    // ========================================================================

    fn check_reference(&mut self, node: &AstNode, name: &str) {
        if self.scopes.is_bound(name)
            || is_host_global(name)
            || self.macro_names.contains(name)
            || !self.warned.insert(name.to_string())
        {
            return;
        }
        self.warnings.push(Warning::UnresolvedReference {
            name: name.to_string(),
            module: self.module.to_string(),
            ctx: ErrorContext::at(self.file, node.span)
                .with_help("define or import it, or make sure the host provides it"),
        });
    }

    /// `a`, `obj.prop`, and `alias.hyphen-name` through the property-get helper.
    fn symbol(&mut self, node: &AstNode, name: &str) -> GenResult<String> {
        if name.starts_with('.') {
            return Err(self.error(node, format!("`{name}` is a method accessor and is only valid in call position")));
        }
        let mut segments = name.split('.');
        let root = segments.next().unwrap_or(name);
        self.check_reference(node, root);
        let mut js = mangle(root);
        for segment in segments {
            if is_property_name(segment) && !segment.contains('-') {
                js.push('.');
                js.push_str(segment);
            } else {
                let get = self.use_helper(runtime::GET);
                js = format!("{get}({js}, {})", js_string(segment));
            }
        }
        Ok(js)
    }

    /// Assignable form of a symbol: dotted segments become property writes.
    fn place(&mut self, node: &AstNode, name: &str) -> GenResult<String> {
        if name.starts_with('.') {
            return Err(self.error(node, format!("cannot assign to `{name}`")));
        }
        let mut segments = name.split('.');
        let root = segments.next().unwrap_or(name);
        self.check_reference(node, root);
        let mut js = mangle(root);
        for segment in segments {
            if is_property_name(segment) {
                js.push('.');
                js.push_str(segment);
            } else {
                js.push_str(&format!("[{}]", js_string(segment)));
            }
        }
        Ok(js)
    }

    fn binding_name<'n>(&self, node: &'n AstNode, what: &str) -> GenResult<&'n str> {
        node.value
            .as_symbol()
            .filter(|name| !name.contains('.'))
            .ok_or_else(|| self.error(node, format!("{what} must be a plain symbol, found {}", node.value.type_name())))
    }

    // ========================================================================
    // BINDINGS AND FUNCTIONS
    // ========================================================================

    /// `(def x v)`, `(var x v)`, `(let x v)`.
    fn binding(&mut self, node: &AstNode, items: &[AstNode], keyword: &str) -> GenResult<String> {
        let [head, name, value] = items else {
            return Err(self.error(node, format!("`{}` expects a name and a value", items[0].value)));
        };
        let name = self.binding_name(name, &format!("the name in `{}`", head.value))?;
        if !self.scopes.is_bound(name) {
            self.scopes.declare(name, BindingKind::Local);
        }
        let value = self.expression(value)?;
        Ok(format!("{keyword} {} = {};", mangle(name), strip_parens(&value)))
    }

    fn let_block(&mut self, node: &AstNode, items: &[AstNode], tail: bool) -> GenResult<String> {
        let pairs = items[1].value.as_sequence().unwrap_or(&[]);
        if pairs.len() % 2 != 0 {
            return Err(self.error(&items[1], "`let` bindings need an even number of forms"));
        }
        self.scopes.push();
        let mut stmts = Vec::new();
        for pair in pairs.chunks(2) {
            let name = self.binding_name(&pair[0], "a `let` binding name")?;
            let value = self.expression(&pair[1])?;
            self.scopes.declare(name, BindingKind::Local);
            stmts.push(format!("let {} = {};", mangle(name), strip_parens(&value)));
        }
        let body = &items[2..];
        if tail {
            stmts.extend(self.body(body)?);
        } else {
            for form in body {
                stmts.extend(self.statement(form)?);
            }
        }
        self.scopes.pop();
        if stmts.is_empty() {
            return Err(self.error(node, "empty `let`"));
        }
        Ok(block(&stmts))
    }

    /// Parameter list: symbols, optionally `& rest` at the end.
    fn params(&self, node: &AstNode) -> GenResult<Vec<(String, bool)>> {
        let Some(items) = node.value.as_sequence() else {
            return Err(self.error(node, "expected a parameter list"));
        };
        let mut params = Vec::new();
        let mut iter = items.iter().peekable();
        while let Some(item) = iter.next() {
            if item.value.is_symbol("&") {
                let rest = iter
                    .next()
                    .ok_or_else(|| self.error(item, "`&` must be followed by a rest parameter"))?;
                let name = self.binding_name(rest, "a rest parameter")?;
                if iter.peek().is_some() {
                    return Err(self.error(rest, "the rest parameter must be last"));
                }
                params.push((name.to_string(), true));
            } else {
                let name = self.binding_name(item, "a parameter")?;
                params.push((name.to_string(), false));
            }
        }
        Ok(params)
    }

    /// `(fn name? (params) body..)` or `(defn name (params) body..)`.
    fn function(&mut self, node: &AstNode, items: &[AstNode], declaration: bool) -> GenResult<String> {
        let mut rest = &items[1..];
        let name = match rest.first() {
            Some(first) if first.value.as_symbol().is_some() => {
                rest = &rest[1..];
                Some(self.binding_name(first, "a function name")?)
            }
            _ => None,
        };
        if declaration && name.is_none() {
            return Err(self.error(node, "`defn` expects a name, a parameter list and a body"));
        }
        let Some((params_node, body)) = rest.split_first() else {
            return Err(self.error(node, format!("`{}` expects a parameter list", items[0].value)));
        };
        let params = self.params(params_node)?;

        if let (true, Some(name)) = (declaration, name) {
            if !self.scopes.is_bound(name) {
                self.scopes.declare(name, BindingKind::Local);
            }
        }
        self.scopes.push();
        if let (false, Some(name)) = (declaration, name) {
            self.scopes.declare(name, BindingKind::Param);
        }
        for (param, _) in &params {
            self.scopes.declare(param, BindingKind::Param);
        }
        let stmts = self.body(body);
        self.scopes.pop();
        let stmts = stmts?;

        let params_js: Vec<String> = params
            .iter()
            .map(|(p, is_rest)| if *is_rest { format!("...{}", mangle(p)) } else { mangle(p) })
            .collect();
        let head = match name {
            Some(name) => format!("function {}", mangle(name)),
            None => "function ".to_string(),
        };
        Ok(format!("{head}({}) {}", params_js.join(", "), block(&stmts)))
    }

    // ========================================================================
    // CONTROL FLOW
    // ========================================================================

    fn if_statement(&mut self, node: &AstNode, items: &[AstNode], tail: bool) -> GenResult<Vec<String>> {
        let (cond, then, otherwise) = match items {
            [_, c, t] => (c, t, None),
            [_, c, t, e] => (c, t, Some(e)),
            _ => return Err(self.error(node, "`if` expects a condition, a branch and an optional else branch")),
        };
        let test = self.expression(cond)?;
        let then = if tail { self.tail(then)? } else { self.statement(then)? };
        let mut out = format!("if ({}) {}", strip_parens(&test), block(&then));
        if let Some(otherwise) = otherwise {
            let otherwise = if tail { self.tail(otherwise)? } else { self.statement(otherwise)? };
            if !otherwise.is_empty() {
                out.push_str(" else ");
                out.push_str(&block(&otherwise));
            }
        }
        Ok(vec![out])
    }

    fn ternary(&mut self, node: &AstNode, items: &[AstNode]) -> GenResult<String> {
        let (cond, then, otherwise) = match items {
            [_, c, t] => (c, t, None),
            [_, c, t, e] => (c, t, Some(e)),
            _ => return Err(self.error(node, "`if` expects a condition, a branch and an optional else branch")),
        };
        let test = self.expression(cond)?;
        let then = self.expression(then)?;
        let otherwise = match otherwise {
            Some(e) => self.expression(e)?,
            None => "undefined".to_string(),
        };
        Ok(format!("({test} ? {then} : {otherwise})"))
    }

    fn cond(&mut self, node: &AstNode, items: &[AstNode]) -> GenResult<String> {
        let clauses = &items[1..];
        if clauses.len() % 2 != 0 {
            return Err(self.error(node, "`cond` expects condition/value pairs"));
        }
        let mut arms = Vec::new();
        for pair in clauses.chunks(2) {
            let test = if is_else_marker(&pair[0]) {
                None
            } else {
                Some(self.expression(&pair[0])?)
            };
            arms.push((test, self.expression(&pair[1])?));
        }
        let mut acc = "undefined".to_string();
        for (test, value) in arms.into_iter().rev() {
            acc = match test {
                Some(test) => format!("({test} ? {value} : {acc})"),
                None => value,
            };
        }
        Ok(acc)
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    fn list(&mut self, node: &AstNode, items: &[AstNode]) -> GenResult<String> {
        let Some(first) = items.first() else {
            return Ok("[]".to_string());
        };
        if let Some((head, items)) = self.special_head(node) {
            return self.special_expression(node, head, items);
        }
        if let Some(method) = first.value.as_symbol().and_then(|s| s.strip_prefix('.')) {
            return self.method_call(node, method, &items[1..]);
        }
        let callee = self.callee(first)?;
        let args = self.expressions(&items[1..])?;
        Ok(format!("{callee}({args})"))
    }

    fn callee(&mut self, node: &AstNode) -> GenResult<String> {
        let js = self.expression(node)?;
        Ok(if node.value.as_symbol().is_some() { js } else { member_base(js) })
    }

    fn method_call(&mut self, node: &AstNode, method: &str, args: &[AstNode]) -> GenResult<String> {
        if method.is_empty() {
            return Err(self.error(node, "`.` needs a method name"));
        }
        let Some((target, rest)) = args.split_first() else {
            return Err(self.error(node, format!("`.{method}` needs a target object")));
        };
        let target = member_base(self.expression(target)?);
        let access = if is_property_name(method) {
            format!(".{method}")
        } else {
            format!("[{}]", js_string(method))
        };
        Ok(format!("{target}{access}({})", self.expressions(rest)?))
    }

    fn special_expression(&mut self, node: &AstNode, head: &str, items: &[AstNode]) -> GenResult<String> {
        let args = &items[1..];
        match head {
            "def" | "var" | "defn" | "return" => {
                Err(self.error(node, format!("`{head}` is a statement and cannot be used as a value")))
            }
            "let" if is_let_block(items) => {
                let block = self.let_block(node, items, true)?;
                Ok(format!("(() => {block})()"))
            }
            "let" => Err(self.error(node, "`let` is a statement and cannot be used as a value")),
            "import" | "export" => Err(self.error(node, format!("`{head}` is only allowed at module top level"))),
            "defmacro" | "macro" => Err(self.error(node, "macro definitions are only allowed at module top level")),
            "unquote" | "unquote-splicing" => {
                Err(self.error(node, format!("`{head}` is only valid inside a quasiquote")))
            }
            "set!" => match args {
                [target, value] => {
                    let Some(name) = target.value.as_symbol() else {
                        return Err(self.error(target, "`set!` target must be a symbol"));
                    };
                    let place = self.place(target, name)?;
                    let value = self.expression(value)?;
                    Ok(format!("({place} = {value})"))
                }
                _ => Err(self.error(node, "`set!` expects a target and a value")),
            },
            "fn" => self.function(node, items, false),
            "if" => self.ternary(node, items),
            "cond" => self.cond(node, items),
            "do" => match args {
                [] => Ok("undefined".to_string()),
                [one] => self.expression(one),
                forms => {
                    let stmts = self.body(forms)?;
                    Ok(iife(&stmts))
                }
            },
            "new" => {
                let Some((class, rest)) = args.split_first() else {
                    return Err(self.error(node, "`new` expects a constructor"));
                };
                let class = self.callee(class)?;
                Ok(format!("new {class}({})", self.expressions(rest)?))
            }
            "quote" => match args {
                [x] => Ok(self.quoted(x)),
                _ => Err(self.error(node, "`quote` expects exactly one form")),
            },
            "quasiquote" => match args {
                [x] => self.quasi(x, 1),
                _ => Err(self.error(node, "`quasiquote` expects exactly one form")),
            },
            "and" => self.logical(args, "&&", "true"),
            "or" => self.logical(args, "||", "false"),
            "not" => match args {
                [x] => Ok(format!("(!{})", self.expression(x)?)),
                _ => Err(self.error(node, "`not` expects one argument")),
            },
            "+" | "*" => match args {
                [] => Ok(if head == "+" { "0" } else { "1" }.to_string()),
                [x] => self.expression(x),
                _ => self.infix(args, head),
            },
            "-" => match args {
                [] => Err(self.error(node, "`-` expects at least one argument")),
                [x] => {
                    let x = self.expression(x)?;
                    Ok(if x.starts_with('-') { format!("(-({x}))") } else { format!("(-{x})") })
                }
                _ => self.infix(args, "-"),
            },
            "/" => match args {
                [] => Err(self.error(node, "`/` expects at least one argument")),
                [x] => Ok(format!("(1 / {})", self.expression(x)?)),
                _ => self.infix(args, "/"),
            },
            "%" => match args {
                [_, _] => self.infix(args, "%"),
                _ => Err(self.error(node, "`%` expects two arguments")),
            },
            "<" | ">" | "<=" | ">=" | "=" | "==" => {
                let op = match head {
                    "=" | "==" => "===",
                    other => other,
                };
                self.comparison(node, head, args, op)
            }
            "not=" | "!=" => match args {
                [_, _] => self.infix(args, "!=="),
                _ => Err(self.error(node, format!("`{head}` expects two arguments"))),
            },
            "list" => self.helper_call(runtime::LIST, args),
            "vector" => self.helper_call(runtime::VECTOR, args),
            "hash-map" => {
                if args.len() % 2 != 0 {
                    return Err(self.error(node, "`hash-map` expects key/value pairs"));
                }
                self.helper_call(runtime::HASH_MAP, args)
            }
            "hash-set" => self.helper_call(runtime::HASH_SET, args),
            "str" => self.helper_call(runtime::STR, args),
            "get" => match args {
                [_, _] | [_, _, _] => self.helper_call(runtime::GET, args),
                _ => Err(self.error(node, "`get` expects a target, a key and an optional default")),
            },
            _ => Err(self.error(node, format!("no translation for `{head}`"))),
        }
    }

    fn helper_call(&mut self, helper: &'static str, args: &[AstNode]) -> GenResult<String> {
        let name = self.use_helper(helper);
        Ok(format!("{name}({})", self.expressions(args)?))
    }

    fn infix(&mut self, args: &[AstNode], op: &str) -> GenResult<String> {
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            parts.push(self.expression(arg)?);
        }
        Ok(format!("({})", parts.join(&format!(" {op} "))))
    }

    /// `(< a b c)` is `(a < b && b < c)`.
    fn comparison(&mut self, node: &AstNode, head: &str, args: &[AstNode], op: &str) -> GenResult<String> {
        if args.len() < 2 {
            return Err(self.error(node, format!("`{head}` expects at least two arguments")));
        }
        let mut operands = Vec::with_capacity(args.len());
        for arg in args {
            operands.push(self.expression(arg)?);
        }
        let links: Vec<String> = operands
            .windows(2)
            .map(|pair| format!("{} {op} {}", pair[0], pair[1]))
            .collect();
        Ok(format!("({})", links.join(" && ")))
    }

    fn logical(&mut self, args: &[AstNode], op: &str, empty: &str) -> GenResult<String> {
        match args {
            [] => Ok(empty.to_string()),
            [x] => self.expression(x),
            _ => self.infix(args, op),
        }
    }

    fn map_literal(&mut self, pairs: &[(AstNode, AstNode)]) -> GenResult<String> {
        let literal_keys = pairs
            .iter()
            .all(|(k, _)| matches!(&*k.value, Expr::String(_) | Expr::Keyword(_)));
        if literal_keys {
            let mut entries = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                entries.push(format!("{}: {}", self.expression(k)?, self.expression(v)?));
            }
            return Ok(object(&entries));
        }
        let mut parts = Vec::with_capacity(pairs.len() * 2);
        for (k, v) in pairs {
            parts.push(self.expression(k)?);
            parts.push(self.expression(v)?);
        }
        let name = self.use_helper(runtime::HASH_MAP);
        Ok(format!("{name}({})", parts.join(", ")))
    }

    // ========================================================================
    // QUOTED DATA
    // ========================================================================

    /// Runtime data for a quoted form: symbols and keywords become strings,
    /// lists and vectors become arrays.
    fn quoted(&mut self, node: &AstNode) -> String {
        match &*node.value {
            Expr::Symbol(s) | Expr::Keyword(s) | Expr::String(s) => js_string(s),
            Expr::Number(n) => number_literal(*n),
            Expr::Bool(b) => b.to_string(),
            Expr::Nil => "null".to_string(),
            Expr::List(items) | Expr::Vector(items) => {
                let parts: Vec<String> = items.iter().map(|i| self.quoted(i)).collect();
                format!("[{}]", parts.join(", "))
            }
            Expr::Map(pairs) => {
                let literal_keys = pairs
                    .iter()
                    .all(|(k, _)| matches!(&*k.value, Expr::String(_) | Expr::Keyword(_) | Expr::Symbol(_)));
                if literal_keys {
                    let entries: Vec<String> = pairs
                        .iter()
                        .map(|(k, v)| format!("{}: {}", self.quoted(k), self.quoted(v)))
                        .collect();
                    object(&entries)
                } else {
                    let mut parts = Vec::new();
                    for (k, v) in pairs {
                        parts.push(self.quoted(k));
                        parts.push(self.quoted(v));
                    }
                    let name = self.use_helper(runtime::HASH_MAP);
                    format!("{name}({})", parts.join(", "))
                }
            }
        }
    }

    /// Quasiquoted data: like [`Self::quoted`] except that unquoted parts at
    /// `level` 1 are evaluated and spliced parts are spread into the array.
    fn quasi(&mut self, node: &AstNode, level: usize) -> GenResult<String> {
        let Expr::List(items) = &*node.value else {
            return match &*node.value {
                Expr::Vector(items) => self.quasi_items(items, level),
                _ => Ok(self.quoted(node)),
            };
        };
        match (node.value.head_symbol(), items.as_slice()) {
            (Some("unquote"), [_, inner]) if level == 1 => self.expression(inner),
            (Some("unquote-splicing"), [_, _]) if level == 1 => {
                Err(self.error(node, "`unquote-splicing` must appear inside a list or vector"))
            }
            (Some(head @ ("unquote" | "unquote-splicing")), [_, inner]) => {
                Ok(format!("[{}, {}]", js_string(head), self.quasi(inner, level - 1)?))
            }
            (Some("quasiquote"), [_, inner]) => Ok(format!("[\"quasiquote\", {}]", self.quasi(inner, level + 1)?)),
            _ => self.quasi_items(items, level),
        }
    }

    fn quasi_items(&mut self, items: &[AstNode], level: usize) -> GenResult<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match (item.value.head_symbol(), item.value.as_list()) {
                (Some("unquote-splicing"), Some([_, inner])) if level == 1 => {
                    parts.push(format!("...{}", member_base(self.expression(inner)?)));
                }
                _ => parts.push(self.quasi(item, level)?),
            }
        }
        Ok(format!("[{}]", parts.join(", ")))
    }
}

fn object(entries: &[String]) -> String {
    if entries.is_empty() {
        "{}".to_string()
    } else {
        format!("{{ {} }}", entries.join(", "))
    }
}
