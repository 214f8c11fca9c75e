//! Identifier mangling and JavaScript literal helpers.

use std::collections::HashSet;

use once_cell::sync::Lazy;

static RESERVED_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
        "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
        "if", "implements", "import", "in", "instanceof", "interface", "let", "new", "null",
        "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
        "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield", "eval",
        "arguments",
    ]
    .into_iter()
    .collect()
});

/// Globals every JavaScript host provides; referencing them is not a warning.
static HOST_GLOBALS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "console", "Math", "JSON", "Object", "Array", "String", "Number", "Boolean", "Symbol",
        "BigInt", "Promise", "Date", "RegExp", "Error", "TypeError", "RangeError", "SyntaxError",
        "Map", "Set", "WeakMap", "WeakSet", "Reflect", "Proxy", "Intl", "globalThis", "window",
        "document", "process", "require", "module", "exports", "setTimeout", "clearTimeout",
        "setInterval", "clearInterval", "queueMicrotask", "structuredClone", "fetch", "parseInt",
        "parseFloat", "isNaN", "isFinite", "encodeURIComponent", "decodeURIComponent", "undefined",
        "NaN", "Infinity", "this", "arguments",
    ]
    .into_iter()
    .collect()
});

pub fn is_reserved(name: &str) -> bool {
    RESERVED_WORDS.contains(name)
}

pub fn is_host_global(name: &str) -> bool {
    HOST_GLOBALS.contains(name)
}

/// Maps a source identifier to a valid JavaScript identifier:
/// `double-five` → `double_five`, `empty?` → `empty$p`, `set!` → `set$b`.
///
/// `-` is the only character written as a bare `_`; every other escape starts
/// with `$`, so two distinct names never share a mangled form (`a_b` becomes
/// `a$_b`). Reserved words and leading digits get a `$k` prefix.
pub fn mangle(name: &str) -> String {
    if name == "this" || name == "arguments" {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        let code = match ch {
            '-' => {
                out.push('_');
                continue;
            }
            c if c.is_ascii_alphanumeric() || (!c.is_ascii() && c.is_alphabetic()) => {
                out.push(c);
                continue;
            }
            '_' => '_',
            '$' => '$',
            '?' => 'p',
            '!' => 'b',
            '*' => 'x',
            '+' => 'a',
            '<' => 'l',
            '>' => 'g',
            '=' => 'e',
            '/' => 's',
            '%' => 'c',
            '&' => 'n',
            '#' => 'h',
            '|' => 'v',
            '^' => 'r',
            other => {
                out.push_str(&format!("$u{:x}$", other as u32));
                continue;
            }
        };
        out.push('$');
        out.push(code);
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) || is_reserved(&out) {
        out.insert_str(0, "$k");
    }
    out
}

/// Whether `text` can be used verbatim as a JavaScript identifier.
pub fn is_identifier(text: &str) -> bool {
    let start = |c: char| c.is_alphabetic() || c == '_' || c == '$';
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    start(first) && chars.all(|c| start(c) || c.is_ascii_digit()) && !is_reserved(text)
}

/// A JavaScript string literal for `text`.
pub fn js_string(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| format!("{text:?}"))
}

/// The ES export name for a source binding: the bare identifier when mangling
/// leaves it unchanged, otherwise a string export name such as `"double-five"`.
pub fn export_name(name: &str) -> String {
    if is_identifier(name) && mangle(name) == name {
        name.to_string()
    } else {
        js_string(name)
    }
}
