//! Reader: source text to syntax nodes.
//!
//! Reading is lazy over top-level forms. Each form is parsed on its own, so a
//! malformed form later in a file never hides the forms before it.

use pest::{
    error::{Error as PestError, ErrorVariant, InputLocation},
    iterators::Pair,
    Parser,
};
use pest_derive::Parser;

use crate::{
    errors::{CompileError, ErrorContext},
    source::SourceFile,
    syntax::{make_list, make_wrapped, node, AstNode, Expr, Span},
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct SprigParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// True when `text` looks like source in this language rather than plain JavaScript.
pub fn is_source_language(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('(') || trimmed.starts_with('[')
}

/// Lazily reads the top-level forms of `file`.
pub fn read(file: &SourceFile) -> Reader<'_> {
    Reader {
        file,
        pos: 0,
        failed: false,
    }
}

/// Reads every top-level form, failing on the first malformed one.
pub fn read_all(file: &SourceFile) -> Result<Vec<AstNode>, CompileError> {
    read(file).collect()
}

/// Iterator over the top-level forms of one source file. Exhausted after the
/// first error.
pub struct Reader<'a> {
    file: &'a SourceFile,
    pos: usize,
    failed: bool,
}

impl Iterator for Reader<'_> {
    type Item = Result<AstNode, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.pos = skip_trivia(&self.file.text, self.pos);
        if self.pos >= self.file.text.len() {
            return None;
        }
        match read_form(self.file, self.pos) {
            Ok((form, end)) => {
                self.pos = end;
                Some(Ok(form))
            }
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

// ============================================================================
// FORM READING
// ============================================================================

fn skip_trivia(text: &str, mut pos: usize) -> usize {
    let bytes = text.as_bytes();
    while pos < bytes.len() {
        match bytes[pos] {
            b' ' | b'\t' | b'\r' | b'\n' | b',' => pos += 1,
            b';' => {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            }
            _ => break,
        }
    }
    pos
}

/// Parses the single form starting at `offset`, returning it and the offset
/// just past it.
fn read_form(file: &SourceFile, offset: usize) -> Result<(AstNode, usize), CompileError> {
    let input = &file.text[offset..];
    let mut pairs = SprigParser::parse(Rule::form, input)
        .map_err(|e| convert_parse_error(e, file, offset))?;
    let form = pairs
        .next()
        .ok_or_else(|| syntax_error(file, offset, "expression"))?;
    let end = offset + form.as_span().end();
    let expr = form
        .into_inner()
        .next()
        .ok_or_else(|| syntax_error(file, offset, "expression"))?;
    let builder = Builder { file, offset };
    Ok((builder.build(expr)?, end))
}

struct Builder<'a> {
    file: &'a SourceFile,
    offset: usize,
}

impl Builder<'_> {
    fn span(&self, pair: &Pair<Rule>) -> Span {
        let s = pair.as_span();
        Span::new(self.file.id, self.offset + s.start(), self.offset + s.end())
    }

    fn build(&self, pair: Pair<Rule>) -> Result<AstNode, CompileError> {
        let span = self.span(&pair);
        match pair.as_rule() {
            Rule::quote => self.build_wrapped("quote", pair, span),
            Rule::quasiquote => self.build_wrapped("quasiquote", pair, span),
            Rule::unquote => self.build_wrapped("unquote", pair, span),
            Rule::unquote_splicing => self.build_wrapped("unquote-splicing", pair, span),

            Rule::list => Ok(make_list(self.build_children(pair)?, span)),
            Rule::vector => Ok(node(Expr::Vector(self.build_children(pair)?), span)),
            Rule::map => {
                let items = self.build_children(pair)?;
                if items.len() % 2 != 0 {
                    let at = span.end.saturating_sub(1);
                    return Err(syntax_error(self.file, at, "a value for every map key"));
                }
                let mut pairs = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    pairs.push((k, v));
                }
                Ok(node(Expr::Map(pairs), span))
            }

            Rule::string => {
                let body = pair
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::string_body)
                    .ok_or_else(|| syntax_error(self.file, span.start, "string"))?;
                let body_start = self.offset + body.as_span().start();
                let text = unescape_string(body.as_str(), body_start, self.file)?;
                Ok(node(Expr::String(text), span))
            }

            Rule::number => {
                let text = pair.as_str();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| syntax_error(self.file, span.start, "number"))?;
                Ok(node(Expr::Number(value), span))
            }

            Rule::keyword => Ok(node(Expr::Keyword(pair.as_str()[1..].to_string()), span)),

            Rule::symbol => {
                let text = pair.as_str();
                let expr = match text {
                    "true" => Expr::Bool(true),
                    "false" => Expr::Bool(false),
                    "nil" => Expr::Nil,
                    _ if text.contains("..") || (text.len() > 1 && text.ends_with('.')) => {
                        return Err(syntax_error(self.file, span.start, "symbol"));
                    }
                    _ => Expr::Symbol(text.to_string()),
                };
                Ok(node(expr, span))
            }

            _ => Err(syntax_error(self.file, span.start, "expression")),
        }
    }

    fn build_wrapped(&self, head: &str, pair: Pair<Rule>, span: Span) -> Result<AstNode, CompileError> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| syntax_error(self.file, span.end, "expression"))?;
        Ok(make_wrapped(head, self.build(inner)?, span))
    }

    fn build_children(&self, pair: Pair<Rule>) -> Result<Vec<AstNode>, CompileError> {
        pair.into_inner()
            .filter(|p| {
                !matches!(
                    p.as_rule(),
                    Rule::close_paren | Rule::close_bracket | Rule::close_brace
                )
            })
            .map(|p| self.build(p))
            .collect()
    }
}

fn unescape_string(body: &str, body_start: usize, file: &SourceFile) -> Result<String, CompileError> {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.char_indices();
    while let Some((i, ch)) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some((_, 'n')) => result.push('\n'),
            Some((_, 't')) => result.push('\t'),
            Some((_, 'r')) => result.push('\r'),
            Some((_, '0')) => result.push('\0'),
            Some((_, '\\')) => result.push('\\'),
            Some((_, '"')) => result.push('"'),
            _ => return Err(syntax_error(file, body_start + i, "a valid escape sequence")),
        }
    }
    Ok(result)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

fn syntax_error(file: &SourceFile, offset: usize, expected: &str) -> CompileError {
    let span = Span::new(file.id, offset, offset + 1);
    CompileError::Syntax {
        file: file.name.clone(),
        offset,
        expected: expected.to_string(),
        ctx: ErrorContext::at(file, span),
    }
}

fn describe_rule(rule: Rule) -> &'static str {
    match rule {
        Rule::close_paren => "`)`",
        Rule::close_bracket => "`]`",
        Rule::close_brace => "`}`",
        Rule::close_quote => "closing `\"`",
        _ => "expression",
    }
}

fn convert_parse_error(error: PestError<Rule>, file: &SourceFile, offset: usize) -> CompileError {
    let pos = match error.location {
        InputLocation::Pos(p) => p,
        InputLocation::Span((start, _)) => start,
    };
    let expected = match &error.variant {
        ErrorVariant::ParsingError { positives, .. } if !positives.is_empty() => {
            let mut names: Vec<&str> = Vec::new();
            for rule in positives {
                let name = describe_rule(*rule);
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            names.join(" or ")
        }
        ErrorVariant::CustomError { message } => message.clone(),
        _ => "expression".to_string(),
    };
    syntax_error(file, offset + pos, &expected)
}
