use miette::Diagnostic;
use sprig::{
    syntax::{read, read_all},
    CompileError, ErrorType, Expr, SourceMap,
};

#[test]
fn forms_carry_spans_into_their_own_file() {
    let mut sources = SourceMap::new();
    let a = sources.add("a.sprig", "(def x 1)");
    let b = sources.add("b.sprig", "  (def y 2)");
    let a_forms = read_all(&a).unwrap();
    let b_forms = read_all(&b).unwrap();
    assert_ne!(a_forms[0].span.file, b_forms[0].span.file);
    assert_eq!((b_forms[0].span.start, b_forms[0].span.end), (2, 11));
    assert_eq!(sources.name_of(b_forms[0].span.file), "b.sprig");
}

#[test]
fn reader_yields_forms_before_the_first_error() {
    let mut sources = SourceMap::new();
    let file = sources.add("lazy.sprig", "(ok 1) (also ok) (broken");
    let mut reader = read(&file);
    assert!(reader.next().unwrap().is_ok());
    assert!(reader.next().unwrap().is_ok());
    let err = reader.next().unwrap().unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Syntax);
    assert!(reader.next().is_none());
}

#[test]
fn keywords_symbols_and_collections() {
    let mut sources = SourceMap::new();
    let file = sources.add("t.sprig", "; leading comment\n{:name \"ada\" :tags [a b]} user-name :else");
    let forms = read_all(&file).unwrap();
    assert_eq!(forms.len(), 3);
    let Expr::Map(pairs) = &*forms[0].value else {
        panic!("expected a map, got {}", forms[0]);
    };
    assert_eq!(*pairs[0].0.value, Expr::Keyword("name".into()));
    assert!(matches!(&*pairs[1].1.value, Expr::Vector(items) if items.len() == 2));
    assert_eq!(forms[1].value.as_symbol(), Some("user-name"));
    assert_eq!(*forms[2].value, Expr::Keyword("else".into()));
}

#[test]
fn reader_macros_print_in_long_form() {
    let mut sources = SourceMap::new();
    let file = sources.add("t.sprig", "'(a b) `(c ~d ~@e)");
    let printed: Vec<String> = read_all(&file).unwrap().iter().map(|f| f.to_string()).collect();
    assert_eq!(
        printed,
        vec![
            "(quote (a b))".to_string(),
            "(quasiquote (c (unquote d) (unquote-splicing e)))".to_string(),
        ]
    );
}

#[test]
fn syntax_errors_render_with_their_code() {
    let mut sources = SourceMap::new();
    let file = sources.add("bad.sprig", "(def x [1 2)");
    let err = read_all(&file).unwrap_err();
    let CompileError::Syntax { file: name, .. } = &err else {
        panic!("expected a syntax error, got {err:?}");
    };
    assert_eq!(name, "bad.sprig");
    let code = err.code().map(|c| c.to_string()).unwrap_or_default();
    assert!(code.starts_with("sprig::syntax"), "{code}");
    assert!(err.source_code().is_some());
}
