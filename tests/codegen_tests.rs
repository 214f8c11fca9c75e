//! End-to-end text generation through the public entry points.

mod common;

use common::project;
use sprig::{
    codegen::runtime_module_source, compile_to_text, run, CompileError, CompileOptions,
    EvaluationAdapter, RunOptions, RunOutcome,
};

fn compile(source: &str) -> String {
    compile_to_text(source, &CompileOptions::default()).unwrap_or_else(|e| panic!("{e}"))
}

#[test]
fn module_with_function_and_call() {
    let text = compile("(defn add (a b) (+ a b)) (export [add]) (add 5 3)");
    assert!(text.starts_with("// Generated by sprig from <input>\n"), "{text}");
    assert!(text.contains("function add(a, b) {"), "{text}");
    assert!(text.contains("\nadd(5, 3);\n"), "{text}");
    assert!(text.contains("export { add };"));
    assert!(text.ends_with("export default { \"add\": add };\n"), "{text}");
}

#[test]
fn macro_output_is_generated_not_the_definition() {
    let text = compile("(defmacro twice (x) (list '+ x x)) (def ten (twice 5))");
    assert!(text.contains("const ten = 5 + 5;"), "{text}");
    assert!(!text.contains("twice"), "{text}");
    assert!(text.ends_with("export default {};\n"));
}

#[test]
fn prelude_when_becomes_a_statement_if() {
    let text = compile("(defn check (ok) (when ok (log 1) 2))");
    assert!(text.contains("if (ok) {"), "{text}");
    assert!(text.contains("return 2;"), "{text}");
}

#[test]
fn external_imports_are_left_alone() {
    let text = compile(r#"(import [use-state as hook] from "react") (import "./setup.sprig") (hook 0)"#);
    assert!(text.contains(r#"import { "use-state" as hook } from "react";"#), "{text}");
    assert!(text.contains(r#"import "./setup.js";"#), "{text}");
    assert!(text.contains("\nhook(0);\n"));
}

#[test]
fn inline_runtime_carries_helper_source() {
    let options = CompileOptions {
        inline_runtime: true,
        ..CompileOptions::default()
    };
    let text = compile_to_text("(def s (str 1 2)) (def v (get s :length))", &options).unwrap();
    assert!(text.contains("function __sprig_str("), "{text}");
    assert!(text.contains("function __sprig_get("), "{text}");
    assert!(!text.contains("sprig-runtime.js"), "{text}");
}

#[test]
fn runtime_module_exports_every_helper() {
    let source = runtime_module_source();
    for helper in ["__sprig_list", "__sprig_vector", "__sprig_hash_map", "__sprig_hash_set", "__sprig_str", "__sprig_get"] {
        assert!(source.contains(&format!("export function {helper}(")), "{helper}");
    }
}

#[test]
fn generation_errors_carry_location() {
    let err = compile_to_text("(def ok 1)\n(f ~x)", &CompileOptions::default()).unwrap_err();
    assert!(matches!(err, CompileError::Generation { .. }), "{err}");
    let span = err.span().expect("generation errors are located");
    assert!(span.start >= "(def ok 1)\n".len());
}

#[test]
fn warnings_are_collected_per_session() {
    let mut session = project(&[]);
    session.compile_source("a.sprig", "(console.log 1) (undefined-fn 2)").unwrap();
    let names: Vec<String> = session.take_warnings().iter().map(|w| w.name().to_string()).collect();
    assert_eq!(names, vec!["undefined-fn"]);
    assert!(session.warnings().is_empty());
}

struct Recorder {
    programs: Vec<String>,
    reject: bool,
}

impl EvaluationAdapter for Recorder {
    fn evaluate(&mut self, program: &str) -> Result<(), String> {
        self.programs.push(program.to_string());
        if self.reject {
            Err("ReferenceError: nope is not defined".to_string())
        } else {
            Ok(())
        }
    }
}

#[test]
fn run_hands_self_contained_program_to_adapter() {
    let mut adapter = Recorder { programs: Vec::new(), reject: false };
    let outcome = run(
        "(def xs (vector 1 2)) (console.log xs)",
        RunOptions {
            adapter: Some(&mut adapter),
            ..RunOptions::default()
        },
    )
    .unwrap();
    let RunOutcome::Evaluated(program) = outcome else {
        panic!("expected evaluation");
    };
    assert!(program.contains("function __sprig_vector("));
    assert_eq!(adapter.programs, vec![program]);
}

#[test]
fn run_reports_adapter_failures() {
    let mut adapter = Recorder { programs: Vec::new(), reject: true };
    let outcome = run(
        "(nope)",
        RunOptions {
            adapter: Some(&mut adapter),
            ..RunOptions::default()
        },
    )
    .unwrap();
    assert!(matches!(outcome, RunOutcome::Failed { message, .. } if message.starts_with("ReferenceError")));
    assert!(matches!(run("(f 1)", RunOptions::default()).unwrap(), RunOutcome::Unevaluated(_)));
}

#[test]
fn unicode_symbols_compile_to_identifiers() {
    let text = compile("(def café 1) (def x٣ 2) (export [café]) (console.log café x٣)");
    assert!(text.contains("const café = 1;"), "{text}");
    assert!(text.contains("const x$u663$ = 2;"), "{text}");
    assert!(text.contains("console.log(café, x$u663$);"), "{text}");
    assert!(text.contains("export { café };"), "{text}");
}

#[test]
fn macro_produced_exports_are_rejected() {
    let err = compile_to_text(
        "(defmacro export-all () '(export [x])) (def x 1) (export-all)",
        &CompileOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, CompileError::Generation { .. }), "{err}");
    assert!(err.to_string().contains("export-all"), "{err}");
}
