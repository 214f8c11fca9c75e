//! Project-level resolution through a compilation session.

mod common;

use std::path::{Path, PathBuf};

use common::{project, text_of};
use sprig::{
    errors::ImportFailure,
    interop::{get_property, HostValue},
    modules::CompileEvent,
    CompileError, ErrorType,
};

#[test]
fn diamond_compiles_shared_module_once() {
    let mut session = project(&[
        ("/p/main.sprig", r#"(import [b] from "./b.sprig") (import [c] from "./c.sprig") (def d [b c])"#),
        ("/p/b.sprig", r#"(import [a] from "./a.sprig") (def b a) (export [b])"#),
        ("/p/c.sprig", r#"(import [a] from "./a.sprig") (def c a) (export [c])"#),
        ("/p/a.sprig", "(def a 1) (export [a])"),
    ]);
    let modules = session.compile("/p/main.sprig").unwrap();
    let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["a.sprig", "b.sprig", "c.sprig", "main.sprig"]);
    assert_eq!(session.loader().read_count("/p/a.sprig"), 1);
    let generated = session
        .events()
        .iter()
        .filter(|e| matches!(e, CompileEvent::Generated { module } if module == "a.sprig"))
        .count();
    assert_eq!(generated, 1);
}

#[test]
fn mutually_importing_modules_both_generate() {
    let mut session = project(&[
        ("/p/even.sprig", r#"(import [odd?] from "./odd.sprig") (defn even? (n) (if (= n 0) true (odd? (- n 1)))) (export [even?])"#),
        ("/p/odd.sprig", r#"(import [even?] from "./even.sprig") (defn odd? (n) (if (= n 0) false (even? (- n 1)))) (export [odd?])"#),
    ]);
    let modules = session.compile("/p/even.sprig").unwrap();
    assert_eq!(modules.len(), 2);
    assert!(text_of(&modules, "odd.sprig").contains(r#"import { "even?" as even$p } from "./even.js";"#));
    assert!(text_of(&modules, "even.sprig").contains(r#"export { even$p as "even?" };"#));
    assert!(session
        .events()
        .iter()
        .any(|e| matches!(e, CompileEvent::Deferred { .. })));
}

#[test]
fn nested_modules_keep_their_layout() {
    let mut session = project(&[
        ("/p/main.sprig", r#"(import [fmt] from "./lib/text/fmt.sprig") (def s (fmt 1))"#),
        ("/p/lib/text/fmt.sprig", r#"(defn fmt (x) (str "<" x ">")) (export [fmt])"#),
    ]);
    let modules = session.compile("/p/main.sprig").unwrap();
    let lib = modules.iter().find(|m| m.output_path == Path::new("lib/text/fmt.js")).unwrap();
    assert!(lib.artifact.text.contains(r#"from "../../sprig-runtime.js";"#), "{}", lib.artifact.text);
    assert!(text_of(&modules, "main.sprig").contains(r#"from "./lib/text/fmt.js";"#));
    assert_eq!(modules.last().unwrap().output_path, PathBuf::from("main.js"));
}

#[test]
fn namespace_import_reaches_hyphenated_exports() {
    let mut session = project(&[
        ("/p/lib.sprig", "(def double-five 10) (export [double-five])"),
        ("/p/main.sprig", r#"(import lib from "./lib.sprig") (def x lib.double-five)"#),
    ]);
    let modules = session.compile("/p/main.sprig").unwrap();
    let lib = text_of(&modules, "lib.sprig");
    assert!(lib.contains(r#"export { double_five as "double-five" };"#), "{lib}");
    assert!(lib.contains(r#"export default { "double-five": double_five };"#), "{lib}");
    let main = text_of(&modules, "main.sprig");
    assert!(main.contains(r#"import * as lib from "./lib.js";"#));
    assert!(main.contains(r#"const x = __sprig_get(lib, "double-five");"#), "{main}");
}

#[test]
fn missing_export_fails_with_import_error() {
    let mut session = project(&[
        ("/p/main.sprig", r#"(import [nope] from "./lib.sprig")"#),
        ("/p/lib.sprig", "(def yes 1) (export [yes])"),
    ]);
    let err = session.compile("/p/main.sprig").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Import);
    assert!(matches!(
        err,
        CompileError::UnresolvedImport { reason: ImportFailure::MissingExport, .. }
    ));
    assert!(err.to_string().contains("./lib.sprig"), "{err}");
}

#[test]
fn exporting_an_undefined_name_fails() {
    let mut session = project(&[("/p/main.sprig", "(def a 1) (export [a b])")]);
    let err = session.compile("/p/main.sprig").unwrap_err();
    match err {
        CompileError::UnknownExport { name, module, .. } => {
            assert_eq!(name, "b");
            assert_eq!(module, "main.sprig");
        }
        other => panic!("expected an unknown export, got {other}"),
    }
}

#[test]
fn failed_module_does_not_poison_unrelated_entries() {
    let mut session = project(&[
        ("/p/bad.sprig", "(def x (1 2"),
        ("/p/good.sprig", "(def y 2) (export [y])"),
    ]);
    assert_eq!(session.compile("/p/bad.sprig").unwrap_err().error_type(), ErrorType::Syntax);
    let modules = session.compile("/p/good.sprig").unwrap();
    assert!(text_of(&modules, "good.sprig").contains("const y = 2;"));
}

#[test]
fn manifests_describe_exports_and_helpers() {
    let mut session = project(&[(
        "/p/main.sprig",
        r#"(defmacro twice (x) (list '+ x x)) (def xs (list 1 2)) (export [xs twice])"#,
    )]);
    let modules = session.compile("/p/main.sprig").unwrap();
    let manifest = &modules[0].artifact.manifest;
    assert_eq!(manifest.exports, vec!["xs".to_string()]);
    assert_eq!(manifest.macros, vec!["twice".to_string()]);
    assert!(!manifest.has_default_export);
    assert_eq!(manifest.runtime_helpers, vec!["__sprig_list".to_string()]);
}

#[test]
fn name_bound_as_macro_and_value_cannot_be_exported() {
    let mut session = project(&[
        ("/p/x.sprig", "(defmacro dbl (x) (list 'boom x)) (defn dbl (x) (* x 2)) (export [dbl])"),
        ("/p/main.sprig", r#"(import [dbl] from "./x.sprig") (def r (dbl 4))"#),
    ]);
    let err = session.compile("/p/main.sprig").unwrap_err();
    assert_eq!(err.error_type(), ErrorType::Macro);
    assert!(err.to_string().contains("both a macro and a value"), "{err}");
    assert!(session.module(Path::new("/p/main.sprig")).and_then(|m| m.output.as_ref()).is_none());
}

#[test]
fn local_macro_never_reaches_importers_of_a_value() {
    let mut session = project(&[
        ("/p/x.sprig", "(defmacro helper (x) (list 'boom x)) (defn dbl (x) (helper x)) (export [dbl])"),
        ("/p/main.sprig", r#"(import [dbl] from "./x.sprig") (def r (dbl 4)) (def s (helper 1))"#),
    ]);
    let modules = session.compile("/p/main.sprig").unwrap();
    let x = text_of(&modules, "x.sprig");
    assert!(x.contains("export { dbl };"), "{x}");
    let main = text_of(&modules, "main.sprig");
    assert!(main.contains(r#"import { dbl } from "./x.js";"#), "{main}");
    assert!(main.contains("const r = dbl(4);"), "{main}");
    assert!(main.contains("const s = helper(1);"), "{main}");
}

#[test]
fn namespace_member_missing_from_module_reads_as_undefined() {
    let mut session = project(&[
        ("/p/lib.sprig", "(def a 1) (export [a])"),
        ("/p/main.sprig", r#"(import lib from "./lib.sprig") (def y lib.missing-prop)"#),
    ]);
    let modules = session.compile("/p/main.sprig").unwrap();
    let main = text_of(&modules, "main.sprig");
    assert!(main.contains(r#"const y = __sprig_get(lib, "missing-prop");"#), "{main}");

    let module = HostValue::object([("a", HostValue::Number(1.0))]);
    let read = get_property(&module, &HostValue::string("missing-prop"), HostValue::Undefined);
    assert_eq!(read, HostValue::Undefined);
}
