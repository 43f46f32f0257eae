use hf_core::{ErrorKind, Exports, IntTy, NativeFunction, SymbolTable, Ty, TypeDescriptor, Value};
use hf_interpret::{evaluate, EvalOptions, Interpreter};
use pretty_assertions::assert_eq;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

struct Greeter {
    name: String,
}

fn greeter_type() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder::<Greeter>("host::Greeter")
        .method("greet", vec![Ty::Str], Ty::Str, |greeter, args| {
            Ok(Value::string(format!("{} greets {}", greeter.name, args.str(0)?)))
        })
        .field("name", |greeter| Value::from(greeter.name.as_str()))
        .build()
}

fn host_symbols() -> SymbolTable {
    let ty = greeter_type();
    let greeter = ty
        .instance(Arc::new(Greeter {
            name: "host".to_string(),
        }))
        .unwrap();
    let exports = Exports::new("app")
        .with_type(&ty)
        .with("host", "GREETER", greeter)
        .with_function(
            "host",
            NativeFunction::new("double", vec![Ty::Int(IntTy::I64)], Ty::Int(IntTy::I64), |args| {
                Ok(Value::Int(args.int(0)? * 2))
            }),
        );
    SymbolTable::from_exports(&exports).unwrap()
}

fn eval(source: &str, expr: &str) -> hf_core::Result<Value> {
    let interpreter = Interpreter::new(&host_symbols())?;
    interpreter.load_source(source, "test.rs")?.eval(expr)
}

fn eval_ok(source: &str, expr: &str) -> Value {
    eval(source, expr).unwrap_or_else(|err| panic!("evaluation failed: {err}"))
}

fn eval_err(source: &str, expr: &str) -> hf_core::Error {
    match eval(source, expr) {
        Ok(value) => panic!("expected an error, got {value:?}"),
        Err(err) => err,
    }
}

#[test]
fn evaluate_reads_the_script_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "fn answer() -> i64 {{ 6 * 7 }}").unwrap();
    let value = evaluate(file.path(), "answer()", &host_symbols()).unwrap();
    assert_eq!(value, Value::Int(42));
}

#[test]
fn missing_script_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = evaluate(dir.path().join("absent.rs"), "1", &SymbolTable::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn syntax_errors_in_script_and_expression() {
    assert_eq!(eval_err("fn broken( {", "1").kind(), ErrorKind::Parse);
    assert_eq!(eval_err("fn ok() {}", "ok(").kind(), ErrorKind::Parse);
}

#[test]
fn unknown_names_are_unresolved() {
    let err = eval_err("fn ok() -> i64 { 1 }", "missing_fn()");
    assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
    assert!(err.to_string().contains("missing_fn"), "{err}");

    let err = eval_err("use host::Nope;", "1");
    assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
}

#[test]
fn items_modules_and_constants() {
    let source = r#"
        const LIMIT: i64 = 3;

        struct Point { x: i64, y: i64 }

        mod geo {
            pub fn manhattan(p: &crate::Point) -> i64 {
                p.x.abs() + p.y.abs()
            }
        }

        fn offset() -> i64 {
            let p = Point { x: -2, y: LIMIT };
            geo::manhattan(&p)
        }
    "#;
    assert_eq!(eval_ok(source, "offset()"), Value::Int(5));
    assert_eq!(
        eval_ok(source, "format!(\"{:?}\", Point { x: 1, y: 2 })"),
        Value::from("Point { x: 1, y: 2 }")
    );
}

#[test]
fn recursion_loops_and_match() {
    let source = r#"
        fn fib(n: i64) -> i64 {
            if n < 2 { n } else { fib(n - 1) + fib(n - 2) }
        }

        fn sum_to(n: i64) -> i64 {
            let mut total = 0;
            for i in 0..=n {
                total += i;
            }
            total
        }

        fn first_square_over(limit: i64) -> i64 {
            let mut i = 0;
            loop {
                i += 1;
                if i * i > limit {
                    break i;
                }
            }
        }

        fn classify(n: i64) -> String {
            match n {
                0 => "zero".to_string(),
                1 | 2 => "small".to_string(),
                3..=9 => "medium".to_string(),
                x if x < 0 => "negative".to_string(),
                _ => "large".to_string(),
            }
        }
    "#;
    assert_eq!(eval_ok(source, "fib(15)"), Value::Int(610));
    assert_eq!(eval_ok(source, "sum_to(100)"), Value::Int(5050));
    assert_eq!(eval_ok(source, "first_square_over(50)"), Value::Int(8));
    let classes = eval_ok(source, "[classify(0), classify(2), classify(5), classify(-4), classify(50)]");
    assert_eq!(classes.to_string(), r#"["zero", "small", "medium", "negative", "large"]"#);
}

#[test]
fn closures_capture_by_value() {
    let source = r#"
        fn captured() -> i64 {
            let mut n = 1;
            let add = |x: i64| x + n;
            n = 10;
            add(1) + n
        }

        fn mapped() -> Vec<i64> {
            let factor = 3;
            vec![1, 2, 3].iter().map(|x| x * factor).collect::<Vec<_>>()
        }
    "#;
    assert_eq!(eval_ok(source, "captured()"), Value::Int(12));
    assert_eq!(
        eval_ok(source, "mapped()"),
        Value::list(vec![Value::Int(3), Value::Int(6), Value::Int(9)])
    );
}

#[test]
fn assignment_copies_values() {
    let source = r#"
        fn copies() -> i64 {
            let a = vec![1, 2];
            let mut b = a.clone();
            b.push(3);
            b[0] = 9;
            (a.len() * 10 + b.len()) as i64 + a[0]
        }
    "#;
    assert_eq!(eval_ok(source, "copies()"), Value::Int(24));
}

#[test]
fn top_level_statements_run_once_in_order() {
    let source = r#"
        let base = 40;
        let answer = base + 2;
        fn read_answer() -> i64 { answer }
    "#;
    assert_eq!(eval_ok(source, "answer"), Value::Int(42));
    assert_eq!(eval_ok(source, "read_answer()"), Value::Int(42));
}

#[test]
fn formatting_macros() {
    let value = eval_ok("", r#"format!("{} {:?} {name} {{}} {:>4}", "a", "b", 7, name = "n")"#);
    assert_eq!(value, Value::from("a \"b\" n {}    7"));

    let value = eval_ok("fn who() -> String { let who = \"you\"; format!(\"hi {who}\") }", "who()");
    assert_eq!(value, Value::from("hi you"));

    let err = eval_err("", r#"format!("{}", 1, 2)"#);
    assert!(err.to_string().contains("never used"), "{err}");
}

#[test]
fn runtime_failures_are_eval_errors() {
    let cases = [
        ("1 / 0", "attempt to divide by zero"),
        ("vec![1][3]", "index out of bounds"),
        ("panic!(\"boom {}\", 1)", "script panicked: boom 1"),
        ("\"a\" - 1", "cannot apply"),
    ];
    for (expr, needle) in cases {
        let err = eval_err("", expr);
        assert_eq!(err.kind(), ErrorKind::Eval, "{expr}");
        assert!(err.to_string().contains(needle), "{expr}: {err}");
    }
}

#[test]
fn immutable_bindings_reject_assignment() {
    let err = eval_err("fn f() { let x = 1; x = 2; }", "f()");
    assert!(err.to_string().contains("cannot assign twice to immutable variable `x`"), "{err}");
}

#[test]
fn step_budget_stops_endless_loops() {
    let options = EvalOptions {
        max_steps: 1_000,
        ..EvalOptions::default()
    };
    let interpreter = Interpreter::with_options(&SymbolTable::new(), options).unwrap();
    let script = interpreter.load_source("fn spin() { loop {} }", "spin.rs").unwrap();
    let err = script.eval("spin()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    assert!(err.to_string().contains("step budget of 1000 exhausted"), "{err}");
}

#[test]
fn call_depth_is_limited() {
    let options = EvalOptions {
        max_call_depth: 16,
        ..EvalOptions::default()
    };
    let interpreter = Interpreter::with_options(&SymbolTable::new(), options).unwrap();
    let script = interpreter
        .load_source("fn down(n: i64) -> i64 { down(n + 1) }", "deep.rs")
        .unwrap();
    let err = script.eval("down(0)").unwrap_err();
    assert!(err.to_string().contains("call depth limit of 16 exceeded"), "{err}");
}

const COUNTDOWN: &str = "fn down(n: i64) -> i64 { if n == 0 { 0 } else { down(n - 1) + 1 } }";

#[test]
fn default_call_depth_is_usable_in_full() {
    let interpreter = Interpreter::with_options(&SymbolTable::new(), EvalOptions::default()).unwrap();
    let script = interpreter.load_source(COUNTDOWN, "countdown.rs").unwrap();
    assert_eq!(script.eval("down(127)").unwrap(), Value::Int(127));
    let err = script.eval("down(128)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    assert!(err.to_string().contains("call depth limit of 128 exceeded"), "{err}");
}

#[test]
fn deep_recursion_outgrows_the_thread_stack() {
    let options = EvalOptions {
        max_call_depth: 5_000,
        ..EvalOptions::default()
    };
    let interpreter = Interpreter::with_options(&SymbolTable::new(), options).unwrap();
    let script = interpreter.load_source(COUNTDOWN, "countdown.rs").unwrap();
    let run = move || script.eval("down(4000)");
    // test threads get a small stack
    let outcome = std::thread::Builder::new()
        .stack_size(256 * 1024)
        .spawn(run)
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(outcome.unwrap(), Value::Int(4000));
}

#[test]
fn expired_deadline_fails_the_evaluation() {
    let interpreter = Interpreter::with_options(&SymbolTable::new(), EvalOptions::default()).unwrap();
    let script = interpreter.load_source("fn one() -> i64 { 1 }", "late.rs").unwrap();
    assert_eq!(script.eval("one()").unwrap(), Value::Int(1));

    let options = EvalOptions::default().with_timeout(Duration::ZERO);
    let interpreter = Interpreter::with_options(&SymbolTable::new(), options).unwrap();
    let script = interpreter.load_source("fn one() -> i64 { 1 }", "late.rs").unwrap();
    let err = script.eval("one()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    assert!(err.to_string().contains("deadline exceeded"), "{err}");
}

#[test]
fn host_types_values_and_functions() {
    let source = r#"
        use host::{Greeter, GREETER, double};

        fn via_method() -> String { GREETER.greet("a") }
        fn via_path() -> String { Greeter::greet(GREETER, "b") }
        fn field() -> String { GREETER.name }
    "#;
    assert_eq!(eval_ok(source, "via_method()"), Value::from("host greets a"));
    assert_eq!(eval_ok(source, "via_path()"), Value::from("host greets b"));
    assert_eq!(eval_ok(source, "field()"), Value::from("host"));
    assert_eq!(eval_ok(source, "double(21)"), Value::Int(42));

    let err = eval_err(source, "GREETER.wave()");
    let hf_core::Error::MethodNotFound { available, .. } = err else {
        panic!("expected a missing method, got {err:?}");
    };
    assert_eq!(available.as_deref(), Some("available methods: greet"));
}

#[test]
fn base_symbol_sets_are_visible() {
    let source = r#"
        use std::strings;
        use std::math::*;

        fn joined() -> String { strings::join(vec!["a", "b"], "+") }
        fn biggest() -> i64 { max(3, MAX_INT - MAX_INT + 7) }
    "#;
    assert_eq!(eval_ok(source, "joined()"), Value::from("a+b"));
    assert_eq!(eval_ok(source, "biggest()"), Value::Int(7));
    assert_eq!(eval_ok("", "unrestricted::reflect::type_name(1.5)"), Value::from("f64"));
    assert_eq!(
        eval_ok("", "unrestricted::reflect::methods(host::Greeter)"),
        Value::list(vec![Value::from("greet")])
    );
    assert_eq!(eval_ok("", "syscall::os::getenv(\"HF_SURELY_UNSET_VARIABLE\")"), Value::from(""));
    let shared = "fn shared() -> bool { let s = \"x\"; unsafe::mem::same(s, s.clone()) }";
    assert_eq!(eval_ok(shared, "shared()"), Value::Bool(true));
}

#[test]
fn glob_imports_do_not_shadow_their_own_paths() {
    let source = r#"
        use std::math::*;
        use host::*;

        mod util {
            use super::inner::*;
            pub fn twice(n: i64) -> i64 { double(n) }
        }
        mod inner {
            use super::util::*;
            use host::double;
        }
        use util::*;

        fn run() -> i64 { twice(max(2, 3)) }
        fn greeting() -> String { GREETER.greet("glob") }
    "#;
    assert_eq!(eval_ok(source, "run()"), Value::Int(6));
    assert_eq!(eval_ok(source, "greeting()"), Value::from("host greets glob"));
    let err = eval_err(source, "not_there()");
    assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
}

#[test]
fn script_functions_are_callable_from_the_host() {
    let source = "fn shout(s: String) -> String { s.to_uppercase() + \"!\" }";
    let func = eval_ok(source, "shout");
    let callable = func.as_callable().unwrap();
    assert_eq!(callable.call(vec![Value::from("hey")]).unwrap(), Value::from("HEY!"));

    let err = callable.call(vec![Value::Int(1)]).unwrap_err();
    assert!(err.to_string().contains("expects `String` for argument 1"), "{err}");

    let closure = eval_ok("", "|a: i64, b: i64| -> i64 { a * b }");
    let callable = closure.as_callable().unwrap();
    assert_eq!(callable.call(vec![Value::Int(6), Value::Int(7)]).unwrap(), Value::Int(42));
    assert_eq!(
        callable.signature().map(ToString::to_string).as_deref(),
        Some("fn(i64, i64) -> i64")
    );
}
