mod support;

use hf_core::{ErrorKind, NativeFunction, Ty, Value};
use hf_patch::{apply_func, apply_func_with, check_func, ApplyOptions, PatchLedger};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use support::{Host, Scripts, HELLO_WORLD, RECOVERY};

#[test]
fn hello_world_replaces_index() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("patch_http.rs", HELLO_WORLD);

    assert_eq!(host.call("index", "/"), "index /");
    let handle = apply_func(&path, "patch_test_handler()", &host.symbols).unwrap();
    assert_eq!(host.call("index", "/"), "hello world");
    assert_eq!(host.call("hello", "/"), "hello /");
    assert_eq!(handle.target(), "handler::HttpSvc::index");

    handle.restore().unwrap();
    assert_eq!(host.call("index", "/"), "index /");
}

#[test]
fn recovery_patch_delegates_to_another_method() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("patch_recovery.rs", RECOVERY);

    let _handle = apply_func(&path, "patch_recovery_handler()", &host.symbols).unwrap();
    assert_eq!(host.call("index", "/docs"), "hello /docs");
}

#[test]
fn glob_imports_reach_the_hotfix_package() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write(
        "glob.rs",
        r#"
        use hotfix::*;
        use handler::*;

        fn index(_svc: &HttpSvc, req: Request) -> String {
            format!("globbed {}", req.path)
        }

        fn patch() -> FuncPatch {
            FuncPatch { target: HttpSvc, method: "index".to_string(), replacement: index }
        }
        "#,
    );

    let handle = apply_func(&path, "patch()", &host.symbols).unwrap();
    assert_eq!(host.call("index", "/g"), "globbed /g");
    handle.restore().unwrap();
    assert_eq!(host.call("index", "/g"), "index /g");
}

#[test]
fn self_recursive_replacement_fails_the_call_not_the_host() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write(
        "loop.rs",
        r#"
        use handler::{HttpSvc, Request};

        fn index(svc: &HttpSvc, req: Request) -> String { svc.index(req) }

        fn patch() -> hotfix::FuncPatch {
            hotfix::FuncPatch { target: HttpSvc, method: "index".to_string(), replacement: index }
        }
        "#,
    );

    let handle = apply_func(&path, "patch()", &host.symbols).unwrap();
    let err = host
        .svc_type
        .call("index", vec![host.svc.clone(), host.request("/")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    assert!(err.to_string().contains("call depth limit"), "{err}");
    assert_eq!(host.call("hello", "/"), "hello /");

    handle.restore().unwrap();
    assert_eq!(host.call("index", "/"), "index /");
}

#[test]
fn replacement_can_wrap_the_original() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write(
        "wrap.rs",
        r#"
        use handler::{HttpSvc, Request};

        fn index(svc: &HttpSvc, req: Request) -> String {
            let original = hotfix::original(HttpSvc, "index");
            let patched = hotfix::is_patched(HttpSvc, "index");
            format!("[{patched}] {}", original(svc, req))
        }

        fn patch() -> hotfix::FuncPatch {
            hotfix::FuncPatch { target: HttpSvc, method: "index".to_string(), replacement: index }
        }
        "#,
    );

    let _handle = apply_func(&path, "patch()", &host.symbols).unwrap();
    assert_eq!(host.call("index", "/a"), "[true] index /a");
}

#[test]
fn undefined_identifier_leaves_target_unchanged() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("patch_http.rs", HELLO_WORLD);
    let slot = host.svc_type.method("index").cloned().unwrap();
    let before = slot.entry_addr();

    let err = apply_func(&path, "no_such_patch()", &host.symbols).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnresolvedSymbol);
    assert_eq!(slot.entry_addr(), before);
    assert_eq!(host.call("index", "/"), "index /");
}

#[test]
fn parse_errors_leave_target_unchanged() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("broken.rs", "fn patch( -> {");
    let slot = host.svc_type.method("index").cloned().unwrap();
    let before = slot.entry_addr();

    let err = apply_func(&path, "patch()", &host.symbols).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Parse);
    assert_eq!(slot.entry_addr(), before);
}

#[test]
fn missing_script_is_an_io_error() {
    let host = Host::new();
    let scripts = Scripts::new();
    let err = apply_func(scripts.write("x.rs", "").with_file_name("absent.rs"), "x()", &host.symbols).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn signature_mismatch_leaves_entry_identical() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write(
        "mismatch.rs",
        r#"
        use handler::{HttpSvc, Request};

        fn index(_svc: &HttpSvc, _req: Request) -> i64 { 42 }

        fn patch() -> hotfix::FuncPatch {
            hotfix::FuncPatch { target: HttpSvc, method: "index".to_string(), replacement: index }
        }
        "#,
    );
    let slot = host.svc_type.method("index").cloned().unwrap();
    let before = slot.entry_addr();

    let err = apply_func(&path, "patch()", &host.symbols).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SignatureMismatch);
    assert!(err.to_string().contains("handler::HttpSvc::index"), "{err}");
    assert_eq!(slot.entry_addr(), before);
    assert_eq!(slot.generation(), 0);
}

#[test]
fn applying_twice_does_not_chain() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("patch_http.rs", HELLO_WORLD);
    let slot = host.svc_type.method("index").cloned().unwrap();
    let pristine = slot.entry_addr();

    let first = apply_func(&path, "patch_test_handler()", &host.symbols).unwrap();
    let second = apply_func(&path, "patch_test_handler()", &host.symbols).unwrap();
    assert_eq!(host.call("index", "/"), "hello world");
    assert_eq!(second.replaced_addr(), first.installed_addr());

    assert_eq!(first.restore().unwrap_err().kind(), ErrorKind::Redirection);
    assert_eq!(host.call("index", "/"), "hello world");

    second.restore().unwrap();
    assert_eq!(slot.entry_addr(), pristine);
    assert_eq!(host.call("index", "/"), "index /");
}

#[test]
fn unknown_method_lists_the_available_ones() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write(
        "typo.rs",
        r#"
        use handler::{HttpSvc, Request};
        fn index(_svc: &HttpSvc, _req: Request) -> String { String::new() }
        fn patch() -> hotfix::FuncPatch {
            hotfix::FuncPatch { target: HttpSvc, method: "Index".to_string(), replacement: index }
        }
        "#,
    );
    let err = apply_func(&path, "patch()", &host.symbols).unwrap_err();
    let hf_core::Error::MethodNotFound { method, available, .. } = err else {
        panic!("expected a missing method, got {err:?}");
    };
    assert_eq!(method, "Index");
    assert_eq!(available.as_deref(), Some("available methods: hello, index"));
}

#[test]
fn results_other_than_func_patch_are_invalid() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write(
        "wrong.rs",
        r#"
        struct FuncPatch { target: i64 }
        fn lookalike() -> FuncPatch { FuncPatch { target: 1 } }
        "#,
    );
    for expr in ["42", "lookalike()", "\"index\""] {
        let err = apply_func(&path, expr, &host.symbols).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDescriptor, "{expr}: {err}");
    }
}

#[test]
fn panics_in_host_functions_are_recovered() {
    let host = Host::with_exports(|exports| {
        exports.with_function(
            "chaos",
            NativeFunction::new("explode", vec![], Ty::Unit, |_| -> hf_core::Result<Value> {
                panic!("kaboom from the host")
            }),
        )
    });
    let scripts = Scripts::new();
    let path = scripts.write("panic.rs", "fn patch() -> i64 { chaos::explode(); 1 }");
    let slot = host.svc_type.method("index").cloned().unwrap();
    let before = slot.entry_addr();

    let err = apply_func(&path, "patch()", &host.symbols).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PanicRecovered);
    assert!(err.to_string().contains("kaboom from the host"), "{err}");
    assert!(err.to_string().contains("apply_tests.rs"), "{err}");
    assert_eq!(slot.entry_addr(), before);

    // the process keeps working after the recovery
    let path = scripts.write("patch_http.rs", HELLO_WORLD);
    let _handle = apply_func(&path, "patch_test_handler()", &host.symbols).unwrap();
    assert_eq!(host.call("index", "/"), "hello world");
}

#[test]
fn endless_scripts_hit_the_limits() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("spin.rs", "fn patch() -> i64 { loop {} }");
    let options = ApplyOptions {
        max_steps: u64::MAX,
        ..ApplyOptions::default()
    }
    .with_timeout(Duration::from_millis(50));

    let err = apply_func_with(&path, "patch()", &host.symbols, &options).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Eval);
    assert!(err.to_string().contains("deadline exceeded"), "{err}");
}

#[test]
fn check_is_a_dry_run() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("patch_http.rs", HELLO_WORLD);

    let plan = check_func(&path, "patch_test_handler()", &host.symbols).unwrap();
    assert_eq!(plan.target, "handler::HttpSvc::index");
    assert_eq!(plan.signature, "fn(handler::HttpSvc, handler::Request) -> String");
    assert!(!plan.currently_patched);
    assert_eq!(host.call("index", "/"), "index /");
}

#[test]
fn ledger_tracks_applied_patches() {
    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("patch_http.rs", HELLO_WORLD);
    let ledger = PatchLedger::new();

    let handle = apply_func(&path, "patch_test_handler()", &host.symbols).unwrap();
    let record = ledger.record(handle, &path, "patch_test_handler()").unwrap();
    assert_eq!(ledger.list(), vec![record.clone()]);

    ledger.revert(record.id).unwrap();
    assert_eq!(host.call("index", "/"), "index /");
}

#[test]
fn callers_see_old_or_new_while_patches_come_and_go() {
    const ROUNDS: usize = 50;
    const CALLERS: usize = 4;

    let host = Host::new();
    let scripts = Scripts::new();
    let path = scripts.write("patch_http.rs", HELLO_WORLD);
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..CALLERS {
            let host = &host;
            let done = &done;
            scope.spawn(move || {
                while !done.load(Ordering::Acquire) {
                    let out = host.call("index", "/");
                    assert!(out == "index /" || out == "hello world", "unexpected result: {out}");
                }
            });
        }
        for _ in 0..ROUNDS {
            let handle = apply_func(&path, "patch_test_handler()", &host.symbols).unwrap();
            handle.restore().unwrap();
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(host.call("index", "/"), "index /");
}
