use hf_cli::config::HotfixConfig;
use hf_cli::demo::DemoHost;
use hf_cli::shell::{Reply, Shell};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::sync::Arc;

fn patches_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("patches")
}

fn shell() -> Shell {
    let mut config = HotfixConfig::default();
    config.scripts.root = Some(patches_dir());
    Shell::new(Arc::new(DemoHost::new().unwrap()), Arc::new(config))
}

fn run(shell: &Shell, line: &str) -> String {
    match shell.execute(line) {
        Reply::Output(text) => text,
        other => panic!("`{line}` gave {other:?}"),
    }
}

#[test]
fn hotfix_patches_and_reverts() {
    let shell = shell();
    assert_eq!(run(&shell, "call index /"), "index page for /");

    let applied = run(&shell, "hotfix patch_http.rs patch_test_handler()");
    assert!(applied.starts_with("hotfix applied (id "), "{applied}");
    assert_eq!(run(&shell, "call index /"), "hello world");
    assert_eq!(run(&shell, "call hello /x"), "hello from /x");

    let listing = run(&shell, "patches");
    assert!(listing.contains("handler::HttpSvc::index"), "{listing}");
    assert!(listing.contains("patch_test_handler()"), "{listing}");

    let id = shell.ledger().list()[0].id;
    assert_eq!(
        run(&shell, &format!("revert {id}")),
        format!("reverted #{id} (handler::HttpSvc::index)")
    );
    assert_eq!(run(&shell, "call index /"), "index page for /");
    assert_eq!(run(&shell, "patches"), "no live patches");
}

#[test]
fn recovery_patch_routes_to_hello() {
    let shell = shell();
    run(&shell, "hotfix patch_recovery.rs patch_recovery_handler()");
    assert_eq!(run(&shell, "call index /docs"), "hello from /docs");
    assert_eq!(run(&shell, "revert all"), "reverted 1 patch(es)");
    assert_eq!(run(&shell, "call index /docs"), "index page for /docs");
}

#[test]
fn later_patches_win() {
    let shell = shell();
    run(&shell, "hotfix patch_http.rs patch_test_handler()");
    run(&shell, "hotfix patch_recovery.rs patch_recovery_handler()");
    assert_eq!(run(&shell, "call index /"), "hello from /");
    assert_eq!(shell.ledger().len(), 1);
    assert_eq!(run(&shell, "revert all"), "reverted 1 patch(es)");
    assert_eq!(run(&shell, "call index /"), "index page for /");
}

#[test]
fn failures_are_reported_and_change_nothing() {
    let shell = shell();
    let missing = run(&shell, "hotfix patch_http.rs no_such_fn()");
    assert!(missing.starts_with("hotfix error: unresolved symbol `no_such_fn`"), "{missing}");

    let absent = run(&shell, "hotfix absent.rs patch()");
    assert!(absent.starts_with("hotfix error: cannot read script"), "{absent}");

    assert_eq!(run(&shell, "call index /"), "index page for /");
    assert_eq!(run(&shell, "patches"), "no live patches");
    assert!(run(&shell, "revert 99").starts_with("revert error:"));
    assert!(run(&shell, "call Index").starts_with("call error:"));
    assert_eq!(run(&shell, "frobnicate"), "unknown command `frobnicate`; type `help` for the list");
}
