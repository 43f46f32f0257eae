use hf_cli::config::{HotfixConfig, DEFAULT_LISTEN};
use hf_cli::CliError;
use pretty_assertions::assert_eq;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn partial_files_merge_over_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hotfix.toml");
    fs::write(
        &path,
        r#"
        [interpreter]
        eval_timeout_ms = 250

        [scripts]
        root = "/srv/patches"
        "#,
    )
    .unwrap();

    let config = HotfixConfig::load_from_file(&path).unwrap();
    assert_eq!(config.server.listen, DEFAULT_LISTEN);
    assert_eq!(config.interpreter.max_call_depth, HotfixConfig::default().interpreter.max_call_depth);
    assert_eq!(config.apply_options().timeout, Some(Duration::from_millis(250)));
    assert_eq!(config.scripts.root.as_deref(), Some(std::path::Path::new("/srv/patches")));
}

#[test]
fn discovery_takes_the_first_existing_file() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.toml");
    let first = dir.path().join("first.toml");
    let second = dir.path().join("second.toml");
    fs::write(&first, "[server]\nlisten = \"0.0.0.0:1\"\n").unwrap();
    fs::write(&second, "[server]\nlisten = \"0.0.0.0:2\"\n").unwrap();

    let config = HotfixConfig::discover(&[missing.clone(), first, second]).unwrap();
    assert_eq!(config.server.listen, "0.0.0.0:1");
    assert_eq!(HotfixConfig::discover(&[missing]).unwrap(), HotfixConfig::default());
}

#[test]
fn broken_files_are_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("hotfix.toml");
    fs::write(&path, "[server\nlisten = 1").unwrap();
    assert!(matches!(HotfixConfig::discover(&[path]), Err(CliError::Config(_))));

    let err = HotfixConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"), "{err}");
}

#[test]
fn listen_addr_env_overrides() {
    let mut config = HotfixConfig::default();
    config.apply_env(None);
    config.apply_env(Some("  ".to_string()));
    assert_eq!(config.server.listen, DEFAULT_LISTEN);
    config.apply_env(Some("0.0.0.0:4444".to_string()));
    assert_eq!(config.server.listen, "0.0.0.0:4444");
}

#[test]
fn scripts_root_confines_scripts() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("patches");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("fix.rs"), "fn patch() {}").unwrap();
    fs::write(dir.path().join("outside.rs"), "fn patch() {}").unwrap();

    let mut config = HotfixConfig::default();
    let relative = std::path::Path::new("fix.rs");
    assert_eq!(config.resolve_script(relative).unwrap(), relative);

    config.scripts.root = Some(root.clone());
    let resolved = config.resolve_script(relative).unwrap();
    assert_eq!(resolved, root.canonicalize().unwrap().join("fix.rs"));

    let escaped = config.resolve_script(std::path::Path::new("../outside.rs")).unwrap_err();
    assert!(matches!(escaped, CliError::InvalidInput(_)), "{escaped}");

    let missing = config.resolve_script(std::path::Path::new("nope.rs")).unwrap_err();
    let CliError::Hotfix(err) = missing else {
        panic!("expected an engine error, got {missing:?}");
    };
    assert_eq!(err.kind(), hf_core::ErrorKind::Io);
}
