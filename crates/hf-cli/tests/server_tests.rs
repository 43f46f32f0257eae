use hf_cli::config::HotfixConfig;
use hf_cli::demo::DemoHost;
use hf_cli::server::{self, BANNER};
use hf_cli::shell::{Shell, PROMPT};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

fn shell() -> Shell {
    let mut config = HotfixConfig::default();
    config.scripts.root = Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("patches"));
    Shell::new(Arc::new(DemoHost::new().unwrap()), Arc::new(config))
}

/// Send `lines`, ending with `exit`, and collect everything the server wrote.
async fn session(addr: std::net::SocketAddr, lines: &[&str]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    for line in lines {
        stream.write_all(format!("{line}\r\n").as_bytes()).await.unwrap();
    }
    stream.write_all(b"exit\r\n").await.unwrap();
    let mut out = String::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_string(&mut out))
        .await
        .unwrap()
        .unwrap();
    out
}

#[tokio::test]
async fn shell_sessions_patch_the_shared_service() {
    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, shell(), None, async {
        let _ = stopped.await;
    }));

    let first = session(addr, &["call index /", "hotfix patch_http.rs patch_test_handler()"]).await;
    assert!(first.starts_with(BANNER), "{first}");
    assert!(first.contains(PROMPT), "{first}");
    assert!(first.contains("index page for /"), "{first}");
    assert!(first.contains("hotfix applied (id "), "{first}");
    assert!(first.ends_with("bye\r\n"), "{first}");

    // a second session sees the patch installed by the first
    let second = session(addr, &["call index /", "patches", "revert all", "call index /"]).await;
    assert!(second.contains("hello world"), "{second}");
    assert!(second.contains("patch_test_handler()"), "{second}");
    assert!(second.contains("reverted 1 patch(es)"), "{second}");
    assert!(second.matches("index page for /").count() == 1, "{second}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn idle_sessions_are_closed() {
    let listener = server::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(listener, shell(), Some(Duration::from_millis(100)), async {
        let _ = stopped.await;
    }));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut out = String::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_string(&mut out))
        .await
        .unwrap()
        .unwrap();
    assert!(out.contains("idle timeout"), "{out}");

    stop.send(()).unwrap();
    server.await.unwrap().unwrap();
}
