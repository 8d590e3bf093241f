//! The rigwatch binary against an in-process demo backend.
use std::path::Path;

use rigwatch_demo::{spawn_local, AppState};

async fn rigwatch(config: &Path, url: &str, args: &[&str]) -> (bool, String) {
    let mut cmd = assert_cmd::Command::cargo_bin("rigwatch").unwrap();
    cmd.env("XDG_CONFIG_HOME", config)
        .env_remove("RUST_LOG")
        .arg("--api-url")
        .arg(url)
        .args(args);
    // the backend runs on this runtime; keep its workers free while the child runs
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    (output.status.success(), text)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_list_and_read_messages() {
    let (url, _server) = spawn_local(AppState::seeded("cli-secret")).await.unwrap();
    let td = tempfile::tempdir().unwrap();
    let cfg = td.path();

    let (ok, out) = rigwatch(cfg, &url, &["login", "demo", "--password", "demo"]).await;
    assert!(ok, "{out}");
    assert!(out.contains("Logged in as demo"), "{out}");
    assert!(cfg.join("rigwatch/session.json").exists());

    let (ok, out) = rigwatch(cfg, &url, &["devices"]).await;
    assert!(ok, "{out}");
    // the hot node sorts first and carries its disk warning
    assert!(out.starts_with("Render Node (DEMO-RN-02)"), "{out}");
    assert!(out.contains("C: disk usage too high"), "{out}");
    assert!(out.contains("Reception Laptop (DEMO-LT-03)"), "{out}");

    let (ok, out) = rigwatch(cfg, &url, &["messages", "list"]).await;
    assert!(ok, "{out}");
    assert!(out.starts_with("Office Workstation (DEMO-WS-01)  2 unread"), "{out}");

    let (ok, out) = rigwatch(cfg, &url, &["messages", "read", "DEMO-WS-01"]).await;
    assert!(ok, "{out}");
    assert!(out.contains("user: The fans are loud"), "{out}");
    assert!(out.contains("it: We are looking into it."), "{out}");

    let (_, out) = rigwatch(cfg, &url, &["messages", "list"]).await;
    assert!(!out.contains("unread"), "{out}");

    let (ok, out) = rigwatch(cfg, &url, &["notes", "show", "DEMO-RN-02"]).await;
    assert!(ok);
    assert_eq!(out.trim(), "Thermal paste replaced last quarter.");

    let (ok, _) = rigwatch(cfg, &url, &["logout"]).await;
    assert!(ok);
    let (ok, out) = rigwatch(cfg, &url, &["devices"]).await;
    assert!(!ok);
    assert!(out.contains("not logged in"), "{out}");
}
