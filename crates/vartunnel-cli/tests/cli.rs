//! Drive the compiled `vartunnel` binary against a live tunnel.

use std::process::{Output, Stdio};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use vartunnel_core::TunnelClient;
use vartunnel_test_utils::TestTunnel;

fn vartunnel(workdir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_vartunnel"));
    cmd.current_dir(workdir.path())
        .env_remove("VARIABLE_TUNNEL_URL")
        .env_remove("RUST_LOG");
    cmd
}

async fn run(workdir: &tempfile::TempDir, server: &str, args: &[&str]) -> Output {
    vartunnel(workdir)
        .arg("--server")
        .arg(server)
        .args(args)
        .output()
        .await
        .unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[tokio::test(flavor = "multi_thread")]
async fn get_prints_raw_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let tunnel = TestTunnel::start(json!({"foo": "bar", "list": [1, 2]})).await;

    let out = run(&dir, tunnel.url(), &["get", "foo"]).await;
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "bar\n");

    let out = run(&dir, tunnel.url(), &["--json", "get", "foo"]).await;
    assert_eq!(stdout(&out), "\"bar\"\n");

    let out = run(&dir, tunnel.url(), &["get", "list"]).await;
    assert_eq!(stdout(&out), "[1,2]\n");

    tunnel.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn set_coerces_formats() {
    let dir = tempfile::tempdir().unwrap();
    let tunnel = TestTunnel::start(json!({})).await;

    let out = run(&dir, tunnel.url(), &["set", "n", "22ab", "--format", "integer"]).await;
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "");
    assert_eq!(tunnel.store().get("n"), Some(json!(22)));

    let out = run(&dir, tunnel.url(), &["set", "a.b", "[1,2,\"a\"]", "--format", "json"]).await;
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(tunnel.store().get("a"), Some(json!({"b": [1, 2, "a"]})));

    let out = run(&dir, tunnel.url(), &["set", "ok", "1", "--format", "boolean"]).await;
    assert!(out.status.success());
    assert_eq!(tunnel.store().get("ok"), Some(json!(true)));

    let out = run(&dir, tunnel.url(), &["set", "s", "22"]).await;
    assert!(out.status.success());
    assert_eq!(tunnel.store().get("s"), Some(json!("22")));

    tunnel.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_json_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let tunnel = TestTunnel::start(json!({})).await;

    let out = run(&dir, tunnel.url(), &["set", "x", "{{{{", "--format", "json"]).await;
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("Unable to parse input"), "{}", stderr(&out));
    assert_eq!(tunnel.store().get("x"), None);

    tunnel.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn set_reads_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let tunnel = TestTunnel::start(json!({})).await;

    let mut child = vartunnel(&dir)
        .args(["--server", tunnel.url(), "set", "piped"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    let mut stdin = child.stdin.take().unwrap();
    stdin.write_all(b"from a pipe\n").await.unwrap();
    drop(stdin);

    let out = child.wait_with_output().await.unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(tunnel.store().get("piped"), Some(json!("from a pipe")));

    tunnel.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn wrong_nonce_fails_with_field() {
    let dir = tempfile::tempdir().unwrap();
    let tunnel = TestTunnel::start(json!({"foo": "bar"})).await;
    let url = tunnel.url_with_nonce("fakenonce");

    let out = run(&dir, &url, &["get", "foo"]).await;
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "");
    let err = stderr(&out);
    assert!(err.contains("Unable to get value of \"foo\""), "{err}");
    assert!(err.contains("Invalid Nonce"), "{err}");

    let out = run(&dir, &url, &["--json", "get", "foo"]).await;
    assert_eq!(out.status.code(), Some(1));
    let message: String = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert!(message.starts_with("Unable to get value of \"foo\""), "{message}");

    tunnel.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn falls_back_to_environment_url() {
    let dir = tempfile::tempdir().unwrap();
    let tunnel = TestTunnel::start(json!({"hero": {"name": "superman"}})).await;

    let out = vartunnel(&dir)
        .env("VARIABLE_TUNNEL_URL", tunnel.url())
        .args(["get", "hero.name"])
        .output()
        .await
        .unwrap();
    assert!(out.status.success(), "{}", stderr(&out));
    assert_eq!(stdout(&out), "superman\n");

    tunnel.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn no_server_configured_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = vartunnel(&dir).args(["get", "foo"]).output().await.unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("no tunnel URL"), "{}", stderr(&out));
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("vartunnel.toml"),
        "[server]\nbind_addr = \"0.0.0.0\"\n",
    )
    .unwrap();

    let out = vartunnel(&dir).args(["get", "foo"]).output().await.unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("invalid config file"), "{}", stderr(&out));
}

/// Spawn `vartunnel serve` and return the child with its first stdout line.
async fn spawn_serve(workdir: &tempfile::TempDir, args: &[&str]) -> (Child, String) {
    let mut child = vartunnel(workdir)
        .arg("serve")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    let stdout = child.stdout.take().unwrap();
    let line = tokio::time::timeout(
        Duration::from_secs(10),
        BufReader::new(stdout).lines().next_line(),
    )
    .await
    .expect("serve did not print its URL")
    .unwrap()
    .expect("serve exited before printing its URL");
    (child, line)
}

fn write_data(workdir: &tempfile::TempDir, content: &str) -> String {
    let path = workdir.path().join("data.json");
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn serve_exports_url_with_initial_data() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_data(&dir, r#"{"foo": "bar", "hero": {"name": "superman"}}"#);

    let (mut child, line) = spawn_serve(&dir, &["--data", &data]).await;
    let url = line
        .strip_prefix("export VARIABLE_TUNNEL_URL=")
        .unwrap_or_else(|| panic!("unexpected first line: {line}"));
    assert!(url.starts_with("http://127.0.0.1:"), "{url}");
    assert!(url.ends_with('/'), "{url}");

    let client = TunnelClient::new(url);
    assert_eq!(client.get("hero.name").await.unwrap(), json!("superman"));
    client.set("foo", json!("baz")).await.unwrap();
    assert_eq!(client.get("foo").await.unwrap(), json!("baz"));

    // The exported URL works with the get subcommand too.
    let out = run(&dir, url, &["get", "foo"]).await;
    assert_eq!(stdout(&out), "baz\n");

    child.kill().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn serve_json_prints_url_string() {
    let dir = tempfile::tempdir().unwrap();
    let (mut child, line) = spawn_serve(&dir, &["--json"]).await;

    let url: String = serde_json::from_str(&line).unwrap();
    assert!(url.starts_with("http://127.0.0.1:"), "{url}");

    let client = TunnelClient::new(url);
    client.set("a.b", json!(1)).await.unwrap();
    assert_eq!(client.get("a").await.unwrap(), json!({"b": 1}));

    child.kill().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn serve_immutable_rejects_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_data(&dir, r#"{"foo": "bar"}"#);

    let (mut child, line) = spawn_serve(&dir, &["--immutable", "--data", &data]).await;
    let url = line.strip_prefix("export VARIABLE_TUNNEL_URL=").unwrap();

    let client = TunnelClient::new(url);
    let err = client.set("foo", json!("test")).await.unwrap_err();
    assert!(err.to_string().ends_with("Data is immutable"), "{err}");
    client.set("fresh", json!("ok")).await.unwrap();
    assert_eq!(client.get("foo").await.unwrap(), json!("bar"));

    child.kill().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn serve_rejects_non_object_data() {
    let dir = tempfile::tempdir().unwrap();
    let data = write_data(&dir, "[1, 2, 3]");

    let out = vartunnel(&dir)
        .args(["serve", "--data", data.as_str()])
        .output()
        .await
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(stdout(&out), "");
    assert!(stderr(&out).contains("must be a JSON object"), "{}", stderr(&out));
}

#[tokio::test(flavor = "multi_thread")]
async fn zero_timeouts_are_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let out = vartunnel(&dir)
        .args(["serve", "--request-timeout", "0"])
        .output()
        .await
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("--request-timeout must be non-zero"), "{}", stderr(&out));

    let out = run(&dir, "http://127.0.0.1:1/nonce/", &["--timeout", "0", "get", "foo"]).await;
    assert_eq!(out.status.code(), Some(1));
    assert!(stderr(&out).contains("--timeout must be non-zero"), "{}", stderr(&out));
}
