//! Drives a live server on an ephemeral port with the fake supervisor.

use std::io::{BufRead, BufReader, Cursor, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use deployd_daemon::{bootstrap, bootstrap_with, send_request, serve, DaemonConfig, Request, Response};
use deployd_supervisor::FakeSupervisor;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use zip::write::SimpleFileOptions;

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default())
                .expect("start file");
            zip.write_all(body.as_bytes()).expect("write entry");
        }
        zip.finish().expect("finish zip");
    }
    std::fs::write(path, buf).expect("write archive");
}

async fn call(addr: SocketAddr, request: Request) -> Response {
    tokio::task::spawn_blocking(move || send_request(addr, &request))
        .await
        .expect("join")
        .expect("send request")
}

async fn raw_line(addr: SocketAddr, line: &'static str) -> Value {
    tokio::task::spawn_blocking(move || {
        let mut stream = TcpStream::connect(addr).expect("connect");
        stream.write_all(line.as_bytes()).expect("write");
        let mut reader = BufReader::new(stream);
        let mut response = String::new();
        reader.read_line(&mut response).expect("read");
        serde_json::from_str::<Value>(&response).expect("json response")
    })
    .await
    .expect("join")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn install_control_and_shutdown_over_tcp() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fake = Arc::new(FakeSupervisor::new());
    let config = DaemonConfig {
        root: dir.path().join("srv"),
        ..DaemonConfig::default()
    };
    let boot = bootstrap_with(&config, fake.clone()).expect("bootstrap");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let (shutdown_tx, _) = broadcast::channel(4);
    let server = tokio::spawn(serve(listener, boot.manager.clone(), shutdown_tx));

    let archive = dir.path().join("api.zip");
    write_zip(&archive, &[("api", "#!/bin/sh\n"), ("app.toml", "port = 1")]);

    let installed = call(
        addr,
        Request::Install {
            archive: archive.clone(),
            name: None,
        },
    )
    .await;
    assert!(installed.ok, "install failed: {installed:?}");
    assert_eq!(installed.data.as_ref().map(|d| &d["id"]), Some(&json!("api")));
    assert!(fake.journal().contains(&"daemon-reload".to_string()));

    let started = call(addr, Request::Start { id: "api".into() }).await;
    assert!(started.ok);
    let running = call(addr, Request::IsRunning { id: "api".into() }).await;
    assert_eq!(running.data, Some(json!(true)));

    let listed = call(addr, Request::List).await;
    let services = listed.data.expect("list data");
    assert_eq!(services.as_array().map(Vec::len), Some(1));
    assert_eq!(services[0]["id"], json!("api"));

    let replacement = dir.path().join("app.toml");
    std::fs::write(&replacement, "port = 2").expect("write replacement");
    let updated = call(
        addr,
        Request::Update {
            id: "api".into(),
            file: replacement,
            name: None,
        },
    )
    .await;
    assert!(updated.ok, "update failed: {updated:?}");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("srv/services/api/app.toml")).expect("read"),
        "port = 2"
    );

    let files = call(addr, Request::Files { id: "api".into() }).await;
    let names: Vec<String> = files
        .data
        .expect("files data")
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|f| f["name"].as_str().map(str::to_string))
        .collect();
    assert_eq!(names, ["api", "app.toml"]);

    let ghost = call(addr, Request::Start { id: "ghost".into() }).await;
    assert!(!ghost.ok);
    assert_eq!(ghost.kind.as_deref(), Some("not_managed"));

    let garbage = raw_line(addr, "this is not json\n").await;
    assert_eq!(garbage["ok"], json!(false));
    assert!(garbage["error"]
        .as_str()
        .is_some_and(|e| e.contains("invalid request JSON")));

    let stopping = call(addr, Request::Shutdown).await;
    assert!(stopping.ok);
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server stops")
        .expect("join")
        .expect("serve result");
}

#[test]
fn bootstrap_persists_explicit_port() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = DaemonConfig {
        root: dir.path().to_path_buf(),
        unit_dir: dir.path().join("units"),
        port: Some(9191),
        ..DaemonConfig::default()
    };
    assert_eq!(bootstrap(&config).expect("bootstrap").addr.port(), 9191);

    let again = DaemonConfig {
        port: None,
        ..config
    };
    assert_eq!(bootstrap(&again).expect("bootstrap").addr.port(), 9191);
}

#[test]
fn missing_unit_template_fails_bootstrap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = DaemonConfig {
        root: dir.path().to_path_buf(),
        unit_template: Some(dir.path().join("missing.tera")),
        ..DaemonConfig::default()
    };
    assert!(bootstrap(&config).is_err());
}
