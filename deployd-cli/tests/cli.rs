use std::fs;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn deployd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("deployd"));
    cmd.env_remove("DEPLOYD_ADDR")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0");
    cmd
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    listener.local_addr().expect("local addr").port()
}

fn write_archive(dir: &Path, name: &str, exe: &str) -> PathBuf {
    let path = dir.join(name);
    let file = fs::File::create(&path).expect("create archive");
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().unix_permissions(0o644);
    zip.start_file(exe, options).expect("start exe");
    zip.write_all(b"#!/bin/sh\necho hi\n").expect("write exe");
    zip.add_directory("conf/", options).expect("add dir");
    zip.start_file("conf/app.toml", options).expect("start conf");
    zip.write_all(b"port = 9000\n").expect("write conf");
    zip.finish().expect("finish archive");
    path
}

fn true_binary() -> PathBuf {
    ["/bin/true", "/usr/bin/true"]
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
        .expect("a `true` binary")
}

struct DaemonGuard(Child);

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn wait_for_port(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(15);
    while Instant::now() < deadline {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        sleep(Duration::from_millis(50));
    }
    panic!("daemon never listened on {port}");
}

// ---------------------------------------------------------------------------
// Offline behaviour
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    deployd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("install"))
        .stdout(contains("rollback"))
        .stdout(contains("delete-file"))
        .stdout(contains("daemon"));
}

#[test]
fn client_without_daemon_reports_not_running() {
    deployd()
        .args(["--addr", "127.0.0.1:1", "list"])
        .assert()
        .failure()
        .stderr(contains("not running"));
}

#[test]
fn install_of_missing_archive_fails_before_contacting_daemon() {
    let tmp = TempDir::new().expect("tempdir");
    deployd()
        .args(["--addr", "127.0.0.1:1", "install"])
        .arg(tmp.path().join("absent.zip"))
        .assert()
        .failure()
        .stderr(contains("cannot read"));
}

// ---------------------------------------------------------------------------
// Against a live daemon
// ---------------------------------------------------------------------------

#[test]
fn install_list_and_shutdown_against_live_daemon() {
    let tmp = TempDir::new().expect("tempdir");
    let root = tmp.path().join("root");
    let units = tmp.path().join("units");
    let port = free_port();
    let addr = format!("127.0.0.1:{port}");

    let child = deployd()
        .arg("daemon")
        .arg("--root")
        .arg(&root)
        .arg("--unit-dir")
        .arg(&units)
        .arg("--systemctl")
        .arg(true_binary())
        .args(["--port", &port.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn daemon");
    let mut guard = DaemonGuard(child);
    wait_for_port(port);

    let archive = write_archive(tmp.path(), "api.zip", "api");
    deployd()
        .args(["--addr", &addr, "install"])
        .arg(&archive)
        .assert()
        .success()
        .stdout(contains("installed api"));

    assert!(root.join("services/api/conf/app.toml").is_file());
    assert!(units.join("api.service").is_file());

    deployd()
        .args(["--addr", &addr, "list", "--json"])
        .assert()
        .success()
        .stdout(contains("\"id\": \"api\""));

    deployd()
        .args(["--addr", &addr, "files", "api"])
        .assert()
        .success()
        .stdout(contains("conf/app.toml"));

    deployd()
        .args(["--addr", &addr, "start", "ghost"])
        .assert()
        .failure()
        .stderr(contains("not_managed"));

    deployd()
        .args(["--addr", &addr, "shutdown"])
        .assert()
        .success();

    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if guard.0.try_wait().expect("poll daemon").is_some() {
            return;
        }
        sleep(Duration::from_millis(50));
    }
    panic!("daemon did not exit after shutdown");
}
