//! Integration tests for `brewcheck install`.
//!
//! Most tests point `--runtime` at a shell script that speaks just enough of
//! the docker CLI and records every call. The real-daemon test is ignored by
//! default; run it with `cargo test -- --ignored` on a host with docker.

#![cfg(unix)]

mod common;

use common::{TempDir, TestEnv, parse_json};
use predicates::prelude::*;
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const FAKE_DOCKER: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_DOCKER_LOG"
case "$1" in
  pull) echo "latest: Pulling from $2" ;;
  create) echo "c0ffee" ;;
  start) echo "$2" ;;
  logs)
    echo "==> Installing vws from local archive"
    echo "vws, version 1" >&2
    if [ -n "$FAKE_DOCKER_HANG" ]; then sleep 30; fi
    ;;
  wait) echo "${FAKE_DOCKER_STATUS:-0}" ;;
  rm) echo "$3" ;;
  container) echo "Error: No such container: $5" >&2; exit 1 ;;
  *) exit 2 ;;
esac
"#;

struct FakeDocker {
    dir: TempDir,
}

impl FakeDocker {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("docker");
        std::fs::write(&script, FAKE_DOCKER).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("calls.log"), "").unwrap();
        Self { dir }
    }

    fn binary(&self) -> PathBuf {
        self.dir.path().join("docker")
    }

    fn log(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.log())
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

fn install(env: &TestEnv, docker: &FakeDocker, work: &Path) -> assert_cmd::Command {
    let mut cmd = env.brewcheck();
    cmd.env("FAKE_DOCKER_LOG", docker.log())
        .arg("install")
        .arg("--runtime")
        .arg(docker.binary())
        .arg("--work-dir")
        .arg(work);
    cmd
}

#[test]
fn test_install_with_fake_runtime() {
    let env = TestEnv::new();
    let docker = FakeDocker::new();
    let work = TempDir::new().unwrap();

    let output = install(&env, &docker, work.path()).output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let json = parse_json(&output.stdout);
    assert_eq!(json["scenario"], "install");
    assert_eq!(json["archive_url"], "file:///1.tar");
    assert_eq!(json["container"]["id"], "c0ffee");
    assert_eq!(json["container"]["status_code"], 0);
    assert_eq!(json["container"]["log_lines"], 2);
    assert_eq!(json["container"]["removed"], true);
    assert!(json["container"]["name"]
        .as_str()
        .unwrap()
        .starts_with("brewcheck-"));

    let calls = docker.calls();
    let verbs: Vec<&str> = calls
        .iter()
        .map(|c| c.split_whitespace().next().unwrap_or_default())
        .collect();
    assert_eq!(
        verbs,
        vec!["pull", "create", "start", "logs", "wait", "rm", "container"]
    );
    assert_eq!(calls[0], "pull linuxbrew/linuxbrew:latest");

    let create = &calls[1];
    assert!(create.contains("target=/1.tar,readonly"));
    assert!(create.contains("target=/vws.rb,readonly"));
    assert!(create.contains("--env HOMEBREW_NO_AUTO_UPDATE=1"));
    assert!(create.ends_with(
        "linuxbrew/linuxbrew:latest /bin/bash -c brew install /vws.rb && vws --version"
    ));
    assert_eq!(calls[5], "rm --force c0ffee");

    let formula = std::fs::read_to_string(work.path().join("vws.rb")).unwrap();
    assert!(formula.contains("url \"file:///1.tar\""));
}

#[test]
fn test_install_failure_exits_nonzero_and_removes_container() {
    let env = TestEnv::new();
    let docker = FakeDocker::new();
    let work = TempDir::new().unwrap();

    install(&env, &docker, work.path())
        .env("FAKE_DOCKER_STATUS", "1")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "brewcheck: error: install: formula did not install cleanly",
        ))
        .stderr(predicate::str::contains("status code 1"));

    assert_eq!(docker.calls().last().unwrap(), "rm --force c0ffee");
}

#[test]
fn test_install_timeout_removes_container() {
    let env = TestEnv::new();
    let docker = FakeDocker::new();
    let work = TempDir::new().unwrap();

    install(&env, &docker, work.path())
        .env("FAKE_DOCKER_HANG", "1")
        .args(["--timeout", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("brewcheck: error: timeout:"));

    let calls = docker.calls();
    assert!(!calls.iter().any(|c| c.starts_with("wait")));
    assert!(calls.iter().any(|c| c == "rm --force c0ffee"));
}

#[test]
fn test_install_missing_runtime_binary() {
    let env = TestEnv::new();
    let work = TempDir::new().unwrap();

    env.brewcheck()
        .args(["install", "--runtime", "/nonexistent/docker", "--work-dir"])
        .arg(work.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot run `/nonexistent/docker`"));
}

#[test]
#[ignore = "needs a docker daemon and network access"]
#[serial]
fn test_install_in_linuxbrew_container() {
    let env = TestEnv::new();
    env.write(
        "setup.py",
        r#"from setuptools import setup

setup(
    name="vws",
    version="1",
    py_modules=["vws"],
    entry_points={"console_scripts": ["vws=vws:main"]},
)
"#,
    );
    env.write("vws.py", "def main():\n    print('vws, version 1')\n");
    env.git(&["add", "."]);
    env.git(&["commit", "-q", "-m", "add entry point"]);

    let work = TempDir::new().unwrap();
    env.brewcheck()
        .args(["-v", "install", "--work-dir"])
        .arg(work.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status_code\":0"))
        .stdout(predicate::str::contains("\"removed\":true"));
}
