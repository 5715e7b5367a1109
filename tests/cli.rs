// ABOUTME: Integration tests for the rollsafe binary.
// ABOUTME: Argument handling, setup failures and full runs against a stub platform.

mod support;

use assert_cmd::Command;
use assert_cmd::assert::OutputAssertExt;
use parking_lot::Mutex;
use predicates::prelude::*;
use std::path::Path;
use std::sync::Arc;
use support::{StubRequest, StubResponse, StubServer};

const SERVICE_PATH: &str = "/v1/clusters/prod/services/web";

fn rollsafe_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rollsafe"));
    cmd.env_remove("ROLLSAFE_CLUSTER")
        .env_remove("ROLLSAFE_SERVICE")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, endpoint: &str, extra: &str) {
    let yaml = format!(
        r#"cluster: prod
service: web
platform:
  endpoint: {endpoint}
  retries: 0
  poll_interval: 50ms
stabilize_timeout: 5s
rollback_timeout: 5s
revision:
  family: web
  image: ghcr.io/acme/web
  latest_tag: main
lock:
  dir: {lock_dir}
{extra}"#,
        lock_dir = dir.join("locks").display(),
    );
    std::fs::write(dir.join("rollsafe.yml"), yaml).unwrap();
}

/// A platform with one service on `current` that converges instantly to whatever it is pointed at.
/// An empty `current` is a service that was never deployed.
fn platform(
    current: Arc<Mutex<String>>,
) -> impl Fn(&StubRequest) -> StubResponse + Send + Sync + 'static {
    move |req| {
        let status_path = format!("{SERVICE_PATH}/status");
        let instances_path = format!("{SERVICE_PATH}/instances");
        match (req.method.as_str(), req.path.as_str()) {
            ("GET", p) if p == SERVICE_PATH => match current.lock().as_str() {
                "" => StubResponse::json(404, r#"{"message": "no such service"}"#),
                rev => StubResponse::json(200, format!(r#"{{"revision": "{rev}"}}"#)),
            },
            ("POST", "/v1/revisions") => StubResponse::json(201, r#"{"revision": "web:2"}"#),
            ("PUT", p) if p == SERVICE_PATH => {
                let body: serde_json::Value = serde_json::from_str(&req.body).unwrap();
                *current.lock() = body["revision"].as_str().unwrap().to_string();
                StubResponse::json(200, "{}")
            }
            ("GET", p) if p == status_path => {
                let rev = current.lock().clone();
                StubResponse::json(
                    200,
                    format!(
                        r#"{{"revision": "{rev}", "desired_count": 1, "instances": [
                            {{"id": "a", "revision": "{rev}", "state": "RUNNING"}}]}}"#
                    ),
                )
            }
            ("GET", p) if p == instances_path => {
                StubResponse::json(200, r#"{"instances": [{"id": "a", "state": "RUNNING"}]}"#)
            }
            ("GET", p) if p.starts_with(&instances_path) => StubResponse::json(
                200,
                r#"{"id": "a", "state": "RUNNING", "health": "HEALTHY"}"#,
            ),
            _ => StubResponse::json(404, r#"{"message": "no route"}"#),
        }
    }
}

/// Run the binary off the runtime so the stub server keeps serving.
async fn run(mut cmd: Command) -> assert_cmd::assert::Assert {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
        .assert()
}

#[test]
fn help_describes_the_command() {
    rollsafe_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("IMAGE_TAG"))
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn invalid_tag_is_rejected() {
    rollsafe_cmd()
        .arg("v1!")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value 'v1!'"));
}

#[test]
fn quiet_and_json_conflict() {
    rollsafe_cmd()
        .args(["--quiet", "--json"])
        .assert()
        .code(2);
}

#[test]
fn missing_config_aborts_before_anything_runs() {
    let dir = tempfile::tempdir().unwrap();

    rollsafe_cmd()
        .current_dir(dir.path())
        .arg("v1")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("configuration file not found"));
}

#[test]
fn missing_identity_aborts() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("rollsafe.yml"),
        "platform:\n  endpoint: http://127.0.0.1:1\nrevision:\n  family: web\n  image: ghcr.io/acme/web\n",
    )
    .unwrap();

    rollsafe_cmd()
        .current_dir(dir.path())
        .arg("v1")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ROLLSAFE_CLUSTER"));
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_deploy_exits_zero() {
    let current = Arc::new(Mutex::new("web:1".to_string()));
    let server = StubServer::start(platform(Arc::clone(&current))).await;
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &server.endpoint(), "");

    let mut cmd = rollsafe_cmd();
    cmd.current_dir(dir.path()).args(["--json", "v2"]);
    let assert = run(cmd).await;

    assert
        .code(0)
        .stdout(predicate::str::contains(r#""outcome":"SUCCEEDED""#))
        .stdout(predicate::str::contains(r#""image":"ghcr.io/acme/web:v2""#))
        .stdout(predicate::str::contains(r#""previous_revision":"web:1""#));
    assert_eq!(*current.lock(), "web:2");
    assert!(!dir.path().join("locks/prod.web.lock").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_smoke_test_rolls_back_and_exits_one() {
    let current = Arc::new(Mutex::new("web:1".to_string()));
    let server = StubServer::start(platform(Arc::clone(&current))).await;
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        &server.endpoint(),
        "smoke_test:\n  command: [sh, -c, \"exit 1\"]\n  timeout: 10s\n",
    );

    let mut cmd = rollsafe_cmd();
    cmd.current_dir(dir.path()).arg("--json");
    let assert = run(cmd).await;

    assert
        .code(1)
        .stdout(predicate::str::contains(r#""outcome":"ROLLED_BACK""#))
        .stdout(predicate::str::contains(r#""image":"ghcr.io/acme/web:main""#));
    assert_eq!(*current.lock(), "web:1");
    assert_eq!(server.count("PUT", SERVICE_PATH), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_first_deployment_cannot_roll_back_and_exits_three() {
    let current = Arc::new(Mutex::new(String::new()));
    let server = StubServer::start(platform(Arc::clone(&current))).await;
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        &server.endpoint(),
        "smoke_test:\n  command: [sh, -c, \"exit 1\"]\n  timeout: 10s\n",
    );

    let mut cmd = rollsafe_cmd();
    cmd.current_dir(dir.path()).args(["--json", "v2"]);
    let assert = run(cmd).await;

    assert
        .code(3)
        .stdout(predicate::str::contains(r#""outcome":"ROLLBACK_FAILED""#))
        .stdout(predicate::str::contains(r#""exit_code":3"#));
    assert_eq!(*current.lock(), "web:2");
    assert_eq!(server.count("PUT", SERVICE_PATH), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn held_lock_aborts_without_touching_the_platform() {
    let current = Arc::new(Mutex::new("web:1".to_string()));
    let server = StubServer::start(platform(Arc::clone(&current))).await;
    let dir = tempfile::tempdir().unwrap();
    write_config(dir.path(), &server.endpoint(), "");

    let lock_dir = dir.path().join("locks");
    let _held = rollsafe::deploy::DeployLock::acquire(&lock_dir, &support::service(), false)
        .unwrap();

    let mut cmd = rollsafe_cmd();
    cmd.current_dir(dir.path()).arg("v2");
    let assert = run(cmd).await;

    assert
        .code(2)
        .stderr(predicate::str::contains("--force"));
    assert!(server.requests().is_empty());
}
