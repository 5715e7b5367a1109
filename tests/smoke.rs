// ABOUTME: Integration tests for the command smoke-test runner.
// ABOUTME: Exit status, timeouts, unstartable programs and the exported environment.

mod support;

use nonempty::NonEmpty;
use rollsafe::config::SmokeTestConfig;
use rollsafe::smoke::{CommandSmokeTest, SkippedSmokeTest, SmokeResult, SmokeTestRunner};
use std::time::{Duration, Instant};

fn sh(script: &str) -> NonEmpty<String> {
    NonEmpty::from_vec(vec!["sh".to_string(), "-c".to_string(), script.to_string()]).unwrap()
}

fn runner(script: &str) -> CommandSmokeTest {
    CommandSmokeTest::new(sh(script), Duration::from_secs(10))
}

#[tokio::test]
async fn zero_exit_passes() {
    assert_eq!(runner("exit 0").run().await, SmokeResult::Pass);
}

#[tokio::test]
async fn nonzero_exit_fails() {
    assert_eq!(runner("echo broken >&2; exit 3").run().await, SmokeResult::Fail);
}

#[tokio::test]
async fn hung_command_times_out_as_failure() {
    let smoke = CommandSmokeTest::new(sh("sleep 30"), Duration::from_millis(200));

    let started = Instant::now();
    let result = smoke.run().await;

    assert_eq!(result, SmokeResult::Fail);
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn missing_program_fails() {
    let smoke = CommandSmokeTest::new(
        NonEmpty::new("/nonexistent/rollsafe-smoke".to_string()),
        Duration::from_secs(5),
    );

    assert_eq!(smoke.run().await, SmokeResult::Fail);
}

#[tokio::test]
async fn runs_in_working_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker"), "").unwrap();

    let smoke = runner("test -f marker").working_dir(dir.path());

    assert_eq!(smoke.run().await, SmokeResult::Pass);
}

#[tokio::test]
async fn deployment_is_exported_to_the_command() {
    let config = SmokeTestConfig {
        command: sh(r#"[ "$ROLLSAFE_CLUSTER/$ROLLSAFE_SERVICE" = "prod/web" ] && [ "$ROLLSAFE_IMAGE" = "ghcr.io/acme/web:v9" ]"#),
        timeout: Duration::from_secs(10),
    };

    let smoke =
        CommandSmokeTest::from_config(&config, &support::service(), &support::image("v9"));

    assert_eq!(smoke.run().await, SmokeResult::Pass);
}

#[tokio::test]
async fn skipped_smoke_test_passes() {
    assert!(SkippedSmokeTest.run().await.is_pass());
}
