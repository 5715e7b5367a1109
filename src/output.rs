// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes.

use serde::Serialize;
use std::time::Instant;

use crate::deploy::{DeploymentReport, Outcome, Phase};
use crate::diagnostics::Warning;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a non-fatal warning (suppressed in quiet mode).
    pub fn warning(&self, warning: &Warning) {
        match self.mode {
            OutputMode::Normal => eprintln!("Warning: {}", warning.message),
            OutputMode::Quiet => {}
            OutputMode::Json => emit(&WarningEvent {
                event: "warning",
                warning,
            }),
        }
    }

    /// Print the final result of a deployment attempt.
    pub fn report(&self, report: &DeploymentReport) {
        for warning in report.diagnostics.warnings() {
            self.warning(warning);
        }

        let outcome = report.outcome();
        let message = outcome_message(report);
        match self.mode {
            OutputMode::Json => emit(&ReportEvent::new(report, &message, self.duration())),
            OutputMode::Normal | OutputMode::Quiet if outcome.is_success() => {
                self.success(&message)
            }
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("{message}");
                if let Some(cause) = report.attempt.failure() {
                    eprintln!("  cause: {cause}");
                }
                if let Some(e) = report.attempt.rollback_error() {
                    eprintln!("  rollback: {e}");
                }
            }
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration(),
            }),
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }
}

fn outcome_message(report: &DeploymentReport) -> String {
    let attempt = &report.attempt;
    match report.outcome() {
        Outcome::Succeeded => format!("Deployed {} to {}", attempt.image(), attempt.service()),
        Outcome::RolledBack => match attempt.previous_revision() {
            Some(revision) => format!(
                "Deployment of {} failed; {} rolled back to {revision}",
                attempt.image(),
                attempt.service()
            ),
            None => format!("Deployment of {} failed; rolled back", attempt.image()),
        },
        Outcome::AbortedBeforeMutation => format!(
            "Deployment of {} aborted; {} was not changed",
            attempt.image(),
            attempt.service()
        ),
        Outcome::RollbackFailed => format!(
            "ROLLBACK FAILED for {}: service state unknown, manual intervention required",
            attempt.service()
        ),
    }
}

fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct WarningEvent<'a> {
    event: &'a str,
    #[serde(flatten)]
    warning: &'a Warning,
}

#[derive(Serialize)]
struct ReportEvent<'a> {
    event: &'static str,
    outcome: Outcome,
    exit_code: i32,
    message: &'a str,
    cluster: String,
    service: String,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous_revision: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_revision: Option<&'a str>,
    phases: &'a [Phase],
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rollback_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

impl<'a> ReportEvent<'a> {
    fn new(report: &'a DeploymentReport, message: &'a str, duration_secs: Option<f64>) -> Self {
        let attempt = &report.attempt;
        let outcome = report.outcome();
        Self {
            event: "outcome",
            outcome,
            exit_code: outcome.exit_code(),
            message,
            cluster: attempt.service().cluster().to_string(),
            service: attempt.service().service().to_string(),
            image: attempt.image().to_string(),
            previous_revision: attempt.previous_revision().map(|r| r.as_str()),
            new_revision: attempt.new_revision().map(|r| r.as_str()),
            phases: attempt.history(),
            failure: attempt.failure().map(ToString::to_string),
            rollback_error: attempt.rollback_error().map(ToString::to_string),
            duration_secs,
        }
    }
}
