// ABOUTME: Deploy command implementation.
// ABOUTME: Loads config, takes the deploy lock, wires collaborators and runs the coordinator.

use rollsafe::config::{Config, HealthMode};
use rollsafe::deploy::{CoordinatorSettings, DeployLock, DeploymentCoordinator, Outcome};
use rollsafe::diagnostics::Warning;
use rollsafe::error::Result;
use rollsafe::health::{HealthProbe, HttpHealthProbe, PlatformHealthProbe};
use rollsafe::output::Output;
use rollsafe::platform::HttpPlatform;
use rollsafe::smoke::{CommandSmokeTest, SkippedSmokeTest, SmokeTestRunner};
use std::env;
use std::path::PathBuf;

use crate::cli::Cli;

/// Deploy the requested tag. Setup failures surface as `Err`; everything
/// after the coordinator starts is reported through the returned outcome.
pub async fn deploy(cli: &Cli, output: &mut Output) -> Result<Outcome> {
    output.start_timer();

    let (config, base_dir) = load_config(cli)?;
    let service = config.service_identity()?;
    let tag = cli.tag.clone().unwrap_or_default();
    let image = config
        .revision
        .image
        .with_tag(tag.resolve(&config.revision.latest_tag));

    let client = HttpPlatform::new(&config.platform)?;

    output.progress(&format!("Deploying {image} to {service}"));

    let lock = DeployLock::acquire(&config.lock_dir()?, &service, cli.force)?;

    let http_probe;
    let platform_probe;
    let probe: &dyn HealthProbe = match config.health.mode {
        HealthMode::Http => {
            http_probe = HttpHealthProbe::new(&client, service.clone(), &config.health);
            &http_probe
        }
        HealthMode::Platform => {
            platform_probe =
                PlatformHealthProbe::new(&client, service.clone(), config.health.timeout);
            &platform_probe
        }
    };

    let smoke: Box<dyn SmokeTestRunner> = match &config.smoke_test {
        Some(smoke) => Box::new(
            CommandSmokeTest::from_config(smoke, &service, &image).working_dir(&base_dir),
        ),
        None => Box::new(SkippedSmokeTest),
    };

    let coordinator = DeploymentCoordinator::new(
        &client,
        probe,
        smoke.as_ref(),
        CoordinatorSettings::from_config(&config),
    );
    let mut report = coordinator
        .run(service.clone(), image, &config.revision)
        .await;

    if let Err(e) = lock.release() {
        report
            .diagnostics
            .warn(Warning::lock_release(format!("failed to release deploy lock: {e}")));
    }

    output.report(&report);
    Ok(report.outcome())
}

/// Load config from `--config` or by discovery; returns it with the directory
/// relative smoke-test commands run from.
fn load_config(cli: &Cli) -> Result<(Config, PathBuf)> {
    match &cli.config {
        Some(path) => {
            let config = Config::load(path)?;
            let base = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => env::current_dir()?,
            };
            Ok((config, base))
        }
        None => {
            let cwd = env::current_dir()?;
            Ok((Config::discover(&cwd)?, cwd))
        }
    }
}
