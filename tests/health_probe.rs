// ABOUTME: Integration tests for the HTTP and platform health probes.
// ABOUTME: Verdict mapping per instance, with UNKNOWN for anything that prevents a verdict.

mod support;

use rollsafe::config::{HealthConfig, HealthMode};
use rollsafe::health::{HealthProbe, HealthVerdict, HttpHealthProbe, PlatformHealthProbe, probe_all};
use std::collections::BTreeSet;
use std::time::Duration;
use support::{Call, FakePlatform, StubResponse, StubServer, instance};

fn http_config() -> HealthConfig {
    HealthConfig {
        mode: HealthMode::Http,
        path: "health".to_string(),
        port: None,
        timeout: Duration::from_secs(2),
    }
}

mod http {
    use super::*;

    #[tokio::test]
    async fn ok_body_is_healthy() {
        let server = StubServer::start(|_| StubResponse::json(200, r#"{"status": "OK"}"#)).await;
        let platform = FakePlatform::new().with_instance(
            "i-1",
            HealthVerdict::Unknown,
            Some(&server.address()),
        );
        let probe = HttpHealthProbe::new(&platform, support::service(), &http_config());

        assert_eq!(probe.check(&instance("i-1")).await, HealthVerdict::Healthy);
        assert_eq!(server.count("GET", "/health"), 1);
    }

    #[tokio::test]
    async fn error_status_is_unhealthy() {
        let server =
            StubServer::start(|_| StubResponse::json(503, r#"{"status": "STARTING"}"#)).await;
        let platform = FakePlatform::new().with_instance(
            "i-1",
            HealthVerdict::Healthy,
            Some(&server.address()),
        );
        let probe = HttpHealthProbe::new(&platform, support::service(), &http_config());

        assert_eq!(probe.check(&instance("i-1")).await, HealthVerdict::Unhealthy);
    }

    #[tokio::test]
    async fn instance_without_address_is_unknown() {
        let platform = FakePlatform::new().with_instance("i-1", HealthVerdict::Healthy, None);
        let probe = HttpHealthProbe::new(&platform, support::service(), &http_config());

        assert_eq!(probe.check(&instance("i-1")).await, HealthVerdict::Unknown);
    }

    #[tokio::test]
    async fn unreachable_instance_is_unknown() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let platform =
            FakePlatform::new().with_instance("i-1", HealthVerdict::Healthy, Some(&addr));
        let probe = HttpHealthProbe::new(&platform, support::service(), &http_config());

        assert_eq!(probe.check(&instance("i-1")).await, HealthVerdict::Unknown);
    }

    #[tokio::test]
    async fn undescribable_instance_is_unknown() {
        let platform = FakePlatform::new();
        let probe = HttpHealthProbe::new(&platform, support::service(), &http_config());

        assert_eq!(probe.check(&instance("gone")).await, HealthVerdict::Unknown);
        assert_eq!(platform.calls(), vec![Call::Describe(instance("gone"))]);
    }

    #[tokio::test]
    async fn configured_port_replaces_reported_one() {
        let server = StubServer::start(|_| StubResponse::json(200, r#"{"status": "OK"}"#)).await;
        let port: u16 = server.address().rsplit_once(':').unwrap().1.parse().unwrap();
        let platform = FakePlatform::new().with_instance(
            "i-1",
            HealthVerdict::Unknown,
            Some("127.0.0.1:1"),
        );
        let config = HealthConfig {
            port: Some(port),
            ..http_config()
        };
        let probe = HttpHealthProbe::new(&platform, support::service(), &config);

        assert_eq!(probe.check(&instance("i-1")).await, HealthVerdict::Healthy);
    }
}

mod platform {
    use super::*;

    #[tokio::test]
    async fn reports_platform_verdicts() {
        let platform = FakePlatform::new()
            .with_instance("a", HealthVerdict::Healthy, None)
            .with_instance("b", HealthVerdict::Unhealthy, None)
            .with_instance("c", HealthVerdict::Unknown, None);
        let probe = PlatformHealthProbe::new(&platform, support::service(), Duration::from_secs(1));

        assert_eq!(probe.check(&instance("a")).await, HealthVerdict::Healthy);
        assert_eq!(probe.check(&instance("b")).await, HealthVerdict::Unhealthy);
        assert_eq!(probe.check(&instance("c")).await, HealthVerdict::Unknown);
        assert_eq!(probe.check(&instance("d")).await, HealthVerdict::Unknown);
    }

    #[tokio::test]
    async fn probe_all_checks_every_instance() {
        let platform = FakePlatform::new()
            .with_instance("a", HealthVerdict::Healthy, None)
            .with_instance("b", HealthVerdict::Unhealthy, None);
        let probe = PlatformHealthProbe::new(&platform, support::service(), Duration::from_secs(1));
        let instances: BTreeSet<_> = [instance("a"), instance("b")].into();

        let report = probe_all(&probe, &instances).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.get(&instance("a")), Some(HealthVerdict::Healthy));
        assert!(report.is_failing());
        assert_eq!(report.unhealthy().collect::<Vec<_>>(), vec![&instance("b")]);
    }
}
