// ABOUTME: Test support utilities.
// ABOUTME: Scriptable fakes for the platform, probe and smoke runner plus a stub HTTP server.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use rollsafe::config::RevisionTemplate;
use rollsafe::health::{HealthProbe, HealthVerdict};
use rollsafe::platform::{InstanceInfo, OrchestrationClient, PlatformError};
use rollsafe::smoke::{SmokeResult, SmokeTestRunner};
use rollsafe::types::{
    ClusterName, ImageRef, ImageRepository, InstanceId, RevisionId, ServiceIdentity, ServiceName,
};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("rollsafe=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn service() -> ServiceIdentity {
    ServiceIdentity::new(
        ClusterName::new("prod").unwrap(),
        ServiceName::new("web").unwrap(),
    )
}

pub fn image(tag: &str) -> ImageRef {
    ImageRepository::parse("ghcr.io/acme/web")
        .unwrap()
        .with_tag(tag)
}

pub fn template() -> RevisionTemplate {
    serde_yaml::from_str(
        r#"
family: web
image: ghcr.io/acme/web
ports: ["8080"]
memory: 512m
"#,
    )
    .unwrap()
}

/// A template the platform must refuse before anything is registered.
pub fn malformed_template() -> RevisionTemplate {
    serde_yaml::from_str(
        r#"
family: web
image: ghcr.io/acme/web
ports: ["not-a-port"]
"#,
    )
    .unwrap()
}

pub fn rev(id: &str) -> RevisionId {
    RevisionId::new(id)
}

pub fn instance(id: &str) -> InstanceId {
    InstanceId::new(id)
}

// =============================================================================
// FakePlatform
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentRevision,
    Register(String),
    Update(RevisionId),
    WaitUntilStable,
    ListInstances,
    Describe(InstanceId),
}

/// What the next `wait_until_stable` call reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Stable,
    Timeout,
    Fatal,
}

#[derive(Debug, Default)]
struct FakeState {
    current: Option<RevisionId>,
    next_revision: Option<RevisionId>,
    fail_current: bool,
    fail_register: bool,
    failing_updates: HashSet<RevisionId>,
    waits: VecDeque<Wait>,
    fail_list: bool,
    instances: BTreeMap<InstanceId, InstanceInfo>,
    calls: Vec<Call>,
}

/// In-memory platform. The live revision changes only through `update_service`.
#[derive(Debug, Default)]
pub struct FakePlatform {
    state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_current(self, revision: &str) -> Self {
        self.state.lock().current = Some(rev(revision));
        self
    }

    /// Revision id handed out by the next registration.
    pub fn registering(self, revision: &str) -> Self {
        self.state.lock().next_revision = Some(rev(revision));
        self
    }

    pub fn failing_current_revision(self) -> Self {
        self.state.lock().fail_current = true;
        self
    }

    pub fn failing_register(self) -> Self {
        self.state.lock().fail_register = true;
        self
    }

    pub fn failing_update_to(self, revision: &str) -> Self {
        self.state.lock().failing_updates.insert(rev(revision));
        self
    }

    /// Outcomes of successive `wait_until_stable` calls; `Stable` once exhausted.
    pub fn waits(self, waits: &[Wait]) -> Self {
        self.state.lock().waits = waits.iter().copied().collect();
        self
    }

    pub fn failing_list(self) -> Self {
        self.state.lock().fail_list = true;
        self
    }

    pub fn with_instance(self, id: &str, health: HealthVerdict, address: Option<&str>) -> Self {
        let id = instance(id);
        self.state.lock().instances.insert(
            id.clone(),
            InstanceInfo {
                id,
                revision: None,
                address: address.map(str::to_string),
                health,
            },
        );
        self
    }

    pub fn current(&self) -> Option<RevisionId> {
        self.state.lock().current.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn updates(&self) -> Vec<RevisionId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl OrchestrationClient for FakePlatform {
    async fn current_revision(
        &self,
        _service: &ServiceIdentity,
    ) -> Result<Option<RevisionId>, PlatformError> {
        self.record(Call::CurrentRevision);
        let state = self.state.lock();
        if state.fail_current {
            return Err(PlatformError::fatal("describe service denied"));
        }
        Ok(state.current.clone())
    }

    async fn register_revision(
        &self,
        image: &ImageRef,
        template: &RevisionTemplate,
    ) -> Result<RevisionId, PlatformError> {
        self.record(Call::Register(image.to_string()));
        if let Err(source) = template.resolve() {
            return Err(PlatformError::MalformedTemplate { source });
        }
        let state = self.state.lock();
        if state.fail_register {
            return Err(PlatformError::RegistrationRejected {
                message: "quota exceeded".into(),
            });
        }
        Ok(state.next_revision.clone().unwrap_or_else(|| rev("rev-new")))
    }

    async fn update_service(
        &self,
        _service: &ServiceIdentity,
        revision: &RevisionId,
    ) -> Result<(), PlatformError> {
        self.record(Call::Update(revision.clone()));
        let mut state = self.state.lock();
        if state.failing_updates.contains(revision) {
            return Err(PlatformError::fatal(format!("update to {revision} refused")));
        }
        state.current = Some(revision.clone());
        Ok(())
    }

    async fn wait_until_stable(
        &self,
        _service: &ServiceIdentity,
        _timeout: Duration,
    ) -> Result<bool, PlatformError> {
        self.record(Call::WaitUntilStable);
        match self.state.lock().waits.pop_front().unwrap_or(Wait::Stable) {
            Wait::Stable => Ok(true),
            Wait::Timeout => Ok(false),
            Wait::Fatal => Err(PlatformError::fatal("service deleted")),
        }
    }

    async fn list_running_instances(
        &self,
        _service: &ServiceIdentity,
    ) -> Result<BTreeSet<InstanceId>, PlatformError> {
        self.record(Call::ListInstances);
        let state = self.state.lock();
        if state.fail_list {
            return Err(PlatformError::fatal("list denied"));
        }
        Ok(state.instances.keys().cloned().collect())
    }

    async fn describe_instance(
        &self,
        _service: &ServiceIdentity,
        instance: &InstanceId,
    ) -> Result<InstanceInfo, PlatformError> {
        self.record(Call::Describe(instance.clone()));
        self.state
            .lock()
            .instances
            .get(instance)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound {
                what: "instance",
                name: instance.to_string(),
            })
    }
}

// =============================================================================
// FakeProbe / FakeSmoke
// =============================================================================

/// Verdicts by instance id; unlisted instances are healthy.
#[derive(Debug, Default)]
pub struct FakeProbe {
    verdicts: BTreeMap<InstanceId, HealthVerdict>,
    checks: AtomicUsize,
}

impl FakeProbe {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, verdict: HealthVerdict) -> Self {
        self.verdicts.insert(instance(id), verdict);
        self
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn check(&self, instance: &InstanceId) -> HealthVerdict {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.verdicts
            .get(instance)
            .copied()
            .unwrap_or(HealthVerdict::Healthy)
    }
}

#[derive(Debug)]
pub struct FakeSmoke {
    result: SmokeResult,
    runs: AtomicUsize,
}

impl FakeSmoke {
    pub fn passing() -> Self {
        Self {
            result: SmokeResult::Pass,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: SmokeResult::Fail,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SmokeTestRunner for FakeSmoke {
    async fn run(&self) -> SmokeResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.result
    }
}

// =============================================================================
// StubServer
// =============================================================================

#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
}

impl StubResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

type Handler = dyn Fn(&StubRequest) -> StubResponse + Send + Sync;

/// Minimal HTTP/1.1 server: one request per connection, answered by `handler`.
pub struct StubServer {
    addr: std::net::SocketAddr,
    requests: Arc<Mutex<Vec<StubRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&StubRequest) -> StubResponse + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let handler = Arc::clone(&handler);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    let _ = read_request(stream, handler.as_ref(), &log).await;
                });
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_request(
    mut stream: TcpStream,
    handler: &Handler,
    log: &Mutex<Vec<StubRequest>>,
) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = buf.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&buf[header_end..end]).into_owned();

    let request = StubRequest { method, path, body };
    let response = handler(&request);
    log.lock().push(request);

    let reply = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        response.body.len(),
        response.body
    );
    stream.write_all(reply.as_bytes()).await.ok()?;
    stream.shutdown().await.ok()?;
    Some(())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
