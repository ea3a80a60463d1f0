//! JSON over HTTP/1.1 rendition of the lifecycle protocol.
//!
//! One keep-alive connection per client. A connection the agent has closed,
//! or one abandoned mid-request, is re-opened before the next request. Every
//! request has a deadline: `request_timeout` for ordinary calls, the remaining
//! deployment budget for status polls. Connect and send failures and missed
//! request deadlines surface as [`LifecycleError::TransportUnreachable`].

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1::{self, SendRequest};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use url::{Position, Url};

use crate::client::{LifecycleClient, LifecycleConnector};
use crate::error::{LifecycleError, LifecycleResult};
use crate::types::{
    ApplicationId, ApplicationInstanceId, ComponentId, ComponentInstanceId, ContainerType,
    DeployableComponent, DeploymentContext, OperatingSystem,
};

const AGENT: &str = "nimbus-lifecycle/0.1";

/// Opens [`HttpLifecycleClient`]s against agents listening on a fixed port.
#[derive(Debug, Clone)]
pub struct HttpLifecycleConnector {
    port: u16,
    connect_timeout: Option<Duration>,
    request_timeout: Duration,
    poll_interval: Duration,
    deployment_timeout: Duration,
}

impl HttpLifecycleConnector {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            connect_timeout: None,
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            deployment_timeout: Duration::from_secs(600),
        }
    }

    /// `None` waits for the operating system to give up.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_deployment_timeout(mut self, timeout: Duration) -> Self {
        self.deployment_timeout = timeout;
        self
    }
}

impl LifecycleConnector for HttpLifecycleConnector {
    type Client = HttpLifecycleClient;

    async fn connect(&self, address: &str) -> LifecycleResult<HttpLifecycleClient> {
        let authority = authority(address, self.port);
        let base = Url::parse(&format!("http://{authority}/"))
            .map_err(|e| unreachable(&authority, format!("invalid agent address: {e}")))?;
        let sender = open(&authority, self.connect_timeout).await?;
        debug!(%authority, "connected to lifecycle agent");
        Ok(HttpLifecycleClient {
            authority,
            base,
            connect_timeout: self.connect_timeout,
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            deployment_timeout: self.deployment_timeout,
            sender: Mutex::new(Some(sender)),
        })
    }
}

/// Lifecycle client bound to one agent.
pub struct HttpLifecycleClient {
    authority: String,
    base: Url,
    connect_timeout: Option<Duration>,
    request_timeout: Duration,
    poll_interval: Duration,
    deployment_timeout: Duration,
    /// Empty while a request is in flight or after it was abandoned.
    sender: Mutex<Option<SendRequest<Full<Bytes>>>>,
}

impl fmt::Debug for HttpLifecycleClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpLifecycleClient")
            .field("authority", &self.authority)
            .finish_non_exhaustive()
    }
}

// ── Wire bodies ───────────────────────────────────────────────────

#[derive(Serialize)]
struct RegisterInstance<'a> {
    application_id: &'a ApplicationId,
    instance_id: &'a ApplicationInstanceId,
}

#[derive(Serialize)]
struct RegisterComponent<'a> {
    component_id: &'a ComponentId,
    name: &'a str,
}

#[derive(Serialize)]
struct Deploy<'a> {
    context: &'a DeploymentContext,
    component: &'a DeployableComponent,
    operating_system: &'a OperatingSystem,
    container: ContainerType,
}

#[derive(Deserialize)]
struct ContextCreated {
    context_id: String,
}

#[derive(Deserialize)]
struct Deployed {
    component_instance_id: String,
}

#[derive(Deserialize)]
struct Undeployed {
    undeployed: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum InstanceState {
    Ready,
    Failed,
    #[serde(other)]
    Pending,
}

#[derive(Deserialize)]
struct InstanceStatus {
    state: InstanceState,
    #[serde(default)]
    message: Option<String>,
}

// ── Transport ─────────────────────────────────────────────────────

fn authority(address: &str, port: u16) -> String {
    if address.contains(':') && !address.starts_with('[') {
        format!("[{address}]:{port}")
    } else {
        format!("{address}:{port}")
    }
}

fn unreachable(authority: &str, reason: impl fmt::Display) -> LifecycleError {
    LifecycleError::TransportUnreachable {
        address: authority.to_string(),
        reason: reason.to_string(),
    }
}

async fn open(
    authority: &str,
    connect_timeout: Option<Duration>,
) -> LifecycleResult<SendRequest<Full<Bytes>>> {
    let connect = TcpStream::connect(authority);
    let stream = match connect_timeout {
        Some(limit) => tokio::time::timeout(limit, connect)
            .await
            .map_err(|_| unreachable(authority, format!("connect timed out after {limit:?}")))?,
        None => connect.await,
    }
    .map_err(|e| unreachable(authority, e))?;

    let io = TokioIo::new(stream);
    let (sender, conn) = http1::handshake(io)
        .await
        .map_err(|e| unreachable(authority, e))?;

    let peer = authority.to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, authority = %peer, "lifecycle connection ended");
        }
    });

    Ok(sender)
}

/// `base` with its path replaced by `segments`, each percent-encoded.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    url
}

/// Path and query of `url`, as sent on the request line.
fn origin_form(url: &Url) -> &str {
    &url[Position::BeforePath..]
}

fn describe(status: StatusCode, body: &Bytes) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("agent answered {status}")
    } else {
        format!("agent answered {status}: {text}")
    }
}

fn decode<T: DeserializeOwned>(body: &Bytes) -> Result<T, String> {
    serde_json::from_slice(body).map_err(|e| format!("malformed agent response: {e}"))
}

impl HttpLifecycleClient {
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Send one request, giving up after `request_timeout`.
    async fn call(
        &self,
        method: Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> LifecycleResult<(StatusCode, Bytes)> {
        let limit = self.request_timeout;
        tokio::time::timeout(limit, self.exchange(method, url, body))
            .await
            .map_err(|_| unreachable(&self.authority, format!("no answer within {limit:?}")))?
    }

    /// Send one request and collect the full response body.
    ///
    /// The connection is only put back once the response is complete, so a
    /// request dropped half way leaves nothing behind for the next caller.
    async fn exchange(
        &self,
        method: Method,
        url: &Url,
        body: Option<Vec<u8>>,
    ) -> LifecycleResult<(StatusCode, Bytes)> {
        let path = origin_form(url);
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(path)
            .header(HOST, self.authority.as_str())
            .header(USER_AGENT, AGENT);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| unreachable(&self.authority, e))?;

        let mut slot = self.sender.lock().await;
        let mut sender = match slot.take() {
            Some(sender) if !sender.is_closed() => sender,
            _ => {
                debug!(authority = %self.authority, "reconnecting to lifecycle agent");
                open(&self.authority, self.connect_timeout).await?
            }
        };
        sender
            .ready()
            .await
            .map_err(|e| unreachable(&self.authority, e))?;
        let response = sender
            .send_request(request)
            .await
            .map_err(|e| unreachable(&self.authority, e))?;

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| unreachable(&self.authority, e))?
            .to_bytes();
        *slot = Some(sender);

        debug!(authority = %self.authority, %method, path, %status, "lifecycle call");
        Ok((status, bytes))
    }
}

impl LifecycleClient for HttpLifecycleClient {
    async fn register_application_instance(
        &self,
        application: &ApplicationId,
        instance: &ApplicationInstanceId,
    ) -> LifecycleResult<bool> {
        let body = serde_json::to_vec(&RegisterInstance {
            application_id: application,
            instance_id: instance,
        })
        .map_err(|e| LifecycleError::RegistrationFailed(e.to_string()))?;

        let url = endpoint(&self.base, &["v1", "application-instances"]);
        let (status, reply) = self.call(Method::POST, &url, Some(body)).await?;
        match status {
            StatusCode::CREATED | StatusCode::OK => Ok(true),
            StatusCode::CONFLICT => Ok(false),
            other => Err(LifecycleError::RegistrationFailed(describe(other, &reply))),
        }
    }

    async fn register_component_for_instance(
        &self,
        instance: &ApplicationInstanceId,
        component: &ComponentId,
        name: &str,
    ) -> LifecycleResult<()> {
        let body = serde_json::to_vec(&RegisterComponent {
            component_id: component,
            name,
        })
        .map_err(|e| LifecycleError::RegistrationFailed(e.to_string()))?;

        let instance = instance.to_string();
        let url = endpoint(
            &self.base,
            &["v1", "application-instances", instance.as_str(), "components"],
        );
        let (status, reply) = self.call(Method::POST, &url, Some(body)).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(LifecycleError::RegistrationFailed(describe(status, &reply)))
        }
    }

    async fn init_deployment_context(
        &self,
        application: &ApplicationId,
        instance: &ApplicationInstanceId,
    ) -> LifecycleResult<DeploymentContext> {
        let body = serde_json::to_vec(&RegisterInstance {
            application_id: application,
            instance_id: instance,
        })
        .map_err(|e| LifecycleError::ContextInitFailed(e.to_string()))?;

        let url = endpoint(&self.base, &["v1", "deployment-contexts"]);
        let (status, reply) = self.call(Method::POST, &url, Some(body)).await?;
        if !status.is_success() {
            return Err(LifecycleError::ContextInitFailed(describe(status, &reply)));
        }
        let created: ContextCreated = decode(&reply).map_err(LifecycleError::ContextInitFailed)?;
        Ok(DeploymentContext::new(
            created.context_id,
            *application,
            *instance,
        ))
    }

    async fn deploy(
        &self,
        context: &DeploymentContext,
        component: &DeployableComponent,
        os: &OperatingSystem,
        container: ContainerType,
    ) -> LifecycleResult<ComponentInstanceId> {
        let body = serde_json::to_vec(&Deploy {
            context,
            component,
            operating_system: os,
            container,
        })
        .map_err(|e| LifecycleError::DeploymentFailed(e.to_string()))?;

        let url = endpoint(&self.base, &["v1", "deployments"]);
        let (status, reply) = self.call(Method::POST, &url, Some(body)).await?;
        if !status.is_success() {
            return Err(LifecycleError::DeploymentFailed(describe(status, &reply)));
        }
        let deployed: Deployed = decode(&reply).map_err(LifecycleError::DeploymentFailed)?;
        Ok(ComponentInstanceId::new(deployed.component_instance_id))
    }

    async fn wait_for_deployment(&self, id: &ComponentInstanceId) -> LifecycleResult<()> {
        let url = endpoint(&self.base, &["v1", "component-instances", id.as_str()]);
        let started = Instant::now();
        let timed_out = |waited: Duration| LifecycleError::DeploymentTimeout {
            id: id.to_string(),
            waited,
        };

        loop {
            let remaining = self.deployment_timeout.saturating_sub(started.elapsed());
            let (status, reply) =
                tokio::time::timeout(remaining, self.exchange(Method::GET, &url, None))
                    .await
                    .map_err(|_| timed_out(started.elapsed()))??;
            if !status.is_success() {
                return Err(LifecycleError::DeploymentFailed(describe(status, &reply)));
            }
            let current: InstanceStatus =
                decode(&reply).map_err(LifecycleError::DeploymentFailed)?;
            match current.state {
                InstanceState::Ready => return Ok(()),
                InstanceState::Failed => {
                    let detail = current.message.unwrap_or_else(|| "no reason given".into());
                    return Err(LifecycleError::DeploymentFailed(format!(
                        "component instance {id} failed: {detail}"
                    )));
                }
                InstanceState::Pending => {}
            }

            let waited = started.elapsed();
            if waited >= self.deployment_timeout {
                return Err(timed_out(waited));
            }
            let remaining = self.deployment_timeout - waited;
            tokio::time::sleep(self.poll_interval.min(remaining)).await;
        }
    }

    async fn undeploy(
        &self,
        id: &ComponentInstanceId,
        container: ContainerType,
    ) -> LifecycleResult<bool> {
        let mut url = endpoint(&self.base, &["v1", "component-instances", id.as_str()]);
        url.query_pairs_mut()
            .append_pair("container", container.as_str());
        let (status, reply) = self.call(Method::DELETE, &url, None).await?;
        if !status.is_success() {
            return Err(LifecycleError::UndeploymentFailed(describe(status, &reply)));
        }
        let result: Undeployed = decode(&reply).map_err(LifecycleError::UndeploymentFailed)?;
        Ok(result.undeployed)
    }
}
