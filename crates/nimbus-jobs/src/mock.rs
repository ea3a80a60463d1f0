//! Recording lifecycle connector for job tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use nimbus_lifecycle::{
    ApplicationId, ApplicationInstanceId, ComponentId, ComponentInstanceId, ComponentPorts,
    ContainerType, DeployableComponent, DeploymentContext, LifecycleClient, LifecycleConnector,
    LifecycleError, LifecycleResult, OperatingSystem,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect(String),
    RegisterInstance,
    RegisterComponent(String),
    InitContext,
    Deploy {
        component: String,
        container: ContainerType,
        ports: Option<ComponentPorts>,
    },
    Wait(String),
    Undeploy {
        id: String,
        container: ContainerType,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Connect,
    Deploy,
    Wait,
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub already_registered: bool,
    pub fail_at: Option<FailAt>,
    pub undeploy_refused: bool,
}

#[derive(Default)]
struct Log {
    calls: Vec<Call>,
    ids: Vec<(ApplicationId, ApplicationInstanceId)>,
}

pub struct MockConnector {
    script: Script,
    log: Arc<Mutex<Log>>,
}

impl MockConnector {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.lock().unwrap().calls.clone()
    }

    pub fn registered_ids(&self) -> Vec<(ApplicationId, ApplicationInstanceId)> {
        self.log.lock().unwrap().ids.clone()
    }
}

impl LifecycleConnector for MockConnector {
    type Client = MockClient;

    async fn connect(&self, address: &str) -> LifecycleResult<MockClient> {
        self.log
            .lock()
            .unwrap()
            .calls
            .push(Call::Connect(address.to_string()));
        if self.script.fail_at == Some(FailAt::Connect) {
            return Err(LifecycleError::TransportUnreachable {
                address: address.to_string(),
                reason: "connection refused".into(),
            });
        }
        Ok(MockClient {
            script: self.script.clone(),
            log: self.log.clone(),
        })
    }
}

pub struct MockClient {
    script: Script,
    log: Arc<Mutex<Log>>,
}

impl MockClient {
    fn record(&self, call: Call) {
        self.log.lock().unwrap().calls.push(call);
    }
}

impl LifecycleClient for MockClient {
    async fn register_application_instance(
        &self,
        application: &ApplicationId,
        instance: &ApplicationInstanceId,
    ) -> LifecycleResult<bool> {
        self.record(Call::RegisterInstance);
        self.log.lock().unwrap().ids.push((*application, *instance));
        Ok(!self.script.already_registered)
    }

    async fn register_component_for_instance(
        &self,
        _instance: &ApplicationInstanceId,
        _component: &ComponentId,
        name: &str,
    ) -> LifecycleResult<()> {
        self.record(Call::RegisterComponent(name.to_string()));
        Ok(())
    }

    async fn init_deployment_context(
        &self,
        application: &ApplicationId,
        instance: &ApplicationInstanceId,
    ) -> LifecycleResult<DeploymentContext> {
        self.record(Call::InitContext);
        Ok(DeploymentContext::new("ctx-1", *application, *instance))
    }

    async fn deploy(
        &self,
        context: &DeploymentContext,
        component: &DeployableComponent,
        _os: &OperatingSystem,
        container: ContainerType,
    ) -> LifecycleResult<ComponentInstanceId> {
        self.record(Call::Deploy {
            component: component.name.clone(),
            container,
            ports: context.ports(&component.id).cloned(),
        });
        if self.script.fail_at == Some(FailAt::Deploy) {
            return Err(LifecycleError::DeploymentFailed("image pull failed".into()));
        }
        Ok(ComponentInstanceId::new("ci-1"))
    }

    async fn wait_for_deployment(&self, id: &ComponentInstanceId) -> LifecycleResult<()> {
        self.record(Call::Wait(id.to_string()));
        if self.script.fail_at == Some(FailAt::Wait) {
            return Err(LifecycleError::DeploymentTimeout {
                id: id.to_string(),
                waited: Duration::from_secs(600),
            });
        }
        Ok(())
    }

    async fn undeploy(
        &self,
        id: &ComponentInstanceId,
        container: ContainerType,
    ) -> LifecycleResult<bool> {
        self.record(Call::Undeploy {
            id: id.to_string(),
            container,
        });
        Ok(!self.script.undeploy_refused)
    }
}
