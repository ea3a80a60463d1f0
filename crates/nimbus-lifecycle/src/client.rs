//! The lifecycle protocol as a pair of traits.
//!
//! A [`LifecycleConnector`] opens one [`LifecycleClient`] per target address.
//! A client belongs to a single job attempt and is dropped with it; callers
//! that need to retry after [`LifecycleError::TransportUnreachable`] connect
//! again instead of reusing the client.
//!
//! [`LifecycleError::TransportUnreachable`]: crate::LifecycleError::TransportUnreachable

use std::future::Future;

use crate::error::LifecycleResult;
use crate::types::{
    ApplicationId, ApplicationInstanceId, ComponentId, ComponentInstanceId, ContainerType,
    DeployableComponent, DeploymentContext, OperatingSystem,
};

/// Typed calls against one lifecycle agent.
pub trait LifecycleClient: Send + Sync {
    /// Register an application instance.
    ///
    /// Returns `false` when the agent already knows the instance from an
    /// earlier attempt.
    fn register_application_instance(
        &self,
        application: &ApplicationId,
        instance: &ApplicationInstanceId,
    ) -> impl Future<Output = LifecycleResult<bool>> + Send;

    fn register_component_for_instance(
        &self,
        instance: &ApplicationInstanceId,
        component: &ComponentId,
        name: &str,
    ) -> impl Future<Output = LifecycleResult<()>> + Send;

    fn init_deployment_context(
        &self,
        application: &ApplicationId,
        instance: &ApplicationInstanceId,
    ) -> impl Future<Output = LifecycleResult<DeploymentContext>> + Send;

    fn deploy(
        &self,
        context: &DeploymentContext,
        component: &DeployableComponent,
        os: &OperatingSystem,
        container: ContainerType,
    ) -> impl Future<Output = LifecycleResult<ComponentInstanceId>> + Send;

    /// Resolve once the agent reports the component instance as running.
    fn wait_for_deployment(
        &self,
        id: &ComponentInstanceId,
    ) -> impl Future<Output = LifecycleResult<()>> + Send;

    /// Remove a deployed component instance. Returns the agent's verdict.
    fn undeploy(
        &self,
        id: &ComponentInstanceId,
        container: ContainerType,
    ) -> impl Future<Output = LifecycleResult<bool>> + Send;
}

/// Opens lifecycle clients by host address.
pub trait LifecycleConnector: Send + Sync {
    type Client: LifecycleClient;

    /// Connect to the agent on `address`, a host name or IP without port.
    fn connect(&self, address: &str) -> impl Future<Output = LifecycleResult<Self::Client>> + Send;
}
