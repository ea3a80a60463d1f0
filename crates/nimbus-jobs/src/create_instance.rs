//! Create-instance job: deploy one application component onto its virtual
//! machine through the lifecycle agent.
//!
//! Model reads and writes happen in short scopes of their own. No scope is
//! open while a lifecycle call is in flight, so a failed call leaves the model
//! at its last committed state.
//!
//! Compensation only ever undeploys the component instance this attempt
//! deployed. A remote id left on the instance by an earlier attempt is never
//! touched.

use std::sync::Arc;

use nimbus_core::{ContainerPreference, NimbusConfig};
use nimbus_lifecycle::{
    ComponentInstanceId, ContainerType, LifecycleClient, LifecycleConnector, LifecycleError,
};
use nimbus_state::{
    Application, ApplicationComponent, ApplicationInstance, Component, Instance, ReadScope,
    RemoteState, StateError, StateStore, VirtualMachine, WriteScope,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::convert;
use crate::error::{JobError, JobFault, JobResult, JobStep, StepContext};
use crate::job::{Compensation, RemoteResourceJob};
use crate::validation::{ApplicationGraphValidator, ModelValidator};

/// Policy switches for [`CreateInstanceJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateInstanceOptions {
    pub model_validation: bool,
    pub delete_failed_instances: bool,
    pub default_container: ContainerPreference,
}

impl Default for CreateInstanceOptions {
    fn default() -> Self {
        Self {
            model_validation: true,
            delete_failed_instances: false,
            default_container: ContainerPreference::Docker,
        }
    }
}

impl CreateInstanceOptions {
    pub fn from_config(config: &NimbusConfig) -> Self {
        Self {
            model_validation: config.jobs.model_validation,
            delete_failed_instances: config.jobs.delete_failed_instances,
            default_container: config.lifecycle.default_container,
        }
    }
}

/// Everything the model knows about the instance being deployed.
struct Target {
    instance: Instance,
    vm: VirtualMachine,
    application_instance: ApplicationInstance,
    application: Application,
    app_component: ApplicationComponent,
    component: Component,
}

fn load_target(tx: &ReadScope<'_>, instance_id: &str) -> Result<Target, JobFault> {
    let instance: Instance = tx.require(instance_id)?;
    let vm: VirtualMachine = tx.require(&instance.virtual_machine_id)?;
    let application_instance: ApplicationInstance = tx.require(&instance.application_instance_id)?;
    let application: Application = tx.require(&application_instance.application_id)?;
    let app_component = application
        .component(&instance.application_component_id)
        .cloned()
        .ok_or_else(|| StateError::NotFound {
            kind: "application component",
            key: instance.application_component_id.clone(),
        })?;
    let component: Component = tx.require(&app_component.component_id)?;
    Ok(Target {
        instance,
        vm,
        application_instance,
        application,
        app_component,
        component,
    })
}

/// What the current attempt left running on the agent.
#[derive(Debug, Clone)]
struct Deployed {
    remote_id: ComponentInstanceId,
    address: String,
    container: ContainerType,
}

/// Deploys the application component of one [`Instance`].
pub struct CreateInstanceJob<C, V = ApplicationGraphValidator> {
    instance_id: String,
    entity: String,
    store: StateStore,
    connector: Arc<C>,
    validator: V,
    options: CreateInstanceOptions,
    /// Set once the remote id is persisted, reset at the start of every attempt.
    deployed: Mutex<Option<Deployed>>,
}

impl<C: LifecycleConnector> CreateInstanceJob<C> {
    pub fn new(
        instance_id: impl Into<String>,
        store: StateStore,
        connector: Arc<C>,
        options: CreateInstanceOptions,
    ) -> Self {
        let instance_id = instance_id.into();
        Self {
            entity: format!("instance {instance_id}"),
            instance_id,
            store,
            connector,
            validator: ApplicationGraphValidator,
            options,
            deployed: Mutex::new(None),
        }
    }
}

impl<C, V> CreateInstanceJob<C, V> {
    pub fn with_validator<W: ModelValidator>(self, validator: W) -> CreateInstanceJob<C, W> {
        CreateInstanceJob {
            instance_id: self.instance_id,
            entity: self.entity,
            store: self.store,
            connector: self.connector,
            validator,
            options: self.options,
            deployed: self.deployed,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn read<T>(
        &self,
        step: JobStep,
        f: impl FnOnce(&ReadScope<'_>) -> Result<T, JobFault>,
    ) -> JobResult<T> {
        self.store.read(f).step(step, &self.entity)
    }

    fn write<T>(
        &self,
        step: JobStep,
        f: impl FnOnce(&WriteScope<'_>) -> Result<T, JobFault>,
    ) -> JobResult<T> {
        self.store.write(f).step(step, &self.entity)
    }

    fn set_state(&self, step: JobStep, state: RemoteState) -> JobResult<()> {
        self.write(step, |tx| {
            let mut instance: Instance = tx.require(&self.instance_id)?;
            instance.remote_state = state;
            tx.put(&instance)?;
            Ok(())
        })
    }

    fn resolve_address(&self) -> JobResult<String> {
        self.read(JobStep::ResolveAddress, |tx| {
            let instance: Instance = tx.require(&self.instance_id)?;
            let vm: VirtualMachine = tx.require(&instance.virtual_machine_id)?;
            vm.public_address()
                .map(str::to_string)
                .ok_or_else(|| JobFault::NoAddressAssigned { vm: vm.id.clone() })
        })
    }

    fn container_for(&self, target: &Target) -> ContainerType {
        convert::container_type(
            target.component.kind,
            target.vm.operating_system.family,
            self.options.default_container,
        )
    }
}

impl<C: LifecycleConnector, V> CreateInstanceJob<C, V> {
    async fn connect(&self, address: &str) -> JobResult<C::Client> {
        self.connector
            .connect(address)
            .await
            .step(JobStep::Connect, &self.entity)
    }
}

impl<C, V> RemoteResourceJob for CreateInstanceJob<C, V>
where
    C: LifecycleConnector,
    V: ModelValidator,
{
    fn entity(&self) -> &str {
        &self.entity
    }

    fn can_start(&self) -> JobResult<bool> {
        self.read(JobStep::CheckDependencies, |tx| {
            let instance: Instance = tx.require(&self.instance_id)?;
            let vm: VirtualMachine = tx.require(&instance.virtual_machine_id)?;
            if vm.remote_state != RemoteState::Ok {
                debug!(entity = %self.entity, vm = %vm.id, state = ?vm.remote_state, "virtual machine not ready");
            }
            Ok(vm.remote_state == RemoteState::Ok)
        })
    }

    async fn do_work(&self) -> JobResult<()> {
        let entity = self.entity.as_str();
        *self.deployed.lock().await = None;

        let address = self.resolve_address()?;
        let client = self.connect(&address).await?;

        if self.options.model_validation {
            self.read(JobStep::ValidateModel, |tx| {
                let target = load_target(tx, &self.instance_id)?;
                self.validator.validate(tx, &target.application)
            })?;
        }

        let (application_id, instance_id) = self.read(JobStep::DeriveIdentifiers, |tx| {
            let target = load_target(tx, &self.instance_id)?;
            Ok((
                convert::application_id(&target.application),
                convert::application_instance_id(&target.application_instance),
            ))
        })?;

        let fresh = client
            .register_application_instance(&application_id, &instance_id)
            .await
            .step(JobStep::RegisterInstance, entity)?;
        if fresh {
            let components = self.read(JobStep::RegisterComponents, |tx| {
                let target = load_target(tx, &self.instance_id)?;
                target
                    .application
                    .components
                    .iter()
                    .map(|ac| {
                        let component: Component = tx.require(&ac.component_id)?;
                        Ok((convert::component_id(ac), component.name))
                    })
                    .collect::<Result<Vec<_>, JobFault>>()
            })?;
            for (component_id, name) in &components {
                client
                    .register_component_for_instance(&instance_id, component_id, name)
                    .await
                    .step(JobStep::RegisterComponents, entity)?;
            }
            debug!(entity, %instance_id, count = components.len(), "registered application components");
        } else {
            info!(entity, %instance_id, "application instance already registered, keeping its components");
        }

        let mut context = client
            .init_deployment_context(&application_id, &instance_id)
            .await
            .step(JobStep::InitContext, entity)?;
        let target = self.read(JobStep::RegisterContext, |tx| load_target(tx, &self.instance_id))?;
        let component_id = convert::component_id(&target.app_component);
        for port in &target.component.provided_ports {
            context.register_provided_port(component_id, &port.name, port.port);
        }
        for port in &target.component.required_ports {
            context.register_required_port(component_id, &port.name, convert::min_sinks(port.mandatory));
        }

        let descriptor = convert::deployable_component(&target.app_component, &target.component)
            .step(JobStep::BuildDescriptor, entity)?;
        let os = convert::operating_system(&target.vm.operating_system)
            .step(JobStep::ResolveOs, entity)?;
        let container = self.container_for(&target);

        let remote_id = client
            .deploy(&context, &descriptor, &os, container)
            .await
            .step(JobStep::Deploy, entity)?;
        self.write(JobStep::PersistRemoteId, |tx| {
            let mut instance: Instance = tx.require(&self.instance_id)?;
            instance.bind_remote_id(remote_id.as_str());
            tx.put(&instance)?;
            Ok(())
        })?;
        *self.deployed.lock().await = Some(Deployed {
            remote_id: remote_id.clone(),
            address: address.clone(),
            container,
        });
        info!(entity, %remote_id, %container, host = %address, "component deployed");

        client
            .wait_for_deployment(&remote_id)
            .await
            .step(JobStep::WaitForDeployment, entity)?;
        self.set_state(JobStep::MarkRunning, RemoteState::Ok)?;
        info!(entity, %remote_id, instance = %target.instance.id, "component instance running");
        Ok(())
    }

    async fn on_error(&self, error: &JobError) -> JobResult<Compensation> {
        let entity = self.entity.as_str();
        if let Err(e) = self.set_state(JobStep::MarkFailed, RemoteState::Error) {
            warn!(entity, error = %e, "could not mark instance failed, compensating anyway");
        }

        if !self.options.delete_failed_instances {
            debug!(entity, "deleting failed instances is disabled");
            return Ok(Compensation::Disabled);
        }

        let Some(deployed) = self.deployed.lock().await.clone() else {
            return Err(JobError::new(
                JobStep::Undeploy,
                entity,
                JobFault::MissingRemoteId {
                    instance: self.instance_id.clone(),
                },
            ));
        };
        let Deployed {
            remote_id,
            address,
            container,
        } = deployed;

        let client = self.connect(&address).await?;
        info!(entity, %remote_id, %container, cause = %error, "undeploying failed component instance");
        let undeployed = client
            .undeploy(&remote_id, container)
            .await
            .step(JobStep::Undeploy, entity)?;
        if !undeployed {
            return Err(JobError::new(
                JobStep::Undeploy,
                entity,
                LifecycleError::UndeploymentFailed(format!("agent kept {remote_id}")),
            ));
        }
        *self.deployed.lock().await = None;

        self.write(JobStep::MarkDeleted, |tx| {
            let mut instance: Instance = tx.require(&self.instance_id)?;
            if instance.remote_id() == Some(remote_id.as_str()) {
                instance.clear_remote_id();
            }
            instance.remote_state = RemoteState::Deleted;
            tx.put(&instance)?;
            Ok(())
        })?;
        Ok(Compensation::Compensated)
    }
}
