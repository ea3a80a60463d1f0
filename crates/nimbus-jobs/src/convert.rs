//! Model → lifecycle protocol conversions.
//!
//! Protocol identifiers are UUID v5 values over a fixed namespace and the
//! model id, so every attempt for the same model entity talks about the same
//! agent-side objects.

use std::collections::BTreeMap;

use nimbus_core::ContainerPreference;
use nimbus_lifecycle as lifecycle;
use nimbus_lifecycle::{
    ApplicationId, ApplicationInstanceId, ComponentId, ComponentPayload, ContainerType,
    DeployableComponent, LifecycleCommands,
};
use nimbus_state::{
    Application, ApplicationComponent, ApplicationInstance, Component, ComponentKind,
    OperatingSystem, OsArchitecture, OsFamily,
};
use uuid::Uuid;

use crate::error::JobFault;

/// Namespace of every derived protocol identifier.
pub const NAMESPACE: Uuid = Uuid::from_u128(0x6e69_6d62_7573_4c43_9a1f_3d2b_5c08_e471);

fn derive(kind: &str, model_id: &str) -> Uuid {
    Uuid::new_v5(&NAMESPACE, format!("{kind}/{model_id}").as_bytes())
}

pub fn application_id(application: &Application) -> ApplicationId {
    ApplicationId::from_uuid(derive("application", &application.id))
}

pub fn application_instance_id(instance: &ApplicationInstance) -> ApplicationInstanceId {
    ApplicationInstanceId::from_uuid(derive("application-instance", &instance.id))
}

pub fn component_id(component: &ApplicationComponent) -> ComponentId {
    ComponentId::from_uuid(derive("application-component", &component.id))
}

/// Describe `component`, as used by `app_component`, to the agent.
pub fn deployable_component(
    app_component: &ApplicationComponent,
    component: &Component,
) -> Result<DeployableComponent, JobFault> {
    let payload = match component.kind {
        ComponentKind::Lifecycle => {
            let h = &component.handlers;
            ComponentPayload::Lifecycle(LifecycleCommands {
                pre_install: h.pre_install.clone(),
                install: h.install.clone(),
                post_install: h.post_install.clone(),
                start: h.start.clone(),
                stop: h.stop.clone(),
            })
        }
        ComponentKind::Docker => {
            let image = component
                .image
                .clone()
                .ok_or_else(|| JobFault::MissingImage(component.name.clone()))?;
            ComponentPayload::DockerImage { image }
        }
    };

    Ok(DeployableComponent {
        id: component_id(app_component),
        name: component.name.clone(),
        payload,
        provided_ports: component
            .provided_ports
            .iter()
            .map(|p| (p.name.clone(), p.port))
            .collect::<BTreeMap<_, _>>(),
        required_ports: component
            .required_ports
            .iter()
            .map(|p| p.name.clone())
            .collect(),
    })
}

pub fn operating_system(os: &OperatingSystem) -> Result<lifecycle::OperatingSystem, JobFault> {
    let os_type = match os.family {
        OsFamily::Ubuntu => lifecycle::OsType::Ubuntu,
        OsFamily::Debian => lifecycle::OsType::Debian,
        OsFamily::CentOs => lifecycle::OsType::CentOs,
        OsFamily::Windows => lifecycle::OsType::Windows,
        OsFamily::Unknown => return Err(JobFault::UnsupportedOs("unknown".into())),
    };
    let arch = match os.architecture {
        OsArchitecture::Amd64 => lifecycle::OsArch::Amd64,
        OsArchitecture::I386 => lifecycle::OsArch::I386,
        OsArchitecture::Arm64 => lifecycle::OsArch::Arm64,
    };
    Ok(lifecycle::OperatingSystem {
        os_type,
        arch,
        version: os.version.clone(),
    })
}

/// Docker components always run in docker. Lifecycle components follow the
/// configured preference, except on Windows hosts where only plain works.
pub fn container_type(
    kind: ComponentKind,
    host: OsFamily,
    preference: ContainerPreference,
) -> ContainerType {
    match (kind, host) {
        (ComponentKind::Docker, _) => ContainerType::Docker,
        (ComponentKind::Lifecycle, OsFamily::Windows) => ContainerType::Plain,
        (ComponentKind::Lifecycle, _) => match preference {
            ContainerPreference::Docker => ContainerType::Docker,
            ContainerPreference::Plain => ContainerType::Plain,
        },
    }
}

/// Minimum number of providers a required port must be wired to.
pub fn min_sinks(mandatory: bool) -> u32 {
    u32::from(mandatory)
}
