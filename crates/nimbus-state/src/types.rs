//! Domain types for the nimbus model store.
//!
//! These types represent the persisted model: virtual machines, components,
//! applications and their instances, plus the provider resources (hardware
//! flavors, images) the watchdogs reconcile. All types are serializable
//! to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};

/// Model id of a virtual machine.
pub type VirtualMachineId = String;

/// Model id of a component definition.
pub type ComponentId = String;

/// Model id of an application.
pub type ApplicationId = String;

/// Model id of a component inside an application.
pub type ApplicationComponentId = String;

/// Model id of an application instance.
pub type ApplicationInstanceId = String;

/// Model id of a deployed component instance.
pub type InstanceId = String;

/// State of an entity that mirrors a remote resource.
///
/// Transitions are driven by jobs and watchdogs, never by the entity itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    #[default]
    Pending,
    Ok,
    Error,
    Deleted,
}

// ── Virtual machine ───────────────────────────────────────────────

/// A virtual machine provisioned at a cloud provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualMachine {
    pub id: VirtualMachineId,
    pub name: String,
    /// Model id of the cloud the machine runs in.
    pub cloud: String,
    pub remote_state: RemoteState,
    /// Public address, assigned once the provider reports it.
    pub public_address: Option<String>,
    pub operating_system: OperatingSystem,
}

impl VirtualMachine {
    pub fn public_address(&self) -> Option<&str> {
        self.public_address.as_deref()
    }
}

/// Operating system of a virtual machine or image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatingSystem {
    pub family: OsFamily,
    pub architecture: OsArchitecture,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Ubuntu,
    Debian,
    CentOs,
    Windows,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsArchitecture {
    Amd64,
    I386,
    Arm64,
}

// ── Components & applications ─────────────────────────────────────

/// How a component is packaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentKind {
    /// Installed and run through lifecycle handler scripts.
    Lifecycle,
    /// Shipped as a docker image.
    Docker,
}

/// Shell commands run by the agent at each lifecycle phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleHandlers {
    pub pre_install: Option<String>,
    pub install: Option<String>,
    pub post_install: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
}

/// A port a component offers to others.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvidedPort {
    pub name: String,
    pub port: u16,
}

/// A port a component consumes from others.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RequiredPort {
    pub name: String,
    /// Whether the component cannot start without a connected provider.
    pub mandatory: bool,
}

/// A reusable component definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub id: ComponentId,
    pub name: String,
    pub kind: ComponentKind,
    #[serde(default)]
    pub handlers: LifecycleHandlers,
    /// Docker image reference, for `ComponentKind::Docker`.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub provided_ports: Vec<ProvidedPort>,
    #[serde(default)]
    pub required_ports: Vec<RequiredPort>,
}

impl Component {
    pub fn provided_port(&self, name: &str) -> Option<&ProvidedPort> {
        self.provided_ports.iter().find(|p| p.name == name)
    }

    pub fn required_port(&self, name: &str) -> Option<&RequiredPort> {
        self.required_ports.iter().find(|p| p.name == name)
    }
}

/// A component as used inside one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationComponent {
    pub id: ApplicationComponentId,
    pub component_id: ComponentId,
}

/// One end of a communication: a named port on an application component.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortRef {
    pub application_component: ApplicationComponentId,
    pub port: String,
}

/// A wire from a provided port to a required port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Communication {
    pub provider: PortRef,
    pub consumer: PortRef,
}

/// An application: a graph of components wired by communications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Application {
    pub id: ApplicationId,
    pub name: String,
    pub components: Vec<ApplicationComponent>,
    #[serde(default)]
    pub communications: Vec<Communication>,
}

impl Application {
    pub fn component(&self, id: &str) -> Option<&ApplicationComponent> {
        self.components.iter().find(|c| c.id == id)
    }
}

/// A running instantiation of an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplicationInstance {
    pub id: ApplicationInstanceId,
    pub application_id: ApplicationId,
}

/// One application component deployed onto one virtual machine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub id: InstanceId,
    pub application_component_id: ApplicationComponentId,
    pub application_instance_id: ApplicationInstanceId,
    pub virtual_machine_id: VirtualMachineId,
    /// Component instance id issued by the lifecycle agent once deployed.
    #[serde(default)]
    pub remote_id: Option<String>,
    #[serde(default)]
    pub remote_state: RemoteState,
}

impl Instance {
    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn bind_remote_id(&mut self, remote_id: impl Into<String>) {
        self.remote_id = Some(remote_id.into());
    }

    /// Forget the agent's id once the component instance is gone.
    pub fn clear_remote_id(&mut self) -> Option<String> {
        self.remote_id.take()
    }
}

// ── Provider resources ────────────────────────────────────────────

/// A location a provider resource is offered in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct LocationRef {
    /// Model id of the cloud.
    pub cloud: String,
    /// The provider's id for the location.
    pub location: String,
}

/// A hardware flavor known to the model, keyed by `(base_id, cloud)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hardware {
    pub base_id: String,
    pub cloud: String,
    pub name: String,
    pub cores: u32,
    pub ram_mb: u64,
    /// Credentials this flavor was listed with.
    pub credentials: Vec<String>,
    /// Locations this flavor is offered in.
    pub locations: Vec<LocationRef>,
}

/// A machine image known to the model, keyed by `(base_id, cloud)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub base_id: String,
    pub cloud: String,
    pub name: String,
    #[serde(default)]
    pub operating_system: Option<OperatingSystem>,
    pub credentials: Vec<String>,
    pub locations: Vec<LocationRef>,
}

/// Natural key of a cloud-scoped provider resource.
pub fn cloud_resource_key(cloud: &str, base_id: &str) -> String {
    format!("{cloud}/{base_id}")
}

// ── Bulk import ───────────────────────────────────────────────────

/// The whole model in one document, imported in a single write scope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelSnapshot {
    pub virtual_machines: Vec<VirtualMachine>,
    pub components: Vec<Component>,
    pub applications: Vec<Application>,
    pub application_instances: Vec<ApplicationInstance>,
    pub instances: Vec<Instance>,
    pub hardware: Vec<Hardware>,
    pub images: Vec<Image>,
}
