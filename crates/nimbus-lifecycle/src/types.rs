//! Protocol-level identifiers and descriptors.
//!
//! Identifiers are owned by the lifecycle agent. The client only carries them
//! between calls of one job attempt, so they are plain comparable tokens with
//! no behaviour beyond display and (de)serialization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Application as known to the agent.
    ApplicationId
);
uuid_id!(
    /// Application instance as known to the agent.
    ApplicationInstanceId
);
uuid_id!(
    /// Component as known to the agent, scoped by its application instance.
    ComponentId
);

/// A deployed component instance, issued by the agent on `deploy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentInstanceId(String);

impl ComponentInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ports one component publishes into a deployment context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentPorts {
    /// Provided port name → port number.
    pub provided: BTreeMap<String, u16>,
    /// Required port name → minimum number of connected sinks.
    pub required: BTreeMap<String, u32>,
}

/// Agent-side session scoping the deployments of one application instance.
///
/// Port registrations are collected locally and travel with every `deploy`
/// request made in this context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentContext {
    id: String,
    application_id: ApplicationId,
    instance_id: ApplicationInstanceId,
    #[serde(default)]
    components: BTreeMap<ComponentId, ComponentPorts>,
}

impl DeploymentContext {
    pub fn new(
        id: impl Into<String>,
        application_id: ApplicationId,
        instance_id: ApplicationInstanceId,
    ) -> Self {
        Self {
            id: id.into(),
            application_id,
            instance_id,
            components: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn application_id(&self) -> &ApplicationId {
        &self.application_id
    }

    pub fn instance_id(&self) -> &ApplicationInstanceId {
        &self.instance_id
    }

    pub fn register_provided_port(&mut self, component: ComponentId, port: &str, number: u16) {
        self.components
            .entry(component)
            .or_default()
            .provided
            .insert(port.to_string(), number);
    }

    pub fn register_required_port(&mut self, component: ComponentId, port: &str, min_sinks: u32) {
        self.components
            .entry(component)
            .or_default()
            .required
            .insert(port.to_string(), min_sinks);
    }

    pub fn ports(&self, component: &ComponentId) -> Option<&ComponentPorts> {
        self.components.get(component)
    }
}

/// Commands the agent runs at each phase of a lifecycle component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCommands {
    pub pre_install: Option<String>,
    pub install: Option<String>,
    pub post_install: Option<String>,
    pub start: Option<String>,
    pub stop: Option<String>,
}

/// How the agent obtains the component's payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentPayload {
    Lifecycle(LifecycleCommands),
    DockerImage { image: String },
}

/// Everything the agent needs to install and start one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployableComponent {
    pub id: ComponentId,
    pub name: String,
    pub payload: ComponentPayload,
    /// Provided port name → port number.
    pub provided_ports: BTreeMap<String, u16>,
    /// Names of the ports this component consumes.
    pub required_ports: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsType {
    Ubuntu,
    Debian,
    CentOs,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsArch {
    Amd64,
    I386,
    Arm64,
}

/// Operating system of the target host, as the agent understands it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystem {
    pub os_type: OsType,
    pub arch: OsArch,
    pub version: String,
}

/// Container the agent runs a component in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Docker,
    Plain,
}

impl ContainerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> DeploymentContext {
        DeploymentContext::new(
            "ctx-1",
            ApplicationId::from_uuid(Uuid::from_u128(1)),
            ApplicationInstanceId::from_uuid(Uuid::from_u128(2)),
        )
    }

    #[test]
    fn context_collects_ports_per_component() {
        let web = ComponentId::from_uuid(Uuid::from_u128(10));
        let db = ComponentId::from_uuid(Uuid::from_u128(11));

        let mut ctx = context();
        ctx.register_provided_port(web, "http", 8080);
        ctx.register_required_port(web, "sql", 1);
        ctx.register_provided_port(db, "sql", 5432);

        let web_ports = ctx.ports(&web).unwrap();
        assert_eq!(web_ports.provided["http"], 8080);
        assert_eq!(web_ports.required["sql"], 1);
        assert_eq!(ctx.ports(&db).unwrap().provided["sql"], 5432);
        assert!(ctx.ports(&ComponentId::from_uuid(Uuid::nil())).is_none());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = ApplicationId::from_uuid(Uuid::from_u128(1));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let ci = ComponentInstanceId::new("ci-42");
        assert_eq!(serde_json::to_string(&ci).unwrap(), "\"ci-42\"");
    }

    #[test]
    fn container_type_wire_names() {
        assert_eq!(ContainerType::Docker.to_string(), "docker");
        assert_eq!(
            serde_json::to_string(&ContainerType::Plain).unwrap(),
            "\"plain\""
        );
    }
}
