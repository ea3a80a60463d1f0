//! Application graph validation, run before any remote call.

use nimbus_state::{Application, Component, ReadScope};

use crate::error::JobFault;

/// Checks an application against the model before it is deployed.
pub trait ModelValidator: Send + Sync {
    fn validate(&self, scope: &ReadScope<'_>, application: &Application) -> Result<(), JobFault>;
}

/// Structural checks on the component graph. Reports every violation, not
/// just the first.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplicationGraphValidator;

impl ModelValidator for ApplicationGraphValidator {
    fn validate(&self, scope: &ReadScope<'_>, application: &Application) -> Result<(), JobFault> {
        let mut violations = Vec::new();

        if application.components.is_empty() {
            violations.push("application has no components".to_string());
        }

        // Resolve each application component once; `None` marks a dangling reference.
        let mut resolved: Vec<(&str, Option<Component>)> = Vec::new();
        for ac in &application.components {
            let component = scope.get::<Component>(&ac.component_id)?;
            if component.is_none() {
                violations.push(format!(
                    "application component {} references unknown component {}",
                    ac.id, ac.component_id
                ));
            }
            resolved.push((ac.id.as_str(), component));
        }
        let lookup = |id: &str| resolved.iter().find(|(ac, _)| *ac == id);

        for comm in &application.communications {
            match lookup(&comm.provider.application_component) {
                None => violations.push(format!(
                    "communication provider {} is not part of the application",
                    comm.provider.application_component
                )),
                Some((_, Some(c))) if c.provided_port(&comm.provider.port).is_none() => violations
                    .push(format!(
                        "component {} provides no port {}",
                        c.name, comm.provider.port
                    )),
                Some(_) => {}
            }
            match lookup(&comm.consumer.application_component) {
                None => violations.push(format!(
                    "communication consumer {} is not part of the application",
                    comm.consumer.application_component
                )),
                Some((_, Some(c))) if c.required_port(&comm.consumer.port).is_none() => violations
                    .push(format!(
                        "component {} requires no port {}",
                        c.name, comm.consumer.port
                    )),
                Some(_) => {}
            }
        }

        for (ac, component) in &resolved {
            let Some(component) = component else { continue };
            for port in component.required_ports.iter().filter(|p| p.mandatory) {
                let wired = application.communications.iter().any(|comm| {
                    comm.consumer.application_component == *ac && comm.consumer.port == port.name
                });
                if !wired {
                    violations.push(format!(
                        "mandatory port {} of {ac} is not connected",
                        port.name
                    ));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(JobFault::ValidationFailed {
                application: application.id.clone(),
                violations,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_state::*;

    fn component(id: &str, provides: &[&str], requires: &[(&str, bool)]) -> Component {
        Component {
            id: id.into(),
            name: id.into(),
            kind: ComponentKind::Lifecycle,
            handlers: LifecycleHandlers::default(),
            image: None,
            provided_ports: provides
                .iter()
                .map(|p| ProvidedPort {
                    name: p.to_string(),
                    port: 1000,
                })
                .collect(),
            required_ports: requires
                .iter()
                .map(|(p, mandatory)| RequiredPort {
                    name: p.to_string(),
                    mandatory: *mandatory,
                })
                .collect(),
        }
    }

    fn wire(provider: &str, consumer: &str, port: &str) -> Communication {
        Communication {
            provider: PortRef {
                application_component: provider.into(),
                port: port.into(),
            },
            consumer: PortRef {
                application_component: consumer.into(),
                port: port.into(),
            },
        }
    }

    fn store() -> StateStore {
        let store = StateStore::open_in_memory().unwrap();
        store.put(&component("web", &["http"], &[("sql", true), ("cache", false)])).unwrap();
        store.put(&component("db", &["sql"], &[])).unwrap();
        store
    }

    fn app(communications: Vec<Communication>) -> Application {
        Application {
            id: "shop".into(),
            name: "shop".into(),
            components: vec![
                ApplicationComponent {
                    id: "ac-web".into(),
                    component_id: "web".into(),
                },
                ApplicationComponent {
                    id: "ac-db".into(),
                    component_id: "db".into(),
                },
            ],
            communications,
        }
    }

    fn violations(store: &StateStore, app: &Application) -> Vec<String> {
        let result: Result<(), JobFault> =
            store.read(|scope| ApplicationGraphValidator.validate(scope, app));
        match result {
            Ok(()) => vec![],
            Err(JobFault::ValidationFailed { violations, .. }) => violations,
            Err(other) => panic!("unexpected fault {other}"),
        }
    }

    #[test]
    fn wired_application_is_valid() {
        let store = store();
        assert!(violations(&store, &app(vec![wire("ac-db", "ac-web", "sql")])).is_empty());
    }

    #[test]
    fn unconnected_mandatory_port_is_reported() {
        let store = store();
        let found = violations(&store, &app(vec![]));
        assert_eq!(found, vec!["mandatory port sql of ac-web is not connected"]);
    }

    #[test]
    fn all_violations_are_collected() {
        let store = store();
        let mut application = app(vec![
            wire("ac-db", "ac-web", "sql"),
            wire("ac-ghost", "ac-web", "cache"),
            wire("ac-web", "ac-db", "http"),
        ]);
        application.components.push(ApplicationComponent {
            id: "ac-queue".into(),
            component_id: "queue".into(),
        });

        let found = violations(&store, &application);
        assert_eq!(found.len(), 3, "{found:?}");
        assert!(found.iter().any(|v| v.contains("unknown component queue")));
        assert!(found.iter().any(|v| v.contains("provider ac-ghost")));
        assert!(found.iter().any(|v| v.contains("db requires no port http")));
    }

    #[test]
    fn empty_application_is_invalid() {
        let store = store();
        let application = Application {
            id: "empty".into(),
            name: "empty".into(),
            components: vec![],
            communications: vec![],
        };
        assert_eq!(violations(&store, &application), vec!["application has no components"]);
    }
}
