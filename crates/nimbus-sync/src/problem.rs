//! Problem reports emitted by the watchdogs.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Provider resource kinds that take part in reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Hardware,
    Image,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hardware => f.write_str("hardware"),
            Self::Image => f.write_str("image"),
        }
    }
}

/// A live provider resource carrying a cloud-scoped id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveResource {
    pub kind: ResourceKind,
    /// The scoped id exactly as the provider listed it.
    pub raw_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProblemKind {
    NotInDatabase,
    MissingCredential,
    MissingLocation,
    MalformedIdentifier { reason: String },
    LookupFailed { reason: String },
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInDatabase => f.write_str("resource not in database"),
            Self::MissingCredential => f.write_str("resource missing credential"),
            Self::MissingLocation => f.write_str("resource missing location"),
            Self::MalformedIdentifier { reason } => write!(f, "malformed identifier: {reason}"),
            Self::LookupFailed { reason } => write!(f, "model lookup failed: {reason}"),
        }
    }
}

/// An immutable drift report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    kind: ProblemKind,
    resource: LiveResource,
    /// Unix seconds.
    detected_at: u64,
}

impl Problem {
    pub fn new(kind: ProblemKind, resource: LiveResource) -> Self {
        Self {
            kind,
            resource,
            detected_at: epoch_secs(),
        }
    }

    pub fn kind(&self) -> &ProblemKind {
        &self.kind
    }

    pub fn resource(&self) -> &LiveResource {
        &self.resource
    }

    pub fn detected_at(&self) -> u64 {
        self.detected_at
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} ({})",
            self.kind, self.resource.kind, self.resource.raw_id, self.resource.name
        )
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn problem_display_names_resource() {
        let problem = Problem::new(
            ProblemKind::MissingLocation,
            LiveResource {
                kind: ResourceKind::Hardware,
                raw_id: "cred/cloud/eu-1/m1.small".into(),
                name: "m1.small".into(),
            },
        );
        assert_eq!(
            problem.to_string(),
            "resource missing location: hardware cred/cloud/eu-1/m1.small (m1.small)"
        );
        assert!(problem.detected_at() > 0);
    }

    #[test]
    fn problem_kind_serializes_tagged() {
        let json = serde_json::to_value(ProblemKind::MalformedIdentifier {
            reason: "3 components".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "malformed_identifier");
        assert_eq!(json["reason"], "3 components");
    }
}
