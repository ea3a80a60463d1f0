//! Cloud-scoped identifiers.
//!
//! Providers hand out ids that are only unique within the credential, cloud
//! and location they were listed under. A [`CloudScopedId`] carries all four
//! parts and serializes to a single string:
//!
//! ```text
//! {credential}/{cloud}/{location}/{base_id}
//! ```
//!
//! Parsing and [`Display`](std::fmt::Display) are exact inverses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between the four components of the wire form.
pub const DELIMITER: char = '/';

const COMPONENTS: usize = 4;

/// Errors raised while parsing or building a [`CloudScopedId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("malformed identifier {raw:?}: expected 4 components, found {found}")]
    ComponentCount { raw: String, found: usize },

    #[error("malformed identifier {raw:?}: {component} component is empty")]
    EmptyComponent { raw: String, component: &'static str },

    #[error("{component} component {value:?} contains the delimiter '/'")]
    DelimiterInComponent { component: &'static str, value: String },
}

/// A provider-issued id scoped to its (credential, cloud, location) tuple.
///
/// Equality and hashing are structural over all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CloudScopedId {
    credential: String,
    cloud: String,
    location: String,
    base_id: String,
}

impl CloudScopedId {
    /// Build a scoped id from its parts.
    ///
    /// Fails when a part is empty or contains [`DELIMITER`], since such an id
    /// could not be parsed back.
    pub fn new(
        credential: impl Into<String>,
        cloud: impl Into<String>,
        location: impl Into<String>,
        base_id: impl Into<String>,
    ) -> Result<Self, IdError> {
        let id = Self {
            credential: credential.into(),
            cloud: cloud.into(),
            location: location.into(),
            base_id: base_id.into(),
        };
        for (component, value) in id.components() {
            if value.contains(DELIMITER) {
                return Err(IdError::DelimiterInComponent {
                    component,
                    value: value.to_string(),
                });
            }
            if value.is_empty() {
                return Err(IdError::EmptyComponent {
                    raw: id.to_string(),
                    component,
                });
            }
        }
        Ok(id)
    }

    /// Parse the `{credential}/{cloud}/{location}/{base_id}` wire form.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        let parts: Vec<&str> = raw.split(DELIMITER).collect();
        let [credential, cloud, location, base_id] = parts.as_slice() else {
            return Err(IdError::ComponentCount {
                raw: raw.to_string(),
                found: parts.len(),
            });
        };

        let id = Self {
            credential: credential.to_string(),
            cloud: cloud.to_string(),
            location: location.to_string(),
            base_id: base_id.to_string(),
        };
        if let Some((component, _)) = id.components().into_iter().find(|(_, v)| v.is_empty()) {
            return Err(IdError::EmptyComponent {
                raw: raw.to_string(),
                component,
            });
        }
        Ok(id)
    }

    /// The provider's own opaque id.
    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    /// The credential the resource was listed with.
    pub fn credential(&self) -> &str {
        &self.credential
    }

    /// The cloud account the resource belongs to.
    pub fn cloud(&self) -> &str {
        &self.cloud
    }

    /// The provider-side location (region / datacenter) id.
    pub fn location(&self) -> &str {
        &self.location
    }

    fn components(&self) -> [(&'static str, &str); COMPONENTS] {
        [
            ("credential", self.credential.as_str()),
            ("cloud", self.cloud.as_str()),
            ("location", self.location.as_str()),
            ("base id", self.base_id.as_str()),
        ]
    }
}

impl fmt::Display for CloudScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.credential, self.cloud, self.location, self.base_id
        )
    }
}

impl FromStr for CloudScopedId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CloudScopedId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CloudScopedId> for String {
    fn from(id: CloudScopedId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn parse_exposes_components() {
        let id = CloudScopedId::parse("cred-1/aws-eu/eu-west-1/m5.large").unwrap();
        assert_eq!(id.credential(), "cred-1");
        assert_eq!(id.cloud(), "aws-eu");
        assert_eq!(id.location(), "eu-west-1");
        assert_eq!(id.base_id(), "m5.large");
    }

    #[test]
    fn round_trip_is_lossless() {
        for raw in [
            "c/cl/l/b",
            "cred-1/aws-eu/eu-west-1/m5.large",
            "3f2a:9/openstack@uulm/RegionOne/ab12-cd34-ef56",
            "a b/c-d/e_f/g.h:i",
        ] {
            let id: CloudScopedId = raw.parse().unwrap();
            assert_eq!(id.to_string(), raw);
        }
    }

    #[test]
    fn every_combination_of_opaque_parts_round_trips() {
        let samples = [
            "a",
            "3f2a:9",
            "ops@tenant",
            "m5.large",
            " spaced out ",
            "région-东京",
            "%2F\\?#",
        ];
        let mut checked = 0;
        for credential in samples {
            for cloud in samples {
                for location in samples {
                    for base_id in samples {
                        let built = CloudScopedId::new(credential, cloud, location, base_id).unwrap();
                        let wire = built.to_string();
                        assert_eq!(wire, format!("{credential}/{cloud}/{location}/{base_id}"));

                        let parsed = CloudScopedId::parse(&wire).unwrap();
                        assert_eq!(parsed, built);
                        assert_eq!(parsed.credential(), credential);
                        assert_eq!(parsed.cloud(), cloud);
                        assert_eq!(parsed.location(), location);
                        assert_eq!(parsed.base_id(), base_id);
                        checked += 1;
                    }
                }
            }
        }
        assert_eq!(checked, samples.len().pow(4));
    }

    #[test]
    fn too_few_components_rejected() {
        let err = CloudScopedId::parse("cred/cloud/base").unwrap_err();
        assert_eq!(
            err,
            IdError::ComponentCount {
                raw: "cred/cloud/base".to_string(),
                found: 3
            }
        );
    }

    #[test]
    fn too_many_components_rejected() {
        let err = CloudScopedId::parse("a/b/c/d/e").unwrap_err();
        assert!(matches!(err, IdError::ComponentCount { found: 5, .. }));
    }

    #[test]
    fn unscoped_provider_id_rejected() {
        let err = CloudScopedId::parse("m5.large").unwrap_err();
        assert!(matches!(err, IdError::ComponentCount { found: 1, .. }));
    }

    #[test]
    fn empty_component_rejected() {
        let err = CloudScopedId::parse("cred//loc/base").unwrap_err();
        assert!(matches!(
            err,
            IdError::EmptyComponent {
                component: "cloud",
                ..
            }
        ));
        assert!(CloudScopedId::parse("").is_err());
    }

    #[test]
    fn new_rejects_delimiter_in_component() {
        let err = CloudScopedId::new("cred", "cloud", "loc", "flavors/small").unwrap_err();
        assert!(matches!(
            err,
            IdError::DelimiterInComponent {
                component: "base id",
                ..
            }
        ));
    }

    #[test]
    fn new_matches_parse() {
        let built = CloudScopedId::new("cred", "cloud", "loc", "base").unwrap();
        let parsed = CloudScopedId::parse("cred/cloud/loc/base").unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn equality_covers_all_components() {
        let a = CloudScopedId::parse("c/cl/l/b").unwrap();
        let other_location = CloudScopedId::parse("c/cl/l2/b").unwrap();
        let other_credential = CloudScopedId::parse("c2/cl/l/b").unwrap();

        assert_ne!(a, other_location);
        assert_ne!(a, other_credential);

        let set: HashSet<_> = [a.clone(), a.clone(), other_location].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn serde_uses_wire_form() {
        let id = CloudScopedId::parse("c/cl/l/b").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"c/cl/l/b\"");

        let back: CloudScopedId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);

        assert!(serde_json::from_str::<CloudScopedId>("\"c/cl/b\"").is_err());
    }
}
