//! nimbus-core — types shared by every nimbus crate.
//!
//! - [`CloudScopedId`]: a provider id scoped to the credential, cloud and
//!   location it was issued under. This is the join key between live
//!   provider listings and the stored model.
//! - [`NimbusConfig`]: the `nimbus.toml` configuration file.
//! - [`duration::parse_duration`]: `"5s"` / `"500ms"` / `"2m"` parsing used by
//!   every interval and timeout setting.

pub mod config;
pub mod duration;
pub mod id;

pub use config::{ContainerPreference, NimbusConfig};
pub use id::{CloudScopedId, IdError};
