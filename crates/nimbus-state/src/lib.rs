//! nimbus-state — embedded model store for nimbus.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for virtual machines, components, applications, component
//! instances, and the provider resources (hardware, images) that the
//! watchdogs reconcile.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Provider resources use the composite key `{cloud}/{base_id}` so they can be
//! found by the natural key carried in a cloud-scoped id.
//!
//! Model access happens inside [`StateStore::read`] / [`StateStore::write`]
//! scopes. A write scope commits iff its closure returns `Ok`.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::{ReadScope, StateStore, WriteScope};
pub use tables::Entity;
pub use types::*;
