//! nimbus-lifecycle — client side of the lifecycle protocol.
//!
//! The lifecycle agent runs on every virtual machine and installs, starts and
//! removes application components on request. A job talks to it through a
//! [`LifecycleClient`] obtained from a [`LifecycleConnector`] for the
//! machine's address.
//!
//! # Protocol
//!
//! ```text
//! register_application_instance ─┐
//! register_component_for_instance┤  once per application instance
//! init_deployment_context ───────┘
//! deploy ──────────────→ ComponentInstanceId
//! wait_for_deployment     (polls until the agent reports "ready")
//! undeploy                (compensation)
//! ```
//!
//! [`http::HttpLifecycleConnector`] speaks the protocol as JSON over HTTP/1.1.
//! Every identifier is an opaque token owned by the agent; callers keep them
//! only for the duration of one job attempt.

pub mod client;
pub mod error;
pub mod http;
pub mod types;

pub use client::{LifecycleClient, LifecycleConnector};
pub use error::{LifecycleError, LifecycleResult};
pub use types::*;
