//! redb table definitions for the nimbus model store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).
//! Scoped provider resources are keyed by `{cloud}/{base_id}`; everything else
//! by its model id.

use redb::TableDefinition;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::*;

/// Table layout of a single value.
pub type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Virtual machines keyed by id.
pub const VIRTUAL_MACHINES: Table = TableDefinition::new("virtual_machines");

/// Component definitions keyed by id.
pub const COMPONENTS: Table = TableDefinition::new("components");

/// Applications keyed by id.
pub const APPLICATIONS: Table = TableDefinition::new("applications");

/// Application instances keyed by id.
pub const APPLICATION_INSTANCES: Table = TableDefinition::new("application_instances");

/// Component instances keyed by id.
pub const INSTANCES: Table = TableDefinition::new("instances");

/// Hardware flavors keyed by `{cloud}/{base_id}`.
pub const HARDWARE: Table = TableDefinition::new("hardware");

/// Images keyed by `{cloud}/{base_id}`.
pub const IMAGES: Table = TableDefinition::new("images");

pub(crate) const ALL: [Table; 7] = [
    VIRTUAL_MACHINES,
    COMPONENTS,
    APPLICATIONS,
    APPLICATION_INSTANCES,
    INSTANCES,
    HARDWARE,
    IMAGES,
];

/// A domain type stored in its own table.
pub trait Entity: Serialize + DeserializeOwned {
    /// Name used in error messages and logs.
    const KIND: &'static str;
    const TABLE: Table;

    /// Key of this value in [`Self::TABLE`].
    fn table_key(&self) -> String;
}

impl Entity for VirtualMachine {
    const KIND: &'static str = "virtual machine";
    const TABLE: Table = VIRTUAL_MACHINES;

    fn table_key(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Component {
    const KIND: &'static str = "component";
    const TABLE: Table = COMPONENTS;

    fn table_key(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Application {
    const KIND: &'static str = "application";
    const TABLE: Table = APPLICATIONS;

    fn table_key(&self) -> String {
        self.id.clone()
    }
}

impl Entity for ApplicationInstance {
    const KIND: &'static str = "application instance";
    const TABLE: Table = APPLICATION_INSTANCES;

    fn table_key(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Instance {
    const KIND: &'static str = "instance";
    const TABLE: Table = INSTANCES;

    fn table_key(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Hardware {
    const KIND: &'static str = "hardware";
    const TABLE: Table = HARDWARE;

    fn table_key(&self) -> String {
        cloud_resource_key(&self.cloud, &self.base_id)
    }
}

impl Entity for Image {
    const KIND: &'static str = "image";
    const TABLE: Table = IMAGES;

    fn table_key(&self) -> String {
        cloud_resource_key(&self.cloud, &self.base_id)
    }
}
