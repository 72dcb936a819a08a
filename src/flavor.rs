//! Flavor Registry
//!
//! Process-local store of compute-shape definitions. The vendor has no native
//! flavor concept, so definitions live here and are consumed at VM-creation
//! time. The registry is injected into the adapter at construction and may be
//! shared by multiple adapter instances, hence the concurrent map.

use crate::domain::ports::FlavorDef;
use crate::error::{Error, Result};
use dashmap::DashMap;
use tracing::debug;

/// In-memory mapping id -> flavor definition.
///
/// Registry lifetime equals adapter-process lifetime; no persistence.
#[derive(Debug, Default)]
pub struct FlavorRegistry {
    flavors: DashMap<String, FlavorDef>,
}

impl FlavorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flavor under a freshly generated id, never reused.
    pub fn create(&self, flavor: FlavorDef) -> String {
        let flavor_id = uuid::Uuid::new_v4().to_string();
        debug!("Registering flavor {} as {}", flavor.name, flavor_id);
        self.flavors.insert(flavor_id.clone(), flavor);
        flavor_id
    }

    /// Obtain a flavor definition by id.
    pub fn get(&self, flavor_id: &str) -> Result<FlavorDef> {
        self.flavors
            .get(flavor_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found("Flavor", flavor_id))
    }

    /// Delete a flavor; returns the used id.
    pub fn delete(&self, flavor_id: &str) -> Result<String> {
        self.flavors
            .remove(flavor_id)
            .map(|(id, _)| id)
            .ok_or_else(|| Error::not_found("Flavor", flavor_id))
    }

    pub fn len(&self) -> usize {
        self.flavors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flavors.is_empty()
    }
}
