//! Identity Resolver
//!
//! Maps orchestrator-level UUIDs to vendor-native resource names and back,
//! over a freshly enumerated listing. Deliberately uncached and O(n) per
//! lookup; callers needing repeated lookups should build one resolver per
//! listing and batch.

use crate::error::{Error, Result};

/// One remote resource enumerated from the backing service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub id: String,
    pub name: String,
}

impl RemoteEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Check that a string is a syntactically valid UUID.
pub fn is_valid_uuid(candidate: &str) -> bool {
    uuid::Uuid::parse_str(candidate).is_ok()
}

/// Name <-> id resolution over one listing generation
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    /// Human-readable resource kind, used in error messages
    kind: &'static str,
    entries: Vec<RemoteEntry>,
}

impl IdentityResolver {
    pub fn new(kind: &'static str, entries: Vec<RemoteEntry>) -> Self {
        Self { kind, entries }
    }

    /// Resolve a vendor-native name from an orchestrator UUID.
    ///
    /// Succeeds only for syntactically valid UUID strings; a stale handle
    /// (resource deleted out-of-band) surfaces as not-found.
    pub fn name_by_id(&self, id: &str) -> Result<&str> {
        if !is_valid_uuid(id) {
            return Err(Error::not_found(self.kind, id));
        }
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.name.as_str())
            .ok_or_else(|| Error::not_found(self.kind, id))
    }

    /// Resolve an orchestrator UUID from a vendor-native name.
    pub fn id_by_name(&self, name: &str) -> Result<&str> {
        let mut matches = self.entries.iter().filter(|entry| entry.name == name);
        let first = matches
            .next()
            .ok_or_else(|| Error::not_found(self.kind, name))?;
        let extra = matches.count();
        if extra > 0 {
            return Err(Error::Ambiguous {
                name: name.to_string(),
                count: extra + 1,
            });
        }
        Ok(first.id.as_str())
    }
}
