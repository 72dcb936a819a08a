//! Adapter configuration
//!
//! One [`AdapterConfig`] per tenant/VIM-account pair. The privileged
//! credential set is optional; without it only tenant-scoped operations are
//! available (VDC and network creation will fail with a configuration error).

use crate::error::{Error, Result};
use crate::session::Credentials;
use std::time::Duration;

/// Organization name privileged principals authenticate against
pub const SYSTEM_ORG: &str = "System";

/// Bounds for the async task poller
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Base polling interval
    pub interval: Duration,
    /// Deadline after which a still-pending task surfaces as an error
    pub deadline: Duration,
    /// Jitter applied around the interval, 0.0..1.0
    pub randomization_factor: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            deadline: Duration::from_secs(300),
            randomization_factor: 0.25,
        }
    }
}

/// Configuration for one adapter instance
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Base URL of the vCloud-Director-style management API
    pub endpoint: String,
    /// Organization the tenant-scoped user belongs to
    pub org_name: String,
    pub username: String,
    pub password: String,
    /// Provider-level principal for operations unavailable to a tenant user
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    /// Tenant (VDC) binding; at least one of id/name must be given
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    /// Skip TLS verification (lab deployments)
    pub insecure: bool,
    pub poller: PollerConfig,
}

impl AdapterConfig {
    pub fn new(
        endpoint: impl Into<String>,
        org_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            org_name: org_name.into(),
            username: username.into(),
            password: password.into(),
            admin_username: None,
            admin_password: None,
            tenant_id: None,
            tenant_name: None,
            insecure: false,
            poller: PollerConfig::default(),
        }
    }

    /// Bind the tenant by name. The combined `"<tenant>:<org>"` form also
    /// carries the organization name.
    pub fn with_tenant_name(mut self, tenant_name: &str) -> Self {
        match tenant_name.split_once(':') {
            Some((tenant, org)) => {
                self.tenant_name = Some(tenant.to_string());
                self.org_name = org.to_string();
            }
            None => self.tenant_name = Some(tenant_name.to_string()),
        }
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_admin(
        mut self,
        admin_username: impl Into<String>,
        admin_password: impl Into<String>,
    ) -> Self {
        self.admin_username = Some(admin_username.into());
        self.admin_password = Some(admin_password.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(Error::Configuration("endpoint must not be empty".into()));
        }
        if self.org_name.is_empty() {
            return Err(Error::Configuration(
                "organization name must not be empty; pass it directly or via tenant_name:<org>"
                    .into(),
            ));
        }
        if self.tenant_id.is_none() && self.tenant_name.is_none() {
            return Err(Error::Configuration(
                "either tenant_id or tenant_name must be provided".into(),
            ));
        }
        Ok(())
    }

    /// Tenant-scoped credential set.
    pub fn user_credentials(&self) -> Credentials {
        Credentials {
            username: self.username.clone(),
            password: self.password.clone(),
            org: self.org_name.clone(),
        }
    }

    /// Provider-level credential set, when configured.
    pub fn admin_credentials(&self) -> Option<Credentials> {
        match (&self.admin_username, &self.admin_password) {
            (Some(user), Some(pass)) => Some(Credentials {
                username: user.clone(),
                password: pass.clone(),
                org: SYSTEM_ORG.to_string(),
            }),
            _ => None,
        }
    }
}
