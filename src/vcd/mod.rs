//! Vendor management API port
//!
//! The adapter treats the vCloud-Director-style service as an opaque remote
//! API reached through [`VcdApi`]. The HTTP client implements it for real
//! deployments; tests script it through the in-memory mock.

pub mod client;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use client::{HttpAuthenticator, VcdClient};
pub use types::*;

use crate::domain::ports::{IpAllocationMode, IpProfile};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Port to the remote virtualization infrastructure.
///
/// Every mutating call returns an [`TaskRef`] handle that must be polled to a
/// terminal state before a dependent call may be issued.
#[async_trait]
pub trait VcdApi: Send + Sync {
    // -- organizations / tenants ---------------------------------------------

    async fn list_orgs(&self) -> Result<Vec<OrgRef>>;

    async fn get_org(&self, org_id: &str) -> Result<OrgDetail>;

    /// Create a VDC; requires the privileged session.
    async fn create_vdc(&self, name: &str) -> Result<(VdcRef, TaskRef)>;

    // -- networks ------------------------------------------------------------

    async fn list_networks(&self, vdc_id: &str) -> Result<Vec<VcdNetwork>>;

    async fn get_network(&self, network_id: &str) -> Result<Option<VcdNetwork>>;

    /// Instantiate a network from the org template; requires the privileged
    /// session.
    async fn create_network(
        &self,
        name: &str,
        shared: bool,
        ip_profile: Option<&IpProfile>,
    ) -> Result<VcdNetwork>;

    async fn delete_network(&self, network_id: &str) -> Result<TaskRef>;

    // -- catalogs / templates ------------------------------------------------

    async fn list_catalogs(&self) -> Result<Vec<VcdCatalog>>;

    async fn create_catalog(&self, name: &str) -> Result<VcdCatalog>;

    async fn upload_template(
        &self,
        catalog_id: &str,
        template_name: &str,
        path: &Path,
    ) -> Result<TaskRef>;

    // -- vApps ---------------------------------------------------------------

    async fn list_vapps(&self, vdc_id: &str) -> Result<Vec<VappRef>>;

    async fn get_vapp(&self, vapp_id: &str) -> Result<Option<VappDetail>>;

    async fn instantiate_vapp(&self, vdc_id: &str, params: &InstantiateParams)
        -> Result<TaskRef>;

    async fn connect_vapp_network(&self, vapp_id: &str, network: &VcdNetwork) -> Result<TaskRef>;

    async fn connect_nic(
        &self,
        vapp_id: &str,
        network_name: &str,
        nic_index: usize,
        mode: IpAllocationMode,
    ) -> Result<TaskRef>;

    async fn power_on(&self, vapp_id: &str) -> Result<TaskRef>;

    async fn power_off(&self, vapp_id: &str) -> Result<TaskRef>;

    async fn shutdown(&self, vapp_id: &str) -> Result<TaskRef>;

    async fn reset(&self, vapp_id: &str) -> Result<TaskRef>;

    async fn deploy(&self, vapp_id: &str, power_on: bool) -> Result<TaskRef>;

    async fn undeploy(&self, vapp_id: &str) -> Result<TaskRef>;

    async fn delete_vapp(&self, vapp_id: &str) -> Result<TaskRef>;

    // -- async tasks ---------------------------------------------------------

    async fn get_task(&self, task: &TaskRef) -> Result<TaskInfo>;
}

pub type VcdApiRef = Arc<dyn VcdApi>;
