//! Domain Ports - the uniform VIM capability contract
//!
//! These traits and types define the boundary between the orchestrator and a
//! concrete VIM adapter. Adapters implement [`VimConnector`] to provide
//! vendor-specific provisioning behind the uniform contract.

use crate::error::Result;
use crate::status::CanonicalStatus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// Tenants
// =============================================================================

/// A tenant (vendor-side virtual datacenter) visible to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantInfo {
    pub id: String,
    pub name: String,
}

/// Exact-match AND filter over tenant attributes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantFilter {
    pub id: Option<String>,
    pub name: Option<String>,
}

impl TenantFilter {
    pub fn matches(&self, tenant: &TenantInfo) -> bool {
        self.id.as_deref().map_or(true, |id| id == tenant.id)
            && self.name.as_deref().map_or(true, |name| name == tenant.name)
    }
}

// =============================================================================
// Networks
// =============================================================================

/// Network type requested by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Bridge,
    Data,
    Ptp,
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Bridge => write!(f, "bridge"),
            NetworkType::Data => write!(f, "data"),
            NetworkType::Ptp => write!(f, "ptp"),
        }
    }
}

/// IP parameters for a new network
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpProfile {
    pub subnet_address: Option<String>,
    pub gateway_address: Option<String>,
    pub dns_address: Option<String>,
    pub dhcp_enabled: bool,
    pub dhcp_start_address: Option<String>,
    pub dhcp_count: Option<u32>,
}

/// A logical L2 segment within a tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub shared: bool,
    pub tenant_id: String,
    pub admin_state_up: bool,
    pub status: CanonicalStatus,
    pub net_type: NetworkType,
}

/// Exact-match AND filter over network attributes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkFilter {
    pub id: Option<String>,
    pub name: Option<String>,
    pub shared: Option<bool>,
    pub tenant_id: Option<String>,
    pub admin_state_up: Option<bool>,
    pub status: Option<CanonicalStatus>,
}

impl NetworkFilter {
    pub fn matches(&self, net: &NetworkInfo) -> bool {
        self.id.as_deref().map_or(true, |id| id == net.id)
            && self.name.as_deref().map_or(true, |name| name == net.name)
            && self.shared.map_or(true, |s| s == net.shared)
            && self
                .tenant_id
                .as_deref()
                .map_or(true, |t| t == net.tenant_id)
            && self.admin_state_up.map_or(true, |a| a == net.admin_state_up)
            && self.status.map_or(true, |s| s == net.status)
    }
}

/// Per-network entry of a batch status refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetStatusEntry {
    pub status: CanonicalStatus,
    pub error_msg: Option<String>,
    /// Plain text dump of the raw vendor data (YAML)
    pub vim_info: Option<String>,
}

// =============================================================================
// Flavors
// =============================================================================

/// A named compute shape; not natively modeled by the vendor, consumed at
/// VM-creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlavorDef {
    pub name: String,
    /// Memory in MBytes
    pub ram_mb: u64,
    pub vcpus: u32,
    /// Disk size in GBytes, when the orchestrator requests one
    pub disk_gb: Option<u64>,
    /// EPA extensions (NUMA/CPU-pinning/SR-IOV requirements)
    pub extended: Option<EpaExtensions>,
}

/// Enhanced platform awareness attributes of a flavor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpaExtensions {
    #[serde(default)]
    pub numas: Vec<NumaRequest>,
}

/// Items requested in the same NUMA node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumaRequest {
    /// Number of 1G huge pages
    pub memory_gb: Option<u64>,
    pub cores: Option<u32>,
    pub threads: Option<u32>,
    pub paired_threads: Option<u32>,
    #[serde(default)]
    pub interfaces: Vec<EpaInterface>,
}

/// Passthrough or SR-IOV interface attached to a NUMA node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpaInterface {
    pub name: String,
    /// "yes" (PT), "no" (SR-IOV) or "yes:sriov"
    pub dedicated: Option<String>,
    pub bandwidth: Option<String>,
    pub vpci: Option<String>,
}

// =============================================================================
// Images
// =============================================================================

/// Request to register an image artifact with the VIM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Path to the image artifact on the local filesystem
    pub location: String,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

// =============================================================================
// VM Instances
// =============================================================================

/// Usage role of a network attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NicRole {
    Mgmt,
    Bridge,
    Data,
}

/// IP assignment mode for a connected network adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IpAllocationMode {
    Pool,
    Dhcp,
    Manual,
    None,
}

impl Default for IpAllocationMode {
    fn default() -> Self {
        IpAllocationMode::Dhcp
    }
}

impl std::fmt::Display for IpAllocationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IpAllocationMode::Pool => write!(f, "POOL"),
            IpAllocationMode::Dhcp => write!(f, "DHCP"),
            IpAllocationMode::Manual => write!(f, "MANUAL"),
            IpAllocationMode::None => write!(f, "NONE"),
        }
    }
}

/// One entry of the ordered network-attachment list of a new instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetAttachment {
    /// Orchestrator network id (UUID) to connect
    pub net_id: String,
    /// Interface name inside the guest, when requested
    pub name: Option<String>,
    pub role: NicRole,
    /// Interface model (virtio, e1000, ...)
    pub model: Option<String>,
    pub mac_address: Option<String>,
    #[serde(default)]
    pub ip_allocation: IpAllocationMode,
}

impl NetAttachment {
    pub fn new(net_id: impl Into<String>, role: NicRole) -> Self {
        Self {
            net_id: net_id.into(),
            name: None,
            role,
            model: None,
            mac_address: None,
            ip_allocation: IpAllocationMode::Dhcp,
        }
    }
}

/// Cloud-init-style configuration injected at creation time
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Raw script passed directly to cloud-init
    pub user_data: Option<String>,
    /// Keys to install to the default user
    #[serde(default)]
    pub key_pairs: Vec<String>,
    /// Additional users with their keys
    #[serde(default)]
    pub users: Vec<CloudUser>,
}

/// A user to add via cloud-init
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudUser {
    pub name: String,
    #[serde(default)]
    pub key_pairs: Vec<String>,
}

/// Declarative request for a new VM instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceSpec {
    pub name: String,
    pub description: Option<String>,
    /// Whether the instance must start rather than boot paused
    pub start: bool,
    /// Catalog/image id (UUID)
    pub image_id: String,
    /// Flavor id in the local registry, when a compute shape is requested
    pub flavor_id: Option<String>,
    /// Ordered attachment list; the first entry is the primary network
    #[serde(default)]
    pub net_list: Vec<NetAttachment>,
    pub cloud_config: Option<CloudConfig>,
}

/// One attached network adapter of a deployed instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// XX:XX:XX:XX:XX:XX
    pub mac_address: String,
    /// Orchestrator network id this adapter is connected to
    pub vim_net_id: Option<String>,
    /// Raw vendor adapter/connection id
    pub vim_interface_id: String,
    pub ip_address: Option<String>,
}

/// Detail of a deployed VM instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub created: chrono::DateTime<chrono::Utc>,
    pub description: Option<String>,
    pub status: CanonicalStatus,
    pub host_id: Option<String>,
    pub error_msg: Option<String>,
    pub interfaces: Vec<InterfaceInfo>,
}

/// Per-instance entry of a batch status refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatusEntry {
    pub status: CanonicalStatus,
    pub error_msg: Option<String>,
    /// Plain text dump of the raw vendor data (YAML)
    pub vim_info: Option<String>,
    pub interfaces: Vec<InterfaceInfo>,
}

/// Closed set of lifecycle actions the adapter supports.
///
/// Anything outside this set fails with a not-implemented error instead of
/// being silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstanceAction {
    Start { rebuild: bool },
    Pause,
    Resume,
    Shutdown,
    ForceOff,
    Terminate,
}

/// Console protocol requested by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsoleType {
    Novnc,
    Xvpvnc,
    RdpHtml5,
    SpiceHtml5,
}

// =============================================================================
// VIM Connector Port
// =============================================================================

/// The uniform contract a VIM adapter exposes to the orchestrator
#[async_trait]
pub trait VimConnector: Send + Sync {
    /// Add a tenant (vendor VDC); returns the tenant identifier.
    async fn new_tenant(&self, name: &str, description: Option<&str>) -> Result<String>;

    /// Obtain tenants of the VIM matching the exact-match filter.
    async fn get_tenant_list(&self, filter: &TenantFilter) -> Result<Vec<TenantInfo>>;

    /// Add a tenant network; returns the network identifier.
    async fn new_network(
        &self,
        name: &str,
        net_type: NetworkType,
        ip_profile: Option<&IpProfile>,
        shared: bool,
    ) -> Result<String>;

    /// Obtain tenant networks matching the exact-match filter.
    async fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkInfo>>;

    /// Obtain one network by id.
    async fn get_network(&self, net_id: &str) -> Result<NetworkInfo>;

    /// Delete a network; returns the network identifier.
    async fn delete_network(&self, net_id: &str) -> Result<String>;

    /// Batch network status refresh; partial results on per-id failure.
    async fn refresh_nets_status(
        &self,
        net_ids: &[String],
    ) -> Result<BTreeMap<String, NetStatusEntry>>;

    /// Register a flavor in the local registry; returns a fresh id.
    async fn new_flavor(&self, flavor: FlavorDef) -> Result<String>;

    /// Obtain a flavor definition by id.
    async fn get_flavor(&self, flavor_id: &str) -> Result<FlavorDef>;

    /// Delete a flavor; returns the used id.
    async fn delete_flavor(&self, flavor_id: &str) -> Result<String>;

    /// Register an image artifact; dedups by source path, returns the image id.
    async fn new_image(&self, image: &ImageSpec) -> Result<String>;

    /// Delete an image.
    async fn delete_image(&self, image_id: &str) -> Result<String>;

    /// Run the VM instantiation pipeline; returns the instance identifier.
    async fn new_vm_instance(&self, spec: &InstanceSpec) -> Result<String>;

    /// Obtain detail of one deployed instance.
    async fn get_vm_instance(&self, instance_id: &str) -> Result<InstanceInfo>;

    /// Run the teardown pipeline; returns the instance identifier.
    async fn delete_vm_instance(&self, instance_id: &str) -> Result<String>;

    /// Batch instance status refresh; partial results on per-id failure.
    async fn refresh_vms_status(
        &self,
        instance_ids: &[String],
    ) -> Result<BTreeMap<String, InstanceStatusEntry>>;

    /// Dispatch a lifecycle action; returns the instance identifier.
    async fn action_vm_instance(&self, instance_id: &str, action: InstanceAction)
        -> Result<String>;

    /// Get a console for the instance (unsupported by this adapter).
    async fn get_vm_instance_console(
        &self,
        instance_id: &str,
        console_type: ConsoleType,
    ) -> Result<String>;
}

pub type VimConnectorRef = Arc<dyn VimConnector>;
