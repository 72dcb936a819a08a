//! Wire-level resource types of the vendor management API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to an organization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgRef {
    pub id: String,
    pub name: String,
}

/// Reference to a virtual datacenter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VdcRef {
    pub id: String,
    pub name: String,
}

/// Organization detail including its VDCs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgDetail {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub vdcs: Vec<VdcRef>,
}

/// A catalog entry (template derived from an uploaded image artifact)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcdCatalog {
    pub id: String,
    pub name: String,
    /// Whether the template upload reached its terminal state
    pub ready: bool,
}

/// A logical network within a VDC
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcdNetwork {
    pub id: String,
    pub name: String,
    pub shared: bool,
    /// Raw vendor state; 1 means the network is administratively up
    pub status: i64,
}

impl VcdNetwork {
    pub fn admin_state_up(&self) -> bool {
        self.status == 1
    }
}

/// Reference to a vApp within a VDC listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VappRef {
    pub id: String,
    pub name: String,
}

/// A connected network adapter of a vApp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VappNic {
    pub mac: String,
    /// Vendor-side name of the connected network
    pub network_name: String,
    /// Raw adapter/connection id
    pub connection_id: String,
    pub ip: Option<String>,
}

/// Full detail of a vApp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VappDetail {
    pub id: String,
    pub name: String,
    /// Raw vendor status code, translated by the status module
    pub status: i64,
    pub deployed: bool,
    pub created: DateTime<Utc>,
    pub description: Option<String>,
    pub host_id: Option<String>,
    #[serde(default)]
    pub nics: Vec<VappNic>,
}

/// Compute shape applied at instantiation time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputeShape {
    pub vcpus: u32,
    pub ram_mb: u64,
}

/// Parameters of the "create vApp container from template" call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstantiateParams {
    pub name: String,
    pub description: Option<String>,
    pub template_id: String,
    pub power_on: bool,
    /// None means the vendor's default/minimal shape
    pub compute: Option<ComputeShape>,
    /// Vendor-side name of the primary network, when one is attached
    pub primary_network: Option<String>,
    pub network_mode: String,
    /// Rendered cloud-init payload
    pub user_data: Option<String>,
}

/// Handle to a vendor-side asynchronous operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    /// Operation the task was issued for, used in logs and errors
    pub operation: String,
}

impl TaskRef {
    pub fn new(id: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            operation: operation.into(),
        }
    }
}

/// Completion state of an asynchronous task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
    Aborted,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error | TaskState::Aborted)
    }
}

/// Task state plus the vendor's failure detail, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub state: TaskState,
    pub detail: Option<String>,
}

impl TaskInfo {
    pub fn success() -> Self {
        Self {
            state: TaskState::Success,
            detail: None,
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            detail: Some(detail.into()),
        }
    }

    pub fn running() -> Self {
        Self {
            state: TaskState::Running,
            detail: None,
        }
    }
}
