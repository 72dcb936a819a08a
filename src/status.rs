//! Status Translator
//!
//! Pure, total mapping from vendor status codes to the canonical status
//! vocabulary the orchestrator understands. Unknown vendor codes map to
//! [`CanonicalStatus::Error`], never panic.

use serde::{Deserialize, Serialize};

/// Interface-level augmentation used by consumers when the instance is
/// ACTIVE but no management interface has an address.
pub const ACTIVE_NO_MGMT_IP: &str = "ACTIVE:NoMgmtIP";

/// Canonical status vocabulary of the orchestrator contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanonicalStatus {
    Active,
    Paused,
    Suspended,
    Inactive,
    Build,
    Error,
    Deleted,
    Other,
}

impl std::fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanonicalStatus::Active => write!(f, "ACTIVE"),
            CanonicalStatus::Paused => write!(f, "PAUSED"),
            CanonicalStatus::Suspended => write!(f, "SUSPENDED"),
            CanonicalStatus::Inactive => write!(f, "INACTIVE"),
            CanonicalStatus::Build => write!(f, "BUILD"),
            CanonicalStatus::Error => write!(f, "ERROR"),
            CanonicalStatus::Deleted => write!(f, "DELETED"),
            CanonicalStatus::Other => write!(f, "OTHER"),
        }
    }
}

impl CanonicalStatus {
    /// Translate a vCloud Director vApp status code.
    ///
    /// The vendor code table:
    ///   -1 could not be created, 0 unresolved, 1 resolved, 2 deployed,
    ///    3 suspended, 4 powered on, 5 waiting for user input, 6 unknown,
    ///    7 unrecognized, 8 powered off, 9 inconsistent,
    ///   10 children with mixed status, 11-13 upload in progress,
    ///   14 upload quarantined, 15 quarantine period expired.
    pub fn from_vapp_code(code: i64) -> Self {
        match code {
            4 => CanonicalStatus::Active,
            7 => CanonicalStatus::Paused,
            3 => CanonicalStatus::Suspended,
            8 => CanonicalStatus::Inactive,
            1 | 2 | 11 | 12 | 13 => CanonicalStatus::Build,
            -1 | 0 | 9 | 15 => CanonicalStatus::Error,
            14 => CanonicalStatus::Deleted,
            5 | 6 | 10 => CanonicalStatus::Other,
            _ => CanonicalStatus::Error,
        }
    }

    /// Consumer-facing rendering. An ACTIVE instance whose management
    /// interface carries no address renders as [`ACTIVE_NO_MGMT_IP`].
    pub fn render(self, has_mgmt_ip: bool) -> String {
        if self == CanonicalStatus::Active && !has_mgmt_ip {
            ACTIVE_NO_MGMT_IP.to_string()
        } else {
            self.to_string()
        }
    }

    /// Translate a vendor network status code. The vendor reports network
    /// state numerically: 1 realized and administratively up, 0 created but
    /// not realized.
    pub fn from_net_code(code: i64) -> Self {
        match code {
            1 => CanonicalStatus::Active,
            0 => CanonicalStatus::Inactive,
            _ => CanonicalStatus::Error,
        }
    }
}
