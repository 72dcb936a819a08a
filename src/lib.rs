//! # vCD VIM Adapter
//!
//! Connector between an NFV orchestrator and vCloud-Director-style
//! virtualization infrastructure. Declarative requests (create a tenant
//! network, instantiate a VM with an ordered NIC list, tear an instance
//! down) are translated into ordered sequences of vendor API calls, with
//! every asynchronous vendor task polled to completion before a dependent
//! call is issued.
//!
//! ## Architecture
//!
//! ```text
//!  orchestrator ──> VimConnector (domain::ports)
//!                        │
//!                   VcloudAdapter ──┬── FlavorRegistry   (local shapes)
//!                        │          ├── Provisioner      (pipelines)
//!                        │          ├── TaskPoller       (task waits)
//!                        │          └── IdentityResolver (uuid <-> name)
//!                        │
//!                    VcdApi port ──> VcdClient (HTTP) / scripted mock
//!                        │
//!                   SessionManager (tenant + privileged sessions)
//! ```
//!
//! ## Modules
//!
//! - [`adapter`]: the [`VimConnector`] facade over the vendor port
//! - [`provisioner`]: VM instantiation and teardown pipelines
//! - [`poller`]: polls vendor tasks to a terminal state
//! - [`resolver`]: UUID to vendor-name resolution over listings
//! - [`flavor`]: process-local compute-shape registry
//! - [`status`]: vendor status code translation
//! - [`session`]: tenant and privileged session handling
//! - [`vcd`]: vendor API port, wire types, and HTTP client
//! - [`domain`]: orchestrator-facing contract types
//! - [`error`], [`config`]: error kinds and adapter configuration

pub mod adapter;
pub mod config;
pub mod domain;
pub mod error;
pub mod flavor;
pub mod poller;
pub mod provisioner;
pub mod resolver;
pub mod session;
pub mod status;
pub mod vcd;

pub use adapter::VcloudAdapter;
pub use config::{AdapterConfig, PollerConfig};
pub use domain::ports::{VimConnector, VimConnectorRef};
pub use error::{Error, Result};
pub use flavor::FlavorRegistry;
pub use poller::TaskPoller;
pub use provisioner::{Provisioner, TenantContext};
pub use status::CanonicalStatus;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
