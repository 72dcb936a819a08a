//! Scripted in-memory implementation of [`VcdApi`] for tests
//!
//! Mutating calls are recorded in order so pipeline tests can assert the
//! exact sequence of vendor calls. Task outcomes and poll delays are
//! scriptable per operation name.

use super::*;
use crate::domain::ports::{IpAllocationMode, IpProfile};
use crate::error::{Error, Result};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;

pub const ORG_ID: &str = "a93c9db9-7471-3192-8d09-a8f7aeda3c16";
pub const VDC_ID: &str = "b5f5b2c0-1111-4e21-9c6e-aafd5e62c1a4";
pub const NET_MGMT_ID: &str = "527d4bf7-566a-41e7-a9e7-ca3cdd9cef4f";
pub const NET_DATA_ID: &str = "8a1632aa-48a2-4b0b-9e45-8f6f30ccb9ce";
pub const IMAGE_ID: &str = "dde30fe6-75a9-11e6-ad5f-0800273e724c";

struct TaskOutcome {
    pending_left: usize,
    info: TaskInfo,
}

/// In-memory VIM with scriptable task behavior
pub struct MockVcd {
    org: Mutex<OrgDetail>,
    networks: Mutex<Vec<VcdNetwork>>,
    catalogs: Mutex<Vec<VcdCatalog>>,
    vapps: Mutex<Vec<VappDetail>>,
    calls: Mutex<Vec<String>>,
    fail_counts: Mutex<HashMap<String, usize>>,
    pending: Mutex<HashMap<String, usize>>,
    outcomes: Mutex<HashMap<String, TaskOutcome>>,
    polls: Mutex<HashMap<String, usize>>,
}

impl MockVcd {
    pub fn new() -> Self {
        Self {
            org: Mutex::new(OrgDetail {
                id: ORG_ID.into(),
                name: "corp".into(),
                vdcs: vec![VdcRef {
                    id: VDC_ID.into(),
                    name: "dev".into(),
                }],
            }),
            networks: Mutex::new(vec![
                VcdNetwork {
                    id: NET_MGMT_ID.into(),
                    name: "mgmt".into(),
                    shared: true,
                    status: 1,
                },
                VcdNetwork {
                    id: NET_DATA_ID.into(),
                    name: "data".into(),
                    shared: false,
                    status: 1,
                },
            ]),
            catalogs: Mutex::new(vec![VcdCatalog {
                id: IMAGE_ID.into(),
                name: "ubuntu-16.04".into(),
                ready: true,
            }]),
            vapps: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            fail_counts: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            outcomes: Mutex::new(HashMap::new()),
            polls: Mutex::new(HashMap::new()),
        }
    }

    // -- scripting -----------------------------------------------------------

    /// The next `count` tasks issued for `operation` fail.
    pub fn fail_next(&self, operation: &str, count: usize) {
        self.fail_counts.lock().insert(operation.into(), count);
    }

    /// Tasks for `operation` stay pending for `polls` queries before their
    /// outcome is reported.
    pub fn delay_polls(&self, operation: &str, polls: usize) {
        self.pending.lock().insert(operation.into(), polls);
    }

    /// Tasks for `operation` never reach a terminal state.
    pub fn never_complete(&self, operation: &str) {
        self.delay_polls(operation, usize::MAX);
    }

    // -- observation ---------------------------------------------------------

    /// Ordered log of mutating vendor calls.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub fn poll_count(&self, task_id: &str) -> usize {
        self.polls.lock().get(task_id).copied().unwrap_or(0)
    }

    // -- fixtures ------------------------------------------------------------

    pub fn add_vapp(&self, detail: VappDetail) {
        self.vapps.lock().push(detail);
    }

    pub fn add_network(&self, net: VcdNetwork) {
        self.networks.lock().push(net);
    }

    pub fn add_catalog(&self, catalog: VcdCatalog) {
        self.catalogs.lock().push(catalog);
    }

    pub fn sample_vapp(id: &str, name: &str, status: i64, deployed: bool) -> VappDetail {
        VappDetail {
            id: id.into(),
            name: name.into(),
            status,
            deployed,
            created: Utc::now(),
            description: None,
            host_id: Some("esx-host-1".into()),
            nics: vec![VappNic {
                mac: "00:50:56:01:00:00".into(),
                network_name: "mgmt".into(),
                connection_id: "0".into(),
                ip: Some("10.0.0.5".into()),
            }],
        }
    }

    // -- internals -----------------------------------------------------------

    fn log(&self, entry: impl Into<String>) {
        self.calls.lock().push(entry.into());
    }

    /// Issue a task for an operation; returns the handle and whether the task
    /// will succeed once polled to completion.
    fn issue_task(&self, operation: &str) -> (TaskRef, bool) {
        let succeeds = {
            let mut fails = self.fail_counts.lock();
            match fails.get_mut(operation) {
                Some(count) if *count > 0 => {
                    *count -= 1;
                    false
                }
                _ => true,
            }
        };
        let pending_left = self.pending.lock().get(operation).copied().unwrap_or(0);
        let task = TaskRef::new(uuid::Uuid::new_v4().to_string(), operation);
        let info = if succeeds {
            TaskInfo::success()
        } else {
            TaskInfo::failed(format!("{operation} failed"))
        };
        self.outcomes
            .lock()
            .insert(task.id.clone(), TaskOutcome { pending_left, info });
        (task, succeeds)
    }

    fn with_vapp(&self, vapp_id: &str, apply: impl FnOnce(&mut VappDetail)) {
        if let Some(vapp) = self.vapps.lock().iter_mut().find(|v| v.id == vapp_id) {
            apply(vapp);
        }
    }
}

impl Default for MockVcd {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl VcdApi for MockVcd {
    async fn list_orgs(&self) -> Result<Vec<OrgRef>> {
        let org = self.org.lock();
        Ok(vec![OrgRef {
            id: org.id.clone(),
            name: org.name.clone(),
        }])
    }

    async fn get_org(&self, org_id: &str) -> Result<OrgDetail> {
        let org = self.org.lock();
        if org.id == org_id {
            Ok(org.clone())
        } else {
            Err(Error::not_found("Organization", org_id))
        }
    }

    async fn create_vdc(&self, name: &str) -> Result<(VdcRef, TaskRef)> {
        self.log(format!("create_vdc:{name}"));
        let (task, succeeds) = self.issue_task("create_vdc");
        let vdc = VdcRef {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
        };
        if succeeds {
            self.org.lock().vdcs.push(vdc.clone());
        }
        Ok((vdc, task))
    }

    async fn list_networks(&self, _vdc_id: &str) -> Result<Vec<VcdNetwork>> {
        Ok(self.networks.lock().clone())
    }

    async fn get_network(&self, network_id: &str) -> Result<Option<VcdNetwork>> {
        Ok(self
            .networks
            .lock()
            .iter()
            .find(|n| n.id == network_id)
            .cloned())
    }

    async fn create_network(
        &self,
        name: &str,
        shared: bool,
        _ip_profile: Option<&IpProfile>,
    ) -> Result<VcdNetwork> {
        self.log(format!("create_network:{name}"));
        let net = VcdNetwork {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            shared,
            status: 1,
        };
        self.networks.lock().push(net.clone());
        Ok(net)
    }

    async fn delete_network(&self, network_id: &str) -> Result<TaskRef> {
        self.log(format!("delete_network:{network_id}"));
        let (task, succeeds) = self.issue_task("delete_network");
        if succeeds {
            self.networks.lock().retain(|n| n.id != network_id);
        }
        Ok(task)
    }

    async fn list_catalogs(&self) -> Result<Vec<VcdCatalog>> {
        Ok(self.catalogs.lock().clone())
    }

    async fn create_catalog(&self, name: &str) -> Result<VcdCatalog> {
        self.log(format!("create_catalog:{name}"));
        let catalog = VcdCatalog {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            ready: false,
        };
        self.catalogs.lock().push(catalog.clone());
        Ok(catalog)
    }

    async fn upload_template(
        &self,
        catalog_id: &str,
        template_name: &str,
        _path: &Path,
    ) -> Result<TaskRef> {
        self.log(format!("upload_template:{template_name}"));
        let (task, succeeds) = self.issue_task("upload_template");
        if succeeds {
            if let Some(catalog) = self.catalogs.lock().iter_mut().find(|c| c.id == catalog_id) {
                catalog.ready = true;
            }
        }
        Ok(task)
    }

    async fn list_vapps(&self, _vdc_id: &str) -> Result<Vec<VappRef>> {
        Ok(self
            .vapps
            .lock()
            .iter()
            .map(|v| VappRef {
                id: v.id.clone(),
                name: v.name.clone(),
            })
            .collect())
    }

    async fn get_vapp(&self, vapp_id: &str) -> Result<Option<VappDetail>> {
        Ok(self.vapps.lock().iter().find(|v| v.id == vapp_id).cloned())
    }

    async fn instantiate_vapp(
        &self,
        _vdc_id: &str,
        params: &InstantiateParams,
    ) -> Result<TaskRef> {
        self.log("instantiate");
        let (task, succeeds) = self.issue_task("instantiate");
        if succeeds {
            let nics = params
                .primary_network
                .iter()
                .map(|name| VappNic {
                    mac: "00:50:56:01:00:00".into(),
                    network_name: name.clone(),
                    connection_id: "0".into(),
                    ip: None,
                })
                .collect();
            self.vapps.lock().push(VappDetail {
                id: uuid::Uuid::new_v4().to_string(),
                name: params.name.clone(),
                status: 8,
                deployed: false,
                created: Utc::now(),
                description: params.description.clone(),
                host_id: Some("esx-host-1".into()),
                nics,
            });
        }
        Ok(task)
    }

    async fn connect_vapp_network(&self, _vapp_id: &str, network: &VcdNetwork) -> Result<TaskRef> {
        self.log(format!("connect_network:{}", network.name));
        let (task, _) = self.issue_task("connect_network");
        Ok(task)
    }

    async fn connect_nic(
        &self,
        vapp_id: &str,
        network_name: &str,
        nic_index: usize,
        _mode: IpAllocationMode,
    ) -> Result<TaskRef> {
        self.log(format!("connect_nic:{network_name}"));
        let (task, succeeds) = self.issue_task("connect_nic");
        if succeeds {
            self.with_vapp(vapp_id, |vapp| {
                vapp.nics.push(VappNic {
                    mac: format!("00:50:56:01:00:{nic_index:02x}"),
                    network_name: network_name.into(),
                    connection_id: nic_index.to_string(),
                    ip: None,
                });
            });
        }
        Ok(task)
    }

    async fn power_on(&self, vapp_id: &str) -> Result<TaskRef> {
        self.log("power_on");
        let (task, succeeds) = self.issue_task("power_on");
        if succeeds {
            self.with_vapp(vapp_id, |vapp| vapp.status = 4);
        }
        Ok(task)
    }

    async fn power_off(&self, vapp_id: &str) -> Result<TaskRef> {
        self.log("power_off");
        let (task, succeeds) = self.issue_task("power_off");
        if succeeds {
            self.with_vapp(vapp_id, |vapp| vapp.status = 8);
        }
        Ok(task)
    }

    async fn shutdown(&self, vapp_id: &str) -> Result<TaskRef> {
        self.log("shutdown");
        let (task, succeeds) = self.issue_task("shutdown");
        if succeeds {
            self.with_vapp(vapp_id, |vapp| vapp.status = 8);
        }
        Ok(task)
    }

    async fn reset(&self, _vapp_id: &str) -> Result<TaskRef> {
        self.log("reset");
        let (task, _) = self.issue_task("reset");
        Ok(task)
    }

    async fn deploy(&self, vapp_id: &str, power_on: bool) -> Result<TaskRef> {
        self.log("deploy");
        let (task, succeeds) = self.issue_task("deploy");
        if succeeds {
            self.with_vapp(vapp_id, |vapp| {
                vapp.deployed = true;
                if power_on {
                    vapp.status = 4;
                }
            });
        }
        Ok(task)
    }

    async fn undeploy(&self, vapp_id: &str) -> Result<TaskRef> {
        self.log("undeploy");
        let (task, succeeds) = self.issue_task("undeploy");
        if succeeds {
            self.with_vapp(vapp_id, |vapp| vapp.deployed = false);
        }
        Ok(task)
    }

    async fn delete_vapp(&self, vapp_id: &str) -> Result<TaskRef> {
        self.log("delete_vapp");
        let (task, succeeds) = self.issue_task("delete_vapp");
        if succeeds {
            self.vapps.lock().retain(|v| v.id != vapp_id);
        }
        Ok(task)
    }

    async fn get_task(&self, task: &TaskRef) -> Result<TaskInfo> {
        *self.polls.lock().entry(task.id.clone()).or_insert(0) += 1;
        let mut outcomes = self.outcomes.lock();
        let outcome = outcomes
            .get_mut(&task.id)
            .ok_or_else(|| Error::unexpected("get_task", format!("unknown task {}", task.id)))?;
        if outcome.pending_left > 0 {
            outcome.pending_left = outcome.pending_left.saturating_sub(1);
            return Ok(TaskInfo::running());
        }
        Ok(outcome.info.clone())
    }
}
