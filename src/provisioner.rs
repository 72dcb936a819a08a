//! Resource Provisioner
//!
//! The VM-instantiation and teardown pipelines. Every step is sequential:
//! a step's precondition is the previous step's vendor-side completion, so
//! each issued task is awaited through the poller before the next call.

use crate::domain::ports::{CloudConfig, InstanceInfo, InstanceSpec, InstanceStatusEntry, InterfaceInfo};
use crate::error::{Error, Result};
use crate::flavor::FlavorRegistry;
use crate::poller::TaskPoller;
use crate::resolver::{is_valid_uuid, IdentityResolver, RemoteEntry};
use crate::status::CanonicalStatus;
use crate::vcd::{
    ComputeShape, InstantiateParams, TaskRef, VappDetail, VcdApi, VcdApiRef, VcdCatalog,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Fixed bound for the undeploy and delete steps of the teardown pipeline
pub const DELETE_INSTANCE_RETRY: usize = 3;

/// Tenant binding resolved at adapter construction
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub org_id: String,
    pub vdc_id: String,
    pub vdc_name: String,
}

/// Runs the multi-step provisioning pipelines against the vendor port
pub struct Provisioner {
    api: VcdApiRef,
    poller: TaskPoller,
    flavors: Arc<FlavorRegistry>,
    cancel: CancellationToken,
}

impl Provisioner {
    pub fn new(
        api: VcdApiRef,
        poller: TaskPoller,
        flavors: Arc<FlavorRegistry>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            api,
            poller,
            flavors,
            cancel,
        }
    }

    /// VM instantiation pipeline.
    ///
    /// Each step completes, including its vendor task, before the next
    /// begins. A NIC-attachment failure aborts the pipeline and leaves
    /// already-attached NICs in place for operator inspection.
    pub async fn create_instance(&self, ctx: &TenantContext, spec: &InstanceSpec) -> Result<String> {
        info!(
            "Creating instance {} (image {}, {} networks)",
            spec.name,
            spec.image_id,
            spec.net_list.len()
        );

        // a. tenant context
        let org = self.api.get_org(&ctx.org_id).await?;
        if !org.vdcs.iter().any(|vdc| vdc.id == ctx.vdc_id) {
            return Err(Error::not_found("Tenant", &ctx.vdc_id));
        }

        // b. catalog/template bound to the image id
        let catalogs = self.api.list_catalogs().await?;
        let catalog = resolve_catalog(&catalogs, &spec.image_id)?;

        // c. compute shape from the flavor registry
        let compute = match &spec.flavor_id {
            Some(flavor_id) => {
                let flavor = self.flavors.get(flavor_id)?;
                Some(ComputeShape {
                    vcpus: flavor.vcpus,
                    ram_mb: flavor.ram_mb,
                })
            }
            None => None,
        };

        // d. primary network: first attachment entry, when any
        let primary = match spec.net_list.first() {
            Some(attachment) => {
                let network = self
                    .api
                    .get_network(&attachment.net_id)
                    .await?
                    .ok_or_else(|| Error::not_found("Network", &attachment.net_id))?;
                debug!(
                    "Primary network for {} is {} ({})",
                    spec.name, network.name, network.id
                );
                Some(network)
            }
            None => None,
        };

        // e. create the container from the template
        let vapp_name = format!("{}-{}", spec.name, uuid::Uuid::new_v4());
        let params = InstantiateParams {
            name: vapp_name.clone(),
            description: spec.description.clone(),
            template_id: catalog.id.clone(),
            power_on: spec.start,
            compute,
            primary_network: primary.as_ref().map(|net| net.name.clone()),
            network_mode: "bridged".into(),
            user_data: spec.cloud_config.as_ref().and_then(render_cloud_init),
        };
        let task = self.api.instantiate_vapp(&ctx.vdc_id, &params).await?;
        self.await_ok(task, "new_vm_instance").await?;

        // f. re-fetch the created container
        let vapp_id = self
            .vapp_id_by_name(ctx, &vapp_name)
            .await?
            .ok_or_else(|| {
                Error::unexpected(
                    "new_vm_instance",
                    format!("container {vapp_name} cannot be re-fetched after instantiation"),
                )
            })?;

        // g. remaining NICs, in order; connect the network, then the adapter
        for (index, attachment) in spec.net_list.iter().enumerate().skip(1) {
            let network = self
                .api
                .get_network(&attachment.net_id)
                .await?
                .ok_or_else(|| Error::not_found("Network", &attachment.net_id))?;
            info!(
                "Connecting {} to network {} (nic {})",
                vapp_name, network.name, index
            );
            let task = self.api.connect_vapp_network(&vapp_id, &network).await?;
            self.await_ok(task, "new_vm_instance").await?;
            let task = self
                .api
                .connect_nic(&vapp_id, &network.name, index, attachment.ip_allocation)
                .await?;
            self.await_ok(task, "new_vm_instance").await?;
        }

        // h. power on, then deploy onto a host
        let task = self.api.power_on(&vapp_id).await?;
        self.await_ok(task, "new_vm_instance").await?;
        let task = self.api.deploy(&vapp_id, true).await?;
        self.await_ok(task, "new_vm_instance").await?;

        // i. final identifier resolution
        let final_id = self
            .vapp_id_by_name(ctx, &vapp_name)
            .await?
            .ok_or_else(|| {
                Error::unexpected(
                    "new_vm_instance",
                    format!("container {vapp_name} unresolvable after deployment"),
                )
            })?;
        info!("Instance {} created as {}", spec.name, final_id);
        Ok(final_id)
    }

    /// Teardown pipeline: power off (best-effort), undeploy and delete with
    /// a fixed retry bound, then verify absence.
    pub async fn delete_instance(&self, ctx: &TenantContext, instance_id: &str) -> Result<String> {
        // a. resolve the container
        let vapps = self.vapp_resolver(ctx).await?;
        let name = vapps.name_by_id(instance_id)?.to_string();
        info!("Deleting instance {} ({})", name, instance_id);

        // b. best-effort power off
        match self.api.power_off(instance_id).await {
            Ok(task) => match self.poller.await_completion(&task, &self.cancel).await {
                Ok(true) => {}
                Ok(false) => warn!(
                    "Power off of {} reported failure, continuing teardown",
                    instance_id
                ),
                Err(err) => warn!(
                    "Power off of {} did not complete ({}), continuing teardown",
                    instance_id, err
                ),
            },
            Err(err) => warn!(
                "Power off of {} could not be issued ({}), continuing teardown",
                instance_id, err
            ),
        }

        // c. undeploy while the container reports itself deployed
        let deployed = self
            .api
            .get_vapp(instance_id)
            .await?
            .map(|vapp| vapp.deployed)
            .unwrap_or(false);
        if deployed {
            let mut undeployed = false;
            for attempt in 1..=DELETE_INSTANCE_RETRY {
                let task = self.api.undeploy(instance_id).await?;
                match self.poller.await_completion(&task, &self.cancel).await {
                    Ok(true) => {
                        undeployed = true;
                        break;
                    }
                    Ok(false) => warn!(
                        "Undeploy attempt {}/{} for {} failed",
                        attempt, DELETE_INSTANCE_RETRY, instance_id
                    ),
                    Err(err @ Error::Cancelled { .. }) => return Err(err),
                    Err(err) => warn!(
                        "Undeploy attempt {}/{} for {} did not complete: {}",
                        attempt, DELETE_INSTANCE_RETRY, instance_id, err
                    ),
                }
            }
            if !undeployed {
                return Err(Error::DeleteFailed {
                    id: instance_id.into(),
                    reason: format!(
                        "undeploy did not complete after {DELETE_INSTANCE_RETRY} attempts"
                    ),
                });
            }
        }

        // d. delete with the same bound
        let mut deleted = false;
        for attempt in 1..=DELETE_INSTANCE_RETRY {
            let task = self.api.delete_vapp(instance_id).await?;
            match self.poller.await_completion(&task, &self.cancel).await {
                Ok(true) => {
                    deleted = true;
                    break;
                }
                Ok(false) => warn!(
                    "Delete attempt {}/{} for {} failed",
                    attempt, DELETE_INSTANCE_RETRY, instance_id
                ),
                Err(err @ Error::Cancelled { .. }) => return Err(err),
                Err(err) => warn!(
                    "Delete attempt {}/{} for {} did not complete: {}",
                    attempt, DELETE_INSTANCE_RETRY, instance_id, err
                ),
            }
        }
        if !deleted {
            return Err(Error::DeleteFailed {
                id: instance_id.into(),
                reason: format!("delete did not complete after {DELETE_INSTANCE_RETRY} attempts"),
            });
        }

        // e. success requires absence
        let vapps = self.api.list_vapps(&ctx.vdc_id).await?;
        if vapps.iter().any(|vapp| vapp.id == instance_id) {
            return Err(Error::DeleteFailed {
                id: instance_id.into(),
                reason: "instance still present after delete".into(),
            });
        }
        info!("Instance {} deleted", instance_id);
        Ok(instance_id.to_string())
    }

    /// Detail of one deployed instance.
    pub async fn get_instance(&self, ctx: &TenantContext, instance_id: &str) -> Result<InstanceInfo> {
        let vapps = self.vapp_resolver(ctx).await?;
        vapps.name_by_id(instance_id)?;
        let detail = self
            .api
            .get_vapp(instance_id)
            .await?
            .ok_or_else(|| Error::not_found("Instance", instance_id))?;
        let nets = self.network_resolver(ctx).await?;
        Ok(InstanceInfo {
            created: detail.created,
            description: detail.description.clone(),
            status: CanonicalStatus::from_vapp_code(detail.status),
            host_id: detail.host_id.clone(),
            error_msg: None,
            interfaces: interfaces_of(&detail, &nets),
        })
    }

    /// Batch status refresh; a single instance's resolution failure never
    /// aborts the batch.
    pub async fn refresh_instances(
        &self,
        ctx: &TenantContext,
        instance_ids: &[String],
    ) -> Result<BTreeMap<String, InstanceStatusEntry>> {
        debug!("Refreshing status of {} instances", instance_ids.len());
        let instances = self.vapp_resolver(ctx).await?;
        let nets = self.network_resolver(ctx).await?;

        let mut entries = BTreeMap::new();
        for instance_id in instance_ids {
            let entry = match self.refresh_one(instance_id, &instances, &nets).await {
                Ok(entry) => entry,
                Err(Error::NotFound { .. }) => InstanceStatusEntry {
                    status: CanonicalStatus::Deleted,
                    error_msg: Some("instance not found at VIM".into()),
                    vim_info: None,
                    interfaces: Vec::new(),
                },
                Err(err) => InstanceStatusEntry {
                    status: CanonicalStatus::Error,
                    error_msg: Some(err.to_string()),
                    vim_info: None,
                    interfaces: Vec::new(),
                },
            };
            entries.insert(instance_id.clone(), entry);
        }
        Ok(entries)
    }

    async fn refresh_one(
        &self,
        instance_id: &str,
        instances: &IdentityResolver,
        nets: &IdentityResolver,
    ) -> Result<InstanceStatusEntry> {
        instances.name_by_id(instance_id)?;
        let detail = self
            .api
            .get_vapp(instance_id)
            .await?
            .ok_or_else(|| Error::not_found("Instance", instance_id))?;
        Ok(InstanceStatusEntry {
            status: CanonicalStatus::from_vapp_code(detail.status),
            error_msg: None,
            vim_info: serde_yaml::to_string(&detail).ok(),
            interfaces: interfaces_of(&detail, nets),
        })
    }

    async fn await_ok(&self, task: TaskRef, operation: &str) -> Result<()> {
        if self.poller.await_completion(&task, &self.cancel).await? {
            Ok(())
        } else {
            Err(Error::unexpected(
                operation,
                format!("{} task did not complete successfully", task.operation),
            ))
        }
    }

    async fn vapp_id_by_name(&self, ctx: &TenantContext, name: &str) -> Result<Option<String>> {
        let vapps = self.api.list_vapps(&ctx.vdc_id).await?;
        Ok(vapps
            .into_iter()
            .find(|vapp| vapp.name == name)
            .map(|vapp| vapp.id))
    }

    async fn vapp_resolver(&self, ctx: &TenantContext) -> Result<IdentityResolver> {
        let vapps = self.api.list_vapps(&ctx.vdc_id).await?;
        Ok(IdentityResolver::new(
            "Instance",
            vapps
                .into_iter()
                .map(|vapp| RemoteEntry::new(vapp.id, vapp.name))
                .collect(),
        ))
    }

    async fn network_resolver(&self, ctx: &TenantContext) -> Result<IdentityResolver> {
        let networks = self.api.list_networks(&ctx.vdc_id).await?;
        Ok(IdentityResolver::new(
            "Network",
            networks
                .into_iter()
                .map(|net| RemoteEntry::new(net.id, net.name))
                .collect(),
        ))
    }
}

fn resolve_catalog<'a>(catalogs: &'a [VcdCatalog], image_id: &str) -> Result<&'a VcdCatalog> {
    if !is_valid_uuid(image_id) {
        return Err(Error::not_found("Image", image_id));
    }
    let catalog = catalogs
        .iter()
        .find(|catalog| catalog.id == image_id)
        .ok_or_else(|| Error::not_found("Image", image_id))?;
    if !catalog.ready {
        warn!("Catalog entry {} is not fully uploaded", image_id);
        return Err(Error::not_found("Image (upload incomplete)", image_id));
    }
    Ok(catalog)
}

fn interfaces_of(detail: &VappDetail, nets: &IdentityResolver) -> Vec<InterfaceInfo> {
    detail
        .nics
        .iter()
        .map(|nic| InterfaceInfo {
            mac_address: nic.mac.clone(),
            vim_net_id: nets.id_by_name(&nic.network_name).ok().map(str::to_string),
            vim_interface_id: nic.connection_id.clone(),
            ip_address: nic.ip.clone(),
        })
        .collect()
}

/// Render the cloud-init payload, preferring a raw user-data script.
fn render_cloud_init(config: &CloudConfig) -> Option<String> {
    if let Some(user_data) = &config.user_data {
        return Some(user_data.clone());
    }
    if config.key_pairs.is_empty() && config.users.is_empty() {
        return None;
    }
    let users: Vec<_> = config
        .users
        .iter()
        .map(|user| {
            serde_json::json!({
                "name": user.name,
                "ssh_authorized_keys": user.key_pairs,
            })
        })
        .collect();
    let doc = serde_json::json!({
        "ssh_authorized_keys": config.key_pairs,
        "users": users,
    });
    serde_yaml::to_string(&doc)
        .ok()
        .map(|body| format!("#cloud-config\n{body}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PollerConfig;
    use crate::domain::ports::{FlavorDef, NetAttachment, NicRole};
    use crate::vcd::mock::{self, MockVcd};
    use assert_matches::assert_matches;
    use std::time::Duration;

    fn setup() -> (Arc<MockVcd>, Provisioner, TenantContext) {
        let api = Arc::new(MockVcd::new());
        let poller = TaskPoller::new(
            api.clone(),
            PollerConfig {
                interval: Duration::from_millis(1),
                deadline: Duration::from_millis(100),
                randomization_factor: 0.0,
            },
        );
        let flavors = Arc::new(FlavorRegistry::new());
        let provisioner = Provisioner::new(
            api.clone(),
            poller,
            flavors,
            CancellationToken::new(),
        );
        let ctx = TenantContext {
            org_id: mock::ORG_ID.into(),
            vdc_id: mock::VDC_ID.into(),
            vdc_name: "dev".into(),
        };
        (api, provisioner, ctx)
    }

    fn spec_with_nets(flavor_id: Option<String>, net_list: Vec<NetAttachment>) -> InstanceSpec {
        InstanceSpec {
            name: "vnf1".into(),
            description: Some("test instance".into()),
            start: true,
            image_id: mock::IMAGE_ID.into(),
            flavor_id,
            net_list,
            cloud_config: None,
        }
    }

    #[tokio::test]
    async fn test_create_pipeline_call_order() {
        let (api, provisioner, ctx) = setup();
        let flavor_id = provisioner.flavors.create(FlavorDef {
            name: "m1.small".into(),
            ram_mb: 2048,
            vcpus: 2,
            disk_gb: None,
            extended: None,
        });
        let spec = spec_with_nets(
            Some(flavor_id),
            vec![
                NetAttachment::new(mock::NET_MGMT_ID, NicRole::Mgmt),
                NetAttachment::new(mock::NET_DATA_ID, NicRole::Data),
            ],
        );

        let instance_id = provisioner.create_instance(&ctx, &spec).await.unwrap();
        assert!(api.get_vapp(&instance_id).await.unwrap().is_some());

        // The primary network (mgmt) is attached at creation; only the data
        // network gets a connect-network + connect-adapter pair.
        assert_eq!(
            api.calls(),
            vec![
                "instantiate",
                "connect_network:data",
                "connect_nic:data",
                "power_on",
                "deploy",
            ]
        );
    }

    #[tokio::test]
    async fn test_create_without_networks() {
        let (api, provisioner, ctx) = setup();
        let spec = spec_with_nets(None, Vec::new());

        let instance_id = provisioner.create_instance(&ctx, &spec).await.unwrap();
        assert!(api.get_vapp(&instance_id).await.unwrap().is_some());
        assert_eq!(api.call_count("connect_network"), 0);
        assert_eq!(api.call_count("connect_nic"), 0);
    }

    #[tokio::test]
    async fn test_create_missing_flavor() {
        let (api, provisioner, ctx) = setup();
        let spec = spec_with_nets(
            Some("0e0e0e0e-0e0e-0e0e-0e0e-0e0e0e0e0e0e".into()),
            Vec::new(),
        );

        let err = provisioner.create_instance(&ctx, &spec).await.unwrap_err();
        assert_matches!(err, Error::NotFound { ref kind, .. } if kind == "Flavor");
        // Precondition failures abort before any vendor mutation.
        assert_eq!(api.call_count("instantiate"), 0);
    }

    #[tokio::test]
    async fn test_create_unknown_image() {
        let (_api, provisioner, ctx) = setup();
        let mut spec = spec_with_nets(None, Vec::new());
        spec.image_id = "11111111-2222-3333-4444-555555555555".into();

        let err = provisioner.create_instance(&ctx, &spec).await.unwrap_err();
        assert_matches!(err, Error::NotFound { .. });
    }

    #[tokio::test]
    async fn test_create_image_not_fully_uploaded() {
        let (api, provisioner, ctx) = setup();
        let pending_id = "77777777-8888-9999-aaaa-bbbbbbbbbbbb";
        api.add_catalog(crate::vcd::VcdCatalog {
            id: pending_id.into(),
            name: "uploading".into(),
            ready: false,
        });
        let mut spec = spec_with_nets(None, Vec::new());
        spec.image_id = pending_id.into();

        let err = provisioner.create_instance(&ctx, &spec).await.unwrap_err();
        assert_matches!(err, Error::NotFound { .. });
    }

    #[tokio::test]
    async fn test_create_instantiate_task_failure() {
        let (api, provisioner, ctx) = setup();
        api.fail_next("instantiate", 1);
        let spec = spec_with_nets(None, Vec::new());

        let err = provisioner.create_instance(&ctx, &spec).await.unwrap_err();
        assert_matches!(err, Error::UnexpectedResponse { .. });
        assert_eq!(api.call_count("power_on"), 0);
    }

    #[tokio::test]
    async fn test_delete_happy_path_and_idempotency() {
        let (api, provisioner, ctx) = setup();
        let vapp_id = "de305d54-75b4-431b-adb2-eb6b9e546014";
        api.add_vapp(MockVcd::sample_vapp(vapp_id, "vnf1-x", 4, true));

        let returned = provisioner.delete_instance(&ctx, vapp_id).await.unwrap();
        assert_eq!(returned, vapp_id);
        assert!(api.get_vapp(vapp_id).await.unwrap().is_none());

        // Retrying after a successful delete is not-found, never a crash.
        let err = provisioner.delete_instance(&ctx, vapp_id).await.unwrap_err();
        assert_matches!(err, Error::NotFound { .. });
    }

    #[tokio::test]
    async fn test_delete_undeploy_retry_bound() {
        let (api, provisioner, ctx) = setup();
        let vapp_id = "de305d54-75b4-431b-adb2-eb6b9e546014";
        api.add_vapp(MockVcd::sample_vapp(vapp_id, "vnf1-x", 4, true));
        api.fail_next("undeploy", DELETE_INSTANCE_RETRY);

        let err = provisioner.delete_instance(&ctx, vapp_id).await.unwrap_err();
        assert_matches!(err, Error::DeleteFailed { .. });
        assert_eq!(api.call_count("undeploy"), DELETE_INSTANCE_RETRY);
        // The pipeline never reached the delete step.
        assert_eq!(api.call_count("delete_vapp"), 0);
    }

    #[tokio::test]
    async fn test_delete_retry_bound() {
        let (api, provisioner, ctx) = setup();
        let vapp_id = "de305d54-75b4-431b-adb2-eb6b9e546014";
        api.add_vapp(MockVcd::sample_vapp(vapp_id, "vnf1-x", 8, false));
        api.fail_next("delete_vapp", DELETE_INSTANCE_RETRY);

        let err = provisioner.delete_instance(&ctx, vapp_id).await.unwrap_err();
        assert_matches!(err, Error::DeleteFailed { ref id, .. } if id == vapp_id);
        assert_eq!(api.call_count("delete_vapp"), DELETE_INSTANCE_RETRY);
    }

    #[tokio::test]
    async fn test_delete_power_off_failure_is_best_effort() {
        let (api, provisioner, ctx) = setup();
        let vapp_id = "de305d54-75b4-431b-adb2-eb6b9e546014";
        api.add_vapp(MockVcd::sample_vapp(vapp_id, "vnf1-x", 4, false));
        api.fail_next("power_off", 1);

        let returned = provisioner.delete_instance(&ctx, vapp_id).await.unwrap();
        assert_eq!(returned, vapp_id);
    }

    #[tokio::test]
    async fn test_get_instance_status_and_interfaces() {
        let (api, provisioner, ctx) = setup();
        let vapp_id = "de305d54-75b4-431b-adb2-eb6b9e546014";
        api.add_vapp(MockVcd::sample_vapp(vapp_id, "vnf1-x", 4, true));

        let info = provisioner.get_instance(&ctx, vapp_id).await.unwrap();
        assert_eq!(info.status, CanonicalStatus::Active);
        assert_eq!(info.interfaces.len(), 1);
        assert_eq!(
            info.interfaces[0].vim_net_id.as_deref(),
            Some(mock::NET_MGMT_ID)
        );
        assert_eq!(info.interfaces[0].ip_address.as_deref(), Some("10.0.0.5"));
    }

    #[tokio::test]
    async fn test_get_instance_not_found() {
        let (_api, provisioner, ctx) = setup();
        let err = provisioner
            .get_instance(&ctx, "11111111-2222-3333-4444-555555555555")
            .await
            .unwrap_err();
        assert_matches!(err, Error::NotFound { .. });
    }

    #[tokio::test]
    async fn test_refresh_batch_returns_partial_results() {
        let (api, provisioner, ctx) = setup();
        let present = "de305d54-75b4-431b-adb2-eb6b9e546014";
        let absent = "11111111-2222-3333-4444-555555555555";
        api.add_vapp(MockVcd::sample_vapp(present, "vnf1-x", 4, true));

        let entries = provisioner
            .refresh_instances(&ctx, &[present.to_string(), absent.to_string()])
            .await
            .unwrap();
        assert_eq!(entries.len(), 2);

        let alive = &entries[present];
        assert_eq!(alive.status, CanonicalStatus::Active);
        assert!(alive.vim_info.is_some());
        assert_eq!(alive.interfaces.len(), 1);

        let gone = &entries[absent];
        assert_eq!(gone.status, CanonicalStatus::Deleted);
        assert!(gone.error_msg.is_some());
    }

    #[test]
    fn test_render_cloud_init() {
        let raw = CloudConfig {
            user_data: Some("#!/bin/sh\necho hi".into()),
            key_pairs: Vec::new(),
            users: Vec::new(),
        };
        assert_eq!(render_cloud_init(&raw).unwrap(), "#!/bin/sh\necho hi");

        let keys = CloudConfig {
            user_data: None,
            key_pairs: vec!["ssh-rsa AAAA".into()],
            users: Vec::new(),
        };
        let rendered = render_cloud_init(&keys).unwrap();
        assert!(rendered.starts_with("#cloud-config"));
        assert!(rendered.contains("ssh-rsa AAAA"));

        assert!(render_cloud_init(&CloudConfig::default()).is_none());
    }
}
