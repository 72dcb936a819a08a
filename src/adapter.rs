//! Adapter Facade
//!
//! [`VcloudAdapter`] implements the uniform [`VimConnector`] contract on top
//! of the vendor port. Construction resolves the organization and tenant
//! binding once; per-operation calls then work against that context.

use crate::config::AdapterConfig;
use crate::domain::ports::*;
use crate::error::{Error, Result};
use crate::flavor::FlavorRegistry;
use crate::poller::TaskPoller;
use crate::provisioner::{Provisioner, TenantContext};
use crate::resolver::{IdentityResolver, RemoteEntry};
use crate::status::CanonicalStatus;
use crate::vcd::{TaskRef, VcdApi, VcdApiRef, VcdClient};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// VIM connector for vCloud-Director-style management endpoints
pub struct VcloudAdapter {
    api: VcdApiRef,
    flavors: Arc<FlavorRegistry>,
    provisioner: Provisioner,
    poller: TaskPoller,
    ctx: TenantContext,
    cancel: CancellationToken,
}

impl std::fmt::Debug for VcloudAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VcloudAdapter")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

impl VcloudAdapter {
    /// Build an adapter over an already-constructed vendor port.
    ///
    /// Resolves the organization by name and the tenant VDC by the
    /// configured id or name; both must exist at the VIM.
    pub async fn new(
        api: VcdApiRef,
        flavors: Arc<FlavorRegistry>,
        config: &AdapterConfig,
    ) -> Result<Self> {
        config.validate()?;

        let orgs = api.list_orgs().await?;
        let org_resolver = IdentityResolver::new(
            "Organization",
            orgs.into_iter()
                .map(|org| RemoteEntry::new(org.id, org.name))
                .collect(),
        );
        let org_id = org_resolver.id_by_name(&config.org_name)?.to_string();

        let org = api.get_org(&org_id).await?;
        let vdc_resolver = IdentityResolver::new(
            "Tenant",
            org.vdcs
                .into_iter()
                .map(|vdc| RemoteEntry::new(vdc.id, vdc.name))
                .collect(),
        );
        let (vdc_id, vdc_name) = match (&config.tenant_id, &config.tenant_name) {
            (Some(tenant_id), _) => {
                let name = vdc_resolver.name_by_id(tenant_id)?.to_string();
                (tenant_id.clone(), name)
            }
            (None, Some(tenant_name)) => {
                let id = vdc_resolver.id_by_name(tenant_name)?.to_string();
                (id, tenant_name.clone())
            }
            (None, None) => {
                return Err(Error::Configuration(
                    "either tenant_id or tenant_name must be provided".into(),
                ))
            }
        };
        info!(
            "Adapter bound to org {} ({}), tenant {} ({})",
            config.org_name, org_id, vdc_name, vdc_id
        );

        let ctx = TenantContext {
            org_id,
            vdc_id,
            vdc_name,
        };
        let poller = TaskPoller::new(api.clone(), config.poller.clone());
        let cancel = CancellationToken::new();
        let provisioner = Provisioner::new(
            api.clone(),
            poller.clone(),
            flavors.clone(),
            cancel.clone(),
        );
        Ok(Self {
            api,
            flavors,
            provisioner,
            poller,
            ctx,
            cancel,
        })
    }

    /// Build an adapter speaking HTTP to the configured endpoint.
    pub async fn connect(config: &AdapterConfig) -> Result<Self> {
        let client = VcdClient::new(config)?;
        Self::new(Arc::new(client), Arc::new(FlavorRegistry::new()), config).await
    }

    /// Tenant context the adapter is bound to.
    pub fn tenant_context(&self) -> &TenantContext {
        &self.ctx
    }

    /// Abort in-flight polling waits; subsequent polled operations fail
    /// with a cancellation error.
    pub fn shutdown(&self) {
        self.cancel.cancel();
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

    async fn instance_resolver(&self) -> Result<IdentityResolver> {
        let vapps = self.api.list_vapps(&self.ctx.vdc_id).await?;
        Ok(IdentityResolver::new(
            "Instance",
            vapps
                .into_iter()
                .map(|vapp| RemoteEntry::new(vapp.id, vapp.name))
                .collect(),
        ))
    }

    fn network_info(&self, net: &crate::vcd::VcdNetwork) -> NetworkInfo {
        NetworkInfo {
            id: net.id.clone(),
            name: net.name.clone(),
            shared: net.shared,
            tenant_id: self.ctx.vdc_id.clone(),
            admin_state_up: net.admin_state_up(),
            status: CanonicalStatus::from_net_code(net.status),
            net_type: NetworkType::Bridge,
        }
    }
}

#[async_trait]
impl VimConnector for VcloudAdapter {
    async fn new_tenant(&self, name: &str, description: Option<&str>) -> Result<String> {
        info!("Creating tenant {}", name);
        if let Some(description) = description {
            // The vendor VDC object carries no description field.
            debug!("Tenant description ignored: {}", description);
        }
        let (vdc, task) = self.api.create_vdc(name).await?;
        self.await_ok(task, "new_tenant").await?;
        Ok(vdc.id)
    }

    async fn get_tenant_list(&self, filter: &TenantFilter) -> Result<Vec<TenantInfo>> {
        let org = self.api.get_org(&self.ctx.org_id).await?;
        Ok(org
            .vdcs
            .into_iter()
            .map(|vdc| TenantInfo {
                id: vdc.id,
                name: vdc.name,
            })
            .filter(|tenant| filter.matches(tenant))
            .collect())
    }

    async fn new_network(
        &self,
        name: &str,
        net_type: NetworkType,
        ip_profile: Option<&IpProfile>,
        shared: bool,
    ) -> Result<String> {
        // All network types map onto the same vendor org-network construct.
        info!("Creating {} network {}", net_type, name);
        let net = self.api.create_network(name, shared, ip_profile).await?;
        Ok(net.id)
    }

    async fn get_network_list(&self, filter: &NetworkFilter) -> Result<Vec<NetworkInfo>> {
        let networks = self.api.list_networks(&self.ctx.vdc_id).await?;
        Ok(networks
            .iter()
            .map(|net| self.network_info(net))
            .filter(|net| filter.matches(net))
            .collect())
    }

    async fn get_network(&self, net_id: &str) -> Result<NetworkInfo> {
        self.api
            .get_network(net_id)
            .await?
            .map(|net| self.network_info(&net))
            .ok_or_else(|| Error::not_found("Network", net_id))
    }

    async fn delete_network(&self, net_id: &str) -> Result<String> {
        self.api
            .get_network(net_id)
            .await?
            .ok_or_else(|| Error::not_found("Network", net_id))?;
        info!("Deleting network {}", net_id);
        let task = self.api.delete_network(net_id).await?;
        self.await_ok(task, "delete_network").await?;
        Ok(net_id.to_string())
    }

    async fn refresh_nets_status(
        &self,
        net_ids: &[String],
    ) -> Result<BTreeMap<String, NetStatusEntry>> {
        let mut entries = BTreeMap::new();
        for net_id in net_ids {
            let entry = match self.api.get_network(net_id).await {
                Ok(Some(net)) => NetStatusEntry {
                    status: CanonicalStatus::from_net_code(net.status),
                    error_msg: None,
                    vim_info: serde_yaml::to_string(&net).ok(),
                },
                Ok(None) => NetStatusEntry {
                    status: CanonicalStatus::Deleted,
                    error_msg: Some("Network not found.".into()),
                    vim_info: None,
                },
                Err(err) => NetStatusEntry {
                    status: CanonicalStatus::Error,
                    error_msg: Some(err.to_string()),
                    vim_info: None,
                },
            };
            entries.insert(net_id.clone(), entry);
        }
        Ok(entries)
    }

    async fn new_flavor(&self, flavor: FlavorDef) -> Result<String> {
        Ok(self.flavors.create(flavor))
    }

    async fn get_flavor(&self, flavor_id: &str) -> Result<FlavorDef> {
        self.flavors.get(flavor_id)
    }

    async fn delete_flavor(&self, flavor_id: &str) -> Result<String> {
        self.flavors.delete(flavor_id)
    }

    async fn new_image(&self, image: &ImageSpec) -> Result<String> {
        let path = Path::new(&image.location);
        let metadata = tokio::fs::metadata(path).await.map_err(|err| {
            Error::Configuration(format!(
                "image artifact {} is not accessible: {err}",
                image.location
            ))
        })?;
        if !metadata.is_file() {
            return Err(Error::Configuration(format!(
                "image artifact {} is not a regular file",
                image.location
            )));
        }
        let extension = path.extension().and_then(|ext| ext.to_str());
        if extension != Some("ovf") {
            return Err(Error::Configuration(format!(
                "unsupported image format for {}; only .ovf artifacts can be uploaded",
                image.location
            )));
        }

        // Catalog name is a stable function of the source path, so repeated
        // registration of the same artifact resolves to one catalog.
        let catalog_name =
            uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_URL, image.location.as_bytes()).to_string();
        let catalogs = self.api.list_catalogs().await?;
        if let Some(existing) = catalogs.iter().find(|catalog| catalog.name == catalog_name) {
            debug!(
                "Image {} already registered as catalog {}",
                image.location, existing.id
            );
            return Ok(existing.id.clone());
        }

        info!("Registering image {} as catalog {}", image.location, catalog_name);
        let catalog = self.api.create_catalog(&catalog_name).await?;
        let template_name = image.name.clone().unwrap_or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or(&catalog_name)
                .to_string()
        });
        let task = self
            .api
            .upload_template(&catalog.id, &template_name, path)
            .await?;
        self.await_ok(task, "new_image").await?;
        Ok(catalog.id)
    }

    async fn delete_image(&self, _image_id: &str) -> Result<String> {
        Err(Error::NotImplemented("delete_image".into()))
    }

    async fn new_vm_instance(&self, spec: &InstanceSpec) -> Result<String> {
        self.provisioner.create_instance(&self.ctx, spec).await
    }

    async fn get_vm_instance(&self, instance_id: &str) -> Result<InstanceInfo> {
        self.provisioner.get_instance(&self.ctx, instance_id).await
    }

    async fn delete_vm_instance(&self, instance_id: &str) -> Result<String> {
        self.provisioner.delete_instance(&self.ctx, instance_id).await
    }

    async fn refresh_vms_status(
        &self,
        instance_ids: &[String],
    ) -> Result<BTreeMap<String, InstanceStatusEntry>> {
        self.provisioner
            .refresh_instances(&self.ctx, instance_ids)
            .await
    }

    async fn action_vm_instance(
        &self,
        instance_id: &str,
        action: InstanceAction,
    ) -> Result<String> {
        let instances = self.instance_resolver().await?;
        instances.name_by_id(instance_id)?;
        info!("Action {:?} on instance {}", action, instance_id);

        let task = match action {
            InstanceAction::Start { rebuild: true } => {
                Some(self.api.deploy(instance_id, true).await?)
            }
            InstanceAction::Start { rebuild: false } => {
                let detail = self
                    .api
                    .get_vapp(instance_id)
                    .await?
                    .ok_or_else(|| Error::not_found("Instance", instance_id))?;
                match CanonicalStatus::from_vapp_code(detail.status) {
                    CanonicalStatus::Suspended | CanonicalStatus::Inactive => {
                        Some(self.api.power_on(instance_id).await?)
                    }
                    status => {
                        debug!(
                            "Instance {} is {}, start request is a no-op",
                            instance_id, status
                        );
                        None
                    }
                }
            }
            InstanceAction::Pause => {
                return Err(Error::NotImplemented("pause".into()));
            }
            InstanceAction::Resume => {
                return Err(Error::NotImplemented("resume".into()));
            }
            InstanceAction::Shutdown => Some(self.api.shutdown(instance_id).await?),
            InstanceAction::ForceOff => Some(self.api.reset(instance_id).await?),
            InstanceAction::Terminate => Some(self.api.delete_vapp(instance_id).await?),
        };
        if let Some(task) = task {
            self.await_ok(task, "action_vm_instance").await?;
        }
        Ok(instance_id.to_string())
    }

    async fn get_vm_instance_console(
        &self,
        _instance_id: &str,
        _console_type: ConsoleType,
    ) -> Result<String> {
        Err(Error::NotImplemented("get_vm_instance_console".into()))
    }
}
