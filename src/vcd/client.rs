//! Thin HTTP client for the vendor management API
//!
//! The wire encoding is treated as opaque: requests are plain JSON against
//! the service endpoints, with the session token attached per call. An
//! authorization failure invalidates the cached session and the call is
//! retried once with a fresh one.

use super::types::*;
use super::VcdApi;
use crate::config::AdapterConfig;
use crate::domain::ports::{IpAllocationMode, IpProfile};
use crate::error::{Error, Result};
use crate::session::{Authenticate, Credentials, Session, SessionManager};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio_util::codec::{BytesCodec, FramedRead};
use tracing::debug;

/// Header carrying the session token
const AUTH_HEADER: &str = "x-vcloud-authorization";

/// Authenticates against the session endpoint
pub struct HttpAuthenticator {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAuthenticator {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Authenticate for HttpAuthenticator {
    async fn authenticate(&self, creds: &Credentials) -> Result<Session> {
        let url = format!("{}/api/sessions", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(creds.principal(), Some(&creds.password))
            .send()
            .await
            .map_err(|err| Error::connection(creds.principal(), err.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::connection(
                creds.principal(),
                format!("authentication rejected with status {}", response.status()),
            ));
        }

        let token = response
            .headers()
            .get(AUTH_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::connection(creds.principal(), "session response carried no token")
            })?;

        #[derive(serde::Deserialize)]
        struct SessionBody {
            org_url: String,
        }
        let body: SessionBody = response.json().await?;

        debug!("Authenticated {} at {}", creds.principal(), self.base_url);
        Ok(Session {
            token,
            org_url: body.org_url,
            established: Utc::now(),
        })
    }
}

/// HTTP implementation of the vendor port
pub struct VcdClient {
    http: reqwest::Client,
    base_url: String,
    sessions: SessionManager,
}

impl VcdClient {
    /// Build a client (and its session manager) from the adapter config.
    pub fn new(config: &AdapterConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        let base_url = config.endpoint.trim_end_matches('/').to_string();
        let auth = Arc::new(HttpAuthenticator::new(http.clone(), base_url.clone()));
        let sessions = SessionManager::new(
            auth,
            config.user_credentials(),
            config.admin_credentials(),
        );
        Ok(Self {
            http,
            base_url,
            sessions,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        privileged: bool,
    ) -> Result<reqwest::Response> {
        let mut response = self.send_once(method.clone(), path, body, privileged).await?;
        // One transparent re-authentication on an authorization failure.
        if response.status() == StatusCode::UNAUTHORIZED {
            self.sessions.invalidate();
            response = self.send_once(method, path, body, privileged).await?;
        }
        Ok(response)
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        privileged: bool,
    ) -> Result<reqwest::Response> {
        let session = if privileged {
            self.sessions.connect_privileged().await?
        } else {
            self.sessions.connect().await?
        };
        let mut request = self
            .http
            .request(method, self.url(path))
            .header(AUTH_HEADER, &session.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(Method::GET, path, None, false).await?;
        let response = response.error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    /// GET where a 404 means the resource is absent, not an error.
    async fn get_json_opt<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.send(Method::GET, path, None, false).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        Ok(Some(response.json::<T>().await?))
    }

    /// One upload attempt with the current session, streaming the artifact.
    async fn upload_once(&self, url_path: &str, artifact: &Path) -> Result<reqwest::Response> {
        let session = self.sessions.connect().await?;
        let file = tokio::fs::File::open(artifact).await?;
        let stream = FramedRead::new(file, BytesCodec::new());
        Ok(self
            .http
            .put(self.url(url_path))
            .header(AUTH_HEADER, &session.token)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await?)
    }

    /// Issue a mutating call and parse the task handle out of the response.
    async fn send_task(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        privileged: bool,
        operation: &str,
    ) -> Result<TaskRef> {
        let response = self.send(method, path, body, privileged).await?;
        let response = response.error_for_status()?;
        let wire: TaskWire = response.json().await?;
        Ok(TaskRef::new(wire.task.id, operation))
    }
}

#[derive(serde::Deserialize)]
struct TaskWire {
    task: TaskWireInner,
}

#[derive(serde::Deserialize)]
struct TaskWireInner {
    id: String,
}

#[async_trait]
impl VcdApi for VcdClient {
    async fn list_orgs(&self) -> Result<Vec<OrgRef>> {
        self.get_json("/api/org").await
    }

    async fn get_org(&self, org_id: &str) -> Result<OrgDetail> {
        self.get_json_opt(&format!("/api/org/{org_id}"))
            .await?
            .ok_or_else(|| Error::not_found("Organization", org_id))
    }

    async fn create_vdc(&self, name: &str) -> Result<(VdcRef, TaskRef)> {
        #[derive(serde::Deserialize)]
        struct CreateVdcWire {
            vdc: VdcRef,
            task: TaskWireInner,
        }
        let response = self
            .send(
                Method::POST,
                "/api/admin/vdcs",
                Some(&json!({ "name": name })),
                true,
            )
            .await?;
        let response = response.error_for_status()?;
        let wire: CreateVdcWire = response.json().await?;
        Ok((wire.vdc, TaskRef::new(wire.task.id, "create_vdc")))
    }

    async fn list_networks(&self, vdc_id: &str) -> Result<Vec<VcdNetwork>> {
        self.get_json(&format!("/api/vdc/{vdc_id}/networks")).await
    }

    async fn get_network(&self, network_id: &str) -> Result<Option<VcdNetwork>> {
        self.get_json_opt(&format!("/api/network/{network_id}"))
            .await
    }

    async fn create_network(
        &self,
        name: &str,
        shared: bool,
        ip_profile: Option<&IpProfile>,
    ) -> Result<VcdNetwork> {
        let body = json!({
            "name": name,
            "shared": shared,
            "ip_profile": ip_profile,
        });
        let response = self
            .send(Method::POST, "/api/admin/networks", Some(&body), true)
            .await?;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn delete_network(&self, network_id: &str) -> Result<TaskRef> {
        self.send_task(
            Method::DELETE,
            &format!("/api/network/{network_id}"),
            None,
            false,
            "delete_network",
        )
        .await
    }

    async fn list_catalogs(&self) -> Result<Vec<VcdCatalog>> {
        self.get_json("/api/catalogs").await
    }

    async fn create_catalog(&self, name: &str) -> Result<VcdCatalog> {
        let response = self
            .send(
                Method::POST,
                "/api/catalogs",
                Some(&json!({ "name": name })),
                false,
            )
            .await?;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Streamed from disk; the artifact is never buffered whole in memory.
    async fn upload_template(
        &self,
        catalog_id: &str,
        template_name: &str,
        path: &Path,
    ) -> Result<TaskRef> {
        let url_path = format!(
            "/api/catalog/{catalog_id}/templates/{}",
            urlencoding::encode(template_name)
        );
        let mut response = self.upload_once(&url_path, path).await?;
        // Same one-shot re-authentication as send(): the body is re-read
        // from disk, so the retry carries a fresh stream.
        if response.status() == StatusCode::UNAUTHORIZED {
            self.sessions.invalidate();
            response = self.upload_once(&url_path, path).await?;
        }
        let response = response.error_for_status()?;
        let wire: TaskWire = response.json().await?;
        Ok(TaskRef::new(wire.task.id, "upload_template"))
    }

    async fn list_vapps(&self, vdc_id: &str) -> Result<Vec<VappRef>> {
        self.get_json(&format!("/api/vdc/{vdc_id}/vapps")).await
    }

    async fn get_vapp(&self, vapp_id: &str) -> Result<Option<VappDetail>> {
        self.get_json_opt(&format!("/api/vapp/{vapp_id}")).await
    }

    async fn instantiate_vapp(
        &self,
        vdc_id: &str,
        params: &InstantiateParams,
    ) -> Result<TaskRef> {
        let body = serde_json::to_value(params)?;
        self.send_task(
            Method::POST,
            &format!("/api/vdc/{vdc_id}/actions/instantiate"),
            Some(&body),
            false,
            "instantiate",
        )
        .await
    }

    async fn connect_vapp_network(&self, vapp_id: &str, network: &VcdNetwork) -> Result<TaskRef> {
        let body = json!({ "network_id": network.id, "network_name": network.name });
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/networks"),
            Some(&body),
            false,
            "connect_network",
        )
        .await
    }

    async fn connect_nic(
        &self,
        vapp_id: &str,
        network_name: &str,
        nic_index: usize,
        mode: IpAllocationMode,
    ) -> Result<TaskRef> {
        let body = json!({
            "network_name": network_name,
            "connection_index": nic_index,
            "ip_allocation_mode": mode.to_string(),
        });
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/nics"),
            Some(&body),
            false,
            "connect_nic",
        )
        .await
    }

    async fn power_on(&self, vapp_id: &str) -> Result<TaskRef> {
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/power/action/powerOn"),
            None,
            false,
            "power_on",
        )
        .await
    }

    async fn power_off(&self, vapp_id: &str) -> Result<TaskRef> {
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/power/action/powerOff"),
            None,
            false,
            "power_off",
        )
        .await
    }

    async fn shutdown(&self, vapp_id: &str) -> Result<TaskRef> {
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/power/action/shutdown"),
            None,
            false,
            "shutdown",
        )
        .await
    }

    async fn reset(&self, vapp_id: &str) -> Result<TaskRef> {
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/power/action/reset"),
            None,
            false,
            "reset",
        )
        .await
    }

    async fn deploy(&self, vapp_id: &str, power_on: bool) -> Result<TaskRef> {
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/action/deploy"),
            Some(&json!({ "power_on": power_on })),
            false,
            "deploy",
        )
        .await
    }

    async fn undeploy(&self, vapp_id: &str) -> Result<TaskRef> {
        self.send_task(
            Method::POST,
            &format!("/api/vapp/{vapp_id}/action/undeploy"),
            None,
            false,
            "undeploy",
        )
        .await
    }

    async fn delete_vapp(&self, vapp_id: &str) -> Result<TaskRef> {
        self.send_task(
            Method::DELETE,
            &format!("/api/vapp/{vapp_id}"),
            None,
            false,
            "delete_vapp",
        )
        .await
    }

    async fn get_task(&self, task: &TaskRef) -> Result<TaskInfo> {
        self.get_json(&format!("/api/task/{}", task.id)).await
    }
}
