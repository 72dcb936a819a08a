//! Session Manager
//!
//! Authenticates against the remote VIM and hands out session tokens.
//! `connect` serves tenant-scoped calls; `connect_privileged` serves
//! provider-level operations such as VDC and network-template instantiation.
//! A still-valid session is cached to avoid redundant authentication; the
//! HTTP client invalidates the cache on an authorization failure and retries,
//! so re-authentication stays transparent to callers.

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// A credential set for one principal
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    /// Organization the principal authenticates against
    pub org: String,
}

impl Credentials {
    /// Identity used in connection errors and logs, never the password.
    pub fn principal(&self) -> String {
        format!("{}@{}", self.username, self.org)
    }
}

/// An established VIM session
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    /// Organization endpoint bound to the session
    pub org_url: String,
    pub established: DateTime<Utc>,
}

/// Port for the authentication call, swappable in tests
#[async_trait]
pub trait Authenticate: Send + Sync {
    async fn authenticate(&self, creds: &Credentials) -> Result<Session>;
}

/// Holds and re-establishes sessions on demand
pub struct SessionManager {
    auth: Arc<dyn Authenticate>,
    user: Credentials,
    admin: Option<Credentials>,
    cached: RwLock<Option<Session>>,
    cached_admin: RwLock<Option<Session>>,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn Authenticate>, user: Credentials, admin: Option<Credentials>) -> Self {
        Self {
            auth,
            user,
            admin,
            cached: RwLock::new(None),
            cached_admin: RwLock::new(None),
        }
    }

    /// Session with read privilege (tenant-scoped principal).
    pub async fn connect(&self) -> Result<Session> {
        if let Some(session) = self.cached.read().clone() {
            debug!("Reusing session for {}", self.user.principal());
            return Ok(session);
        }
        let session = self.auth.authenticate(&self.user).await?;
        info!("Established VIM session for {}", self.user.principal());
        *self.cached.write() = Some(session.clone());
        Ok(session)
    }

    /// Session with elevated privilege (provider-level principal).
    pub async fn connect_privileged(&self) -> Result<Session> {
        let admin = self.admin.as_ref().ok_or_else(|| {
            Error::Configuration(
                "privileged credentials not configured; set admin_username/admin_password".into(),
            )
        })?;
        if let Some(session) = self.cached_admin.read().clone() {
            debug!("Reusing privileged session for {}", admin.principal());
            return Ok(session);
        }
        let session = self
            .auth
            .authenticate(admin)
            .await
            .map_err(|err| match err {
                Error::Connection {
                    principal,
                    reason,
                    hint: None,
                } => Error::Connection {
                    principal,
                    reason,
                    hint: Some(
                        "privileged calls authenticate against the System organization".into(),
                    ),
                },
                other => other,
            })?;
        info!("Established privileged VIM session for {}", admin.principal());
        *self.cached_admin.write() = Some(session.clone());
        Ok(session)
    }

    /// Drop cached sessions so the next connect re-authenticates.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
        *self.cached_admin.write() = None;
    }
}
