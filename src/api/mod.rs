//! Service entry points, all routed through the request pipeline.

mod auth;
mod document;
mod platform;

pub use auth::{AuthApi, USERS_PATH, USER_INFO_PATH, VALIDATE_PATH};
pub use document::DocumentApi;
pub use platform::PlatformApi;

use crate::common::{ClientConfig, SessionError};
use crate::pipeline::{ApiClient, Notifier, PipelineOptions};
use crate::session::SessionManager;
use crate::storage::{SessionStore, Storage};
use crate::transport::HttpTransport;
use std::sync::Arc;

/// One client instance: its session, its pipeline and the service wrappers
#[derive(Clone)]
pub struct OaClient {
    api: ApiClient,
}

impl OaClient {
    /// Restore the session from `storage` and wire up the pipeline
    pub async fn connect(
        config: &ClientConfig,
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, SessionError> {
        let transport = HttpTransport::new(config)?;
        let session = SessionManager::restore(transport, SessionStore::new(storage)).await;
        let api = ApiClient::new(session, notifier, PipelineOptions::from(config));
        Ok(Self { api })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        self.api.session()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(&self.api)
    }

    pub fn platform(&self) -> PlatformApi<'_> {
        PlatformApi::new(&self.api)
    }

    pub fn document(&self) -> DocumentApi<'_> {
        DocumentApi::new(&self.api)
    }
}
