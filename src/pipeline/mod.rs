//! Request pipeline: credentials out, failure handling in.
//!
//! Every authenticated call in the crate goes through [`ApiClient::request`].
//! Before sending it attaches the bearer token (refreshing first when the
//! token is about to expire). After receiving it classifies the response; a
//! 401 tears the session down and redirects to the login entry point, every
//! other failure is surfaced through the [`Notifier`] without touching the
//! session.

mod notifier;

pub use notifier::{ChannelNotifier, Notifier, TracingNotifier, UiEvent};

use crate::common::errors::{NETWORK_FAILED, REQUEST_FAILED, UNAUTHORIZED};
use crate::common::{ClientConfig, SessionError};
use crate::session::SessionManager;
use crate::transport::{Outcome, RequestSpec};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Knobs the pipeline reads from `ClientConfig`
#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub login_path: String,
    pub refresh_on_unauthorized: bool,
    pub proactive_refresh: bool,
    pub refresh_leeway: Duration,
}

impl From<&ClientConfig> for PipelineOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            login_path: config.login_path.clone(),
            refresh_on_unauthorized: config.refresh_on_unauthorized,
            proactive_refresh: config.proactive_refresh,
            refresh_leeway: config.refresh_leeway(),
        }
    }
}

/// Fallback text when a failed response carries no message
pub fn status_message(status: StatusCode) -> &'static str {
    match status {
        StatusCode::UNAUTHORIZED => UNAUTHORIZED,
        StatusCode::FORBIDDEN => "Access denied",
        StatusCode::NOT_FOUND => "Requested resource not found",
        StatusCode::INTERNAL_SERVER_ERROR => "Internal server error",
        _ => REQUEST_FAILED,
    }
}

#[derive(Clone)]
pub struct ApiClient {
    session: Arc<SessionManager>,
    notifier: Arc<dyn Notifier>,
    options: PipelineOptions,
}

impl ApiClient {
    pub fn new(
        session: Arc<SessionManager>,
        notifier: Arc<dyn Notifier>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            session,
            notifier,
            options,
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Send through the pipeline and return the normalized payload
    pub async fn request(&self, spec: RequestSpec) -> Result<Value, SessionError> {
        let mut retried = false;

        loop {
            let bearer = self.before_request().await?;

            let outcome = match self
                .session
                .transport()
                .execute(&spec, bearer.as_deref())
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.notifier.error(NETWORK_FAILED);
                    return Err(e);
                }
            };

            if outcome.ok {
                return Ok(outcome.data);
            }

            if outcome.status == StatusCode::UNAUTHORIZED {
                if self.can_retry_after_refresh(bearer.as_deref(), retried) {
                    retried = true;
                    match self.session.refresh_session().await {
                        Ok(_) => {
                            tracing::debug!(path = %spec.path, "retrying after refresh");
                            continue;
                        }
                        // a concurrent refresh or login took over, retry with its token
                        Err(SessionError::Superseded) if self.session.is_authenticated() => {
                            tracing::debug!(path = %spec.path, "refresh superseded, retrying with current token");
                            continue;
                        }
                        Err(e) => tracing::debug!(error = %e, "reactive refresh failed"),
                    }
                }
                return Err(self.unauthorized().await);
            }

            return Err(self.failure(outcome));
        }
    }

    pub async fn get(&self, path: impl Into<String>) -> Result<Value, SessionError> {
        self.request(RequestSpec::get(path)).await
    }

    pub async fn post(&self, path: impl Into<String>, body: Value) -> Result<Value, SessionError> {
        self.request(RequestSpec::post(path).json(body)).await
    }

    pub async fn put(&self, path: impl Into<String>, body: Value) -> Result<Value, SessionError> {
        self.request(RequestSpec::put(path).json(body)).await
    }

    pub async fn delete(&self, path: impl Into<String>) -> Result<Value, SessionError> {
        self.request(RequestSpec::delete(path)).await
    }

    /// Bearer token for the next request, refreshed first when it is close
    /// to expiry. None = send unauthenticated.
    async fn before_request(&self) -> Result<Option<String>, SessionError> {
        if !self.session.is_authenticated() {
            return Ok(None);
        }

        if self.options.proactive_refresh
            && self.session.has_refresh_token()
            && self
                .session
                .is_token_expiring_soon(self.options.refresh_leeway)
        {
            tracing::debug!("access token close to expiry, refreshing first");
            match self.session.refresh_session().await {
                Ok(token) => return Ok(Some(token)),
                // another login/refresh won, use whatever it left
                Err(SessionError::Superseded) => {}
                Err(_) => return Err(self.unauthorized().await),
            }
        }

        let token = self.session.access_token();
        Ok((!token.is_empty()).then_some(token))
    }

    fn can_retry_after_refresh(&self, bearer: Option<&str>, retried: bool) -> bool {
        self.options.refresh_on_unauthorized
            && !retried
            && bearer.is_some()
            && self.session.has_refresh_token()
    }

    /// 401 with no way back: end the session and send the user to login
    async fn unauthorized(&self) -> SessionError {
        tracing::info!(location = %self.options.login_path, "unauthorized, ending session");
        self.session.logout().await;
        self.notifier.error(UNAUTHORIZED);
        self.notifier.redirect(&self.options.login_path).await;
        SessionError::Unauthorized
    }

    fn failure(&self, outcome: Outcome) -> SessionError {
        let message = outcome.message_or(status_message(outcome.status));
        tracing::debug!(status = outcome.status.as_u16(), reason = %message, "request rejected");
        self.notifier.error(&message);
        SessionError::Api {
            status: outcome.status,
            message,
        }
    }
}
