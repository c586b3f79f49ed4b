use super::permissions;
use super::state::{redact, Session, SessionPhase};
use super::token;
use crate::common::errors::{LOGIN_FAILED, REFRESH_FAILED};
use crate::common::SessionError;
use crate::storage::{SessionStore, StorageKey};
use crate::transport::{HttpTransport, Outcome, RequestSpec};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

pub const LOGIN_PATH: &str = "/auth/login";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const REFRESH_PATH: &str = "/auth/refresh";

/// Profile fields copied out of a login response
const PROFILE_FIELDS: [&str; 3] = ["username", "role", "email"];

/// Permission lookup path with `username` percent-encoded as one segment
pub fn user_permissions_path(username: &str) -> String {
    let segments = ["platform", "external", "users", "username", username, "permissions"];
    let Ok(mut url) = reqwest::Url::parse("http://localhost/") else {
        return format!("/{}", segments.join("/"));
    };
    if let Ok(mut path) = url.path_segments_mut() {
        path.clear().extend(segments);
    }
    url.path().to_string()
}

#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The single session of a client instance.
///
/// Shared as `Arc<SessionManager>`. In-memory state sits behind a sync lock
/// that is never held across an await; `commit` serializes
/// mutate-then-persist sections so storage converges on the in-memory copy.
/// Login, refresh and logout each advance `generation`, and a login/refresh
/// that finds a newer generation when it completes is dropped.
pub struct SessionManager {
    transport: HttpTransport,
    store: SessionStore,
    state: RwLock<Session>,
    commit: Mutex<()>,
    generation: AtomicU64,
    /// Generation of the most recent refresh
    latest_refresh: AtomicU64,
    phase: watch::Sender<SessionPhase>,
}

impl SessionManager {
    /// Build the session from whatever is persisted
    pub async fn restore(transport: HttpTransport, store: SessionStore) -> Arc<Self> {
        let access_token = store.token(StorageKey::Token).await;

        let session = if access_token.is_empty() {
            // leftovers without a token break the logged-out invariant
            if store.get(StorageKey::User).await.is_some()
                || store.get(StorageKey::Perms).await.is_some()
                || store.get(StorageKey::RefreshToken).await.is_some()
            {
                tracing::debug!("dropping stale session keys without a token");
                store.clear().await;
            }
            Session::default()
        } else {
            Session {
                access_token,
                refresh_token: store.token(StorageKey::RefreshToken).await,
                user: store.user().await,
                permissions: store.perms().await,
            }
        };

        tracing::debug!(
            authenticated = session.is_authenticated(),
            token = %redact(&session.access_token),
            "session restored"
        );

        let (phase, _) = watch::channel(session.phase());
        Arc::new(Self {
            transport,
            store,
            state: RwLock::new(session),
            commit: Mutex::new(()),
            generation: AtomicU64::new(0),
            latest_refresh: AtomicU64::new(0),
            phase,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_phase(&self, phase: SessionPhase) {
        self.phase.send_replace(phase);
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    //----------------
    // READS
    //----------------
    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }

    pub fn access_token(&self) -> String {
        self.read().access_token.clone()
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.read().refresh_token.is_empty()
    }

    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    pub fn user(&self) -> Map<String, Value> {
        self.read().user.clone()
    }

    pub fn permissions(&self) -> BTreeSet<String> {
        self.read().permissions.clone()
    }

    pub fn has_perm(&self, code: &str) -> bool {
        permissions::has_perm(&self.read().permissions, code)
    }

    pub fn require_perm(&self, code: &str) -> Result<(), SessionError> {
        permissions::require_perm(&self.read().permissions, code)
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions (LoggedOut / LoggedIn / Refreshing)
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// `exp` of the current access token, when it is a JWT
    pub fn token_expires_at(&self) -> Option<u64> {
        token::expires_at(&self.read().access_token)
    }

    pub fn is_token_expiring_soon(&self, leeway: Duration) -> bool {
        token::is_expiring_soon(&self.read().access_token, leeway)
    }

    //----------------
    // LOGIN
    //----------------
    pub async fn login(&self, credentials: &Credentials) -> Result<(), SessionError> {
        let generation = self.begin();
        let spec = RequestSpec::post(LOGIN_PATH).json(json!(credentials));

        let outcome = self.transport.execute(&spec, None).await?;
        if !outcome.ok {
            let message = outcome.message_or(LOGIN_FAILED);
            tracing::info!(username = %credentials.username, status = outcome.status.as_u16(), "login rejected");
            return Err(SessionError::AuthFailure(message));
        }

        let Some(access_token) = outcome.token.clone() else {
            return Err(SessionError::AuthFailure(outcome.message_or(LOGIN_FAILED)));
        };
        let refresh_token = string_field(&outcome.data, "refreshToken").unwrap_or_default();
        let user = profile_from(&outcome.data);
        let username = user
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| credentials.username.clone());

        {
            let _commit = self.commit.lock().await;
            if !self.is_current(generation) {
                return Err(SessionError::Superseded);
            }
            {
                let mut state = self.write();
                state.access_token = access_token.clone();
                state.refresh_token = refresh_token.clone();
                state.user = user.clone();
                state.permissions = BTreeSet::new();
            }
            self.persist_tokens(&access_token, &refresh_token).await;
            self.store.set_user(&user).await;
            self.store.set_perms(&BTreeSet::new()).await;
            self.set_phase(SessionPhase::LoggedIn);
        }

        tracing::info!(username = %username, token = %redact(&access_token), "logged in");

        let perms = self.fetch_permissions(&username, &access_token).await;

        let _commit = self.commit.lock().await;
        if self.is_current(generation) {
            self.write().permissions = perms.clone();
            self.store.set_perms(&perms).await;
        }
        Ok(())
    }

    /// Best-effort permission lookup. Any failure gives the empty set.
    async fn fetch_permissions(&self, username: &str, access_token: &str) -> BTreeSet<String> {
        let spec = RequestSpec::get(user_permissions_path(username));
        match self.transport.execute(&spec, Some(access_token)).await {
            Ok(outcome) if outcome.ok => match permissions::parse_codes(&outcome.data) {
                Some(codes) => {
                    tracing::debug!(count = codes.len(), "permissions loaded");
                    codes
                }
                None => {
                    tracing::warn!("permission payload not understood, using empty set");
                    BTreeSet::new()
                }
            },
            Ok(outcome) => {
                tracing::warn!(
                    status = outcome.status.as_u16(),
                    server_message = ?outcome.message,
                    "permission fetch rejected, using empty set"
                );
                BTreeSet::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "permission fetch failed, using empty set");
                BTreeSet::new()
            }
        }
    }

    //----------------
    // LOGOUT
    //----------------
    /// Always succeeds locally. Safe to call with no session.
    pub async fn logout(&self) {
        self.begin();
        let token = self.access_token();

        if !token.is_empty() {
            let spec = RequestSpec::post(LOGOUT_PATH);
            match self.transport.execute(&spec, Some(&token)).await {
                Ok(outcome) if !outcome.ok => {
                    tracing::debug!(status = outcome.status.as_u16(), "logout call rejected, ignoring")
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(error = %e, "logout call failed, ignoring"),
            }
        }

        let _commit = self.commit.lock().await;
        self.write().clear();
        self.store.clear().await;
        self.set_phase(SessionPhase::LoggedOut);

        if !token.is_empty() {
            tracing::info!("logged out");
        }
    }

    //----------------
    // REFRESH
    //----------------
    /// Trade the refresh token for a new pair. Any failure ends the session.
    pub async fn refresh_session(&self) -> Result<String, SessionError> {
        let refresh_token = self.read().refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(SessionError::NoRefreshToken);
        }

        let generation = self.begin();
        self.latest_refresh.store(generation, Ordering::SeqCst);
        self.set_phase(SessionPhase::Refreshing);

        let spec = RequestSpec::post(REFRESH_PATH)
            .query("refreshToken", refresh_token.clone())
            .json(json!({ "refreshToken": refresh_token }));

        let result = match self.transport.execute(&spec, None).await {
            Ok(outcome) => Self::refreshed_tokens(outcome),
            Err(e) => Err(e),
        };

        match result {
            Ok((access_token, next_refresh)) => {
                let _commit = self.commit.lock().await;
                if !self.is_current(generation) {
                    return Err(self.refresh_superseded(generation));
                }
                let next_refresh = next_refresh.unwrap_or(refresh_token);
                {
                    let mut state = self.write();
                    state.access_token = access_token.clone();
                    state.refresh_token = next_refresh.clone();
                }
                self.persist_tokens(&access_token, &next_refresh).await;
                self.set_phase(SessionPhase::LoggedIn);
                tracing::info!(token = %redact(&access_token), "session refreshed");
                Ok(access_token)
            }
            Err(e) => {
                if !self.is_current(generation) {
                    let _commit = self.commit.lock().await;
                    return Err(self.refresh_superseded(generation));
                }
                tracing::warn!(error = %e, "refresh failed, ending session");
                self.logout().await;
                Err(e)
            }
        }
    }

    /// Called under `commit`. Hands the phase back to the session state
    /// unless a newer refresh now owns `Refreshing`.
    fn refresh_superseded(&self, generation: u64) -> SessionError {
        if self.latest_refresh.load(Ordering::SeqCst) == generation {
            let phase = self.read().phase();
            self.set_phase(phase);
        }
        tracing::debug!("refresh superseded by a newer session operation");
        SessionError::Superseded
    }

    fn refreshed_tokens(outcome: Outcome) -> Result<(String, Option<String>), SessionError> {
        if !outcome.ok {
            return Err(SessionError::AuthFailure(outcome.message_or(REFRESH_FAILED)));
        }
        let access_token = outcome
            .token
            .clone()
            .ok_or_else(|| SessionError::AuthFailure(outcome.message_or(REFRESH_FAILED)))?;
        Ok((access_token, string_field(&outcome.data, "refreshToken")))
    }

    //----------------
    // USER
    //----------------
    /// Shallow-merge `partial` into the user and persist it.
    /// Ignored while logged out.
    pub async fn update_user(&self, partial: Map<String, Value>) {
        let _commit = self.commit.lock().await;
        let merged = {
            let mut state = self.write();
            if !state.is_authenticated() {
                tracing::debug!("update_user while logged out, ignoring");
                return;
            }
            state.merge_user(partial);
            state.user.clone()
        };
        self.store.set_user(&merged).await;
    }

    /// Replace the user wholesale (profile refetch)
    pub async fn replace_user(&self, user: Map<String, Value>) {
        let _commit = self.commit.lock().await;
        {
            let mut state = self.write();
            if !state.is_authenticated() {
                return;
            }
            state.user = user.clone();
        }
        self.store.set_user(&user).await;
    }

    async fn persist_tokens(&self, access_token: &str, refresh_token: &str) {
        self.store.set(StorageKey::Token, access_token).await;
        if refresh_token.is_empty() {
            self.store.remove(StorageKey::RefreshToken).await;
        } else {
            self.store.set(StorageKey::RefreshToken, refresh_token).await;
        }
    }
}

fn string_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `data.user` when the server nests it, else the flat profile fields
fn profile_from(data: &Value) -> Map<String, Value> {
    if let Some(user) = data.get("user").and_then(Value::as_object) {
        return user.clone();
    }
    PROFILE_FIELDS
        .iter()
        .filter_map(|key| {
            data.get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}
