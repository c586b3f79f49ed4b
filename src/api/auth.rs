use crate::common::SessionError;
use crate::pipeline::ApiClient;
use crate::session::Credentials;
use crate::transport::RequestSpec;
use serde_json::{Map, Value};

pub const USER_INFO_PATH: &str = "/auth/user";
pub const VALIDATE_PATH: &str = "/auth/validate";
pub const USERS_PATH: &str = "/auth/users";

/// Auth service calls. Login, logout and refresh live on the session itself.
pub struct AuthApi<'a> {
    client: &'a ApiClient,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<(), SessionError> {
        self.client.session().login(credentials).await
    }

    pub async fn logout(&self) {
        self.client.session().logout().await
    }

    /// Refetch the profile and replace the stored user with it
    pub async fn fetch_user_info(&self) -> Result<Map<String, Value>, SessionError> {
        let data = self.client.get(USER_INFO_PATH).await?;
        let Value::Object(mut user) = data else {
            return Err(SessionError::Decode(format!("user info is not an object: {}", data)));
        };
        // never keep a password hash around, even a null one
        user.remove("password");

        self.client.session().replace_user(user.clone()).await;
        Ok(user)
    }

    /// Ask the auth service whether the current access token is still valid
    pub async fn validate_token(&self) -> Result<bool, SessionError> {
        let token = self.client.session().access_token();
        if token.is_empty() {
            return Ok(false);
        }
        let data = self
            .client
            .request(RequestSpec::get(VALIDATE_PATH).query("token", token))
            .await?;

        data.as_bool()
            .ok_or_else(|| SessionError::Decode(format!("validate returned {}", data)))
    }

    //----------------
    // ADMIN
    //----------------
    pub async fn list_users(&self) -> Result<Value, SessionError> {
        self.client.get(USERS_PATH).await
    }

    /// The auth service reads the new user from query parameters, not a body
    pub async fn add_user(&self, params: &[(&str, &str)]) -> Result<Value, SessionError> {
        self.client
            .request(RequestSpec::post(USERS_PATH).query_pairs(params))
            .await
    }
}
