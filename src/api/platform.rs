use crate::common::SessionError;
use crate::pipeline::ApiClient;
use serde_json::{json, Value};

/// User / role / permission administration on the platform service
pub struct PlatformApi<'a> {
    client: &'a ApiClient,
}

impl<'a> PlatformApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    // users
    pub async fn list_users(&self) -> Result<Value, SessionError> {
        self.client.get("/platform/users").await
    }

    pub async fn get_user(&self, id: u64) -> Result<Value, SessionError> {
        self.client.get(format!("/platform/users/{}", id)).await
    }

    pub async fn create_user(&self, user: Value) -> Result<Value, SessionError> {
        self.client.post("/platform/users", user).await
    }

    pub async fn update_user(&self, id: u64, user: Value) -> Result<Value, SessionError> {
        self.client.put(format!("/platform/users/{}", id), user).await
    }

    pub async fn delete_user(&self, id: u64) -> Result<Value, SessionError> {
        self.client.delete(format!("/platform/users/{}", id)).await
    }

    pub async fn grant_user_roles(&self, id: u64, role_ids: &[u64]) -> Result<Value, SessionError> {
        self.client
            .post(format!("/platform/users/{}/roles", id), json!(role_ids))
            .await
    }

    // roles
    pub async fn list_roles(&self) -> Result<Value, SessionError> {
        self.client.get("/platform/roles").await
    }

    pub async fn create_role(&self, role: Value) -> Result<Value, SessionError> {
        self.client.post("/platform/roles", role).await
    }

    pub async fn update_role(&self, id: u64, role: Value) -> Result<Value, SessionError> {
        self.client.put(format!("/platform/roles/{}", id), role).await
    }

    pub async fn delete_role(&self, id: u64) -> Result<Value, SessionError> {
        self.client.delete(format!("/platform/roles/{}", id)).await
    }

    pub async fn grant_role_perms(&self, id: u64, perm_ids: &[u64]) -> Result<Value, SessionError> {
        self.client
            .post(format!("/platform/roles/{}/permissions", id), json!(perm_ids))
            .await
    }

    // permissions
    pub async fn list_perms(&self) -> Result<Value, SessionError> {
        self.client.get("/platform/permissions").await
    }

    pub async fn create_perm(&self, perm: Value) -> Result<Value, SessionError> {
        self.client.post("/platform/permissions", perm).await
    }

    pub async fn update_perm(&self, id: u64, perm: Value) -> Result<Value, SessionError> {
        self.client
            .put(format!("/platform/permissions/{}", id), perm)
            .await
    }

    pub async fn delete_perm(&self, id: u64) -> Result<Value, SessionError> {
        self.client
            .delete(format!("/platform/permissions/{}", id))
            .await
    }
}
