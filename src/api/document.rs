use crate::common::SessionError;
use crate::pipeline::ApiClient;
use crate::transport::RequestSpec;
use serde_json::{json, Value};

/// Document service: documents and their approval flows
pub struct DocumentApi<'a> {
    client: &'a ApiClient,
}

impl<'a> DocumentApi<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// `params` become query parameters (page, size, keyword, ...)
    pub async fn list(&self, params: &[(&str, &str)]) -> Result<Value, SessionError> {
        self.client
            .request(RequestSpec::get("/document/list").query_pairs(params))
            .await
    }

    pub async fn detail(&self, id: u64) -> Result<Value, SessionError> {
        self.client.get(format!("/document/{}", id)).await
    }

    pub async fn create(&self, document: Value) -> Result<Value, SessionError> {
        self.client.post("/document", document).await
    }

    pub async fn update(&self, id: u64, document: Value) -> Result<Value, SessionError> {
        self.client.put(format!("/document/{}", id), document).await
    }

    pub async fn delete(&self, id: u64) -> Result<Value, SessionError> {
        self.client.delete(format!("/document/{}", id)).await
    }

    pub async fn flows(&self, params: &[(&str, &str)]) -> Result<Value, SessionError> {
        self.client
            .request(RequestSpec::get("/document/flows").query_pairs(params))
            .await
    }

    pub async fn start_flow(&self, document_id: u64, flow_def_id: u64) -> Result<Value, SessionError> {
        self.client
            .post(
                "/document/flows/start",
                json!({ "documentId": document_id, "flowDefId": flow_def_id }),
            )
            .await
    }
}
