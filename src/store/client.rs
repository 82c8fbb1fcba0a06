//! Document store HTTP client (spec §4.8, §6 "Document store API").
//!
//! Trait-based so the writer and verifier can be exercised against a fake
//! in tests without touching the network.

use crate::core::error::StoreError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait DocumentStoreClient: Send + Sync {
    async fn create_page(&self, database_id: &str, properties: Value, children: Value) -> Result<String, StoreError>;
    async fn retrieve_page(&self, page_id: &str) -> Result<Value, StoreError>;
    async fn query_database(&self, database_id: &str) -> Result<Vec<Value>, StoreError>;
}

#[derive(Clone)]
pub struct HttpStoreClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpStoreClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base_url: base_url.into(), api_key: api_key.into() }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_key).header("Notion-Version", "2022-06-28")
    }

    async fn map_response(response: reqwest::Response) -> Result<Value, StoreError> {
        let status = response.status();
        if status.as_u16() == 429 {
            return Err(StoreError::RateLimited(response.text().await.unwrap_or_default()));
        }
        if status.is_client_error() {
            return Err(StoreError::ClientError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        if status.is_server_error() {
            return Err(StoreError::ServerError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        response.json().await.map_err(|e| StoreError::Transient(e.to_string()))
    }
}

#[async_trait]
impl DocumentStoreClient for HttpStoreClient {
    async fn create_page(&self, database_id: &str, properties: Value, children: Value) -> Result<String, StoreError> {
        let body = serde_json::json!({
            "parent": { "database_id": database_id },
            "properties": properties,
            "children": children,
        });
        let request = self.client.post(format!("{}/pages", self.base_url)).json(&body);
        let response = self.auth(request).send().await.map_err(|e| StoreError::Transient(e.to_string()))?;
        let parsed = Self::map_response(response).await?;
        parsed
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(StoreError::MissingPageId)
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value, StoreError> {
        let request = self.client.get(format!("{}/pages/{}", self.base_url, page_id));
        let response = self.auth(request).send().await.map_err(|e| StoreError::Transient(e.to_string()))?;
        Self::map_response(response).await
    }

    async fn query_database(&self, database_id: &str) -> Result<Vec<Value>, StoreError> {
        let request = self.client.post(format!("{}/databases/{}/query", self.base_url, database_id)).json(&serde_json::json!({}));
        let response = self.auth(request).send().await.map_err(|e| StoreError::Transient(e.to_string()))?;
        let parsed = Self::map_response(response).await?;
        Ok(parsed.get("results").and_then(Value::as_array).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction() {
        let client = HttpStoreClient::new("https://api.example.com", "secret");
        assert_eq!(client.base_url, "https://api.example.com");
    }
}
