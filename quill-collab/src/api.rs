//! REST reads that bootstrap a document session.
//!
//! The hub only pushes changes; the initial block list and the user's role
//! come from the HTTP API. [`DocumentApi`] is the seam sessions depend on so
//! tests can substitute canned data.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quill_core::{Block, DocumentId, UserDocument};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;

/// `since` value that selects every block of a document.
pub const EPOCH: &str = "1970-01-01T00:00:00.000Z";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no access credential stored")]
    MissingCredential,

    /// The credential was rejected; the user must log in again
    #[error("credential rejected ({0})")]
    Unauthorized(StatusCode),

    #[error("server error {status}: {message}")]
    Status { status: u16, message: String },
}

/// Read side of the document REST API.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Blocks of a document changed since `since` (ISO-8601), in document order.
    async fn blocks_by_document(&self, document_id: DocumentId, since: &str) -> Result<Vec<Block>, ApiError>;

    /// Every document the current user belongs to, with their role.
    async fn my_documents(&self) -> Result<Vec<UserDocument>, ApiError>;
}

/// [`DocumentApi`] over HTTP with bearer authentication.
pub struct HttpDocumentApi {
    base_url: String,
    credentials: Arc<CredentialStore>,
    client: Client,
}

impl HttpDocumentApi {
    pub fn new(config: &ClientConfig, credentials: Arc<CredentialStore>) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, ApiError> {
        // Read per request so a refreshed token is picked up.
        let token = self
            .credentials
            .access_token()
            .ok_or(ApiError::MissingCredential)?;

        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .query(query)
            .send()
            .await?;
        handle_response(response).await
    }
}

#[async_trait]
impl DocumentApi for HttpDocumentApi {
    async fn blocks_by_document(&self, document_id: DocumentId, since: &str) -> Result<Vec<Block>, ApiError> {
        self.get_json(&format!("/block/{document_id}"), &[("from", since)])
            .await
    }

    async fn my_documents(&self) -> Result<Vec<UserDocument>, ApiError> {
        self.get_json("/document/my", &[]).await
    }
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
        return Err(ApiError::Unauthorized(status));
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response.json().await?)
}
