use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};

use crate::error::StorageError;
use crate::sanitize;

use super::ObjectStore;

/// Path-style GET against an S3-compatible gateway:
/// `{endpoint}/{bucket}/{key}`.
pub struct HttpStore {
    http: Client,
    endpoint: String,
    bucket: String,
    region: String,
    token: Option<SecretString>,
}

impl HttpStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        token: Option<SecretString>,
    ) -> Result<Self, StorageError> {
        let http = Client::builder()
            .user_agent("docintel/storage")
            .build()
            .map_err(|e| StorageError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            region: region.into(),
            token,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket.trim_matches('/'),
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl ObjectStore for HttpStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        if key.trim().is_empty() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "key is empty".to_string(),
            });
        }

        let mut request = self
            .http
            .get(self.object_url(key))
            .header("x-amz-bucket-region", &self.region);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await.map_err(|e| {
            StorageError::Request(format!(
                "failed to reach {}: {}",
                sanitize::redact_url(&self.endpoint),
                e.without_url()
            ))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound {
                key: key.to_string(),
            }),
            status if !status.is_success() => Err(StorageError::Request(format!(
                "GET {} returned {}",
                sanitize::redact_key(key),
                status
            ))),
            _ => {
                let bytes = response.bytes().await.map_err(|e| {
                    StorageError::Request(format!("failed to read object body: {}", e.without_url()))
                })?;
                tracing::debug!(
                    key = %sanitize::redact_key(key),
                    bytes = bytes.len(),
                    "Fetched object"
                );
                Ok(bytes.to_vec())
            }
        }
    }
}
