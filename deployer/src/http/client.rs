//! HTTP client implementation

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::authn::sigv4::RequestSigner;
use crate::errors::DeployError;
use crate::utils::encode_query;

/// Signed HTTP client for the image API
pub struct CfpClient {
    client: Client,
    base_url: Url,
    signer: Arc<dyn RequestSigner>,
}

impl CfpClient {
    /// Create a new client for `https://<host>/cfp/v1`
    pub fn new(
        host: &str,
        signer: Arc<dyn RequestSigner>,
        timeout: Duration,
    ) -> Result<Self, DeployError> {
        Self::with_base_url(&format!("https://{}/cfp/v1", host), signer, timeout)
    }

    /// Create a new client against an explicit base URL
    pub fn with_base_url(
        base_url: &str,
        signer: Arc<dyn RequestSigner>,
        timeout: Duration,
    ) -> Result<Self, DeployError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DeployError::http)?;
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| DeployError::ConfigError(format!("invalid API URL {}: {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            signer,
        })
    }

    /// Full request URL with the query encoded the same way it is signed
    pub fn request_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, DeployError> {
        let mut url = self.base_url.clone();
        url.set_path(&format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        ));

        let query = encode_query(query);
        url.set_query((!query.is_empty()).then_some(query.as_str()));
        Ok(url)
    }

    /// Make a signed GET request
    pub async fn get<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, DeployError> {
        let url = self.request_url(path, query)?;
        debug!("GET {}{} ({})", self.base_url, path, operation);

        let signed = self.signer.sign(&http::Method::GET, &url, Utc::now())?;

        let response = self
            .client
            .get(url)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("x-amz-date", signed.x_amz_date)
            .header(header::AUTHORIZATION, signed.authorization)
            .send()
            .await
            .map_err(DeployError::http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET {} failed: {} - {}", operation, status, body);
            return Err(DeployError::Transport {
                operation: operation.to_string(),
                status,
                body,
            });
        }

        let body = response.text().await.map_err(DeployError::http)?;
        serde_json::from_str(&body).map_err(|e| {
            DeployError::InvalidResponse(format!("{}: {} in {}", operation, e, body))
        })
    }
}
