//! AWS Signature Version 4 request signing
//!
//! The image API authenticates every call with SigV4. Only the subset the
//! deployer needs is implemented: bodiless requests signed over the `host`
//! and `x-amz-date` headers.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use url::Url;

use crate::errors::DeployError;
use crate::utils::uri_encode;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SIGNED_HEADERS: &str = "host;x-amz-date";

/// Headers that authenticate one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub x_amz_date: String,
    pub authorization: String,
}

/// Signs outgoing requests
pub trait RequestSigner: Send + Sync {
    fn sign(
        &self,
        method: &http::Method,
        url: &Url,
        at: DateTime<Utc>,
    ) -> Result<SignedHeaders, DeployError>;
}

/// SigV4 signer bound to one key pair, region and service
pub struct SigV4Signer {
    access_key: String,
    secret_key: SecretString,
    region: String,
    service: String,
}

impl SigV4Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: SecretString,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key,
            region: region.into(),
            service: service.into(),
        }
    }

    fn canonical_request(method: &http::Method, url: &Url, host: &str, amz_date: &str) -> String {
        format!(
            "{}\n{}\n{}\nhost:{}\nx-amz-date:{}\n\n{}\n{}",
            method.as_str(),
            canonical_path(url),
            canonical_query(url),
            host,
            amz_date,
            SIGNED_HEADERS,
            hex::encode(Sha256::digest(b"")),
        )
    }

    fn signing_key(&self, date: &str) -> Result<Vec<u8>, DeployError> {
        let secret = format!("AWS4{}", self.secret_key.expose_secret());
        let k_date = hmac_sha256(secret.as_bytes(), date.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        hmac_sha256(&k_service, b"aws4_request")
    }
}

impl RequestSigner for SigV4Signer {
    fn sign(
        &self,
        method: &http::Method,
        url: &Url,
        at: DateTime<Utc>,
    ) -> Result<SignedHeaders, DeployError> {
        let host = host_header(url)?;
        let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
        let date = at.format("%Y%m%d").to_string();
        let scope = format!("{}/{}/{}/aws4_request", date, self.region, self.service);

        let canonical_request = Self::canonical_request(method, url, &host, &amz_date);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            scope,
            hex::encode(Sha256::digest(canonical_request.as_bytes())),
        );

        let signature = hex::encode(hmac_sha256(
            &self.signing_key(&date)?,
            string_to_sign.as_bytes(),
        )?);

        Ok(SignedHeaders {
            x_amz_date: amz_date,
            authorization: format!(
                "{} Credential={}/{}, SignedHeaders={}, Signature={}",
                ALGORITHM, self.access_key, scope, SIGNED_HEADERS, signature
            ),
        })
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, DeployError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| DeployError::CredentialsError(format!("invalid signing key: {}", e)))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn host_header(url: &Url) -> Result<String, DeployError> {
    let host = url
        .host_str()
        .ok_or_else(|| DeployError::ConfigError(format!("URL has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Query parameters sorted by name then value, each side URI-encoded
pub fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (uri_encode(&k), uri_encode(&v)))
        .collect();
    pairs.sort();

    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical URI for non-S3 services: every segment of the already
/// percent-encoded path is encoded a second time
pub fn canonical_path(url: &Url) -> String {
    match url.path() {
        "" | "/" => "/".to_string(),
        path => path.split('/').map(uri_encode).collect::<Vec<_>>().join("/"),
    }
}
