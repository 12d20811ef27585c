//! Common utilities for the VPC API client
//!
//! Provides request building, signing and execution shared by every API call.

pub mod signature;

use crate::error::VpcError;
use reqwest::Client;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Signature method advertised to the API
pub const SIGNATURE_METHOD: &str = "HmacSHA1";

/// Value of the `RequestClient` parameter
pub const REQUEST_CLIENT: &str = concat!("vpc-client-rs/", env!("CARGO_PKG_VERSION"));

/// Parameters the CVM API only honours as `Filters.N.*`
const USABLE_FILTERS: &[&str] = &["private-ip-address"];

/// The two API surfaces a request can target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiSurface {
    /// Network API (interfaces and private IPs), v2 style
    Vpc,
    /// Compute API (instances), v3 style
    Cvm,
}

/// Account credentials used to sign requests
#[derive(Clone, Default)]
pub struct Credentials {
    pub secret_id: String,
    pub secret_key: String,
    pub region: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

/// HTTP client wrapper that signs and executes API requests
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    credentials: Credentials,
    vpc_endpoint: String,
    cvm_endpoint: String,
}

impl HttpClient {
    /// Create a new HTTP client wrapper
    ///
    /// Endpoints are `host/path` without a scheme, e.g. `vpc.api.qcloud.com/v2/index.php`;
    /// a leading `https://` is stripped.
    #[must_use]
    pub fn new(client: Client, credentials: Credentials, vpc_endpoint: &str, cvm_endpoint: &str) -> Self {
        Self {
            client,
            credentials,
            vpc_endpoint: strip_scheme(vpc_endpoint),
            cvm_endpoint: strip_scheme(cvm_endpoint),
        }
    }

    /// Endpoint (`host/path`) serving the given surface
    #[must_use]
    pub fn endpoint(&self, surface: ApiSurface) -> &str {
        match surface {
            ApiSurface::Vpc => &self.vpc_endpoint,
            ApiSurface::Cvm => &self.cvm_endpoint,
        }
    }

    /// Fill in the common parameters, sign, and return the encoded query string
    pub fn signed_query(
        &self,
        surface: ApiSurface,
        mut params: BTreeMap<String, String>,
        nonce: u32,
        timestamp: i64,
    ) -> Result<String, VpcError> {
        format_filters(&mut params);
        self.merge_common_params(&mut params, nonce, timestamp);
        let signature = signature::sign(&self.credentials.secret_key, "GET", self.endpoint(surface), &params)?;
        params.insert("Signature".to_string(), signature);
        Ok(encode_query(&params))
    }

    fn merge_common_params(&self, params: &mut BTreeMap<String, String>, nonce: u32, timestamp: i64) {
        let common = [
            ("Nonce", nonce.to_string()),
            ("Region", self.credentials.region.clone()),
            ("SecretId", self.credentials.secret_id.clone()),
            ("Timestamp", timestamp.to_string()),
            ("SignatureMethod", SIGNATURE_METHOD.to_string()),
            ("RequestClient", REQUEST_CLIENT.to_string()),
        ];
        for (key, value) in common {
            let slot = params.entry(key.to_string()).or_default();
            if slot.is_empty() {
                *slot = value;
            }
        }
    }

    /// Sign and execute a request, returning the raw response body
    pub async fn execute(
        &self,
        surface: ApiSurface,
        params: BTreeMap<String, String>,
    ) -> Result<Vec<u8>, VpcError> {
        let action = params.get("Action").cloned().unwrap_or_default();
        let query = self.signed_query(surface, params, rand::random::<u32>(), chrono::Utc::now().timestamp())?;
        let endpoint = self.endpoint(surface);
        debug!("GET {} Action={}", endpoint, action);

        let response = self
            .client
            .get(format!("https://{}?{}", endpoint, query))
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(VpcError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VpcError::Api {
                code: i64::from(status.as_u16()),
                message: format!("{} failed: {} - {}", action, status, body),
            });
        }

        let body = response.bytes().await.map_err(VpcError::Http)?;
        Ok(body.to_vec())
    }
}

/// Move filterable parameters into the `Filters.N.Name` / `Filters.N.Values.0` form
pub fn format_filters(params: &mut BTreeMap<String, String>) {
    let mut index = 0;
    for name in USABLE_FILTERS {
        let Some(value) = params.remove(*name) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        params.insert(format!("Filters.{}.Name", index), (*name).to_string());
        params.insert(format!("Filters.{}.Values.0", index), value);
        index += 1;
    }
}

/// Build a URL-encoded query string from parameters
#[must_use]
pub fn encode_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn strip_scheme(endpoint: &str) -> String {
    endpoint
        .trim()
        .trim_start_matches("https://")
        .to_string()
}
