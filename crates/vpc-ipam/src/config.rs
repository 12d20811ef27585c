//! Plugin configuration.
//!
//! `VpcConfig` is the `vpc` block of the CNI network configuration, with the
//! same camelCase keys the plugin has always accepted. Intervals are given in
//! milliseconds. `LedgerConfig` describes the etcd cluster backing the
//! ownership ledger.

use crate::error::IpamError;
use crate::retry::{DetectPolicy, OperationPolicies, RetryPolicy};
use crate::selector::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use vpc_client::ClientOptions;
use vpc_client::client::DEFAULT_API_VERSION;

const DEFAULT_RETRY: u32 = 5;
const DEFAULT_INTERVAL_MS: u64 = 1000;
const DEFAULT_POST_CHECK_RETRY: u32 = 10;
const DEFAULT_POST_CHECK_INTERVAL_MS: u64 = 500;
const DEFAULT_DETECT_DELAY_MS: u64 = 500;

/// Default key prefix for ledger records
pub const DEFAULT_KEY_PREFIX: &str = "/vpc";

fn default_retry() -> u32 {
    DEFAULT_RETRY
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_MS
}

fn default_post_check_retry() -> u32 {
    DEFAULT_POST_CHECK_RETRY
}

fn default_post_check_interval() -> u64 {
    DEFAULT_POST_CHECK_INTERVAL_MS
}

fn default_detect_delay() -> u64 {
    DEFAULT_DETECT_DELAY_MS
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

/// Retry block for assign and release (`ipAssign`, `ipRelease`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts
    #[serde(default = "default_retry")]
    pub retry: u32,
    /// Milliseconds between attempts
    #[serde(default = "default_interval")]
    pub interval: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry: DEFAULT_RETRY,
            interval: DEFAULT_INTERVAL_MS,
        }
    }
}

impl RetryConfig {
    /// As a [`RetryPolicy`]
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry, Duration::from_millis(self.interval))
    }
}

/// Retry block for migration (`ipMigrate`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrateConfig {
    /// Outer migrate attempts
    #[serde(default = "default_retry")]
    pub retry: u32,
    /// Milliseconds between outer attempts
    #[serde(default = "default_interval")]
    pub interval: u64,
    /// Polls of the new interface after each accepted migrate call
    #[serde(default = "default_post_check_retry")]
    pub post_check_retry: u32,
    /// Milliseconds between post-check polls
    #[serde(default = "default_post_check_interval")]
    pub post_check_interval: u64,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            retry: DEFAULT_RETRY,
            interval: DEFAULT_INTERVAL_MS,
            post_check_retry: DEFAULT_POST_CHECK_RETRY,
            post_check_interval: DEFAULT_POST_CHECK_INTERVAL_MS,
        }
    }
}

/// Detection of the address bound by an assign (`ipDetect`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectConfig {
    /// Milliseconds to wait before the first poll
    #[serde(default = "default_detect_delay")]
    pub delay: u64,
    /// Polls
    #[serde(default = "default_post_check_retry")]
    pub retry: u32,
    /// Milliseconds between polls
    #[serde(default = "default_post_check_interval")]
    pub interval: u64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DETECT_DELAY_MS,
            retry: DEFAULT_POST_CHECK_RETRY,
            interval: DEFAULT_POST_CHECK_INTERVAL_MS,
        }
    }
}

/// `vpc` block of the CNI network configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VpcConfig {
    #[serde(rename = "secretID")]
    /// API key ID
    pub secret_id: String,
    /// API signing key, never logged
    pub secret_key: String,
    /// Region requests are scoped to
    pub region: String,
    #[serde(rename = "vpcID")]
    /// VPC the interfaces belong to
    pub vpc_id: String,
    /// MTU for pod interfaces
    #[serde(rename = "MTU", default)]
    pub mtu: Option<u32>,
    /// Interface selection policy
    #[serde(default)]
    pub policy: SelectionPolicy,
    #[serde(rename = "cvmAPIVersion", default = "default_api_version")]
    /// `Version` sent to the CVM API
    pub cvm_api_version: String,
    /// `Version` sent to the VPC API
    #[serde(rename = "vpcAPIVersion", default = "default_api_version")]
    pub vpc_api_version: String,
    #[serde(rename = "cvmAPIEndpoint")]
    /// CVM API host
    pub cvm_api_endpoint: String,
    /// VPC API host
    #[serde(rename = "vpcAPIEndpoint")]
    pub vpc_api_endpoint: String,
    /// Path appended to the VPC host
    #[serde(rename = "v2URL", default)]
    pub v2_uri: String,
    /// Path appended to the CVM host
    #[serde(rename = "v3URL", default)]
    pub v3_uri: String,
    /// Instance to use instead of resolving it from the node IP
    #[serde(rename = "instanceID", default)]
    pub instance_id: Option<String>,
    /// Host interface carrying pod traffic
    #[serde(default)]
    pub node_interface: Option<String>,
    /// Name prefix of host-side pod interfaces
    #[serde(default)]
    pub node_if_prefix: Option<String>,
    /// Skip TLS verification of the API endpoints
    #[serde(default)]
    pub insecure_skip_verify: bool,
    /// Assign retries
    #[serde(default)]
    pub ip_assign: RetryConfig,
    /// Release retries
    #[serde(default)]
    pub ip_release: RetryConfig,
    /// Migrate retries and post-check
    #[serde(default)]
    pub ip_migrate: MigrateConfig,
    /// Post-assign detection
    #[serde(default)]
    pub ip_detect: DetectConfig,
}

impl fmt::Debug for VpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VpcConfig")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("vpc_id", &self.vpc_id)
            .field("policy", &self.policy)
            .field("vpc_api_endpoint", &self.vpc_api_endpoint)
            .field("cvm_api_endpoint", &self.cvm_api_endpoint)
            .field("instance_id", &self.instance_id)
            .field("ip_assign", &self.ip_assign)
            .field("ip_release", &self.ip_release)
            .field("ip_migrate", &self.ip_migrate)
            .field("ip_detect", &self.ip_detect)
            .finish_non_exhaustive()
    }
}

impl VpcConfig {
    /// Parse and validate the JSON `vpc` block
    pub fn from_json(json: &str) -> Result<Self, IpamError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| IpamError::InvalidConfig(format!("failed to parse vpc config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the client cannot sign requests with
    pub fn validate(&self) -> Result<(), IpamError> {
        let required = [
            ("secretID", &self.secret_id),
            ("secretKey", &self.secret_key),
            ("region", &self.region),
            ("vpcID", &self.vpc_id),
            ("vpcAPIEndpoint", &self.vpc_api_endpoint),
            ("cvmAPIEndpoint", &self.cvm_api_endpoint),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(IpamError::InvalidConfig(format!("{} is required", key)));
            }
        }
        Ok(())
    }

    /// Options for building the signed API client
    #[must_use]
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            secret_id: self.secret_id.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
            vpc_id: self.vpc_id.clone(),
            vpc_endpoint: format!("{}{}", self.vpc_api_endpoint, self.v2_uri),
            cvm_endpoint: format!("{}{}", self.cvm_api_endpoint, self.v3_uri),
            vpc_api_version: self.vpc_api_version.clone(),
            cvm_api_version: self.cvm_api_version.clone(),
            insecure_skip_verify: self.insecure_skip_verify,
            ..Default::default()
        }
    }

    /// Retry policies for every reconciler operation
    #[must_use]
    pub fn operation_policies(&self) -> OperationPolicies {
        OperationPolicies {
            assign: self.ip_assign.policy(),
            release: self.ip_release.policy(),
            migrate: RetryPolicy::new(self.ip_migrate.retry, Duration::from_millis(self.ip_migrate.interval)),
            migrate_post_check: RetryPolicy::new(
                self.ip_migrate.post_check_retry,
                Duration::from_millis(self.ip_migrate.post_check_interval),
            ),
            detect: DetectPolicy {
                delay: Duration::from_millis(self.ip_detect.delay),
                poll: RetryPolicy::new(self.ip_detect.retry, Duration::from_millis(self.ip_detect.interval)),
            },
        }
    }
}

/// Connection settings for the etcd cluster behind the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// etcd endpoints
    pub endpoints: Vec<String>,
    /// Prefix of every ledger key
    pub key_prefix: String,
    /// CA bundle for the server certificate
    pub ca_cert_file: Option<PathBuf>,
    /// Client certificate
    pub cert_file: Option<PathBuf>,
    /// Client key
    pub key_file: Option<PathBuf>,
    /// Connect timeout
    pub dial_timeout: Duration,
    /// Keep-alive ping interval
    pub keep_alive_time: Duration,
    /// Keep-alive ping timeout
    pub keep_alive_timeout: Duration,
}

impl LedgerConfig {
    /// Build from a comma separated endpoint list
    pub fn new(endpoints: &str) -> Result<Self, IpamError> {
        let endpoints: Vec<String> = endpoints
            .split(',')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string)
            .collect();
        if endpoints.is_empty() {
            return Err(IpamError::InvalidConfig("no etcd endpoints specified".to_string()));
        }
        Ok(Self {
            endpoints,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            ca_cert_file: None,
            cert_file: None,
            key_file: None,
            dial_timeout: Duration::from_secs(10),
            keep_alive_time: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(10),
        })
    }

    /// Load from `ETCD_ENDPOINTS`, `ETCD_KEY_PREFIX`, `ETCD_CA_FILE`, `ETCD_CERT_FILE`, `ETCD_KEY_FILE`
    pub fn from_env() -> Result<Self, IpamError> {
        let endpoints = std::env::var("ETCD_ENDPOINTS").map_err(|_| {
            IpamError::InvalidConfig("ETCD_ENDPOINTS environment variable is required".to_string())
        })?;
        let mut config = Self::new(&endpoints)?;
        if let Ok(prefix) = std::env::var("ETCD_KEY_PREFIX") {
            config.key_prefix = prefix;
        }
        config.ca_cert_file = std::env::var_os("ETCD_CA_FILE").map(PathBuf::from);
        config.cert_file = std::env::var_os("ETCD_CERT_FILE").map(PathBuf::from);
        config.key_file = std::env::var_os("ETCD_KEY_FILE").map(PathBuf::from);
        Ok(config)
    }

    /// Whether client TLS material is configured
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.ca_cert_file.is_some() || self.cert_file.is_some() || self.key_file.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "secretID": "AKIDtest",
        "secretKey": "secret",
        "region": "ap-guangzhou",
        "vpcID": "vpc-1",
        "MTU": 1500,
        "policy": "Exclusive",
        "cvmAPIEndpoint": "cvm.tencentcloudapi.com",
        "vpcAPIEndpoint": "vpc.api.qcloud.com",
        "v2URL": "/v2/index.php",
        "v3URL": "/",
        "ipAssign": {"retry": 3, "interval": 200},
        "ipMigrate": {"retry": 4, "postCheckRetry": 6, "postCheckInterval": 50}
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config = VpcConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.policy, SelectionPolicy::Exclusive);
        assert_eq!(config.mtu, Some(1500));
        assert_eq!(config.vpc_api_version, DEFAULT_API_VERSION);

        let options = config.client_options();
        assert_eq!(options.vpc_endpoint, "vpc.api.qcloud.com/v2/index.php");
        assert_eq!(options.cvm_endpoint, "cvm.tencentcloudapi.com/");
    }

    #[test]
    fn test_partial_retry_blocks_fall_back_to_defaults() {
        let config = VpcConfig::from_json(CONFIG).unwrap();
        let policies = config.operation_policies();

        assert_eq!(policies.assign, RetryPolicy::new(3, Duration::from_millis(200)));
        assert_eq!(policies.release, RetryConfig::default().policy());
        assert_eq!(
            policies.migrate,
            RetryPolicy::new(4, Duration::from_millis(DEFAULT_INTERVAL_MS))
        );
        assert_eq!(policies.migrate_post_check, RetryPolicy::new(6, Duration::from_millis(50)));
        assert_eq!(policies.detect.delay, Duration::from_millis(DEFAULT_DETECT_DELAY_MS));
    }

    #[test]
    fn test_policy_defaults_to_share() {
        let json = CONFIG.replace("\"policy\": \"Exclusive\",", "");
        let config = VpcConfig::from_json(&json).unwrap();
        assert_eq!(config.policy, SelectionPolicy::Share);
    }

    #[test]
    fn test_missing_secret_rejected() {
        let json = CONFIG.replace("\"secretKey\": \"secret\"", "\"secretKey\": \"\"");
        let err = VpcConfig::from_json(&json).unwrap_err();
        assert!(err.to_string().contains("secretKey"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = VpcConfig::from_json(CONFIG).unwrap();
        assert!(!format!("{:?}", config).contains("\"secret\""));
    }

    #[test]
    fn test_ledger_endpoints() {
        let config = LedgerConfig::new("https://etcd-0:2379, https://etcd-1:2379,").unwrap();
        assert_eq!(config.endpoints, vec!["https://etcd-0:2379", "https://etcd-1:2379"]);
        assert_eq!(config.key_prefix, DEFAULT_KEY_PREFIX);
        assert!(!config.uses_tls());

        assert!(LedgerConfig::new(" , ").is_err());
    }
}
