//! VPC API client
//!
//! Implements the network interface queries and private IP actions of the
//! VPC API, plus the single CVM call needed to resolve a node's instance.
//! Every mutating action is issued exactly once; retry policy belongs to the caller.

use crate::common::{ApiSurface, Credentials, HttpClient};
use crate::error::VpcError;
use crate::models::*;
use crate::vpc_trait::VpcClientTrait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// API version sent when none is configured
pub const DEFAULT_API_VERSION: &str = "2017-03-12";

/// Options for building a [`VpcClient`]
#[derive(Clone)]
pub struct ClientOptions {
    pub secret_id: String,
    pub secret_key: String,
    pub region: String,
    pub vpc_id: String,
    /// `host/path` of the VPC API, e.g. `vpc.api.qcloud.com/v2/index.php`
    pub vpc_endpoint: String,
    /// `host/path` of the CVM API
    pub cvm_endpoint: String,
    pub vpc_api_version: String,
    pub cvm_api_version: String,
    /// Skip TLS certificate verification (private endpoints only)
    pub insecure_skip_verify: bool,
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            secret_id: String::new(),
            secret_key: String::new(),
            region: String::new(),
            vpc_id: String::new(),
            vpc_endpoint: String::new(),
            cvm_endpoint: String::new(),
            vpc_api_version: DEFAULT_API_VERSION.to_string(),
            cvm_api_version: DEFAULT_API_VERSION.to_string(),
            insecure_skip_verify: false,
            timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("vpc_id", &self.vpc_id)
            .field("vpc_endpoint", &self.vpc_endpoint)
            .field("cvm_endpoint", &self.cvm_endpoint)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// VPC API client
#[derive(Debug, Clone)]
pub struct VpcClient {
    http: HttpClient,
    vpc_id: String,
    vpc_api_version: String,
    cvm_api_version: String,
}

impl VpcClient {
    /// Create a new VPC client
    pub fn new(options: ClientOptions) -> Result<Self, VpcError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .danger_accept_invalid_certs(options.insecure_skip_verify)
            .build()
            .map_err(VpcError::Http)?;

        let credentials = Credentials {
            secret_id: options.secret_id,
            secret_key: options.secret_key,
            region: options.region,
        };

        Ok(Self {
            http: HttpClient::new(client, credentials, &options.vpc_endpoint, &options.cvm_endpoint),
            vpc_id: options.vpc_id,
            vpc_api_version: options.vpc_api_version,
            cvm_api_version: options.cvm_api_version,
        })
    }

    /// VPC every interface query is scoped to
    pub fn vpc_id(&self) -> &str {
        &self.vpc_id
    }

    fn vpc_params(&self, action: &str) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("Action".to_string(), action.to_string());
        params.insert("Version".to_string(), self.vpc_api_version.clone());
        params.insert("vpcId".to_string(), self.vpc_id.clone());
        params
    }

    async fn call<T: DeserializeOwned>(
        &self,
        surface: ApiSurface,
        params: BTreeMap<String, String>,
    ) -> Result<T, VpcError> {
        let body = self.http.execute(surface, params).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Resolve the instance whose private IP is `node_ip`
    pub async fn get_instance_id(&self, node_ip: IpAddr) -> Result<String, VpcError> {
        let mut params = BTreeMap::new();
        params.insert("Action".to_string(), "DescribeInstances".to_string());
        params.insert("Version".to_string(), self.cvm_api_version.clone());
        params.insert("Limit".to_string(), "1".to_string());
        params.insert("private-ip-address".to_string(), node_ip.to_string());

        let resp: CvmDescribeInstancesResponse = self.call(ApiSurface::Cvm, params).await?;
        if let Some(err) = resp.response.error {
            return Err(VpcError::InstanceApi {
                code: err.code,
                message: err.message,
            });
        }
        resp.response
            .instance_set
            .into_iter()
            .next()
            .map(|i| i.instance_id)
            .ok_or_else(|| VpcError::NotFound(format!("No instance with private IP {}", node_ip)))
    }

    async fn describe_interfaces(&self, filter: Option<(&str, &str)>) -> Result<Vec<NetworkInterface>, VpcError> {
        let mut params = self.vpc_params("DescribeNetworkInterfaces");
        if let Some((key, value)) = filter {
            params.insert(key.to_string(), value.to_string());
        }

        let resp: DescribeInterfacesResponse = self.call(ApiSurface::Vpc, params).await?;
        if resp.code != 0 {
            let message = if resp.message.is_empty() { resp.code_desc } else { resp.message };
            return Err(VpcError::Api { code: resp.code, message });
        }
        Ok(resp.data.data)
    }

    /// Get a network interface by ID, `None` if the VPC has no such interface
    pub async fn get_interface(&self, interface_id: &str) -> Result<Option<NetworkInterface>, VpcError> {
        let interfaces = self
            .describe_interfaces(Some(("networkInterfaceId", interface_id)))
            .await?;
        debug!("getInterface for {}: {} result(s)", interface_id, interfaces.len());
        Ok(interfaces.into_iter().next())
    }

    /// Get all network interfaces in the VPC
    pub async fn get_interfaces(&self) -> Result<Vec<NetworkInterface>, VpcError> {
        self.describe_interfaces(None).await
    }

    /// Get the network interfaces attached to an instance
    pub async fn get_instance_interfaces(&self, instance_id: &str) -> Result<Vec<NetworkInterface>, VpcError> {
        let interfaces = self
            .describe_interfaces(Some(("instanceId", instance_id)))
            .await?;
        debug!("getInstanceInterfaces for {}: {} interface(s)", instance_id, interfaces.len());
        Ok(interfaces)
    }

    async fn action(&self, params: BTreeMap<String, String>) -> Result<(), VpcError> {
        let action = params.get("Action").cloned().unwrap_or_default();
        let resp: ActionResponse = self.call(ApiSurface::Vpc, params).await?;
        if resp.code != 0 {
            debug!("{} rejected: code {}, message {}", action, resp.code, resp.message);
            return Err(VpcError::Api {
                code: resp.code,
                message: resp.message,
            });
        }
        Ok(())
    }

    /// Request one new secondary address on an interface
    ///
    /// The response does not say which address was bound.
    pub async fn assign_private_ip(&self, interface_id: &str) -> Result<(), VpcError> {
        let mut params = self.vpc_params("AssignPrivateIpAddresses");
        params.insert("networkInterfaceId".to_string(), interface_id.to_string());
        params.insert("secondaryPrivateIpAddressCount".to_string(), "1".to_string());
        self.action(params).await
    }

    /// Remove a secondary address from an interface
    pub async fn unassign_private_ip(&self, interface_id: &str, ip: IpAddr) -> Result<(), VpcError> {
        let mut params = self.vpc_params("UnassignPrivateIpAddresses");
        params.insert("networkInterfaceId".to_string(), interface_id.to_string());
        params.insert("privateIpAddress.0".to_string(), ip.to_string());
        self.action(params).await
    }

    /// Move a secondary address from one interface to another
    pub async fn migrate_private_ip(
        &self,
        ip: IpAddr,
        old_interface_id: &str,
        new_interface_id: &str,
    ) -> Result<(), VpcError> {
        let mut params = self.vpc_params("MigratePrivateIpAddress");
        params.insert("privateIpAddress".to_string(), ip.to_string());
        params.insert("oldNetworkInterfaceId".to_string(), old_interface_id.to_string());
        params.insert("newNetworkInterfaceId".to_string(), new_interface_id.to_string());
        self.action(params).await
    }
}

#[async_trait::async_trait]
impl VpcClientTrait for VpcClient {
    fn vpc_id(&self) -> &str {
        self.vpc_id()
    }

    async fn get_instance_id(&self, node_ip: IpAddr) -> Result<String, VpcError> {
        self.get_instance_id(node_ip).await
    }

    async fn get_interface(&self, interface_id: &str) -> Result<Option<NetworkInterface>, VpcError> {
        self.get_interface(interface_id).await
    }

    async fn get_interfaces(&self) -> Result<Vec<NetworkInterface>, VpcError> {
        self.get_interfaces().await
    }

    async fn get_instance_interfaces(&self, instance_id: &str) -> Result<Vec<NetworkInterface>, VpcError> {
        self.get_instance_interfaces(instance_id).await
    }

    async fn assign_private_ip(&self, interface_id: &str) -> Result<(), VpcError> {
        self.assign_private_ip(interface_id).await
    }

    async fn unassign_private_ip(&self, interface_id: &str, ip: IpAddr) -> Result<(), VpcError> {
        self.unassign_private_ip(interface_id, ip).await
    }

    async fn migrate_private_ip(
        &self,
        ip: IpAddr,
        old_interface_id: &str,
        new_interface_id: &str,
    ) -> Result<(), VpcError> {
        self.migrate_private_ip(ip, old_interface_id, new_interface_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = VpcClient::new(ClientOptions {
            vpc_id: "vpc-1".to_string(),
            vpc_endpoint: "vpc.api.qcloud.com/v2/index.php".to_string(),
            cvm_endpoint: "cvm.tencentcloudapi.com/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.vpc_id(), "vpc-1");
    }

    #[test]
    fn test_vpc_params() {
        let client = VpcClient::new(ClientOptions {
            vpc_id: "vpc-1".to_string(),
            ..Default::default()
        })
        .unwrap();
        let params = client.vpc_params("AssignPrivateIpAddresses");
        assert_eq!(params["Action"], "AssignPrivateIpAddresses");
        assert_eq!(params["Version"], DEFAULT_API_VERSION);
        assert_eq!(params["vpcId"], "vpc-1");
    }

    #[test]
    fn test_options_debug_redacts_secret() {
        let options = ClientOptions {
            secret_key: "topsecret".to_string(),
            ..Default::default()
        };
        assert!(!format!("{:?}", options).contains("topsecret"));
    }
}
