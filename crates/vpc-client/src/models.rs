//! VPC and CVM API models
//!
//! These models match the JSON bodies returned by `DescribeNetworkInterfaces`,
//! the private IP actions (`AssignPrivateIpAddresses`,
//! `UnassignPrivateIpAddresses`, `MigratePrivateIpAddress`) and the CVM
//! `DescribeInstances` call.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Address bound to a network interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateAddress {
    #[serde(default)]
    pub primary: bool,
    pub private_ip_address: IpAddr,
}

/// Instance an interface is attached to (`instanceSet` in the response)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceInstance {
    #[serde(default)]
    pub instance_id: String,
}

/// Network interface as returned by `DescribeNetworkInterfaces`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    pub network_interface_id: String,
    #[serde(rename = "instanceSet", default)]
    pub instance: Option<InterfaceInstance>,
    #[serde(default)]
    pub mac_address: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(rename = "privateIpAddressesSet", default)]
    pub private_ip_address_set: Vec<PrivateAddress>,
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub vpc_id: String,
    #[serde(default)]
    pub vpc_name: String,
}

impl NetworkInterface {
    /// Instance the interface is attached to, if any
    #[must_use]
    pub fn instance_id(&self) -> Option<&str> {
        self.instance
            .as_ref()
            .map(|i| i.instance_id.as_str())
            .filter(|id| !id.is_empty())
    }

    /// Number of addresses bound to the interface, primary included
    #[must_use]
    pub fn address_count(&self) -> usize {
        self.private_ip_address_set.len()
    }

    /// Whether `ip` is currently bound to the interface
    #[must_use]
    pub fn has_address(&self, ip: IpAddr) -> bool {
        self.private_ip_address_set
            .iter()
            .any(|a| a.private_ip_address == ip)
    }

    /// The interface's primary address
    #[must_use]
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.private_ip_address_set
            .iter()
            .find(|a| a.primary)
            .map(|a| a.private_ip_address)
    }

    /// Bound addresses that are not primary, in response order
    #[must_use]
    pub fn secondary_addresses(&self) -> Vec<IpAddr> {
        self.private_ip_address_set
            .iter()
            .filter(|a| !a.primary)
            .map(|a| a.private_ip_address)
            .collect()
    }
}

/// `data` member of a `DescribeNetworkInterfaces` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescribeInterfacesData {
    #[serde(default)]
    pub data: Vec<NetworkInterface>,
}

/// Response of VPC request `DescribeNetworkInterfaces`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeInterfacesResponse {
    pub code: i64,
    #[serde(default)]
    pub code_desc: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: DescribeInterfacesData,
}

/// `data` member of a private IP action response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponseData {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub code_desc: String,
}

/// Response of the VPC private IP actions (assign, unassign, migrate)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: ActionResponseData,
}

/// Member of `InstanceSet` in a CVM `DescribeInstances` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvmInstance {
    #[serde(rename = "InstanceId")]
    pub instance_id: String,
}

/// `Response.Error` of a failed CVM request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvmError {
    #[serde(rename = "Code")]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
}

/// `Response` member of a CVM `DescribeInstances` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvmDescribeInstancesBody {
    #[serde(rename = "TotalCount", default)]
    pub total_count: u64,
    #[serde(rename = "InstanceSet", default)]
    pub instance_set: Vec<CvmInstance>,
    #[serde(rename = "Error", default)]
    pub error: Option<CvmError>,
}

/// Response of CVM request `DescribeInstances`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CvmDescribeInstancesResponse {
    #[serde(rename = "Response")]
    pub response: CvmDescribeInstancesBody,
}
