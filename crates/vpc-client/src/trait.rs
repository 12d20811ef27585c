//! VpcClient trait for mocking
//!
//! This trait abstracts the VpcClient so the reconciler can be exercised
//! against `MockVpcClient` in unit tests.

use crate::error::VpcError;
use crate::models::NetworkInterface;
use std::net::IpAddr;

/// Trait for VPC API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait VpcClientTrait: Send + Sync {
    /// VPC the client is scoped to
    fn vpc_id(&self) -> &str;

    // Instance lookup
    async fn get_instance_id(&self, node_ip: IpAddr) -> Result<String, VpcError>;

    // Interface queries
    async fn get_interface(&self, interface_id: &str) -> Result<Option<NetworkInterface>, VpcError>;
    async fn get_interfaces(&self) -> Result<Vec<NetworkInterface>, VpcError>;
    async fn get_instance_interfaces(&self, instance_id: &str) -> Result<Vec<NetworkInterface>, VpcError>;

    // Private IP actions, one remote call each
    async fn assign_private_ip(&self, interface_id: &str) -> Result<(), VpcError>;
    async fn unassign_private_ip(&self, interface_id: &str, ip: IpAddr) -> Result<(), VpcError>;
    async fn migrate_private_ip(&self, ip: IpAddr, old_interface_id: &str, new_interface_id: &str) -> Result<(), VpcError>;

    /// Secondary addresses currently bound to an interface
    async fn get_interface_ips(&self, interface_id: &str) -> Result<Vec<IpAddr>, VpcError> {
        self.get_interface(interface_id)
            .await?
            .map(|i| i.secondary_addresses())
            .ok_or_else(|| VpcError::NotFound(format!("Interface {} not found", interface_id)))
    }

    /// Interface in the VPC that currently holds `ip`
    async fn get_interface_by_ip(&self, ip: IpAddr) -> Result<Option<NetworkInterface>, VpcError> {
        Ok(self
            .get_interfaces()
            .await?
            .into_iter()
            .find(|i| i.has_address(ip)))
    }
}
