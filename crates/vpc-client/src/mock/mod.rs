//! Mock VpcClient for unit testing
//!
//! This module provides an in-memory implementation of `VpcClientTrait`
//! that reproduces the provider behaviours the reconciler has to cope with:
//! - scripted transient failures ("resource busy", dropped connections)
//! - actions that land on the provider while the caller sees an error
//! - migrations that only become visible after a number of reads
//!
//! - `interfaces.rs` - interface state and the private IP actions
//! - `helpers.rs` - fixture builders

pub mod helpers;
mod interfaces;

use crate::error::VpcError;
use crate::models::NetworkInterface;
use crate::vpc_trait::VpcClientTrait;
use interfaces::MockState;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Provider error code used for "resource busy" rejections
pub const CODE_RESOURCE_BUSY: i64 = 9003;

/// Provider error code used for invalid parameters
pub const CODE_INVALID_PARAMETER: i64 = 4000;

/// Operation a failure can be scripted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    DescribeInstances,
    DescribeInterfaces,
    Assign,
    Unassign,
    Migrate,
}

/// Scripted outcome for the next call of an operation
#[derive(Debug, Clone)]
pub enum MockFailure {
    /// The request never reaches the provider
    Transport(String),
    /// The provider refuses the request and nothing changes
    Rejected { code: i64, message: String },
    /// The action takes effect but the caller sees a rejection
    AppliedButRejected { code: i64, message: String },
}

impl MockFailure {
    /// "Resource busy" rejection
    #[must_use]
    pub fn busy() -> Self {
        Self::Rejected {
            code: CODE_RESOURCE_BUSY,
            message: "resource is busy, retry later".to_string(),
        }
    }

    /// Action applied, response lost
    #[must_use]
    pub fn lost_response() -> Self {
        Self::AppliedButRejected {
            code: CODE_RESOURCE_BUSY,
            message: "request timed out".to_string(),
        }
    }

    pub(crate) fn into_error(self) -> VpcError {
        match self {
            Self::Transport(msg) => VpcError::Transport(msg),
            Self::Rejected { code, message } | Self::AppliedButRejected { code, message } => {
                VpcError::Api { code, message }
            }
        }
    }
}

/// Mock VpcClient for testing
///
/// Clones share state, so a test can keep a handle for setup and inspection
/// while the reconciler owns another.
#[derive(Debug, Clone)]
pub struct MockVpcClient {
    vpc_id: String,
    state: Arc<Mutex<MockState>>,
}

impl MockVpcClient {
    /// Create a new mock client
    pub fn new(vpc_id: impl Into<String>) -> Self {
        Self {
            vpc_id: vpc_id.into(),
            state: Arc::new(Mutex::new(MockState::new(Ipv4Addr::new(10, 0, 1, 10)))),
        }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an interface to the mock store (for test setup)
    pub fn add_interface(&self, interface: NetworkInterface) {
        self.state().interfaces.push(interface);
    }

    /// Map a node IP to an instance ID (for test setup)
    pub fn add_instance(&self, node_ip: IpAddr, instance_id: impl Into<String>) {
        self.state().instances.insert(node_ip, instance_id.into());
    }

    /// First address handed out by assign (for test setup)
    pub fn set_next_address(&self, ip: Ipv4Addr) {
        self.state().next_address = u32::from(ip);
    }

    /// Number of reads that still see the pre-migration state after a migrate succeeds
    pub fn set_migrate_lag(&self, stale_reads: usize) {
        self.state().migrate_lag = stale_reads;
    }

    /// Script the outcome of the next call of `op`
    pub fn fail_next(&self, op: MockOperation, failure: MockFailure) {
        self.state().failures.entry(op).or_default().push_back(failure);
    }

    /// Script the next `times` calls of `op` to fail the same way
    pub fn fail_times(&self, op: MockOperation, times: usize, failure: &MockFailure) {
        let mut state = self.state();
        let queue = state.failures.entry(op).or_default();
        for _ in 0..times {
            queue.push_back(failure.clone());
        }
    }

    /// How many times `op` has been called
    pub fn calls(&self, op: MockOperation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    /// Current state of an interface, bypassing visibility lag and call counters
    pub fn interface(&self, interface_id: &str) -> Option<NetworkInterface> {
        self.state().find(interface_id).cloned()
    }
}

#[async_trait::async_trait]
impl VpcClientTrait for MockVpcClient {
    fn vpc_id(&self) -> &str {
        &self.vpc_id
    }

    async fn get_instance_id(&self, node_ip: IpAddr) -> Result<String, VpcError> {
        let mut state = self.state();
        state.begin_read(MockOperation::DescribeInstances)?;
        state
            .instances
            .get(&node_ip)
            .cloned()
            .ok_or_else(|| VpcError::NotFound(format!("No instance with private IP {}", node_ip)))
    }

    async fn get_interface(&self, interface_id: &str) -> Result<Option<NetworkInterface>, VpcError> {
        let mut state = self.state();
        state.begin_read(MockOperation::DescribeInterfaces)?;
        Ok(state.find(interface_id).cloned())
    }

    async fn get_interfaces(&self) -> Result<Vec<NetworkInterface>, VpcError> {
        let mut state = self.state();
        state.begin_read(MockOperation::DescribeInterfaces)?;
        Ok(state.interfaces.clone())
    }

    async fn get_instance_interfaces(&self, instance_id: &str) -> Result<Vec<NetworkInterface>, VpcError> {
        let mut state = self.state();
        state.begin_read(MockOperation::DescribeInterfaces)?;
        Ok(state
            .interfaces
            .iter()
            .filter(|i| i.instance_id() == Some(instance_id))
            .cloned()
            .collect())
    }

    async fn assign_private_ip(&self, interface_id: &str) -> Result<(), VpcError> {
        self.state().assign(interface_id)
    }

    async fn unassign_private_ip(&self, interface_id: &str, ip: IpAddr) -> Result<(), VpcError> {
        self.state().unassign(interface_id, ip)
    }

    async fn migrate_private_ip(
        &self,
        ip: IpAddr,
        old_interface_id: &str,
        new_interface_id: &str,
    ) -> Result<(), VpcError> {
        self.state().migrate(ip, old_interface_id, new_interface_id)
    }
}
