//! IPAM error types.
//!
//! Remote failures are retried inside the reconciler and only surface here
//! once an operation's attempts are used up, wrapped with the operation and
//! the resources it touched.

use crate::ledger::PodIdentity;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use vpc_client::VpcError;

/// Errors returned by the reconciler and the ownership ledger.
#[derive(Debug, Error)]
pub enum IpamError {
    /// VPC API error from a single, non-retried call
    #[error("VPC API error: {0}")]
    Vpc(#[from] VpcError),

    /// Assign attempts exhausted
    #[error("failed to assign secondary IP for interface {interface_id} after {attempts} attempts, since: {source}")]
    AssignFailed {
        interface_id: String,
        attempts: u32,
        #[source]
        source: VpcError,
    },

    /// Release attempts exhausted
    #[error("failed to release IP {ip} on {interface_id} after {attempts} attempts, since: {source}")]
    ReleaseFailed {
        interface_id: String,
        ip: IpAddr,
        attempts: u32,
        #[source]
        source: VpcError,
    },

    /// Migrate attempts exhausted
    #[error(
        "failed to migrate IP {ip} between interfaces, {old_interface_id} => {new_interface_id}, after {attempts} attempts, since: {source}"
    )]
    MigrateFailed {
        ip: IpAddr,
        old_interface_id: String,
        new_interface_id: String,
        attempts: u32,
        #[source]
        source: Box<IpamError>,
    },

    /// The address sits somewhere a migration between the two interfaces cannot explain
    #[error("IP {ip} is on {}, not between {old_interface_id} and {new_interface_id}", found.as_deref().unwrap_or("no interface"))]
    UnexpectedLocation {
        ip: IpAddr,
        old_interface_id: String,
        new_interface_id: String,
        found: Option<String>,
    },

    /// Mutation accepted but the expected state never became visible
    #[error("after {polls} * {interval:?} detect, {what}")]
    VerificationTimeout {
        what: String,
        polls: u32,
        interval: Duration,
    },

    /// IP already recorded for a different pod
    #[error("IP {ip} is already owned by {owner}")]
    OwnershipConflict { ip: IpAddr, owner: PodIdentity },

    /// Malformed input such as an unparsable IP
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No interface satisfies the selection policy
    #[error("No eligible interface on instance {instance_id} under {policy} policy")]
    NoEligibleInterface {
        instance_id: String,
        policy: crate::selector::SelectionPolicy,
    },

    /// Interface missing from the VPC
    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    /// etcd request failed
    #[error("etcd error: {0}")]
    Etcd(#[from] etcd_client::Error),

    /// Stored value could not be encoded or decoded
    #[error("Serialization error for {key}: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Store answered in a way a linearizable store cannot
    #[error("Inconsistent store response: {0}")]
    Inconsistent(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of [`IpamError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote API or store could not be reached
    TransportFailure,
    /// Remote API reachable, request refused
    RemoteRejection,
    /// Expected post-state never observed
    VerificationTimeout,
    /// IP claimed by another pod
    OwnershipConflict,
    /// Malformed input, no eligible interface, or address in an unexpected place
    InvalidInput,
    /// Ledger storage or configuration problem
    Internal,
}

fn vpc_kind(err: &VpcError) -> ErrorKind {
    if err.is_transport() {
        ErrorKind::TransportFailure
    } else if err.is_remote_rejection() {
        ErrorKind::RemoteRejection
    } else {
        ErrorKind::Internal
    }
}

impl IpamError {
    /// Classify the error; exhausted retries report the kind of their last cause
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Vpc(e) => vpc_kind(e),
            Self::AssignFailed { source, .. } | Self::ReleaseFailed { source, .. } => vpc_kind(source),
            Self::MigrateFailed { source, .. } => source.kind(),
            Self::VerificationTimeout { .. } => ErrorKind::VerificationTimeout,
            Self::OwnershipConflict { .. } => ErrorKind::OwnershipConflict,
            Self::InvalidInput(_)
            | Self::NoEligibleInterface { .. }
            | Self::InterfaceNotFound(_)
            | Self::UnexpectedLocation { .. } => ErrorKind::InvalidInput,
            Self::Etcd(_) => ErrorKind::TransportFailure,
            Self::Serialization { .. } | Self::Inconsistent(_) | Self::InvalidConfig(_) => ErrorKind::Internal,
        }
    }
}
