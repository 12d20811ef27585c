//! VPC secondary IP management for the CNI plugin
//!
//! Pods get secondary private IPs bound to the network interfaces of the
//! instance they run on. This crate holds the pieces that decide and record
//! those bindings:
//!
//! - [`selector`] picks the interface a new address should land on
//! - [`Reconciler`] assigns, releases and migrates addresses through the
//!   eventually consistent VPC API, retrying and verifying each change
//! - [`Ledger`] records pod and IP ownership in etcd with conditional
//!   inserts, so an IP has at most one owner across concurrent flows
//!
//! # Example
//!
//! ```no_run
//! use vpc_ipam::{Ledger, LedgerConfig, PodIdentity, Reconciler, VpcConfig};
//!
//! # async fn example(net_conf: &str) -> Result<(), vpc_ipam::IpamError> {
//! let config = VpcConfig::from_json(net_conf)?;
//! let reconciler = Reconciler::from_config(&config)?;
//! let ledger = Ledger::connect(&LedgerConfig::from_env()?).await?;
//!
//! let pod = PodIdentity::new("default", "web-0");
//! let instance_id = reconciler.instance_id("10.0.0.5".parse().map_err(|_| {
//!     vpc_ipam::IpamError::InvalidInput("node IP".to_string())
//! })?).await?;
//! let interface = reconciler.pick_interface(&instance_id).await?;
//! let before = interface.secondary_addresses();
//!
//! reconciler.assign_ip(&interface.network_interface_id).await?;
//! for ip in reconciler.detect_assigned_ips(&interface.network_interface_id, &before).await? {
//!     if ledger.validate_and_record_ip(&pod, &ip.to_string()).await? {
//!         ledger.put_pod(&pod, ip, &interface.network_interface_id, false).await?;
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod annotations;
pub mod config;
pub mod error;
pub mod ledger;
pub mod reconciler;
pub mod retry;
pub mod selector;

#[cfg(test)]
mod test_utils;

pub use config::{DetectConfig, LedgerConfig, MigrateConfig, RetryConfig, VpcConfig};
pub use error::{ErrorKind, IpamError};
pub use ledger::{EtcdStore, IpRecord, KvStore, Ledger, PodIdentity, PodRecord};
#[cfg(any(test, feature = "test-util"))]
pub use ledger::MemoryStore;
pub use reconciler::{MigrateStatus, Reconciler};
pub use retry::{DetectPolicy, OperationPolicies, RetryPolicy};
pub use selector::{SelectionPolicy, select_interface};
