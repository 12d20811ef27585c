//! Cloud operation reconciler.
//!
//! Drives the VPC API to assign, release and migrate secondary addresses.
//! The API is flaky under load and eventually consistent, so:
//! - assign and release resubmit the whole call, up to the configured attempts
//! - migrate checks where the address already is before every retry, and
//!   after each accepted call polls the new interface until the move is visible
//!
//! The reconciler holds no mutable state; one instance serves any number of
//! concurrent flows.

mod migrate;

pub use migrate::MigrateStatus;

use crate::config::VpcConfig;
use crate::error::IpamError;
use crate::retry::OperationPolicies;
use crate::selector::{SelectionPolicy, select_interface};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vpc_client::{NetworkInterface, VpcClient, VpcClientTrait};

/// Reconciles secondary IP state on VPC network interfaces.
#[derive(Clone)]
pub struct Reconciler {
    pub(crate) client: Arc<dyn VpcClientTrait>,
    pub(crate) policy: SelectionPolicy,
    pub(crate) policies: OperationPolicies,
    pub(crate) instance_id: Option<String>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("vpc_id", &self.client.vpc_id())
            .field("policy", &self.policy)
            .field("policies", &self.policies)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(client: Arc<dyn VpcClientTrait>, policy: SelectionPolicy, policies: OperationPolicies) -> Self {
        Self {
            client,
            policy,
            policies,
            instance_id: None,
        }
    }

    /// Creates a reconciler talking to the real API described by `config`.
    pub fn from_config(config: &VpcConfig) -> Result<Self, IpamError> {
        config.validate()?;
        let client = VpcClient::new(config.client_options())?;
        let mut reconciler = Self::new(Arc::new(client), config.policy, config.operation_policies());
        reconciler.instance_id = config.instance_id.clone().filter(|id| !id.is_empty());
        Ok(reconciler)
    }

    /// Pin the instance instead of resolving it from the node IP.
    #[must_use]
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Underlying API client, for the interface queries callers diff against
    pub fn client(&self) -> &dyn VpcClientTrait {
        self.client.as_ref()
    }

    /// Instance running on the node with private IP `node_ip`
    pub async fn instance_id(&self, node_ip: IpAddr) -> Result<String, IpamError> {
        if let Some(id) = &self.instance_id {
            return Ok(id.clone());
        }
        let id = self.client.get_instance_id(node_ip).await?;
        debug!("Node {} runs on instance {}", node_ip, id);
        Ok(id)
    }

    /// Choose the interface of `instance_id` a new pod address should land on.
    pub async fn pick_interface(&self, instance_id: &str) -> Result<NetworkInterface, IpamError> {
        let interfaces = self.client.get_instance_interfaces(instance_id).await?;
        let chosen = select_interface(self.policy, &interfaces)
            .and_then(|idx| interfaces.into_iter().nth(idx))
            .ok_or_else(|| IpamError::NoEligibleInterface {
                instance_id: instance_id.to_string(),
                policy: self.policy,
            })?;
        info!(
            "Chose interface {} ({}) on instance {}",
            chosen.network_interface_id, chosen.mac_address, instance_id
        );
        Ok(chosen)
    }

    /// Request one new secondary address on an interface.
    ///
    /// The API does not report which address was bound. Callers snapshot the
    /// interface's addresses beforehand and hand them to
    /// [`Reconciler::detect_assigned_ips`].
    pub async fn assign_ip(&self, interface_id: &str) -> Result<(), IpamError> {
        let policy = self.policies.assign;
        info!("Assigning secondary IP on interface {}", interface_id);

        policy
            .retry("assign", |_| self.client.assign_private_ip(interface_id))
            .await
            .map_err(|source| {
                error!("Failed to assign secondary IP on {}: {}", interface_id, source);
                IpamError::AssignFailed {
                    interface_id: interface_id.to_string(),
                    attempts: policy.attempts(),
                    source,
                }
            })?;

        info!("Assigned secondary IP on interface {}", interface_id);
        Ok(())
    }

    /// Release a secondary address from an interface.
    pub async fn release_ip(&self, interface_id: &str, ip: IpAddr) -> Result<(), IpamError> {
        let policy = self.policies.release;
        info!("Releasing IP {} on interface {}", ip, interface_id);

        policy
            .retry("release", |_| self.client.unassign_private_ip(interface_id, ip))
            .await
            .map_err(|source| {
                error!("Failed to release IP {} on {}: {}", ip, interface_id, source);
                IpamError::ReleaseFailed {
                    interface_id: interface_id.to_string(),
                    ip,
                    attempts: policy.attempts(),
                    source,
                }
            })?;

        info!("Released IP {} on interface {}", ip, interface_id);
        Ok(())
    }

    /// Addresses bound to `interface_id` that were not in `before`.
    ///
    /// Waits the detect delay, then polls the interface until at least one new
    /// secondary address shows up. A failed poll is logged and the next poll
    /// goes ahead; the last failure is reported if no address ever appears.
    /// Concurrent flows may assign on the same interface, so more than one
    /// address can be returned; the caller claims one through the ownership
    /// ledger.
    pub async fn detect_assigned_ips(&self, interface_id: &str, before: &[IpAddr]) -> Result<Vec<IpAddr>, IpamError> {
        let detect = self.policies.detect;
        let polls = detect.poll.attempts();
        let mut last_error = None;
        tokio::time::sleep(detect.delay).await;

        for poll in 0..polls {
            if poll > 0 {
                tokio::time::sleep(detect.poll.interval()).await;
            }
            let current = match self.client.get_interface_ips(interface_id).await {
                Ok(ips) => ips,
                Err(e) => {
                    warn!("Reading addresses of {} failed (poll {}/{}): {}", interface_id, poll + 1, polls, e);
                    last_error = Some(e);
                    continue;
                }
            };
            let fresh: Vec<IpAddr> = current.into_iter().filter(|ip| !before.contains(ip)).collect();
            if !fresh.is_empty() {
                info!("Detected new address(es) {:?} on interface {}", fresh, interface_id);
                return Ok(fresh);
            }
            debug!("No new address on {} yet (poll {}/{})", interface_id, poll + 1, polls);
        }

        let what = match last_error {
            Some(e) => format!("no new address appeared on interface {}, last error: {}", interface_id, e),
            None => format!("no new address appeared on interface {}", interface_id),
        };
        Err(IpamError::VerificationTimeout {
            what,
            polls,
            interval: detect.poll.interval(),
        })
    }
}
