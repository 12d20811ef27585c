//! Secondary IP migration between interfaces.
//!
//! A migrate call can be applied by the provider while the response is lost,
//! and an accepted call may take a while to become visible. Every retry after
//! the first therefore looks up where the address currently lives before
//! deciding to reissue the call.

use super::Reconciler;
use crate::error::IpamError;
use std::net::IpAddr;
use tracing::{debug, error, info, warn};

/// Where an address sits relative to an in-flight migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrateStatus {
    /// Already bound to the destination interface
    Completed,
    /// Still bound to the source interface
    Pending,
}

impl Reconciler {
    /// Move `ip` from `old_interface_id` to `new_interface_id`.
    ///
    /// Succeeds once the address is observed on the new interface, whether
    /// this call moved it or an earlier attempt already did.
    pub async fn migrate_ip(&self, ip: IpAddr, old_interface_id: &str, new_interface_id: &str) -> Result<(), IpamError> {
        if old_interface_id == new_interface_id {
            return Err(IpamError::InvalidInput(format!(
                "cannot migrate IP {} onto the interface it is on ({})",
                ip, old_interface_id
            )));
        }

        let policy = self.policies.migrate;
        let attempts = policy.attempts();
        info!("Migrating IP {} from {} to {}", ip, old_interface_id, new_interface_id);

        let mut last_error = match self.migrate_once(ip, old_interface_id, new_interface_id).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        for attempt in 1..attempts {
            warn!("migrate attempt {}/{} for IP {} failed: {}", attempt, attempts, ip, last_error);
            tokio::time::sleep(policy.interval()).await;

            match self.check_migrate_status(ip, old_interface_id, new_interface_id).await {
                Ok(MigrateStatus::Completed) => {
                    info!("At retry {}, IP {} is already on {}", attempt, ip, new_interface_id);
                    return Ok(());
                }
                Ok(MigrateStatus::Pending) => {}
                Err(e @ IpamError::UnexpectedLocation { .. }) => {
                    error!("Giving up on migrating IP {}: {}", ip, e);
                    return Err(e);
                }
                Err(e) => {
                    last_error = e;
                    continue;
                }
            }

            match self.migrate_once(ip, old_interface_id, new_interface_id).await {
                Ok(()) => return Ok(()),
                Err(e) => last_error = e,
            }
        }

        error!(
            "Failed to migrate IP {} from {} to {} after {} attempts: {}",
            ip, old_interface_id, new_interface_id, attempts, last_error
        );
        Err(IpamError::MigrateFailed {
            ip,
            old_interface_id: old_interface_id.to_string(),
            new_interface_id: new_interface_id.to_string(),
            attempts,
            source: Box::new(last_error),
        })
    }

    /// Look up which of the two interfaces currently holds `ip`.
    ///
    /// Any other location, including none at all, is
    /// [`IpamError::UnexpectedLocation`].
    pub async fn check_migrate_status(
        &self,
        ip: IpAddr,
        old_interface_id: &str,
        new_interface_id: &str,
    ) -> Result<MigrateStatus, IpamError> {
        let owner = self.client.get_interface_by_ip(ip).await?;
        match owner.as_ref().map(|i| i.network_interface_id.as_str()) {
            Some(id) if id == new_interface_id => Ok(MigrateStatus::Completed),
            Some(id) if id == old_interface_id => Ok(MigrateStatus::Pending),
            found => Err(IpamError::UnexpectedLocation {
                ip,
                old_interface_id: old_interface_id.to_string(),
                new_interface_id: new_interface_id.to_string(),
                found: found.map(str::to_string),
            }),
        }
    }

    async fn migrate_once(&self, ip: IpAddr, old_interface_id: &str, new_interface_id: &str) -> Result<(), IpamError> {
        self.client
            .migrate_private_ip(ip, old_interface_id, new_interface_id)
            .await?;
        self.wait_for_address(new_interface_id, ip).await?;
        info!("Migrated IP {} from {} to {}", ip, old_interface_id, new_interface_id);
        Ok(())
    }

    /// Poll `interface_id` until `ip` shows up in its address set
    async fn wait_for_address(&self, interface_id: &str, ip: IpAddr) -> Result<(), IpamError> {
        let policy = self.policies.migrate_post_check;
        let polls = policy.attempts();

        for poll in 0..polls {
            if poll > 0 {
                tokio::time::sleep(policy.interval()).await;
            }
            match self.client.get_interface(interface_id).await? {
                Some(iface) if iface.has_address(ip) => return Ok(()),
                Some(_) => debug!("IP {} not yet on {} (poll {}/{})", ip, interface_id, poll + 1, polls),
                None => return Err(IpamError::InterfaceNotFound(interface_id.to_string())),
            }
        }

        Err(IpamError::VerificationTimeout {
            what: format!("IP {} failed to migrate to new interface {}", ip, interface_id),
            polls,
            interval: policy.interval(),
        })
    }
}
