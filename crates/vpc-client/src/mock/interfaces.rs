//! Interface state and private IP actions for MockVpcClient

use super::{CODE_INVALID_PARAMETER, CODE_RESOURCE_BUSY, MockFailure, MockOperation};
use crate::error::VpcError;
use crate::models::{NetworkInterface, PrivateAddress};
use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};

/// A migration the provider accepted but reads do not reflect yet
#[derive(Debug, Clone)]
struct PendingMigration {
    ip: IpAddr,
    old_interface_id: String,
    new_interface_id: String,
    stale_reads: usize,
}

#[derive(Debug)]
pub(crate) struct MockState {
    pub(crate) interfaces: Vec<NetworkInterface>,
    pub(crate) instances: HashMap<IpAddr, String>,
    pub(crate) failures: HashMap<MockOperation, VecDeque<MockFailure>>,
    pub(crate) calls: HashMap<MockOperation, usize>,
    pub(crate) migrate_lag: usize,
    pub(crate) next_address: u32,
    pending: Vec<PendingMigration>,
}

fn rejected(message: String) -> VpcError {
    VpcError::Api {
        code: CODE_INVALID_PARAMETER,
        message,
    }
}

impl MockState {
    pub(crate) fn new(first_address: Ipv4Addr) -> Self {
        Self {
            interfaces: Vec::new(),
            instances: HashMap::new(),
            failures: HashMap::new(),
            calls: HashMap::new(),
            migrate_lag: 0,
            next_address: u32::from(first_address),
            pending: Vec::new(),
        }
    }

    pub(crate) fn find(&self, interface_id: &str) -> Option<&NetworkInterface> {
        self.interfaces
            .iter()
            .find(|i| i.network_interface_id == interface_id)
    }

    fn find_mut(&mut self, interface_id: &str) -> Result<&mut NetworkInterface, VpcError> {
        self.interfaces
            .iter_mut()
            .find(|i| i.network_interface_id == interface_id)
            .ok_or_else(|| rejected(format!("interface {} does not exist", interface_id)))
    }

    fn record(&mut self, op: MockOperation) -> Option<MockFailure> {
        *self.calls.entry(op).or_insert(0) += 1;
        self.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }

    /// Count a read, let pending migrations age, and surface any scripted failure
    pub(crate) fn begin_read(&mut self, op: MockOperation) -> Result<(), VpcError> {
        let failure = self.record(op);
        self.age_pending();
        match failure {
            Some(f) => Err(f.into_error()),
            None => Ok(()),
        }
    }

    fn age_pending(&mut self) {
        let mut ready = Vec::new();
        self.pending.retain_mut(|p| {
            if p.stale_reads == 0 {
                ready.push(p.clone());
                false
            } else {
                p.stale_reads -= 1;
                true
            }
        });
        for p in ready {
            self.move_address(p.ip, &p.old_interface_id, &p.new_interface_id);
        }
    }

    /// Run a mutation under the scripted outcome for `op`
    fn mutate<F>(&mut self, op: MockOperation, apply: F) -> Result<(), VpcError>
    where
        F: FnOnce(&mut Self) -> Result<(), VpcError>,
    {
        match self.record(op) {
            None => apply(self),
            Some(failure @ MockFailure::AppliedButRejected { .. }) => {
                apply(self)?;
                Err(failure.into_error())
            }
            Some(failure) => Err(failure.into_error()),
        }
    }

    fn in_use(&self, ip: IpAddr) -> bool {
        self.interfaces.iter().any(|i| i.has_address(ip))
    }

    fn allocate_address(&mut self) -> IpAddr {
        loop {
            let candidate = IpAddr::V4(Ipv4Addr::from(self.next_address));
            self.next_address = self.next_address.wrapping_add(1);
            if !self.in_use(candidate) {
                return candidate;
            }
        }
    }

    pub(crate) fn assign(&mut self, interface_id: &str) -> Result<(), VpcError> {
        self.mutate(MockOperation::Assign, |state| {
            state.find_mut(interface_id)?;
            let ip = state.allocate_address();
            state.find_mut(interface_id)?.private_ip_address_set.push(PrivateAddress {
                primary: false,
                private_ip_address: ip,
            });
            Ok(())
        })
    }

    pub(crate) fn unassign(&mut self, interface_id: &str, ip: IpAddr) -> Result<(), VpcError> {
        self.mutate(MockOperation::Unassign, |state| {
            let iface = state.find_mut(interface_id)?;
            let idx = iface
                .private_ip_address_set
                .iter()
                .position(|a| a.private_ip_address == ip && !a.primary)
                .ok_or_else(|| rejected(format!("{} is not a secondary address of {}", ip, interface_id)))?;
            iface.private_ip_address_set.remove(idx);
            Ok(())
        })
    }

    pub(crate) fn migrate(&mut self, ip: IpAddr, old_interface_id: &str, new_interface_id: &str) -> Result<(), VpcError> {
        self.mutate(MockOperation::Migrate, |state| {
            if state.pending.iter().any(|p| p.ip == ip) {
                return Err(VpcError::Api {
                    code: CODE_RESOURCE_BUSY,
                    message: format!("{} is being migrated", ip),
                });
            }
            state.find_mut(new_interface_id)?;
            let old = state.find_mut(old_interface_id)?;
            if !old
                .private_ip_address_set
                .iter()
                .any(|a| a.private_ip_address == ip && !a.primary)
            {
                return Err(rejected(format!("{} is not a secondary address of {}", ip, old_interface_id)));
            }

            if state.migrate_lag == 0 {
                state.move_address(ip, old_interface_id, new_interface_id);
            } else {
                state.pending.push(PendingMigration {
                    ip,
                    old_interface_id: old_interface_id.to_string(),
                    new_interface_id: new_interface_id.to_string(),
                    stale_reads: state.migrate_lag,
                });
            }
            Ok(())
        })
    }

    fn move_address(&mut self, ip: IpAddr, old_interface_id: &str, new_interface_id: &str) {
        if let Ok(old) = self.find_mut(old_interface_id) {
            old.private_ip_address_set.retain(|a| a.private_ip_address != ip);
        }
        if let Ok(new) = self.find_mut(new_interface_id) {
            new.private_ip_address_set.push(PrivateAddress {
                primary: false,
                private_ip_address: ip,
            });
        }
    }
}
