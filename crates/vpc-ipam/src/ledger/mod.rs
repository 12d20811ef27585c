//! Ownership ledger
//!
//! Records which pod owns which secondary IP, in two mappings:
//! - `<prefix>/pods/<namespace>.<name>` holds the pod's IP, interface and retain flag
//! - `<prefix>/ips/<ip>` holds the pod identity that claimed the IP
//!
//! Both are written with a conditional insert that succeeds only while the
//! key has never been written, so the first claimant of an IP wins and a
//! pod's record is never overwritten. Records are removed explicitly when
//! the address is released.

mod etcd;
#[cfg(test)]
mod ledger_test;
#[cfg(any(test, feature = "test-util"))]
mod memory;
mod store;

pub use etcd::EtcdStore;
#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use store::KvStore;

use crate::config::LedgerConfig;
use crate::error::IpamError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Namespace and name of a pod
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PodIdentity {
    /// Namespace, a DNS label and so never containing `.`
    pub namespace: String,
    /// Pod name
    pub name: String,
}

impl PodIdentity {
    /// Identity of pod `name` in `namespace`
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    fn validate(&self) -> Result<(), IpamError> {
        if self.namespace.is_empty() || self.name.is_empty() {
            return Err(IpamError::InvalidInput(format!(
                "pod identity needs a namespace and a name, got {:?}",
                self
            )));
        }
        // `<namespace>.<name>` keys are only unambiguous while the namespace has no dot
        if self.namespace.contains('.') {
            return Err(IpamError::InvalidInput(format!(
                "namespace {:?} is not a DNS label",
                self.namespace
            )));
        }
        Ok(())
    }
}

impl fmt::Display for PodIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What a pod was given
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodRecord {
    /// Address given to the pod
    pub ip: IpAddr,
    /// Interface the address is bound to
    #[serde(rename = "interfaceID")]
    pub interface_id: String,
    /// Keep the IP bound when the pod goes away
    #[serde(rename = "ipRetain", default, with = "retain_flag")]
    pub ip_retain: bool,
}

/// Who claimed an IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRecord {
    /// Claimant's namespace
    #[serde(rename = "ns")]
    pub namespace: String,
    /// Claimant's pod name
    pub name: String,
}

impl IpRecord {
    /// Claimant as a pod identity
    pub fn identity(&self) -> PodIdentity {
        PodIdentity::new(self.namespace.clone(), self.name.clone())
    }
}

impl From<&PodIdentity> for IpRecord {
    fn from(identity: &PodIdentity) -> Self {
        Self {
            namespace: identity.namespace.clone(),
            name: identity.name.clone(),
        }
    }
}

/// Retain flag stored as `"true"`/`"false"`
mod retain_flag {
    use crate::annotations::is_truthy;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "true" } else { "false" })
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(is_truthy(&raw))
    }
}

/// Pod/IP ownership records on a [`KvStore`]
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger").field("prefix", &self.prefix).finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger whose keys live under `prefix`
    pub fn new(store: Arc<dyn KvStore>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        Self { store, prefix }
    }

    /// Connect to etcd as described by `config`
    pub async fn connect(config: &LedgerConfig) -> Result<Self, IpamError> {
        let store = EtcdStore::connect(config).await?;
        Ok(Self::new(Arc::new(store), config.key_prefix.clone()))
    }

    /// Key of a pod's record
    pub fn pod_key(&self, identity: &PodIdentity) -> String {
        format!("{}/pods/{}.{}", self.prefix, identity.namespace, identity.name)
    }

    /// Key of an IP's claim
    pub fn ip_key(&self, ip: IpAddr) -> String {
        format!("{}/ips/{}", self.prefix, ip)
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, IpamError> {
        match self.store.get(key).await? {
            Some(raw) => decode(key, &raw).map(Some),
            None => Ok(None),
        }
    }

    async fn insert<T: Serialize + DeserializeOwned>(&self, key: &str, value: &T) -> Result<Option<T>, IpamError> {
        let raw = serde_json::to_vec(value).map_err(|source| IpamError::Serialization {
            key: key.to_string(),
            source,
        })?;
        match self.store.create_if_absent(key, raw).await? {
            Some(existing) => decode(key, &existing).map(Some),
            None => Ok(None),
        }
    }

    /// Record of a pod, if any
    pub async fn get_pod(&self, identity: &PodIdentity) -> Result<Option<PodRecord>, IpamError> {
        self.read(&self.pod_key(identity)).await
    }

    /// Claimant of an IP, if any
    pub async fn get_ip(&self, ip: IpAddr) -> Result<Option<IpRecord>, IpamError> {
        self.read(&self.ip_key(ip)).await
    }

    /// Record what a pod was given.
    ///
    /// Returns `None` when the record was created, or the existing record,
    /// which is left as it is.
    pub async fn put_pod(
        &self,
        identity: &PodIdentity,
        ip: IpAddr,
        interface_id: &str,
        retain: bool,
    ) -> Result<Option<PodRecord>, IpamError> {
        identity.validate()?;
        let record = PodRecord {
            ip,
            interface_id: interface_id.to_string(),
            ip_retain: retain,
        };
        let existing = self.insert(&self.pod_key(identity), &record).await?;
        match &existing {
            None => info!("Recorded pod {} with IP {} on {}", identity, ip, interface_id),
            Some(found) => debug!(
                "Pod {} already recorded with IP {} on {}",
                identity, found.ip, found.interface_id
            ),
        }
        Ok(existing)
    }

    /// Claim an IP for a pod. First claimant wins.
    ///
    /// Returns `None` when this call created the claim, otherwise the
    /// existing claimant, which may be `identity` itself.
    pub async fn put_ip(&self, identity: &PodIdentity, ip: IpAddr) -> Result<Option<IpRecord>, IpamError> {
        identity.validate()?;
        self.insert(&self.ip_key(ip), &IpRecord::from(identity)).await
    }

    /// Parse `ip` and claim it for `identity`.
    ///
    /// `true` when the claim is new or already held by `identity`; `false`
    /// when another pod owns the IP.
    pub async fn validate_and_record_ip(&self, identity: &PodIdentity, ip: &str) -> Result<bool, IpamError> {
        let parsed: IpAddr = ip
            .parse()
            .map_err(|e| IpamError::InvalidInput(format!("invalid IP {:?}: {}", ip, e)))?;

        match self.put_ip(identity, parsed).await? {
            None => {
                info!("IP {} claimed by {}", parsed, identity);
                Ok(true)
            }
            Some(owner) if owner.identity() == *identity => {
                debug!("IP {} already claimed by {}", parsed, identity);
                Ok(true)
            }
            Some(owner) => {
                warn!(
                    "IP {} requested by {} is owned by {}/{}",
                    parsed, identity, owner.namespace, owner.name
                );
                Ok(false)
            }
        }
    }

    /// Like [`Ledger::validate_and_record_ip`], with a foreign owner reported as
    /// [`IpamError::OwnershipConflict`]
    pub async fn claim_ip(&self, identity: &PodIdentity, ip: IpAddr) -> Result<(), IpamError> {
        match self.put_ip(identity, ip).await? {
            Some(owner) if owner.identity() != *identity => Err(IpamError::OwnershipConflict {
                ip,
                owner: owner.identity(),
            }),
            _ => Ok(()),
        }
    }

    /// Remove a pod's record and its IP claim together
    pub async fn delete_pod_and_ip(&self, identity: &PodIdentity, ip: IpAddr) -> Result<(), IpamError> {
        self.store
            .delete_all(&[self.pod_key(identity), self.ip_key(ip)])
            .await?;
        info!("Removed records of pod {} and IP {}", identity, ip);
        Ok(())
    }

    /// Remove only the claim on an IP
    pub async fn delete_ip(&self, ip: IpAddr) -> Result<(), IpamError> {
        self.store.delete(&self.ip_key(ip)).await?;
        info!("Removed claim on IP {}", ip);
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(key: &str, raw: &[u8]) -> Result<T, IpamError> {
    serde_json::from_slice(raw).map_err(|source| IpamError::Serialization {
        key: key.to_string(),
        source,
    })
}
