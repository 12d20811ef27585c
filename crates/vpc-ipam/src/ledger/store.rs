//! Key-value store seam for the ownership ledger

use crate::error::IpamError;

/// Linearizable key-value operations the ledger is built on
///
/// Every mutation is either a conditional insert or a delete; the ledger
/// never issues an unconditional put.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    /// Point read
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IpamError>;

    /// Insert `value` only if `key` has never been written (version 0).
    ///
    /// Runs as one transaction. Returns `None` when the value was written,
    /// otherwise the value already stored, which is left untouched.
    async fn create_if_absent(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, IpamError>;

    /// Point delete; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), IpamError>;

    /// Delete every key in one transaction
    async fn delete_all(&self, keys: &[String]) -> Result<(), IpamError>;
}
