//! etcd v3 backed [`KvStore`]

use super::store::KvStore;
use crate::config::LedgerConfig;
use crate::error::IpamError;
use etcd_client::{
    Certificate, Client, Compare, CompareOp, ConnectOptions, GetOptions, Identity, TlsOptions, Txn, TxnOp,
    TxnOpResponse,
};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Ledger store on an etcd cluster
///
/// `etcd_client::Client` is a cheap handle over a shared channel; each call
/// works on its own clone.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
    endpoints: Vec<String>,
}

impl fmt::Debug for EtcdStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtcdStore").field("endpoints", &self.endpoints).finish()
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, IpamError> {
    std::fs::read(path).map_err(|e| IpamError::InvalidConfig(format!("failed to read {}: {}", path.display(), e)))
}

fn tls_options(config: &LedgerConfig) -> Result<TlsOptions, IpamError> {
    let mut tls = TlsOptions::new();
    if let Some(ca) = &config.ca_cert_file {
        tls = tls.ca_certificate(Certificate::from_pem(read_pem(ca)?));
    }
    match (&config.cert_file, &config.key_file) {
        (Some(cert), Some(key)) => {
            tls = tls.identity(Identity::from_pem(read_pem(cert)?, read_pem(key)?));
        }
        (None, None) => {}
        _ => {
            return Err(IpamError::InvalidConfig(
                "etcd client certificate and key must be set together".to_string(),
            ));
        }
    }
    Ok(tls)
}

impl EtcdStore {
    /// Wrap an already connected client
    pub fn new(client: Client) -> Self {
        Self {
            client,
            endpoints: Vec::new(),
        }
    }

    /// Connect to the cluster in `config` and check it answers
    pub async fn connect(config: &LedgerConfig) -> Result<Self, IpamError> {
        let mut options = ConnectOptions::new()
            .with_connect_timeout(config.dial_timeout)
            .with_keep_alive(config.keep_alive_time, config.keep_alive_timeout);
        if config.uses_tls() {
            options = options.with_tls(tls_options(config)?);
        }

        let client = Client::connect(config.endpoints.clone(), Some(options)).await?;
        let store = Self {
            client,
            endpoints: config.endpoints.clone(),
        };
        store.check_reachable().await?;

        info!("Connected to etcd at {:?}", config.endpoints);
        Ok(store)
    }

    async fn check_reachable(&self) -> Result<(), IpamError> {
        let mut client = self.client.clone();
        client
            .get("/", Some(GetOptions::new().with_prefix().with_limit(1)))
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl KvStore for EtcdStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IpamError> {
        let mut client = self.client.clone();
        let resp = client.get(key, None).await?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn create_if_absent(&self, key: &str, value: Vec<u8>) -> Result<Option<Vec<u8>>, IpamError> {
        let mut client = self.client.clone();
        let txn = Txn::new()
            .when(vec![Compare::version(key, CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(key, value, None)])
            .or_else(vec![TxnOp::get(key, None)]);

        let resp = client.txn(txn).await?;
        if resp.succeeded() {
            debug!("Created {}", key);
            return Ok(None);
        }

        for op in resp.op_responses() {
            if let TxnOpResponse::Get(get) = op {
                if let Some(kv) = get.kvs().first() {
                    return Ok(Some(kv.value().to_vec()));
                }
            }
        }
        Err(IpamError::Inconsistent(format!(
            "compare on {} failed but the key could not be read back",
            key
        )))
    }

    async fn delete(&self, key: &str) -> Result<(), IpamError> {
        let mut client = self.client.clone();
        client.delete(key, None).await?;
        Ok(())
    }

    async fn delete_all(&self, keys: &[String]) -> Result<(), IpamError> {
        let mut client = self.client.clone();
        let ops: Vec<TxnOp> = keys.iter().map(|k| TxnOp::delete(k.as_str(), None)).collect();
        client.txn(Txn::new().and_then(ops)).await?;
        Ok(())
    }
}
