//! Integration tests for the etcd ledger store
//!
//! These tests require a running etcd cluster.
//! Set ETCD_ENDPOINTS (and ETCD_CA_FILE, ETCD_CERT_FILE, ETCD_KEY_FILE for TLS) to run.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use vpc_ipam::{EtcdStore, KvStore, Ledger, LedgerConfig, PodIdentity};

async fn store_from_env() -> EtcdStore {
    let config = LedgerConfig::from_env().expect("Failed to load etcd config");
    EtcdStore::connect(&config).await.expect("Failed to connect to etcd")
}

/// Key prefix no other run shares
fn unique_prefix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_nanos();
    format!("/vpc-ipam-test/{}", nanos)
}

#[tokio::test]
#[ignore] // Requires etcd
async fn test_create_if_absent_inserts_once() {
    let store = store_from_env().await;
    let key = format!("{}/ips/10.0.0.30", unique_prefix());

    let first = store
        .create_if_absent(&key, b"first".to_vec())
        .await
        .expect("Failed to insert");
    assert_eq!(first, None);

    let second = store
        .create_if_absent(&key, b"second".to_vec())
        .await
        .expect("Failed to insert");
    assert_eq!(second, Some(b"first".to_vec()));

    let stored = store.get(&key).await.expect("Failed to read");
    assert_eq!(stored, Some(b"first".to_vec()));

    store.delete(&key).await.expect("Failed to clean up");
}

#[tokio::test]
#[ignore]
async fn test_delete_all_removes_every_key() {
    let store = store_from_env().await;
    let prefix = unique_prefix();
    let keys = vec![format!("{}/pods/default.web-0", prefix), format!("{}/ips/10.0.0.30", prefix)];

    for key in &keys {
        store
            .create_if_absent(key, b"{}".to_vec())
            .await
            .expect("Failed to insert");
    }

    store.delete_all(&keys).await.expect("Failed to delete");

    for key in &keys {
        assert_eq!(store.get(key).await.expect("Failed to read"), None);
    }
}

#[tokio::test]
#[ignore]
async fn test_ledger_first_claim_wins() {
    let store = store_from_env().await;
    let ledger = Ledger::new(Arc::new(store), unique_prefix());
    let web = PodIdentity::new("default", "web-0");
    let db = PodIdentity::new("default", "db-0");

    assert!(ledger.validate_and_record_ip(&web, "10.0.0.30").await.expect("Failed to claim"));
    assert!(!ledger.validate_and_record_ip(&db, "10.0.0.30").await.expect("Failed to claim"));
    assert!(ledger.validate_and_record_ip(&web, "10.0.0.30").await.expect("Failed to claim"));

    let ip = "10.0.0.30".parse().expect("valid IP");
    let owner = ledger.get_ip(ip).await.expect("Failed to read").expect("claim missing");
    assert_eq!(owner.identity(), web);

    ledger.delete_ip(ip).await.expect("Failed to clean up");
    assert_eq!(ledger.get_ip(ip).await.expect("Failed to read"), None);
}
