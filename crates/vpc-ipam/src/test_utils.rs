//! Test utilities for unit testing the reconciler and ledger
//!
//! Fixtures share one layout: instance `ins-1` on node `192.168.0.8` with a
//! primary interface and two secondary interfaces.

use crate::ledger::{Ledger, MemoryStore, PodIdentity};
use crate::reconciler::Reconciler;
use crate::retry::{DetectPolicy, OperationPolicies, RetryPolicy};
use crate::selector::SelectionPolicy;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use vpc_client::MockVpcClient;
use vpc_client::mock::helpers::network_interface;

pub const NODE_IP: &str = "192.168.0.8";
pub const INSTANCE_ID: &str = "ins-1";

/// Parse an IP literal
pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Policies with small, distinct intervals so elapsed time identifies the path taken
pub fn create_test_policies() -> OperationPolicies {
    OperationPolicies {
        assign: RetryPolicy::new(3, Duration::from_millis(100)),
        release: RetryPolicy::new(3, Duration::from_millis(200)),
        migrate: RetryPolicy::new(3, Duration::from_millis(10)),
        migrate_post_check: RetryPolicy::new(2, Duration::from_millis(7)),
        detect: DetectPolicy {
            delay: Duration::from_millis(50),
            poll: RetryPolicy::new(3, Duration::from_millis(20)),
        },
    }
}

/// Helper to create a mock with the shared interface layout
///
/// - `eni-primary`: primary interface, `10.0.0.2`
/// - `eni-1`: `10.0.0.3`
/// - `eni-2`: `10.0.0.4` plus secondary `10.0.0.30`
pub fn create_test_mock() -> MockVpcClient {
    let mock = MockVpcClient::new("vpc-test");
    mock.add_instance(ip(NODE_IP), INSTANCE_ID);
    mock.add_interface(network_interface("eni-primary", INSTANCE_ID, true, &["10.0.0.2"]));
    mock.add_interface(network_interface("eni-1", INSTANCE_ID, false, &["10.0.0.3"]));
    mock.add_interface(network_interface("eni-2", INSTANCE_ID, false, &["10.0.0.4", "10.0.0.30"]));
    mock
}

/// Helper to create a reconciler driving `mock`
pub fn create_test_reconciler(mock: &MockVpcClient, policy: SelectionPolicy) -> Reconciler {
    Reconciler::new(Arc::new(mock.clone()), policy, create_test_policies())
}

/// Helper to create a ledger on an in-memory store
///
/// The store is returned as well so tests can inspect raw keys.
pub fn create_test_ledger() -> (Ledger, MemoryStore) {
    let store = MemoryStore::new();
    (Ledger::new(Arc::new(store.clone()), "/vpc"), store)
}

pub fn pod(namespace: &str, name: &str) -> PodIdentity {
    PodIdentity::new(namespace, name)
}
