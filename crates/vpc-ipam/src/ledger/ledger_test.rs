//! Unit tests for the ownership ledger

#[cfg(test)]
mod tests {
    use crate::error::{ErrorKind, IpamError};
    use crate::ledger::{IpRecord, KvStore, Ledger, MemoryStore, PodRecord};
    use crate::test_utils::{create_test_ledger, ip, pod};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_key_layout() {
        let (ledger, _) = create_test_ledger();
        assert_eq!(ledger.pod_key(&pod("default", "web-0")), "/vpc/pods/default.web-0");
        assert_eq!(ledger.ip_key(ip("10.0.0.30")), "/vpc/ips/10.0.0.30");

        let trailing = Ledger::new(Arc::new(MemoryStore::new()), "/cni/");
        assert_eq!(trailing.ip_key(ip("10.0.0.30")), "/cni/ips/10.0.0.30");
    }

    #[tokio::test]
    async fn test_fresh_claim_succeeds() {
        let (ledger, store) = create_test_ledger();
        let web = pod("default", "web-0");

        assert!(ledger.validate_and_record_ip(&web, "10.0.0.30").await.unwrap());

        let owner = ledger.get_ip(ip("10.0.0.30")).await.unwrap().unwrap();
        assert_eq!(owner.identity(), web);
        assert_eq!(store.keys(), vec!["/vpc/ips/10.0.0.30".to_string()]);
    }

    #[tokio::test]
    async fn test_claim_by_other_pod_is_refused() {
        let (ledger, _) = create_test_ledger();
        let web = pod("default", "web-0");
        let db = pod("default", "db-0");

        assert!(ledger.validate_and_record_ip(&web, "10.0.0.30").await.unwrap());
        assert!(!ledger.validate_and_record_ip(&db, "10.0.0.30").await.unwrap());

        // owner unchanged
        let owner = ledger.get_ip(ip("10.0.0.30")).await.unwrap().unwrap();
        assert_eq!(owner.identity(), web);
    }

    #[tokio::test]
    async fn test_reclaim_by_same_pod_succeeds() {
        let (ledger, _) = create_test_ledger();
        let web = pod("default", "web-0");

        assert!(ledger.validate_and_record_ip(&web, "10.0.0.30").await.unwrap());
        assert!(ledger.validate_and_record_ip(&web, "10.0.0.30").await.unwrap());
    }

    #[tokio::test]
    async fn test_same_name_other_namespace_is_other_pod() {
        let (ledger, _) = create_test_ledger();

        assert!(ledger.validate_and_record_ip(&pod("a", "web"), "10.0.0.30").await.unwrap());
        assert!(!ledger.validate_and_record_ip(&pod("b", "web"), "10.0.0.30").await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_ip_is_rejected_without_write() {
        let (ledger, store) = create_test_ledger();

        let err = ledger
            .validate_and_record_ip(&pod("default", "web-0"), "10.0.0.300")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_claim_ip_reports_conflict() {
        let (ledger, _) = create_test_ledger();
        let web = pod("default", "web-0");

        ledger.claim_ip(&web, ip("10.0.0.30")).await.unwrap();
        ledger.claim_ip(&web, ip("10.0.0.30")).await.unwrap();

        match ledger.claim_ip(&pod("default", "db-0"), ip("10.0.0.30")).await {
            Err(IpamError::OwnershipConflict { ip: conflict, owner }) => {
                assert_eq!(conflict, ip("10.0.0.30"));
                assert_eq!(owner, web);
            }
            other => panic!("expected ownership conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_put_pod_never_overwrites() {
        let (ledger, _) = create_test_ledger();
        let web = pod("default", "web-0");

        let created = ledger.put_pod(&web, ip("10.0.0.30"), "eni-1", true).await.unwrap();
        assert!(created.is_none());

        let existing = ledger.put_pod(&web, ip("10.0.0.31"), "eni-2", false).await.unwrap();
        assert_eq!(
            existing,
            Some(PodRecord {
                ip: ip("10.0.0.30"),
                interface_id: "eni-1".to_string(),
                ip_retain: true,
            })
        );

        let stored = ledger.get_pod(&web).await.unwrap().unwrap();
        assert_eq!(stored.ip, ip("10.0.0.30"));
        assert_eq!(stored.interface_id, "eni-1");
    }

    #[tokio::test]
    async fn test_put_ip_returns_existing_owner() {
        let (ledger, _) = create_test_ledger();

        assert!(ledger.put_ip(&pod("default", "web-0"), ip("10.0.0.30")).await.unwrap().is_none());
        let owner = ledger.put_ip(&pod("default", "db-0"), ip("10.0.0.30")).await.unwrap();
        assert_eq!(
            owner,
            Some(IpRecord {
                namespace: "default".to_string(),
                name: "web-0".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_delete_pod_and_ip_frees_the_address() {
        let (ledger, store) = create_test_ledger();
        let web = pod("default", "web-0");
        let db = pod("default", "db-0");

        ledger.put_pod(&web, ip("10.0.0.30"), "eni-1", false).await.unwrap();
        assert!(ledger.validate_and_record_ip(&web, "10.0.0.30").await.unwrap());

        ledger.delete_pod_and_ip(&web, ip("10.0.0.30")).await.unwrap();

        assert!(ledger.get_pod(&web).await.unwrap().is_none());
        assert!(store.keys().is_empty());
        assert!(ledger.validate_and_record_ip(&db, "10.0.0.30").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_ip_keeps_pod_record() {
        let (ledger, _) = create_test_ledger();
        let web = pod("default", "web-0");

        ledger.put_pod(&web, ip("10.0.0.30"), "eni-1", true).await.unwrap();
        ledger.claim_ip(&web, ip("10.0.0.30")).await.unwrap();

        ledger.delete_ip(ip("10.0.0.30")).await.unwrap();

        assert!(ledger.get_ip(ip("10.0.0.30")).await.unwrap().is_none());
        assert!(ledger.get_pod(&web).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let (ledger, _) = create_test_ledger();
        let claimants: Vec<_> = (0..16).map(|n| pod("default", &format!("web-{}", n))).collect();

        let results = futures::future::join_all(
            claimants
                .iter()
                .map(|identity| ledger.validate_and_record_ip(identity, "10.0.0.30")),
        )
        .await;

        let winners: Vec<_> = results
            .into_iter()
            .zip(&claimants)
            .filter_map(|(claimed, identity)| claimed.unwrap().then_some(identity))
            .collect();
        assert_eq!(winners.len(), 1);

        let owner = ledger.get_ip(ip("10.0.0.30")).await.unwrap().unwrap();
        assert_eq!(&owner.identity(), winners[0]);
    }

    #[tokio::test]
    async fn test_concurrent_claims_across_tasks() {
        let (ledger, _) = create_test_ledger();

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .validate_and_record_ip(&pod("default", &format!("db-{}", n)), "10.0.0.31")
                        .await
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_stored_values_are_compatible_json() {
        let (ledger, store) = create_test_ledger();
        let web = pod("default", "web-0");

        ledger.put_pod(&web, ip("10.0.0.30"), "eni-1", true).await.unwrap();
        ledger.claim_ip(&web, ip("10.0.0.30")).await.unwrap();

        let pod_json: serde_json::Value =
            serde_json::from_slice(&store.get("/vpc/pods/default.web-0").await.unwrap().unwrap()).unwrap();
        assert_eq!(
            pod_json,
            serde_json::json!({"ip": "10.0.0.30", "interfaceID": "eni-1", "ipRetain": "true"})
        );

        let ip_json: serde_json::Value =
            serde_json::from_slice(&store.get("/vpc/ips/10.0.0.30").await.unwrap().unwrap()).unwrap();
        assert_eq!(ip_json, serde_json::json!({"ns": "default", "name": "web-0"}));
    }

    #[tokio::test]
    async fn test_reads_records_written_elsewhere() {
        let (ledger, store) = create_test_ledger();
        store.insert_raw(
            "/vpc/pods/kube-system.dns-1",
            r#"{"ip":"10.0.0.40","interfaceID":"eni-9","ipRetain":""}"#,
        );

        let record = ledger.get_pod(&pod("kube-system", "dns-1")).await.unwrap().unwrap();
        assert_eq!(record.ip, ip("10.0.0.40"));
        assert!(!record.ip_retain);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_serialization_error() {
        let (ledger, store) = create_test_ledger();
        store.insert_raw("/vpc/ips/10.0.0.30", "not json");

        let err = ledger.get_ip(ip("10.0.0.30")).await.unwrap_err();
        assert!(matches!(err, IpamError::Serialization { ref key, .. } if key == "/vpc/ips/10.0.0.30"));
    }

    #[tokio::test]
    async fn test_empty_identity_is_rejected() {
        let (ledger, _) = create_test_ledger();
        let err = ledger.put_ip(&pod("", "web-0"), ip("10.0.0.30")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_dotted_namespace_is_rejected() {
        // ("a.b", "c") and ("a", "b.c") would share the key /vpc/pods/a.b.c
        let (ledger, store) = create_test_ledger();

        let err = ledger
            .put_pod(&pod("a.b", "c"), ip("10.0.0.30"), "eni-2", false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = ledger.put_ip(&pod("a.b", "c"), ip("10.0.0.31")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.keys().is_empty());

        assert!(ledger
            .put_pod(&pod("a", "b.c"), ip("10.0.0.30"), "eni-2", false)
            .await
            .unwrap()
            .is_none());
        assert_eq!(store.keys(), vec!["/vpc/pods/a.b.c".to_string()]);
    }

    #[tokio::test]
    async fn test_padded_ip_string_is_rejected() {
        let (ledger, store) = create_test_ledger();
        let web = pod("default", "web-0");

        let err = ledger.validate_and_record_ip(&web, " 10.0.0.30 ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        let err = ledger.validate_and_record_ip(&web, "10.0.0.30\n").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(store.keys().is_empty());
    }
}
