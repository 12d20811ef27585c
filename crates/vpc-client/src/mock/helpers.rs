//! Helper functions for building interface fixtures

use crate::models::{InterfaceInstance, NetworkInterface, PrivateAddress};

/// Build a network interface whose first address is its primary address
///
/// Addresses that do not parse are skipped.
#[must_use]
pub fn network_interface(id: &str, instance_id: &str, primary: bool, addresses: &[&str]) -> NetworkInterface {
    let private_ip_address_set = addresses
        .iter()
        .filter_map(|a| a.parse().ok())
        .enumerate()
        .map(|(idx, private_ip_address)| PrivateAddress {
            primary: idx == 0,
            private_ip_address,
        })
        .collect();

    NetworkInterface {
        network_interface_id: id.to_string(),
        instance: (!instance_id.is_empty()).then(|| InterfaceInstance {
            instance_id: instance_id.to_string(),
        }),
        mac_address: mac_for(id),
        primary,
        private_ip_address_set,
        subnet_id: "subnet-test".to_string(),
        vpc_id: "vpc-test".to_string(),
        vpc_name: "test".to_string(),
    }
}

/// Deterministic locally administered MAC derived from the interface id
fn mac_for(id: &str) -> String {
    let sum = id.bytes().fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    let [a, b, c, d] = sum.to_be_bytes();
    format!("52:54:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_address_is_primary() {
        let iface = network_interface("eni-1", "ins-1", false, &["10.0.0.2", "10.0.0.3"]);
        assert_eq!(iface.address_count(), 2);
        assert_eq!(iface.primary_address(), Some("10.0.0.2".parse().unwrap()));
        assert_eq!(iface.instance_id(), Some("ins-1"));
        assert_eq!(iface.mac_address, network_interface("eni-1", "", true, &[]).mac_address);
    }
}
