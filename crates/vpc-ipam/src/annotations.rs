//! Pod annotation keys written and read by the CNI plugin

/// Enables VPC IPAM for a pod when set to a true-like value
pub const IPAM: &str = "alcor.io/vpc-cni.ipam";
/// Keep the pod's IP bound when the pod is deleted
pub const IP_RETAIN: &str = "alcor.io/vpc-cni.ipRetain";
/// IP assigned to the pod
pub const IP: &str = "alcor.io/vpc-cni.ip";
/// MAC of the interface the pod's traffic goes through
pub const NIC_MAC: &str = "alcor.io/vpc-cni.nicMAC";
/// ID of the interface the IP is bound to
pub const NIC_ID: &str = "alcor.io/vpc-cni.nicID";
/// Instance the pod runs on; a mismatch with the node means the IP must migrate
pub const INSTANCE_ID: &str = "alcor.io/vpc-cni.instanceID";

/// Annotation and stored flag values that mean "yes"
///
/// Accepts `true`, `yes`, `on` and `1` in any case, ignoring surrounding
/// whitespace. Anything else, including an empty string, is false.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "yes" | "on" | "1"
    )
}
