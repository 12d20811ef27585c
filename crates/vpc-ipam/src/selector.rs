//! Interface selection policy
//!
//! Decides which of an instance's network interfaces a new pod address
//! should be bound to. Selection is a pure function of the policy and the
//! interface list, so a caller retrying a flow gets the same answer for the
//! same observed state.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use vpc_client::NetworkInterface;

/// How pods are spread over an instance's network interfaces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Each pod gets a bare non-primary interface of its own
    Exclusive,
    /// Pods share non-primary interfaces, least loaded first
    #[default]
    Share,
    /// Like `Share`, with the primary interface also eligible
    SharePrimary,
}

impl fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exclusive => "Exclusive",
            Self::Share => "Share",
            Self::SharePrimary => "SharePrimary",
        };
        f.write_str(name)
    }
}

/// Pick an interface for a new pod address
///
/// Returns the index into `interfaces`, or `None` when no interface is eligible.
#[must_use]
pub fn select_interface(policy: SelectionPolicy, interfaces: &[NetworkInterface]) -> Option<usize> {
    let chosen = match policy {
        SelectionPolicy::Exclusive => select_exclusive(interfaces),
        SelectionPolicy::Share => select_least_loaded(interfaces, false),
        SelectionPolicy::SharePrimary => select_least_loaded(interfaces, true),
    };
    match chosen {
        Some(idx) => debug!(
            "{} policy chose interface {} ({} addresses)",
            policy, interfaces[idx].network_interface_id, interfaces[idx].address_count()
        ),
        None => debug!("{} policy found no eligible interface among {}", policy, interfaces.len()),
    }
    chosen
}

/// First non-primary interface that only carries its own primary address
fn select_exclusive(interfaces: &[NetworkInterface]) -> Option<usize> {
    interfaces
        .iter()
        .position(|i| !i.primary && i.address_count() == 1)
}

/// Eligible interface with the fewest bound addresses; earliest wins ties
fn select_least_loaded(interfaces: &[NetworkInterface], include_primary: bool) -> Option<usize> {
    interfaces
        .iter()
        .enumerate()
        .filter(|(_, i)| include_primary || !i.primary)
        .min_by_key(|(_, i)| i.address_count())
        .map(|(idx, _)| idx)
}
