//! Events published by the topology store and the lease manager.

use crate::types::{PortId, PortNo, SwitchId};
use std::net::Ipv4Addr;

/// A change to the switch/link/host graph, tagged with its reason.
///
/// The store emits exactly one of these per mutation that actually changed
/// state; duplicate notifications are absorbed silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopologyEvent {
    SwitchEnter(SwitchId),
    SwitchLeave(SwitchId),
    LinkAdd { src: PortId, dst: PortId },
    LinkDelete { src: PortId, dst: PortId },
    HostAdd { mac: String },
    HostDelete { mac: String },
}

impl TopologyEvent {
    /// Reason tag for logging.
    pub fn reason(&self) -> &'static str {
        match self {
            TopologyEvent::SwitchEnter(_) => "switch-enter",
            TopologyEvent::SwitchLeave(_) => "switch-leave",
            TopologyEvent::LinkAdd { .. } => "link-add",
            TopologyEvent::LinkDelete { .. } => "link-delete",
            TopologyEvent::HostAdd { .. } => "host-add",
            TopologyEvent::HostDelete { .. } => "host-delete",
        }
    }
}

/// Host presence as seen by the lease manager.
///
/// `Added` fires on every granted lease (new or refreshed attachment),
/// `Removed` when an expiry sweep reclaims the lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Added {
        mac: String,
        ip: Ipv4Addr,
        switch: SwitchId,
        port: PortNo,
    },
    Removed {
        mac: String,
        ip: Ipv4Addr,
        switch: SwitchId,
        port: PortNo,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topology_event_reason() {
        assert_eq!(TopologyEvent::SwitchEnter(1).reason(), "switch-enter");
        assert_eq!(
            TopologyEvent::LinkDelete {
                src: PortId::new(1, 1),
                dst: PortId::new(2, 1),
            }
            .reason(),
            "link-delete"
        );
        assert_eq!(
            TopologyEvent::HostAdd {
                mac: "aa:bb:cc:dd:ee:ff".to_string()
            }
            .reason(),
            "host-add"
        );
    }
}
