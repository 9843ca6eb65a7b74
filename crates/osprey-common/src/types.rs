//! Core identifiers and the host record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Datapath identifier of a switch.
pub type SwitchId = u64;

/// Switch-local port number.
pub type PortNo = u32;

/// One endpoint of an inter-switch link: a (switch, port) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortId {
    pub switch: SwitchId,
    pub port: PortNo,
}

impl PortId {
    pub fn new(switch: SwitchId, port: PortNo) -> Self {
        Self { switch, port }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}:{}", self.switch, self.port)
    }
}

/// Normalize a MAC address to lowercase with colons
pub fn normalize_mac(mac: &str) -> String {
    mac.to_lowercase().replace('-', ":")
}

/// An end host attached to a switch port, identified by its MAC address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub mac: String,
    pub switch: SwitchId,
    pub port: PortNo,
    /// Addresses currently leased to this host
    #[serde(default)]
    pub ips: Vec<Ipv4Addr>,
    #[serde(default = "Utc::now")]
    pub first_seen: DateTime<Utc>,
}

impl Host {
    pub fn new(mac: impl Into<String>, switch: SwitchId, port: PortNo) -> Self {
        Self {
            mac: normalize_mac(&mac.into()),
            switch,
            port,
            ips: Vec::new(),
            first_seen: Utc::now(),
        }
    }

    pub fn with_ip(mut self, ip: Ipv4Addr) -> Self {
        self.ips.push(ip);
        self
    }

    /// The host's attachment point as a `PortId`.
    pub fn attachment(&self) -> PortId {
        PortId::new(self.switch, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_mac() {
        assert_eq!(normalize_mac("0A-E4-1C-D1-3E-44"), "0a:e4:1c:d1:3e:44");
        assert_eq!(normalize_mac("aa:bb:cc:dd:ee:ff"), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_port_id_display() {
        let p = PortId::new(3, 2);
        assert_eq!(p.to_string(), "s3:2");
    }

    #[test]
    fn test_host_builder() {
        let host = Host::new("AA:BB:CC:00:11:22", 7, 4).with_ip(Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(host.mac, "aa:bb:cc:00:11:22");
        assert_eq!(host.attachment(), PortId::new(7, 4));
        assert_eq!(host.ips, vec![Ipv4Addr::new(10, 0, 0, 5)]);
    }
}
