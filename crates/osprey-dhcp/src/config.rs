//! Lease responder configuration.

use std::net::Ipv4Addr;

/// Configuration for the lease responder and the address pool.
#[derive(Debug, Clone)]
pub struct DhcpConfig {
    /// Address the responder answers from (also offered as the gateway)
    pub server_ip: Ipv4Addr,

    /// Hardware address the responder answers from
    pub server_mac: String,

    /// Subnet mask offered to clients
    pub subnet_mask: Ipv4Addr,

    /// DNS servers offered to clients
    pub dns_servers: Vec<Ipv4Addr>,

    /// Lease lifetime in seconds; also the sweep expiry bound
    pub lease_time: u32,

    /// The /24 whose host ids 2..=253 feed the pool
    pub network: Ipv4Addr,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        Self {
            server_ip: Ipv4Addr::new(10, 0, 0, 1),
            server_mac: "0a:e4:1c:d1:3e:44".to_string(),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            dns_servers: vec![Ipv4Addr::new(8, 8, 8, 8)],
            lease_time: 30,
            network: Ipv4Addr::new(10, 0, 0, 0),
        }
    }
}

impl DhcpConfig {
    pub fn new(server_ip: Ipv4Addr) -> Self {
        Self {
            server_ip,
            ..Default::default()
        }
    }

    pub fn with_server_mac(mut self, mac: impl Into<String>) -> Self {
        self.server_mac = osprey_common::normalize_mac(&mac.into());
        self
    }

    pub fn with_subnet_mask(mut self, mask: Ipv4Addr) -> Self {
        self.subnet_mask = mask;
        self
    }

    pub fn with_dns_server(mut self, dns: Ipv4Addr) -> Self {
        self.dns_servers.push(dns);
        self
    }

    pub fn with_lease_time(mut self, seconds: u32) -> Self {
        self.lease_time = seconds;
        self
    }

    pub fn with_network(mut self, network: Ipv4Addr) -> Self {
        self.network = network;
        self
    }

    /// Renewal time (option 58): half the lease lifetime.
    pub fn renewal_time(&self) -> u32 {
        self.lease_time / 2
    }

    /// Rebinding time (option 59): seven eighths of the lease lifetime.
    pub fn rebind_time(&self) -> u32 {
        self.lease_time * 7 / 8
    }

    /// The pool address with the given host id.
    pub fn address_for(&self, host_id: u8) -> Ipv4Addr {
        let [a, b, c, _] = self.network.octets();
        Ipv4Addr::new(a, b, c, host_id)
    }
}
