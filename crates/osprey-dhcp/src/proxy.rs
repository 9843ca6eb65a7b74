//! Proxy address resolution.
//!
//! Who-has requests for leased addresses are answered by the controller on
//! the owner's behalf, straight out of the lease table; the request never
//! reaches the owner. Misses stay silent so the requester's own retry
//! logic applies.

use crate::lease::LeaseManager;
use crate::responder::PacketSink;
use osprey_common::{PortNo, SwitchId};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Address-resolution opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    Request,
    Reply,
}

/// A decoded address-resolution packet; the transport owns the wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_mac: String,
    pub sender_ip: Ipv4Addr,
    pub target_mac: String,
    pub target_ip: Ipv4Addr,
}

impl ArpPacket {
    /// The reply to this request, speaking for `owner_mac`.
    fn answered_by(&self, owner_mac: String) -> ArpPacket {
        ArpPacket {
            op: ArpOp::Reply,
            sender_mac: owner_mac,
            sender_ip: self.target_ip,
            target_mac: self.sender_mac.clone(),
            target_ip: self.sender_ip,
        }
    }
}

/// Answers address-resolution requests from the lease table.
pub struct ArpProxy {
    leases: Arc<LeaseManager>,
    sink: Arc<dyn PacketSink>,
}

impl ArpProxy {
    pub fn new(leases: Arc<LeaseManager>, sink: Arc<dyn PacketSink>) -> Self {
        Self { leases, sink }
    }

    /// Handle one decoded address-resolution packet that arrived on the
    /// given switch port. Replies go back out the same port.
    pub async fn handle_packet(&self, switch: SwitchId, port: PortNo, packet: ArpPacket) {
        if packet.op != ArpOp::Request {
            return;
        }
        let Some(mac) = self.leases.mac_for_ip(packet.target_ip) else {
            debug!(ip = %packet.target_ip, "no lease holds the requested address");
            return;
        };
        debug!(
            ip = %packet.target_ip,
            mac = %mac,
            requester = %packet.sender_mac,
            "answering address resolution on behalf of leased host"
        );
        let reply = packet.answered_by(mac);
        if let Err(e) = self.sink.send_arp(switch, port, reply).await {
            warn!(error = %e, "address-resolution reply send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DhcpConfig;
    use crate::responder::DhcpReply;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        arp: Mutex<Vec<(SwitchId, PortNo, ArpPacket)>>,
    }

    #[async_trait]
    impl PacketSink for Recorder {
        async fn send_dhcp(
            &self,
            _switch: SwitchId,
            _port: PortNo,
            _reply: DhcpReply,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        async fn send_arp(
            &self,
            switch: SwitchId,
            port: PortNo,
            reply: ArpPacket,
        ) -> anyhow::Result<()> {
            self.arp.lock().unwrap().push((switch, port, reply));
            Ok(())
        }
    }

    fn request_for(target_ip: Ipv4Addr) -> ArpPacket {
        ArpPacket {
            op: ArpOp::Request,
            sender_mac: "aa:00:00:00:00:02".to_string(),
            sender_ip: Ipv4Addr::new(10, 0, 0, 50),
            target_mac: "00:00:00:00:00:00".to_string(),
            target_ip,
        }
    }

    fn proxy() -> (ArpProxy, Arc<LeaseManager>, Arc<Recorder>) {
        let leases = Arc::new(LeaseManager::new(DhcpConfig::default()));
        let sink = Arc::new(Recorder::default());
        let proxy = ArpProxy::new(leases.clone(), sink.clone());
        (proxy, leases, sink)
    }

    #[tokio::test]
    async fn test_request_for_leased_address_is_answered() {
        let (proxy, leases, sink) = proxy();
        let ip = leases.renew_or_create("aa:00:00:00:00:01", 3, 4).unwrap();

        proxy.handle_packet(3, 4, request_for(ip)).await;

        let sent = sink.arp.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (switch, port, reply) = &sent[0];
        // back out the port the request came in on
        assert_eq!((*switch, *port), (3, 4));
        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.sender_mac, "aa:00:00:00:00:01");
        assert_eq!(reply.sender_ip, ip);
        assert_eq!(reply.target_mac, "aa:00:00:00:00:02");
        assert_eq!(reply.target_ip, Ipv4Addr::new(10, 0, 0, 50));
    }

    #[tokio::test]
    async fn test_request_for_unleased_address_stays_silent() {
        let (proxy, _, sink) = proxy();
        proxy
            .handle_packet(1, 1, request_for(Ipv4Addr::new(10, 0, 0, 200)))
            .await;
        assert!(sink.arp.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_replies_are_ignored() {
        let (proxy, leases, sink) = proxy();
        let ip = leases.renew_or_create("aa:00:00:00:00:01", 1, 1).unwrap();
        let mut packet = request_for(ip);
        packet.op = ArpOp::Reply;
        proxy.handle_packet(1, 1, packet).await;
        assert!(sink.arp.lock().unwrap().is_empty());
    }
}
