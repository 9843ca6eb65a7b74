//! The lease-protocol responder.
//!
//! Speaks the 4-message exchange: DISCOVER is answered with an OFFER
//! carrying a pool address, REQUEST with an ACK echoing the bound address.
//! DECLINE, RELEASE, INFORM and NAK are deliberate no-ops. Replies are
//! assembled as decoded `dhcproto` messages; the transport serializes.

use crate::config::DhcpConfig;
use crate::error::{DhcpError, Result};
use crate::lease::LeaseManager;
use crate::proxy::ArpPacket;
use async_trait::async_trait;
use dhcproto::v4::{DhcpOption, Message, MessageType, Opcode, OptionCode};
use osprey_common::{PortNo, SwitchId};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inbound lease-protocol packet, unwrapped from its decoded message.
#[derive(Debug, Clone)]
pub struct LeaseRequest {
    pub message: Message,
    pub message_type: MessageType,
    /// Client hardware address, normalized
    pub mac: String,
    pub xid: u32,
}

impl LeaseRequest {
    pub fn from_message(message: Message) -> Result<Self> {
        let message_type = message
            .opts()
            .get(OptionCode::MessageType)
            .and_then(|opt| {
                if let DhcpOption::MessageType(mt) = opt {
                    Some(mt.clone())
                } else {
                    None
                }
            })
            .ok_or_else(|| DhcpError::MalformedMessage("missing message type".to_string()))?;

        let chaddr = message.chaddr();
        if chaddr.len() < 6 {
            return Err(DhcpError::MalformedMessage(
                "short hardware address".to_string(),
            ));
        }
        let mac = format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            chaddr[0], chaddr[1], chaddr[2], chaddr[3], chaddr[4], chaddr[5]
        );

        Ok(Self {
            xid: message.xid(),
            message,
            message_type,
            mac,
        })
    }
}

/// A reply frame with the server as source; the transport owns framing
/// bytes and serialization.
#[derive(Debug, Clone)]
pub struct DhcpReply {
    pub eth_src: String,
    pub eth_dst: String,
    pub ipv4_src: Ipv4Addr,
    pub ipv4_dst: Ipv4Addr,
    pub message: Message,
}

/// Capability to emit an outbound packet on a switch port, implemented by
/// the transport. Fire-and-forget.
#[async_trait]
pub trait PacketSink: Send + Sync {
    async fn send_dhcp(
        &self,
        switch: SwitchId,
        port: PortNo,
        reply: DhcpReply,
    ) -> anyhow::Result<()>;

    async fn send_arp(
        &self,
        switch: SwitchId,
        port: PortNo,
        reply: ArpPacket,
    ) -> anyhow::Result<()>;
}

/// Answers lease-protocol packets and drives the expiry sweep.
pub struct DhcpResponder {
    config: DhcpConfig,
    leases: Arc<LeaseManager>,
    sink: Arc<dyn PacketSink>,
}

impl DhcpResponder {
    pub fn new(config: DhcpConfig, leases: Arc<LeaseManager>, sink: Arc<dyn PacketSink>) -> Self {
        Self {
            config,
            leases,
            sink,
        }
    }

    /// Handle one decoded lease-protocol packet that arrived on the given
    /// switch port.
    pub async fn handle_packet(&self, switch: SwitchId, port: PortNo, message: Message) {
        let request = match LeaseRequest::from_message(message) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "dropping unusable lease packet");
                return;
            }
        };
        debug!(
            mac = %request.mac,
            msg_type = ?request.message_type,
            switch,
            port,
            "received lease packet"
        );

        match request.message_type {
            MessageType::Discover => self.handle_discover(switch, port, request).await,
            MessageType::Request => self.handle_request(switch, port, request).await,
            other => {
                debug!(msg_type = ?other, "ignoring lease message");
            }
        }
    }

    async fn handle_discover(&self, switch: SwitchId, port: PortNo, request: LeaseRequest) {
        let ip = match self.leases.renew_or_create(&request.mac, switch, port) {
            Ok(ip) => ip,
            Err(DhcpError::PoolExhausted) => {
                warn!(mac = %request.mac, "no address available, dropping discover");
                return;
            }
            Err(e) => {
                warn!(mac = %request.mac, error = %e, "discover failed");
                return;
            }
        };
        let reply = self.assemble_reply(&request, MessageType::Offer, ip);
        self.send(switch, port, reply).await;
    }

    async fn handle_request(&self, switch: SwitchId, port: PortNo, request: LeaseRequest) {
        let Some(ip) = self.leases.renew(&request.mac) else {
            debug!(mac = %request.mac, "request from a mac without a lease");
            return;
        };
        let reply = self.assemble_reply(&request, MessageType::Ack, ip);
        self.send(switch, port, reply).await;
        // every granted ACK rides an expiry pass over the whole table
        self.leases.sweep_expired();
    }

    /// Build the OFFER/ACK for a request: echo the client's option set
    /// minus the fields the server owns, then add the fixed server
    /// options, with direction swapped and the bound address as yiaddr.
    fn assemble_reply(
        &self,
        request: &LeaseRequest,
        message_type: MessageType,
        ip: Ipv4Addr,
    ) -> DhcpReply {
        let mut message = Message::default();
        message.set_opcode(Opcode::BootReply);
        message.set_xid(request.xid);
        message.set_flags(request.message.flags());
        message.set_chaddr(request.message.chaddr());
        message.set_giaddr(request.message.giaddr());
        message.set_yiaddr(ip);
        message.set_siaddr(self.config.server_ip);

        let mut opts = request.message.opts().clone();
        opts.remove(OptionCode::MessageType);
        opts.remove(OptionCode::RequestedIpAddress);
        opts.remove(OptionCode::ParameterRequestList);
        opts.remove(OptionCode::Hostname);
        *message.opts_mut() = opts;

        message
            .opts_mut()
            .insert(DhcpOption::SubnetMask(self.config.subnet_mask));
        message
            .opts_mut()
            .insert(DhcpOption::Router(vec![self.config.server_ip]));
        message
            .opts_mut()
            .insert(DhcpOption::DomainNameServer(self.config.dns_servers.clone()));
        message
            .opts_mut()
            .insert(DhcpOption::AddressLeaseTime(self.config.lease_time));
        message
            .opts_mut()
            .insert(DhcpOption::MessageType(message_type));
        message
            .opts_mut()
            .insert(DhcpOption::Renewal(self.config.renewal_time()));
        message
            .opts_mut()
            .insert(DhcpOption::Rebinding(self.config.rebind_time()));

        // unicast when the client already has an address, broadcast otherwise
        let ipv4_dst = if request.message.giaddr() != Ipv4Addr::UNSPECIFIED {
            request.message.giaddr()
        } else if request.message.ciaddr() != Ipv4Addr::UNSPECIFIED {
            request.message.ciaddr()
        } else {
            Ipv4Addr::BROADCAST
        };

        DhcpReply {
            eth_src: self.config.server_mac.clone(),
            eth_dst: request.mac.clone(),
            ipv4_src: self.config.server_ip,
            ipv4_dst,
            message,
        }
    }

    async fn send(&self, switch: SwitchId, port: PortNo, reply: DhcpReply) {
        info!(
            mac = %reply.eth_dst,
            ip = %reply.message.yiaddr(),
            switch,
            port,
            "sending lease reply"
        );
        if let Err(e) = self.sink.send_dhcp(switch, port, reply).await {
            warn!(error = %e, "lease reply send failed");
        }
    }
}
