//! End-to-end exercise of the control plane against mock collaborators.

use async_trait::async_trait;
use dhcproto::v4::{DhcpOption, Message, MessageType, Opcode};
use osprey_common::PortId;
use osprey_controller::Controller;
use osprey_dhcp::{ArpOp, ArpPacket, DhcpConfig, DhcpReply, PacketSink};
use osprey_routing::{FlowAction, FlowRule, FlowSink, FLOW_PRIORITY, TABLE_MISS_PRIORITY};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Default)]
struct FlowRecorder {
    rules: Mutex<Vec<FlowRule>>,
}

#[async_trait]
impl FlowSink for FlowRecorder {
    async fn install(&self, rule: FlowRule) -> anyhow::Result<()> {
        self.rules.lock().unwrap().push(rule);
        Ok(())
    }
}

#[derive(Default)]
struct PacketRecorder {
    dhcp: Mutex<Vec<DhcpReply>>,
    arp: Mutex<Vec<ArpPacket>>,
}

#[async_trait]
impl PacketSink for PacketRecorder {
    async fn send_dhcp(&self, _switch: u64, _port: u32, reply: DhcpReply) -> anyhow::Result<()> {
        self.dhcp.lock().unwrap().push(reply);
        Ok(())
    }

    async fn send_arp(&self, _switch: u64, _port: u32, reply: ArpPacket) -> anyhow::Result<()> {
        self.arp.lock().unwrap().push(reply);
        Ok(())
    }
}

fn lease_packet(mac: [u8; 6], xid: u32, message_type: MessageType) -> Message {
    let mut message = Message::default();
    message.set_opcode(Opcode::BootRequest);
    message.set_xid(xid);
    let mut chaddr = [0u8; 16];
    chaddr[..6].copy_from_slice(&mac);
    message.set_chaddr(&chaddr);
    message
        .opts_mut()
        .insert(DhcpOption::MessageType(message_type));
    message
}

fn who_has(target_ip: Ipv4Addr, sender_mac: &str, sender_ip: Ipv4Addr) -> ArpPacket {
    ArpPacket {
        op: ArpOp::Request,
        sender_mac: sender_mac.to_string(),
        sender_ip,
        target_mac: "00:00:00:00:00:00".to_string(),
        target_ip,
    }
}

async fn wait_for(mut cond: impl FnMut() -> bool, what: &str) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

const MAC_A: [u8; 6] = [0xaa, 0x00, 0x00, 0x00, 0x00, 0x01];
const MAC_B: [u8; 6] = [0xaa, 0x00, 0x00, 0x00, 0x00, 0x02];

fn start() -> (
    Arc<Controller>,
    Arc<FlowRecorder>,
    Arc<PacketRecorder>,
    watch::Sender<bool>,
) {
    let flows = Arc::new(FlowRecorder::default());
    let packets = Arc::new(PacketRecorder::default());
    let controller = Arc::new(Controller::new(
        DhcpConfig::default(),
        flows.clone(),
        packets.clone(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    controller.run(shutdown_rx);
    (controller, flows, packets, shutdown_tx)
}

#[tokio::test]
async fn test_leased_hosts_get_rules_along_the_path() {
    let (controller, flows, packets, _shutdown) = start();

    // 1 -(p2:p2)- 2 -(p3:p2)- 3
    controller.on_switch_join(1).await;
    controller.on_switch_join(2).await;
    controller.on_switch_join(3).await;
    controller.on_link_up(PortId::new(1, 2), PortId::new(2, 2));
    controller.on_link_up(PortId::new(2, 3), PortId::new(3, 2));

    // one table-miss rule per join, issued synchronously
    {
        let rules = flows.rules.lock().unwrap();
        let misses: Vec<_> = rules
            .iter()
            .filter(|r| r.priority == TABLE_MISS_PRIORITY)
            .collect();
        assert_eq!(misses.len(), 3);
        assert!(misses.iter().all(|r| r.action == FlowAction::ToController));
    }

    controller
        .on_dhcp_packet(1, 1, lease_packet(MAC_A, 1, MessageType::Discover))
        .await;
    controller
        .on_dhcp_packet(3, 1, lease_packet(MAC_B, 2, MessageType::Discover))
        .await;

    let (ip_a, ip_b) = {
        let replies = packets.dhcp.lock().unwrap();
        assert_eq!(replies.len(), 2);
        (replies[0].message.yiaddr(), replies[1].message.yiaddr())
    };
    assert_ne!(ip_a, ip_b);

    // the pump turns host events into topology changes into installed rules
    wait_for(
        || {
            flows.rules.lock().unwrap().iter().any(|r| {
                r.switch == 2
                    && r.pattern.eth_src.as_deref() == Some("aa:00:00:00:00:01")
                    && r.action == FlowAction::Output(3)
            })
        },
        "rules on the middle switch",
    )
    .await;

    let rules = flows.rules.lock().unwrap();
    let forward: Vec<&FlowRule> = rules
        .iter()
        .filter(|r| {
            r.pattern.eth_src.as_deref() == Some("aa:00:00:00:00:01")
                && r.pattern.eth_dst.as_deref() == Some("aa:00:00:00:00:02")
        })
        .collect();
    assert!(forward
        .iter()
        .any(|r| r.switch == 1 && r.pattern.in_port == Some(1) && r.action == FlowAction::Output(2)));
    assert!(forward
        .iter()
        .any(|r| r.switch == 2 && r.pattern.in_port == Some(2) && r.action == FlowAction::Output(3)));
    assert!(forward
        .iter()
        .any(|r| r.switch == 3 && r.pattern.in_port == Some(2) && r.action == FlowAction::Output(1)));
    assert!(forward.iter().all(|r| {
        r.priority == FLOW_PRIORITY
            && r.pattern.ipv4_src == Some(ip_a)
            && r.pattern.ipv4_dst == Some(ip_b)
    }));

    // the reverse pair got its own rules
    assert!(rules.iter().any(|r| {
        r.switch == 2
            && r.pattern.eth_src.as_deref() == Some("aa:00:00:00:00:02")
            && r.action == FlowAction::Output(2)
    }));
}

#[tokio::test]
async fn test_same_switch_hosts_forward_locally() {
    let (controller, flows, packets, _shutdown) = start();

    controller.on_switch_join(7).await;
    controller
        .on_dhcp_packet(7, 1, lease_packet(MAC_A, 1, MessageType::Discover))
        .await;
    controller
        .on_dhcp_packet(7, 4, lease_packet(MAC_B, 2, MessageType::Discover))
        .await;
    assert_eq!(packets.dhcp.lock().unwrap().len(), 2);

    wait_for(
        || {
            flows.rules.lock().unwrap().iter().any(|r| {
                r.pattern.eth_src.as_deref() == Some("aa:00:00:00:00:01")
                    && r.action == FlowAction::Output(4)
            })
        },
        "local forwarding rules",
    )
    .await;

    let rules = flows.rules.lock().unwrap();
    let pair: Vec<&FlowRule> = rules
        .iter()
        .filter(|r| r.priority == FLOW_PRIORITY)
        .collect();
    assert!(pair.iter().all(|r| r.switch == 7));
    assert!(pair
        .iter()
        .any(|r| r.pattern.in_port == Some(1) && r.action == FlowAction::Output(4)));
    assert!(pair
        .iter()
        .any(|r| r.pattern.in_port == Some(4) && r.action == FlowAction::Output(1)));
}

#[tokio::test]
async fn test_proxy_answers_for_leased_hosts_only() {
    let (controller, _flows, packets, _shutdown) = start();

    controller.on_switch_join(1).await;
    controller
        .on_dhcp_packet(1, 1, lease_packet(MAC_A, 1, MessageType::Discover))
        .await;
    let ip_a = packets.dhcp.lock().unwrap()[0].message.yiaddr();

    controller
        .on_arp_packet(1, 5, who_has(ip_a, "aa:00:00:00:00:02", Ipv4Addr::new(10, 0, 0, 99)))
        .await;
    {
        let arp = packets.arp.lock().unwrap();
        assert_eq!(arp.len(), 1);
        assert_eq!(arp[0].op, ArpOp::Reply);
        assert_eq!(arp[0].sender_mac, "aa:00:00:00:00:01");
        assert_eq!(arp[0].sender_ip, ip_a);
        assert_eq!(arp[0].target_mac, "aa:00:00:00:00:02");
    }

    // nobody leases .254: the proxy stays silent
    controller
        .on_arp_packet(
            1,
            5,
            who_has(
                Ipv4Addr::new(10, 0, 0, 254),
                "aa:00:00:00:00:02",
                Ipv4Addr::new(10, 0, 0, 99),
            ),
        )
        .await;
    assert_eq!(packets.arp.lock().unwrap().len(), 1);
}
