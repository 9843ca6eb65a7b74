//! Control-plane wiring.
//!
//! [`Controller`] is the surface the transport and discovery collaborators
//! talk to: join/leave/link notifications and decoded packets come in
//! through the `on_*` handlers, and a pump task closes the two internal
//! loops: host-presence events from the lease manager feed the topology
//! store, and every topology change triggers a snapshot, an all-pairs path
//! computation, and a full forwarding-rule sync. The graph lock is never
//! held across an install call.

use dhcproto::v4::Message;
use osprey_common::{Host, HostEvent, PortId, PortNo, SwitchId, TopologyEvent};
use osprey_dhcp::{ArpPacket, ArpProxy, DhcpConfig, DhcpResponder, LeaseManager, PacketSink};
use osprey_routing::{FlowSink, PathTable, RuleInstaller};
use osprey_topology::Topology;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The assembled control plane.
pub struct Controller {
    topology: Arc<Topology>,
    leases: Arc<LeaseManager>,
    responder: DhcpResponder,
    proxy: ArpProxy,
    installer: RuleInstaller,
}

impl Controller {
    pub fn new(
        config: DhcpConfig,
        flows: Arc<dyn FlowSink>,
        packets: Arc<dyn PacketSink>,
    ) -> Self {
        let topology = Arc::new(Topology::new());
        let leases = Arc::new(LeaseManager::new(config.clone()));
        let responder = DhcpResponder::new(config, Arc::clone(&leases), Arc::clone(&packets));
        let proxy = ArpProxy::new(Arc::clone(&leases), packets);
        let installer = RuleInstaller::new(flows);
        Self {
            topology,
            leases,
            responder,
            proxy,
            installer,
        }
    }

    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    pub fn leases(&self) -> &Arc<LeaseManager> {
        &self.leases
    }

    /// A switch joined: record it and punt its unmatched traffic to the
    /// controller.
    pub async fn on_switch_join(&self, switch: SwitchId) {
        self.topology.add_switch(switch);
        self.installer.install_table_miss(switch).await;
    }

    pub fn on_switch_leave(&self, switch: SwitchId) {
        self.topology.remove_switch(switch);
    }

    pub fn on_link_up(&self, src: PortId, dst: PortId) {
        self.topology.add_link(src, dst);
    }

    pub fn on_link_down(&self, src: PortId, dst: PortId) {
        self.topology.remove_link(src, dst);
    }

    /// Decoded lease-protocol packet tagged with its arrival point.
    pub async fn on_dhcp_packet(&self, switch: SwitchId, port: PortNo, message: Message) {
        self.responder.handle_packet(switch, port, message).await;
    }

    /// Decoded address-resolution packet tagged with its arrival point.
    pub async fn on_arp_packet(&self, switch: SwitchId, port: PortNo, packet: ArpPacket) {
        self.proxy.handle_packet(switch, port, packet).await;
    }

    /// Spawn the pump task.
    ///
    /// Subscriptions are taken before the task is spawned, so events
    /// published after `run` returns are never missed.
    pub fn run(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let topo_rx = self.topology.subscribe();
        let host_rx = self.leases.subscribe();
        let controller = Arc::clone(self);
        tokio::spawn(async move { controller.pump(topo_rx, host_rx, shutdown).await })
    }

    async fn pump(
        &self,
        mut topo_rx: broadcast::Receiver<TopologyEvent>,
        mut host_rx: broadcast::Receiver<HostEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("controller pump running");
        loop {
            tokio::select! {
                event = topo_rx.recv() => match event {
                    Ok(event) => {
                        debug!(reason = event.reason(), "recomputing forwarding state");
                        self.recompute().await;
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "topology events lagged, forcing a recompute");
                        self.recompute().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                event = host_rx.recv() => match event {
                    Ok(HostEvent::Added { mac, ip, switch, port }) => {
                        self.topology.add_host(Host::new(mac, switch, port).with_ip(ip));
                    }
                    Ok(HostEvent::Removed { mac, .. }) => {
                        self.topology.remove_host(&mac);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "host events lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("controller pump shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Snapshot the graph, compute all-pairs paths, re-issue every rule.
    async fn recompute(&self) {
        let snapshot = self.topology.snapshot();
        let paths = PathTable::compute(&snapshot);
        let installed = self.installer.sync_all(&snapshot, &paths).await;
        debug!(
            switches = snapshot.switches.len(),
            hosts = snapshot.hosts.len(),
            rules = installed,
            "forwarding state recomputed"
        );
    }
}
