//! The topology store.

use osprey_common::{Host, PortId, PortNo, SwitchId, TopologyEvent};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Point-in-time copy of the graph, taken under a single lock hold.
///
/// `switches` preserves insertion order; `adjacency` is indexed by that
/// order. `port_map` carries every link in both directions as
/// `(from, to) -> (egress port on from, ingress port on to)`. Hosts are
/// sorted by MAC so enumeration over a snapshot is deterministic.
#[derive(Debug, Clone)]
pub struct TopologySnapshot {
    pub switches: Vec<SwitchId>,
    pub adjacency: Vec<Vec<u32>>,
    pub port_map: HashMap<(SwitchId, SwitchId), (PortNo, PortNo)>,
    pub hosts: Vec<Host>,
}

struct Graph {
    /// Insertion order doubles as the adjacency-matrix index.
    switches: Vec<SwitchId>,
    /// Directed: the reverse direction is an independent entry.
    links: HashMap<PortId, PortId>,
    hosts: HashMap<String, Host>,
}

impl Graph {
    fn index_of(&self, switch: SwitchId) -> Option<usize> {
        self.switches.iter().position(|&s| s == switch)
    }

    fn adjacency(&self) -> Vec<Vec<u32>> {
        let n = self.switches.len();
        let mut matrix = vec![vec![0u32; n]; n];
        for (src, dst) in &self.links {
            if let (Some(i), Some(j)) = (self.index_of(src.switch), self.index_of(dst.switch)) {
                if i != j {
                    matrix[i][j] = 1;
                    matrix[j][i] = 1;
                }
            }
        }
        matrix
    }

    fn port_map(&self) -> HashMap<(SwitchId, SwitchId), (PortNo, PortNo)> {
        let mut map = HashMap::new();
        for (src, dst) in &self.links {
            map.insert((src.switch, dst.switch), (src.port, dst.port));
            map.insert((dst.switch, src.switch), (dst.port, src.port));
        }
        map
    }
}

/// Authoritative switch/link/host table.
///
/// All mutators are idempotent: re-adding a known entity or removing an
/// unknown one is a no-op and publishes nothing.
pub struct Topology {
    graph: Mutex<Graph>,
    events: broadcast::Sender<TopologyEvent>,
}

impl Topology {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            graph: Mutex::new(Graph {
                switches: Vec::new(),
                links: HashMap::new(),
                hosts: HashMap::new(),
            }),
            events,
        }
    }

    /// Subscribe to topology change events.
    pub fn subscribe(&self) -> broadcast::Receiver<TopologyEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock().expect("topology lock poisoned")
    }

    fn emit(&self, event: TopologyEvent) {
        debug!(reason = event.reason(), "topology changed");
        // Nobody listening yet is fine
        let _ = self.events.send(event);
    }

    pub fn add_switch(&self, switch: SwitchId) {
        {
            let mut graph = self.lock();
            if graph.switches.contains(&switch) {
                debug!(switch, "switch already known");
                return;
            }
            graph.switches.push(switch);
        }
        info!(switch, "switch entered");
        self.emit(TopologyEvent::SwitchEnter(switch));
    }

    /// Remove a switch together with all of its incident links.
    pub fn remove_switch(&self, switch: SwitchId) {
        {
            let mut graph = self.lock();
            let Some(index) = graph.index_of(switch) else {
                return;
            };
            graph.switches.remove(index);
            graph
                .links
                .retain(|src, dst| src.switch != switch && dst.switch != switch);
        }
        info!(switch, "switch left");
        self.emit(TopologyEvent::SwitchLeave(switch));
    }

    pub fn add_link(&self, src: PortId, dst: PortId) {
        {
            let mut graph = self.lock();
            if graph.index_of(src.switch).is_none() || graph.index_of(dst.switch).is_none() {
                warn!(%src, %dst, "link endpoints name an unknown switch, ignoring");
                return;
            }
            if graph.links.get(&src) == Some(&dst) {
                return;
            }
            graph.links.insert(src, dst);
        }
        info!(%src, %dst, "link up");
        self.emit(TopologyEvent::LinkAdd { src, dst });
    }

    pub fn remove_link(&self, src: PortId, dst: PortId) {
        {
            let mut graph = self.lock();
            if graph.links.get(&src) != Some(&dst) {
                return;
            }
            graph.links.remove(&src);
        }
        info!(%src, %dst, "link down");
        self.emit(TopologyEvent::LinkDelete { src, dst });
    }

    /// Record a host, or move a known host's attachment point.
    ///
    /// Re-adding a host with an unchanged record is a no-op.
    pub fn add_host(&self, host: Host) {
        let mac = host.mac.clone();
        {
            let mut graph = self.lock();
            if let Some(known) = graph.hosts.get(&mac) {
                if known.switch == host.switch && known.port == host.port && known.ips == host.ips
                {
                    return;
                }
            }
            graph.hosts.insert(mac.clone(), host);
        }
        info!(mac = %mac, "host added");
        self.emit(TopologyEvent::HostAdd { mac });
    }

    pub fn remove_host(&self, mac: &str) {
        {
            let mut graph = self.lock();
            if graph.hosts.remove(mac).is_none() {
                return;
            }
        }
        info!(mac = %mac, "host deleted");
        self.emit(TopologyEvent::HostDelete {
            mac: mac.to_string(),
        });
    }

    /// 0/1 adjacency over the current switch set, in insertion order.
    ///
    /// An entry is 1 when a direct link exists in either direction; the
    /// diagonal is 0.
    pub fn adjacency_matrix(&self) -> Vec<Vec<u32>> {
        self.lock().adjacency()
    }

    /// Connecting ports of a direct link between two switches, if any.
    pub fn connecting_ports(&self, a: SwitchId, b: SwitchId) -> Option<(PortNo, PortNo)> {
        let graph = self.lock();
        for (src, dst) in &graph.links {
            if src.switch == a && dst.switch == b {
                return Some((src.port, dst.port));
            }
            if src.switch == b && dst.switch == a {
                return Some((dst.port, src.port));
            }
        }
        None
    }

    /// Copy the whole graph under one lock hold.
    pub fn snapshot(&self) -> TopologySnapshot {
        let graph = self.lock();
        let mut hosts: Vec<Host> = graph.hosts.values().cloned().collect();
        hosts.sort_by(|a, b| a.mac.cmp(&b.mac));
        TopologySnapshot {
            switches: graph.switches.clone(),
            adjacency: graph.adjacency(),
            port_map: graph.port_map(),
            hosts,
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}
