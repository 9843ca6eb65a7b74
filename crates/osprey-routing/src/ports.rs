//! Per-hop port resolution along a switch path.

use crate::error::{Result, RoutingError};
use osprey_common::{PortNo, SwitchId};
use std::collections::HashMap;

/// Directed connecting-port map: `(from, to) -> (egress on from, ingress on
/// to)`, derived once per recomputation from all known links in both
/// directions.
pub type PortMap = HashMap<(SwitchId, SwitchId), (PortNo, PortNo)>;

/// Ingress/egress ports at one path position.
///
/// `None` marks a host-facing slot: the first hop's ingress and the last
/// hop's egress connect to an end host, not another switch, and are filled
/// in by the caller with the hosts' attachment ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortHop {
    pub ingress: Option<PortNo>,
    pub egress: Option<PortNo>,
}

/// Resolve the ingress/egress port sequence for a switch-id path.
///
/// A single-switch path (both hosts on one switch) resolves to one hop
/// with both slots host-facing; no map lookup happens. A lookup miss on a
/// multi-switch path means the port map and the path disagree and is
/// surfaced as [`RoutingError::PortLookup`].
pub fn resolve_hops(path: &[SwitchId], ports: &PortMap) -> Result<Vec<PortHop>> {
    let connecting = |from: SwitchId, to: SwitchId| -> Result<(PortNo, PortNo)> {
        ports
            .get(&(from, to))
            .copied()
            .ok_or(RoutingError::PortLookup { from, to })
    };

    let mut hops = Vec::with_capacity(path.len());
    for (i, &switch) in path.iter().enumerate() {
        let ingress = if i == 0 {
            None
        } else {
            Some(connecting(path[i - 1], switch)?.1)
        };
        let egress = if i == path.len() - 1 {
            None
        } else {
            Some(connecting(switch, path[i + 1])?.0)
        };
        hops.push(PortHop { ingress, egress });
    }
    Ok(hops)
}
