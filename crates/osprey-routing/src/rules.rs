//! Exact-match forwarding rules and the rule installer.

use crate::error::{Result, RoutingError};
use crate::paths::PathTable;
use crate::ports::{resolve_hops, PortMap};
use async_trait::async_trait;
use osprey_common::{Host, PortNo, SwitchId};
use osprey_topology::TopologySnapshot;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Priority of the per-host-pair exact-match rules.
pub const FLOW_PRIORITY: u16 = 1;

/// Priority of the table-miss rule issued on switch join.
pub const TABLE_MISS_PRIORITY: u16 = 0;

/// Match fields of a forwarding rule; `None` is a wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMatch {
    pub in_port: Option<PortNo>,
    pub eth_src: Option<String>,
    pub eth_dst: Option<String>,
    pub ipv4_src: Option<Ipv4Addr>,
    pub ipv4_dst: Option<Ipv4Addr>,
}

impl FlowMatch {
    /// A pattern matching every packet.
    pub fn match_all() -> Self {
        Self {
            in_port: None,
            eth_src: None,
            eth_dst: None,
            ipv4_src: None,
            ipv4_dst: None,
        }
    }
}

/// Forwarding action of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    /// Output on a switch port
    Output(PortNo),
    /// Punt to the controller
    ToController,
}

/// One forwarding rule on one switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRule {
    pub switch: SwitchId,
    pub priority: u16,
    pub pattern: FlowMatch,
    pub action: FlowAction,
}

/// Capability to install a rule on a switch, implemented by the transport.
#[async_trait]
pub trait FlowSink: Send + Sync {
    /// Install or override one rule. Fire-and-forget: the core neither
    /// waits for switch acknowledgement nor retries a failed install.
    async fn install(&self, rule: FlowRule) -> anyhow::Result<()>;
}

/// The priority-0 match-all rule that punts unmatched traffic to the
/// controller, issued once per switch join.
pub fn table_miss_rule(switch: SwitchId) -> FlowRule {
    FlowRule {
        switch,
        priority: TABLE_MISS_PRIORITY,
        pattern: FlowMatch::match_all(),
        action: FlowAction::ToController,
    }
}

/// Synthesizes and installs the full forwarding-rule set.
///
/// The installer keeps no record of previously issued rules: every sync
/// re-issues everything, and rules left on switches by an earlier, larger
/// topology are not retracted.
pub struct RuleInstaller {
    sink: Arc<dyn FlowSink>,
}

impl RuleInstaller {
    pub fn new(sink: Arc<dyn FlowSink>) -> Self {
        Self { sink }
    }

    /// Issue the table-miss rule for a freshly joined switch.
    pub async fn install_table_miss(&self, switch: SwitchId) {
        if let Err(e) = self.sink.install(table_miss_rule(switch)).await {
            warn!(switch, error = %e, "table-miss install failed");
        }
    }

    /// Install one rule per (ordered host pair, switch on path).
    ///
    /// A synthesis inconsistency aborts that pair only; install failures
    /// are logged and not retried. Returns the number of rules handed to
    /// the sink successfully.
    pub async fn sync_all(&self, snapshot: &TopologySnapshot, paths: &PathTable) -> usize {
        let mut installed = 0;
        for src in &snapshot.hosts {
            for dst in &snapshot.hosts {
                if src.mac == dst.mac {
                    continue;
                }
                let rules = match self.rules_for_pair(src, dst, paths, &snapshot.port_map) {
                    Ok(rules) => rules,
                    Err(e) => {
                        error!(
                            src = %src.mac,
                            dst = %dst.mac,
                            error = %e,
                            "flow synthesis inconsistency, skipping pair"
                        );
                        continue;
                    }
                };
                for rule in rules {
                    match self.sink.install(rule).await {
                        Ok(()) => installed += 1,
                        Err(e) => warn!(error = %e, "rule install failed"),
                    }
                }
            }
        }
        info!(
            hosts = snapshot.hosts.len(),
            rules = installed,
            "forwarding rules synced"
        );
        installed
    }

    fn rules_for_pair(
        &self,
        src: &Host,
        dst: &Host,
        paths: &PathTable,
        port_map: &PortMap,
    ) -> Result<Vec<FlowRule>> {
        let (Some(&src_ip), Some(&dst_ip)) = (src.ips.first(), dst.ips.first()) else {
            debug!(src = %src.mac, dst = %dst.mac, "host pair without leased addresses");
            return Ok(Vec::new());
        };

        let path: Vec<SwitchId> = if src.switch == dst.switch {
            vec![src.switch]
        } else {
            match paths.path(src.switch, dst.switch) {
                Some(path) => path.to_vec(),
                None => {
                    debug!(src = %src.mac, dst = %dst.mac, "no path between attachments");
                    return Ok(Vec::new());
                }
            }
        };

        let mut hops = resolve_hops(&path, port_map)?;
        if let Some(first) = hops.first_mut() {
            first.ingress = Some(src.port);
        }
        if let Some(last) = hops.last_mut() {
            last.egress = Some(dst.port);
        }

        let mut rules = Vec::with_capacity(path.len());
        for (&switch, hop) in path.iter().zip(&hops) {
            let ingress = hop.ingress.ok_or(RoutingError::UnresolvedHop { switch })?;
            let egress = hop.egress.ok_or(RoutingError::UnresolvedHop { switch })?;
            rules.push(FlowRule {
                switch,
                priority: FLOW_PRIORITY,
                pattern: FlowMatch {
                    in_port: Some(ingress),
                    eth_src: Some(src.mac.clone()),
                    eth_dst: Some(dst.mac.clone()),
                    ipv4_src: Some(src_ip),
                    ipv4_dst: Some(dst_ip),
                },
                action: FlowAction::Output(egress),
            });
        }
        Ok(rules)
    }
}
