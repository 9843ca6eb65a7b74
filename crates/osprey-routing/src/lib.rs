//! Path computation and forwarding-rule synthesis.
//!
//! This crate turns a [`TopologySnapshot`] into installed forwarding state
//! in three steps:
//!
//! 1. [`PathTable::compute`]: all-pairs shortest paths over the switch
//!    graph (Floyd–Warshall with path reconstruction).
//! 2. [`resolve_hops`]: convert a switch-id path into per-hop
//!    ingress/egress ports; the two host-facing ends stay unresolved for
//!    the caller to fill with the hosts' attachment ports.
//! 3. [`RuleInstaller::sync_all`]: one exact-match rule per
//!    (ordered host pair, switch on path), pushed through the [`FlowSink`]
//!    capability the transport implements.
//!
//! [`TopologySnapshot`]: osprey_topology::TopologySnapshot

pub mod error;
pub mod paths;
pub mod ports;
pub mod rules;

pub use error::{Result, RoutingError};
pub use paths::{PathTable, INFINITE_DISTANCE};
pub use ports::{resolve_hops, PortHop, PortMap};
pub use rules::{
    table_miss_rule, FlowAction, FlowMatch, FlowRule, FlowSink, RuleInstaller, FLOW_PRIORITY,
    TABLE_MISS_PRIORITY,
};
