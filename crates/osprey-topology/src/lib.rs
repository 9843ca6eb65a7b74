//! Authoritative table of switches, links and hosts.
//!
//! The store is pure state plus a mutation API: the discovery collaborator
//! feeds join/leave notifications in, and every mutation that actually
//! changes the graph publishes one reason-tagged [`TopologyEvent`] on a
//! broadcast channel. Consumers (the routing pipeline) read the graph
//! through a single-lock [`TopologySnapshot`] so a recomputation never
//! observes a torn graph and never holds the graph lock across installs.
//!
//! [`TopologyEvent`]: osprey_common::TopologyEvent

pub mod store;

pub use store::{Topology, TopologySnapshot};
