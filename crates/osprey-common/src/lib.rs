//! Shared types for the osprey control plane.
//!
//! Everything the topology store, the routing engine and the lease manager
//! need to agree on lives here: switch/port identifiers, the host record,
//! MAC normalization, and the event types the components publish.

pub mod events;
pub mod types;

pub use events::{HostEvent, TopologyEvent};
pub use types::{normalize_mac, Host, PortId, PortNo, SwitchId};
