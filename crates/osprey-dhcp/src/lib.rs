//! Address leasing and proxy address resolution.
//!
//! This crate owns the controller's view of who holds which address:
//!
//! - [`LeaseManager`]: the lease table and the address pool under one
//!   lock, with a split renew/sweep API and host-presence events on a
//!   broadcast channel.
//! - [`DhcpResponder`]: the 4-message lease protocol (DISCOVER→OFFER,
//!   REQUEST→ACK; everything else is a deliberate no-op), assembling
//!   replies over `dhcproto`'s decoded message model. Every granted ACK
//!   triggers a global expiry sweep.
//! - [`ArpProxy`]: answers who-has queries on behalf of leased hosts
//!   straight from the lease table; misses stay silent.
//!
//! The transport collaborator decodes inbound packets before they reach
//! this crate and serializes the replies handed back through
//! [`PacketSink`]; no wire bytes are touched here.

pub mod config;
pub mod error;
pub mod lease;
pub mod pool;
pub mod proxy;
pub mod responder;

pub use config::DhcpConfig;
pub use error::{DhcpError, Result};
pub use lease::{Lease, LeaseManager};
pub use pool::{AddressPool, POOL_FIRST_ID, POOL_LAST_ID, POOL_SIZE};
pub use proxy::{ArpOp, ArpPacket, ArpProxy};
pub use responder::{DhcpReply, DhcpResponder, LeaseRequest, PacketSink};
