//! The lease table and its lifecycle.

use crate::config::DhcpConfig;
use crate::error::{DhcpError, Result};
use crate::pool::AddressPool;
use osprey_common::{normalize_mac, HostEvent, PortNo, SwitchId};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// A granted lease: the bound address, the holder's attachment point, and
/// the last renewal instant.
#[derive(Debug, Clone)]
pub struct Lease {
    pub ip: Ipv4Addr,
    pub switch: SwitchId,
    pub port: PortNo,
    renewed_at: Instant,
}

impl Lease {
    /// Time since the last DISCOVER or REQUEST for this mac.
    pub fn age(&self) -> Duration {
        self.renewed_at.elapsed()
    }
}

struct LeaseState {
    pool: AddressPool,
    leases: HashMap<String, Lease>,
}

/// Lease table, address pool and attachment records under one lock.
///
/// The renew and sweep steps are separate calls: the responder invokes
/// [`sweep_expired`] after every granted ACK, which keeps the reference
/// behavior of an expiry pass riding on the ACK path while leaving room
/// for an external timer to drive the same call.
///
/// [`sweep_expired`]: LeaseManager::sweep_expired
pub struct LeaseManager {
    config: DhcpConfig,
    state: Mutex<LeaseState>,
    events: broadcast::Sender<HostEvent>,
}

impl LeaseManager {
    pub fn new(config: DhcpConfig) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            config,
            state: Mutex::new(LeaseState {
                pool: AddressPool::new(),
                leases: HashMap::new(),
            }),
            events,
        }
    }

    /// Subscribe to host presence events.
    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, LeaseState> {
        self.state.lock().expect("lease lock poisoned")
    }

    fn emit(&self, event: HostEvent) {
        let _ = self.events.send(event);
    }

    /// The DISCOVER path: bind a pool address to an unknown mac, or keep a
    /// known mac's binding and refresh its timestamp. Either way the
    /// attachment point is updated and a host-presence event is raised.
    pub fn renew_or_create(
        &self,
        mac: &str,
        switch: SwitchId,
        port: PortNo,
    ) -> Result<Ipv4Addr> {
        let mac = normalize_mac(mac);
        let ip = {
            let mut state = self.lock();
            match state.leases.get_mut(&mac) {
                Some(lease) => {
                    lease.renewed_at = Instant::now();
                    lease.switch = switch;
                    lease.port = port;
                    lease.ip
                }
                None => {
                    let id = state.pool.allocate().ok_or(DhcpError::PoolExhausted)?;
                    let ip = self.config.address_for(id);
                    state.leases.insert(
                        mac.clone(),
                        Lease {
                            ip,
                            switch,
                            port,
                            renewed_at: Instant::now(),
                        },
                    );
                    info!(mac = %mac, ip = %ip, "lease granted");
                    ip
                }
            }
        };
        self.emit(HostEvent::Added {
            mac,
            ip,
            switch,
            port,
        });
        Ok(ip)
    }

    /// The REQUEST path: refresh the timestamp and echo the bound address.
    /// A mac that was never offered anything gets a silent `None`.
    pub fn renew(&self, mac: &str) -> Option<Ipv4Addr> {
        let mac = normalize_mac(mac);
        let mut state = self.lock();
        let lease = state.leases.get_mut(&mac)?;
        lease.renewed_at = Instant::now();
        Some(lease.ip)
    }

    /// Reclaim every lease older than the lease lifetime.
    ///
    /// The lock is held for the whole scan-and-reclaim pass so a renewal
    /// cannot interleave with the reclaim of the same lease. Each
    /// reclaimed address goes back to the pool and a host-removed event is
    /// raised.
    pub fn sweep_expired(&self) -> usize {
        let lifetime = Duration::from_secs(u64::from(self.config.lease_time));
        let mut removed = Vec::new();
        {
            let mut state = self.lock();
            let expired: Vec<String> = state
                .leases
                .iter()
                .filter(|(_, lease)| lease.age() > lifetime)
                .map(|(mac, _)| mac.clone())
                .collect();
            for mac in expired {
                if let Some(lease) = state.leases.remove(&mac) {
                    state.pool.release(lease.ip.octets()[3]);
                    info!(mac = %mac, ip = %lease.ip, "lease expired");
                    removed.push((mac, lease));
                }
            }
        }
        let count = removed.len();
        for (mac, lease) in removed {
            self.emit(HostEvent::Removed {
                mac,
                ip: lease.ip,
                switch: lease.switch,
                port: lease.port,
            });
        }
        if count > 0 {
            debug!(reclaimed = count, "expiry sweep reclaimed leases");
        }
        count
    }

    /// Which mac holds this address, if any.
    pub fn mac_for_ip(&self, ip: Ipv4Addr) -> Option<String> {
        let state = self.lock();
        state
            .leases
            .iter()
            .find(|(_, lease)| lease.ip == ip)
            .map(|(mac, _)| mac.clone())
    }

    /// Current lease for a mac, if any.
    pub fn lease_for(&self, mac: &str) -> Option<Lease> {
        self.lock().leases.get(&normalize_mac(mac)).cloned()
    }

    pub fn lease_count(&self) -> usize {
        self.lock().leases.len()
    }

    pub fn pool_remaining(&self) -> usize {
        self.lock().pool.remaining()
    }

    /// Age a lease artificially so expiry paths are testable.
    #[cfg(test)]
    pub(crate) fn backdate(&self, mac: &str, age: Duration) {
        let mut state = self.lock();
        if let Some(lease) = state.leases.get_mut(&normalize_mac(mac)) {
            lease.renewed_at = Instant::now() - age;
        }
    }

    /// Drain the pool, binding every remaining address to synthetic macs.
    #[cfg(test)]
    pub(crate) fn exhaust_pool(&self) {
        let mut state = self.lock();
        let mut i = 0u32;
        while let Some(id) = state.pool.allocate() {
            let ip = self.config.address_for(id);
            state.leases.insert(
                format!("fe:00:00:00:{:02x}:{:02x}", i / 256, i % 256),
                Lease {
                    ip,
                    switch: 1,
                    port: 1,
                    renewed_at: Instant::now(),
                },
            );
            i += 1;
        }
    }
}
