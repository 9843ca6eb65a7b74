//! The pool of unassigned host addresses.

use rand::Rng;

/// First assignable host id of the /24.
pub const POOL_FIRST_ID: u8 = 2;

/// Last assignable host id of the /24.
pub const POOL_LAST_ID: u8 = 253;

/// Pool capacity.
pub const POOL_SIZE: usize = 252;

/// Unassigned final-octet ids of the lease subnet.
///
/// Invariant: an id is either in the pool or bound to exactly one lease,
/// never both; allocated ids come back only through [`release`].
///
/// [`release`]: AddressPool::release
#[derive(Debug, Clone)]
pub struct AddressPool {
    free: Vec<u8>,
}

impl AddressPool {
    pub fn new() -> Self {
        Self {
            free: (POOL_FIRST_ID..=POOL_LAST_ID).collect(),
        }
    }

    /// Draw one id uniformly at random, or `None` when the pool is dry.
    pub fn allocate(&mut self) -> Option<u8> {
        if self.free.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..self.free.len());
        Some(self.free.swap_remove(index))
    }

    /// Return a reclaimed id to the pool.
    pub fn release(&mut self, id: u8) {
        if !self.free.contains(&id) {
            self.free.push(id);
        }
    }

    pub fn remaining(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

impl Default for AddressPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_starts_full() {
        let pool = AddressPool::new();
        assert_eq!(pool.remaining(), POOL_SIZE);
    }

    #[test]
    fn test_allocate_until_dry() {
        let mut pool = AddressPool::new();
        let mut seen = Vec::new();
        while let Some(id) = pool.allocate() {
            assert!((POOL_FIRST_ID..=POOL_LAST_ID).contains(&id));
            assert!(!seen.contains(&id), "id {id} handed out twice");
            seen.push(id);
        }
        assert_eq!(seen.len(), POOL_SIZE);
        assert!(pool.is_empty());
        assert_eq!(pool.allocate(), None);
    }

    #[test]
    fn test_release_restores_capacity() {
        let mut pool = AddressPool::new();
        let id = pool.allocate().unwrap();
        assert_eq!(pool.remaining(), POOL_SIZE - 1);
        pool.release(id);
        assert_eq!(pool.remaining(), POOL_SIZE);
        // double release must not inflate the pool
        pool.release(id);
        assert_eq!(pool.remaining(), POOL_SIZE);
    }
}
