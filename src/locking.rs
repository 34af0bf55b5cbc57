//! Two-tier locking discipline for the shared topology graph.
//!
//! Every node in one cluster shares a single [`LockCoordinator`], the
//! cluster-scope tier. The node-scope tier is each node's own private
//! `RwLock` around its mutable fields. The coordinator is held whenever the
//! node lock is held, and always acquired first:
//!
//! - read mode for single-node reads and field writes,
//! - write mode for structural changes (host insertion/removal, first-time
//!   persistence, deletion), which touch indexes shared across the cluster.
//!
//! Acquiring the node-scope lock before the cluster-scope lock is never
//! permitted; the fixed order is the only deadlock prevention in play.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Guard for the cluster-scope lock held in read mode.
pub type ClusterReadGuard<'a> = RwLockReadGuard<'a, ()>;

/// Guard for the cluster-scope lock held in write mode.
pub type ClusterWriteGuard<'a> = RwLockWriteGuard<'a, ()>;

/// Cluster-scope reader/writer lock shared by every node of one cluster.
pub struct LockCoordinator {
    cluster: RwLock<()>,
}

impl LockCoordinator {
    /// Create the coordinator for one cluster.
    pub fn new() -> Self {
        LockCoordinator {
            cluster: RwLock::new(()),
        }
    }

    /// Acquire the cluster-scope lock in read mode. Blocks until granted.
    pub fn cluster_read(&self) -> ClusterReadGuard<'_> {
        self.cluster.read()
    }

    /// Acquire the cluster-scope lock in write mode. Blocks until granted.
    pub fn cluster_write(&self) -> ClusterWriteGuard<'_> {
        self.cluster.write()
    }
}

impl Default for LockCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn concurrent_readers_are_admitted() {
        let coordinator = LockCoordinator::new();
        let first = coordinator.cluster_read();
        let second = coordinator.cluster_read();
        drop(first);
        drop(second);
    }

    #[test]
    fn writer_excludes_reader() {
        let coordinator = Arc::new(LockCoordinator::new());
        let guard = coordinator.cluster_write();

        let contender = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                let _read = coordinator.cluster_read();
            })
        };

        // The reader cannot finish until the writer releases.
        assert!(!contender.is_finished());
        drop(guard);
        contender.join().unwrap();
    }
}
