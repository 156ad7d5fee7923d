//! Worker registry.
//!
//! # Responsibilities
//! - Map worker id → WorkerHandle for every live worker process
//! - Be the single source of truth for the actual worker count
//!
//! # Design Decisions
//! - Mutated only by fork success (insert), the listening event
//!   (status update) and the exit event (remove)
//! - Iteration follows insertion order, so "newest" is well defined
//! - The OS process table is never consulted; exit events are the truth

use std::collections::HashMap;
use std::net::SocketAddr;

use crate::pool::worker::{WorkerHandle, WorkerId, WorkerStatus};

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerId, WorkerHandle>,
    order: Vec<WorkerId>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly forked worker. Returns false if the id is already taken.
    pub fn insert(&mut self, handle: WorkerHandle) -> bool {
        if self.workers.contains_key(&handle.id) {
            return false;
        }
        self.order.push(handle.id);
        self.workers.insert(handle.id, handle);
        true
    }

    /// Move a worker to `Listening`. A worker already asked to stop keeps
    /// its `Stopping` status.
    pub fn mark_listening(&mut self, id: WorkerId, address: SocketAddr) -> Option<&WorkerHandle> {
        let handle = self.workers.get_mut(&id)?;
        handle.address = Some(address);
        if handle.status == WorkerStatus::Starting {
            handle.status = WorkerStatus::Listening;
        }
        Some(handle)
    }

    /// Move a worker to `Stopping`. Returns the previous status.
    pub fn mark_stopping(&mut self, id: WorkerId) -> Option<WorkerStatus> {
        let handle = self.workers.get_mut(&id)?;
        Some(std::mem::replace(&mut handle.status, WorkerStatus::Stopping))
    }

    pub fn remove(&mut self, id: WorkerId) -> Option<WorkerHandle> {
        let handle = self.workers.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(handle)
    }

    pub fn contains(&self, id: WorkerId) -> bool {
        self.workers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Snapshot of all ids in insertion order.
    pub fn ids(&self) -> Vec<WorkerId> {
        self.order.clone()
    }

    /// Ids of workers that have not been asked to stop, in insertion order.
    pub fn active_ids(&self) -> Vec<WorkerId> {
        self.iter()
            .filter(|handle| !handle.is_stopping())
            .map(|handle| handle.id)
            .collect()
    }

    /// The most recently inserted worker.
    pub fn newest(&self) -> Option<&WorkerHandle> {
        self.order.last().and_then(|id| self.workers.get(id))
    }

    /// Iterate handles in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.order.iter().filter_map(|id| self.workers.get(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> WorkerId {
        WorkerId::new(raw)
    }

    fn registry_with(ids: &[u64]) -> WorkerRegistry {
        let mut registry = WorkerRegistry::new();
        for raw in ids {
            assert!(registry.insert(WorkerHandle::starting(id(*raw), 1000 + *raw as u32)));
        }
        registry
    }

    #[tokio::test]
    async fn keeps_insertion_order() {
        let mut registry = registry_with(&[7, 3, 5]);
        assert_eq!(registry.ids(), vec![id(7), id(3), id(5)]);
        assert_eq!(registry.newest().map(|w| w.id), Some(id(5)));

        registry.remove(id(5));
        assert_eq!(registry.newest().map(|w| w.id), Some(id(3)));
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn rejects_duplicate_ids() {
        let mut registry = registry_with(&[1]);
        assert!(!registry.insert(WorkerHandle::starting(id(1), 42)));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn status_transitions() {
        let mut registry = registry_with(&[1, 2]);
        let addr: SocketAddr = "127.0.0.1:3000".parse().unwrap();

        let handle = registry.mark_listening(id(1), addr).unwrap();
        assert_eq!(handle.status, WorkerStatus::Listening);
        assert_eq!(handle.address, Some(addr));

        assert_eq!(registry.mark_stopping(id(2)), Some(WorkerStatus::Starting));
        assert_eq!(registry.active_ids(), vec![id(1)]);

        // a late listening event must not resurrect a stopping worker
        let handle = registry.mark_listening(id(2), addr).unwrap();
        assert_eq!(handle.status, WorkerStatus::Stopping);

        assert!(registry.mark_listening(id(9), addr).is_none());
        assert!(registry.mark_stopping(id(9)).is_none());
    }

    #[tokio::test]
    async fn remove_unknown_is_none() {
        let mut registry = registry_with(&[1]);
        assert!(registry.remove(id(2)).is_none());
        assert!(registry.remove(id(1)).is_some());
        assert!(registry.is_empty());
        assert!(registry.newest().is_none());
    }
}
