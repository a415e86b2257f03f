// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-process object registry: local nodes, remote references,
//! and the cross-process reference-count protocol.
//!
//! The registry exclusively owns every node and reference record in its
//! process. Counting is importer-driven: the holding side sends
//! acquire/release control messages on its own count edges, and the owning
//! side applies them here. A node's implementation is dropped exactly when
//! its strong count transitions 1 -> 0; the record itself persists for weak
//! lookups until the weak count also reaches 0.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests + refcount property test (host)
//!
//! INVARIANTS:
//!   - Counts are unsigned; decrement below zero is a protocol violation,
//!     surfaced and counted, never clamped
//!   - Promotion is a single atomic compare-and-increment; it fails when
//!     the strong count is already 0
//!   - Handles are never reused within a process

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::service::Service;
use crate::{Handle, NodeId, Pid};

/// Errors produced by registry operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No node or reference exists for the given identity.
    #[error("unknown object")]
    UnknownObject,
    /// The node record exists but its implementation was already released.
    #[error("object destroyed")]
    ObjectDestroyed,
    /// A peer decremented a count that was already zero.
    #[error("reference count underflow")]
    CounterUnderflow,
}

/// Local object record: implementation plus cross-process counts.
struct NodeRecord {
    service: Mutex<Option<Arc<dyn Service>>>,
    strong: AtomicU64,
    weak: AtomicU64,
    /// Outstanding count units per holding process, for cleanup when a
    /// holder terminates without releasing.
    holders: Mutex<HashMap<Pid, HolderUnits>>,
}

#[derive(Clone, Copy, Default)]
struct HolderUnits {
    strong: u64,
    weak: u64,
}

/// Remote handle record: local counts reflected to the owning process.
pub(crate) struct RefRecord {
    handle: Handle,
    owner: Pid,
    node: NodeId,
    strong: AtomicU64,
    weak: AtomicU64,
    alive: AtomicBool,
}

impl RefRecord {
    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }

    pub(crate) fn owner(&self) -> Pid {
        self.owner
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) fn strong_count(&self) -> u64 {
        self.strong.load(Ordering::SeqCst)
    }

    pub(crate) fn weak_count(&self) -> u64 {
        self.weak.load(Ordering::SeqCst)
    }
}

/// Control messages the runtime must reflect to an owning process after a
/// reference-count edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct RefEffect {
    pub acquire_weak: bool,
    pub acquire_strong: bool,
    pub release_strong: bool,
    pub release_weak: bool,
}

/// Outcome of starting a promotion on a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PromoteStart {
    /// The reference already held a strong count; it was incremented.
    Strong,
    /// The strong count was 0; the owner must confirm before committing.
    NeedRemote,
    /// The owning process is dead; promotion cannot succeed.
    Dead,
}

/// Outcome of committing a promotion after the owner confirmed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PromoteCommit {
    /// This promotion took the 0 -> 1 edge.
    Committed,
    /// Another promotion won the edge; the extra remote unit must be
    /// released back to the owner.
    AlreadyStrong,
}

#[derive(Default)]
struct RefTable {
    by_handle: HashMap<Handle, Arc<RefRecord>>,
    by_object: HashMap<(Pid, NodeId), Handle>,
}

/// Per-process table of nodes and references.
pub struct Registry {
    pid: Pid,
    nodes: Mutex<HashMap<NodeId, Arc<NodeRecord>>>,
    next_node: AtomicU64,
    refs: Mutex<RefTable>,
    next_handle: AtomicU32,
    protocol_faults: AtomicU64,
}

impl Registry {
    /// Creates an empty registry for the process `pid`.
    pub fn new(pid: Pid) -> Self {
        Self {
            pid,
            nodes: Mutex::new(HashMap::new()),
            next_node: AtomicU64::new(1),
            refs: Mutex::new(RefTable::default()),
            next_handle: AtomicU32::new(1),
            protocol_faults: AtomicU64::new(0),
        }
    }

    /// Process this registry belongs to.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Number of protocol violations observed (count underflow, acquire on
    /// a destroyed object).
    pub fn protocol_faults(&self) -> u64 {
        self.protocol_faults.load(Ordering::SeqCst)
    }

    pub(crate) fn record_fault(&self) {
        self.protocol_faults.fetch_add(1, Ordering::SeqCst);
    }

    // --- local nodes -----------------------------------------------------

    /// Exposes a local implementation to other processes.
    pub fn register_local(&self, service: Arc<dyn Service>) -> NodeId {
        let id = NodeId::new(self.next_node.fetch_add(1, Ordering::SeqCst));
        let record = NodeRecord {
            service: Mutex::new(Some(service)),
            strong: AtomicU64::new(0),
            weak: AtomicU64::new(0),
            holders: Mutex::new(HashMap::new()),
        };
        self.nodes.lock().insert(id, Arc::new(record));
        id
    }

    /// Resolves a local node to its implementation.
    pub fn resolve_local(&self, node: NodeId) -> Result<Arc<dyn Service>, RegistryError> {
        let record = self.node(node)?;
        let service = record.service.lock();
        service.clone().ok_or(RegistryError::ObjectDestroyed)
    }

    /// Current `(strong, weak)` counts of a local node, if it still has a
    /// record.
    pub fn node_counts(&self, node: NodeId) -> Option<(u64, u64)> {
        let nodes = self.nodes.lock();
        let record = nodes.get(&node)?;
        Some((record.strong.load(Ordering::SeqCst), record.weak.load(Ordering::SeqCst)))
    }

    /// Validates that a node can be handed to another process.
    pub(crate) fn exportable(&self, node: NodeId) -> Result<(), RegistryError> {
        let record = self.node(node)?;
        if record.service.lock().is_none() {
            return Err(RegistryError::ObjectDestroyed);
        }
        Ok(())
    }

    fn node(&self, node: NodeId) -> Result<Arc<NodeRecord>, RegistryError> {
        self.nodes.lock().get(&node).cloned().ok_or(RegistryError::UnknownObject)
    }

    /// Applies an inbound strong acquire from `from`.
    ///
    /// With `promote` set the acquire is a promotion attempt: it fails when
    /// the strong count is already 0 instead of taking the 0 -> 1 edge.
    pub(crate) fn acquire_strong(
        &self,
        node: NodeId,
        from: Pid,
        promote: bool,
    ) -> Result<(), RegistryError> {
        let record = self.node(node)?;
        if promote {
            record
                .strong
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                    if s == 0 {
                        None
                    } else {
                        Some(s + 1)
                    }
                })
                .map_err(|_| RegistryError::ObjectDestroyed)?;
        } else {
            if record.service.lock().is_none() {
                self.record_fault();
                return Err(RegistryError::ObjectDestroyed);
            }
            record.strong.fetch_add(1, Ordering::SeqCst);
        }
        record.holders.lock().entry(from).or_default().strong += 1;
        Ok(())
    }

    /// Applies an inbound strong release from `from`.
    pub(crate) fn release_strong(&self, node: NodeId, from: Pid) -> Result<(), RegistryError> {
        let record = self.node(node)?;
        let prev = record
            .strong
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| s.checked_sub(1))
            .map_err(|_| {
                self.record_fault();
                RegistryError::CounterUnderflow
            })?;
        if prev == 1 {
            *record.service.lock() = None;
        }
        let mut holders = record.holders.lock();
        if let Some(units) = holders.get_mut(&from) {
            units.strong = units.strong.saturating_sub(1);
            if units.strong == 0 && units.weak == 0 {
                holders.remove(&from);
            }
        }
        drop(holders);
        self.retire_node_if_unreferenced(node, &record);
        Ok(())
    }

    /// Applies an inbound weak acquire from `from`.
    pub(crate) fn acquire_weak(&self, node: NodeId, from: Pid) -> Result<(), RegistryError> {
        let record = self.node(node)?;
        record.weak.fetch_add(1, Ordering::SeqCst);
        record.holders.lock().entry(from).or_default().weak += 1;
        Ok(())
    }

    /// Applies an inbound weak release from `from`.
    pub(crate) fn release_weak(&self, node: NodeId, from: Pid) -> Result<(), RegistryError> {
        let record = self.node(node)?;
        record
            .weak
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| w.checked_sub(1))
            .map_err(|_| {
                self.record_fault();
                RegistryError::CounterUnderflow
            })?;
        let mut holders = record.holders.lock();
        if let Some(units) = holders.get_mut(&from) {
            units.weak = units.weak.saturating_sub(1);
            if units.strong == 0 && units.weak == 0 {
                holders.remove(&from);
            }
        }
        drop(holders);
        self.retire_node_if_unreferenced(node, &record);
        Ok(())
    }

    /// Releases every count unit still held by a terminated process.
    pub(crate) fn drop_holder(&self, holder: Pid) {
        let records: Vec<(NodeId, Arc<NodeRecord>)> =
            self.nodes.lock().iter().map(|(id, rec)| (*id, Arc::clone(rec))).collect();
        for (id, record) in records {
            let units = match record.holders.lock().remove(&holder) {
                Some(units) => units,
                None => continue,
            };
            if units.strong > 0 {
                let prev = record.strong.fetch_sub(units.strong, Ordering::SeqCst);
                if prev > 0 && prev == units.strong {
                    *record.service.lock() = None;
                }
            }
            if units.weak > 0 {
                record.weak.fetch_sub(units.weak, Ordering::SeqCst);
            }
            self.retire_node_if_unreferenced(id, &record);
        }
    }

    fn retire_node_if_unreferenced(&self, id: NodeId, record: &Arc<NodeRecord>) {
        if record.strong.load(Ordering::SeqCst) == 0 && record.weak.load(Ordering::SeqCst) == 0 {
            // Keep nodes that were never exported: a zero count only retires
            // a record once its implementation is gone.
            if record.service.lock().is_none() {
                self.nodes.lock().remove(&id);
            }
        }
    }

    // --- remote references -----------------------------------------------

    /// Imports a strong reference to `(owner, node)`.
    ///
    /// The same identity always yields the same handle; only the first
    /// import (or a weak record's 0 -> 1 strong edge) asks the runtime to
    /// reflect acquires to the owner.
    pub(crate) fn import_strong(&self, owner: Pid, node: NodeId) -> (Arc<RefRecord>, RefEffect) {
        let mut refs = self.refs.lock();
        if let Some(handle) = refs.by_object.get(&(owner, node)).copied() {
            let record = Arc::clone(&refs.by_handle[&handle]);
            let prev = record.strong.fetch_add(1, Ordering::SeqCst);
            let mut effect = RefEffect::default();
            if prev == 0 {
                // Weak record gaining its first strong use: the strong
                // count pins an extra weak unit internally.
                record.weak.fetch_add(1, Ordering::SeqCst);
                effect.acquire_strong = true;
            }
            return (record, effect);
        }
        let handle = Handle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let record = Arc::new(RefRecord {
            handle,
            owner,
            node,
            strong: AtomicU64::new(1),
            weak: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        });
        refs.by_object.insert((owner, node), handle);
        refs.by_handle.insert(handle, Arc::clone(&record));
        (record, RefEffect { acquire_weak: true, acquire_strong: true, ..RefEffect::default() })
    }

    /// Imports a weak-only reference to `(owner, node)`.
    pub(crate) fn import_weak(&self, owner: Pid, node: NodeId) -> (Arc<RefRecord>, RefEffect) {
        let mut refs = self.refs.lock();
        if let Some(handle) = refs.by_object.get(&(owner, node)).copied() {
            let record = Arc::clone(&refs.by_handle[&handle]);
            record.weak.fetch_add(1, Ordering::SeqCst);
            return (record, RefEffect::default());
        }
        let handle = Handle::new(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let record = Arc::new(RefRecord {
            handle,
            owner,
            node,
            strong: AtomicU64::new(0),
            weak: AtomicU64::new(1),
            alive: AtomicBool::new(true),
        });
        refs.by_object.insert((owner, node), handle);
        refs.by_handle.insert(handle, Arc::clone(&record));
        (record, RefEffect { acquire_weak: true, ..RefEffect::default() })
    }

    /// Looks up a reference record by handle.
    pub(crate) fn reference(&self, handle: Handle) -> Option<Arc<RefRecord>> {
        self.refs.lock().by_handle.get(&handle).cloned()
    }

    /// Adds one local strong count to an existing reference (proxy clone).
    pub(crate) fn ref_inc_strong(&self, handle: Handle) {
        if let Some(record) = self.reference(handle) {
            record.strong.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Adds one local weak count to an existing reference (weak clone or
    /// downgrade).
    pub(crate) fn ref_inc_weak(&self, handle: Handle) {
        if let Some(record) = self.reference(handle) {
            record.weak.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Drops one local strong count; reports the releases to reflect.
    pub(crate) fn ref_dec_strong(&self, handle: Handle) -> RefEffect {
        let record = match self.reference(handle) {
            Some(record) => record,
            None => return RefEffect::default(),
        };
        let prev = record.strong.fetch_sub(1, Ordering::SeqCst);
        let mut effect = RefEffect::default();
        if prev == 1 {
            effect.release_strong = true;
            // Drop the weak unit the strong count was pinning.
            let prev_weak = record.weak.fetch_sub(1, Ordering::SeqCst);
            if prev_weak == 1 {
                effect.release_weak = true;
                self.retire_reference(&record);
            }
        }
        effect
    }

    /// Drops one local weak count; reports the release to reflect.
    pub(crate) fn ref_dec_weak(&self, handle: Handle) -> RefEffect {
        let record = match self.reference(handle) {
            Some(record) => record,
            None => return RefEffect::default(),
        };
        let prev_weak = record.weak.fetch_sub(1, Ordering::SeqCst);
        let mut effect = RefEffect::default();
        if prev_weak == 1 && record.strong.load(Ordering::SeqCst) == 0 {
            effect.release_weak = true;
            self.retire_reference(&record);
        }
        effect
    }

    fn retire_reference(&self, record: &Arc<RefRecord>) {
        let mut refs = self.refs.lock();
        refs.by_handle.remove(&record.handle);
        refs.by_object.remove(&(record.owner, record.node));
    }

    /// Starts promoting a weak reference to strong.
    pub(crate) fn ref_promote_start(&self, handle: Handle) -> PromoteStart {
        let record = match self.reference(handle) {
            Some(record) => record,
            None => return PromoteStart::Dead,
        };
        if !record.is_alive() {
            return PromoteStart::Dead;
        }
        match record.strong.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
            if s == 0 {
                None
            } else {
                Some(s + 1)
            }
        }) {
            Ok(_) => PromoteStart::Strong,
            Err(_) => PromoteStart::NeedRemote,
        }
    }

    /// Commits a promotion after the owner confirmed its strong acquire.
    pub(crate) fn ref_promote_commit(&self, handle: Handle) -> PromoteCommit {
        let record = match self.reference(handle) {
            Some(record) => record,
            None => return PromoteCommit::AlreadyStrong,
        };
        let prev = record.strong.fetch_add(1, Ordering::SeqCst);
        record.weak.fetch_add(1, Ordering::SeqCst);
        if prev == 0 {
            PromoteCommit::Committed
        } else {
            // A concurrent promotion already took the edge; the caller must
            // hand its confirmed unit back.
            record.weak.fetch_sub(1, Ordering::SeqCst);
            record.strong.fetch_sub(1, Ordering::SeqCst);
            PromoteCommit::AlreadyStrong
        }
    }

    /// Marks every reference owned by `peer` as dead.
    ///
    /// Returns the handles whose liveness changed; repeated death signals
    /// return an empty list.
    pub(crate) fn mark_peer_dead(&self, peer: Pid) -> Vec<Handle> {
        let refs = self.refs.lock();
        let mut newly_dead = Vec::new();
        for record in refs.by_handle.values() {
            if record.owner == peer && record.alive.swap(false, Ordering::SeqCst) {
                newly_dead.push(record.handle);
            }
        }
        newly_dead
    }
}
