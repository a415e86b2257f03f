// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Per-process runtime: one shared transport and scheduler,
//! explicit lifecycle, passed by shared ownership to every proxy and stub.
//!
//! All inbound traffic funnels through a single transaction pump. At most
//! one thread drains the channel at a time (a try-lock gate); every other
//! waiter parks on its own reply slot in bounded slices. Whichever thread
//! pulls an event routes it: replies complete the matching waiter, control
//! messages apply to the registry, death events fan out to the death
//! registry, and requests are dispatched inline on the pulling thread.
//! Dispatching inline on a blocked caller is what lets a thread waiting on
//! its own reply service nested calls addressed back to it, so two
//! single-worker peers calling into each other cannot deadlock.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests here; cross-process scenarios in tests/e2e

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::death::{DeathRecipient, DeathRegistry, SubscriptionId};
use crate::error::CallError;
use crate::parcel::{Parcel, ParcelObject};
use crate::proxy::{ObjectRef, Proxy};
use crate::registry::{PromoteCommit, PromoteStart, RefEffect, RefRecord, Registry};
use crate::service::{CallContext, CallPolicy, Service};
use crate::transport::{Channel, ChannelEvent, TransportError, Wait};
use crate::wire::{
    self, Envelope, WireObjectEntry, WireTarget, FLAG_ONEWAY, FLAG_REPLY, OP_ACQUIRE_STRONG,
    OP_ACQUIRE_WEAK, OP_DEAD_NOTIFICATION, OP_ENTER_LOOP, OP_EXIT_LOOP, OP_RELEASE_STRONG,
    OP_RELEASE_WEAK, STATUS_FAULT, STATUS_OK, STATUS_REJECTED, STATUS_UNREACHABLE,
};
use crate::{Handle, NodeId, Pid};

/// How long one pump or park slice lasts while a caller is blocked.
const PUMP_SLICE: Duration = Duration::from_millis(1);

/// One reply slot a blocked caller waits on.
struct PendingCall {
    owner: Pid,
    slot: Mutex<Option<Result<Parcel, CallError>>>,
    ready: Condvar,
}

impl PendingCall {
    fn new(owner: Pid) -> Self {
        Self { owner, slot: Mutex::new(None), ready: Condvar::new() }
    }

    fn complete(&self, outcome: Result<Parcel, CallError>) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.ready.notify_all();
    }

    fn try_take(&self) -> Option<Result<Parcel, CallError>> {
        self.slot.lock().take()
    }

    fn park(&self, slice: Duration) {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return;
        }
        let _ = self.ready.wait_for(&mut slot, slice);
    }
}

/// An inbound request pulled off the channel, awaiting dispatch.
pub struct InboundTransaction {
    envelope: Envelope,
}

/// Per-process IPC context.
///
/// Constructed once per process and shared by `Arc` with every proxy,
/// looper, and service that needs it. Dropping the last clone detaches the
/// channel endpoint, which peers observe as process termination.
pub struct ProcessRuntime {
    pid: Pid,
    euid: u32,
    channel: Arc<dyn Channel>,
    registry: Registry,
    death: DeathRegistry,
    policy: Arc<dyn CallPolicy>,
    next_correlation: AtomicU64,
    pending: Mutex<HashMap<u64, Arc<PendingCall>>>,
    pump_gate: Mutex<()>,
}

impl ProcessRuntime {
    /// Creates the runtime for one process.
    pub fn new(
        pid: Pid,
        euid: u32,
        channel: Arc<dyn Channel>,
        policy: Arc<dyn CallPolicy>,
    ) -> Arc<Self> {
        Arc::new(Self {
            pid,
            euid,
            channel,
            registry: Registry::new(pid),
            death: DeathRegistry::new(),
            policy,
            next_correlation: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            pump_gate: Mutex::new(()),
        })
    }

    /// Process identity of this runtime.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// The object registry owned by this runtime.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Exposes a local service to other processes.
    pub fn register_service(&self, service: Arc<dyn Service>) -> NodeId {
        self.registry.register_local(service)
    }

    /// Builds a strong proxy to an object owned by another process.
    ///
    /// This is the bootstrap path a naming directory would use to hand out
    /// root objects; handles received inside parcels are imported
    /// automatically instead.
    pub fn proxy_to(self: &Arc<Self>, owner: Pid, node: NodeId) -> Proxy {
        let (record, effect) = self.registry.import_strong(owner, node);
        self.reflect(&record, effect);
        Proxy::from_handle(Arc::clone(self), record.handle())
    }

    /// Takes ownership of a strong reference received in a parcel.
    ///
    /// The import performed on arrival already holds one strong count; the
    /// returned proxy owns it. Returns `None` for local objects, which need
    /// no proxy.
    pub fn adopt(self: &Arc<Self>, object: ParcelObject) -> Option<Proxy> {
        match object {
            ParcelObject::Local(_) => None,
            ParcelObject::Remote(handle) => {
                Some(Proxy::from_handle(Arc::clone(self), handle))
            }
        }
    }

    /// Issues a transaction against either a local node or a remote handle.
    pub fn transact(
        self: &Arc<Self>,
        target: &ObjectRef,
        opcode: u32,
        request: Parcel,
        oneway: bool,
    ) -> Result<Parcel, CallError> {
        match *target {
            ObjectRef::Local(node) => self.dispatch_local(node, opcode, request),
            ObjectRef::Remote(handle) => {
                self.call_remote(handle, opcode, request, oneway, None)
            }
        }
    }

    // --- outbound calls --------------------------------------------------

    pub(crate) fn call_remote(
        &self,
        handle: Handle,
        opcode: u32,
        request: Parcel,
        oneway: bool,
        deadline: Option<Duration>,
    ) -> Result<Parcel, CallError> {
        let record = self.registry.reference(handle).ok_or(CallError::Unreachable)?;
        if !record.is_alive() {
            return Err(CallError::PeerDead);
        }
        let owner = record.owner();
        let objects = self.outbound_objects(&request)?;
        let flags = if oneway { FLAG_ONEWAY } else { 0 };
        let correlation = self.next_correlation.fetch_add(1, Ordering::SeqCst);
        let envelope = Envelope {
            target: WireTarget::Object { owner, node: record.node() },
            cookie: 0,
            opcode,
            flags,
            sender_pid: self.pid,
            sender_euid: self.euid,
            correlation,
            payload: request.payload().to_vec(),
            objects,
        };

        if oneway {
            return match self.channel.send(owner, &envelope.encode()) {
                Ok(()) => Ok(Parcel::new()),
                Err(_) if !record.is_alive() => Err(CallError::PeerDead),
                Err(_) => Err(CallError::Unreachable),
            };
        }

        let call = Arc::new(PendingCall::new(owner));
        self.pending.lock().insert(correlation, Arc::clone(&call));
        if let Err(err) = self.channel.send(owner, &envelope.encode()) {
            self.pending.lock().remove(&correlation);
            return match err {
                _ if !record.is_alive() => Err(CallError::PeerDead),
                TransportError::NoRoute => Err(CallError::PeerDead),
                _ => Err(CallError::Unreachable),
            };
        }
        self.wait_for_reply(correlation, &call, deadline)
    }

    /// Blocks until the reply slot fills, pumping the channel whenever no
    /// other thread is. A blocked caller dispatches inbound requests
    /// inline (borrowed-thread execution).
    fn wait_for_reply(
        &self,
        correlation: u64,
        call: &Arc<PendingCall>,
        deadline: Option<Duration>,
    ) -> Result<Parcel, CallError> {
        let expires = deadline.map(|d| Instant::now() + d);
        loop {
            if let Some(outcome) = call.try_take() {
                return outcome;
            }
            if let Some(expires) = expires {
                if Instant::now() >= expires {
                    self.pending.lock().remove(&correlation);
                    // The peer still runs the handler to completion; the
                    // late reply is matched by correlation id and dropped.
                    return Err(CallError::Timeout);
                }
            }
            let pumped = match self.pump_gate.try_lock() {
                Some(_gate) => Some(self.pump_once(Wait::Timeout(PUMP_SLICE))),
                None => None,
            };
            match pumped {
                Some(Ok(Some(request))) => self.dispatch(request),
                Some(Ok(None)) => {}
                Some(Err(TransportError::Closed)) => {
                    self.fail_all_pending(CallError::PeerDead);
                }
                Some(Err(_)) => {}
                None => call.park(PUMP_SLICE),
            }
        }
    }

    fn fail_all_pending(&self, error: CallError) {
        let drained: Vec<Arc<PendingCall>> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, call)| call).collect()
        };
        for call in drained {
            call.complete(Err(error));
        }
    }

    // --- the transaction pump --------------------------------------------

    /// Pulls and routes the next event; inbound requests are returned to
    /// the caller for dispatch outside the pump gate.
    ///
    /// Loopers call this in a loop; blocked callers reach the same pump
    /// through [`Self::wait_for_reply`].
    pub fn next_inbound(
        &self,
        wait: Wait,
    ) -> Result<Option<InboundTransaction>, TransportError> {
        let _gate = self.pump_gate.lock();
        self.pump_once(wait)
    }

    /// Dispatches a previously pulled request on the calling thread.
    pub fn dispatch(&self, transaction: InboundTransaction) {
        let envelope = transaction.envelope;
        let node = match envelope.target {
            WireTarget::Node(node) => node,
            WireTarget::Object { owner, node } if owner == self.pid => node,
            WireTarget::Object { owner, .. } => {
                log::error!("{}: transaction misrouted (target owner {owner})", self.pid);
                self.registry.record_fault();
                self.reply_status(&envelope, STATUS_UNREACHABLE);
                return;
            }
        };
        let ctx = CallContext {
            sender: envelope.sender_pid,
            sender_euid: envelope.sender_euid,
        };
        let service = match self.registry.resolve_local(node) {
            Ok(service) => service,
            Err(_) => {
                // Never dropped silently: the caller gets an unreachable
                // reply (oneway callers at least get a log line).
                log::debug!("{}: transaction for unknown {node}", self.pid);
                self.reply_status(&envelope, STATUS_UNREACHABLE);
                return;
            }
        };
        if !self.policy.check(&ctx, node, envelope.opcode) {
            self.reply_status(&envelope, STATUS_REJECTED);
            return;
        }

        let mut request = self.inbound_parcel(&envelope);
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            service.on_transact(&ctx, envelope.opcode, &mut request)
        }));
        match outcome {
            Ok(Ok(reply)) => self.reply_payload(&envelope, reply),
            Ok(Err(err)) => {
                log::debug!("{}: handler for {node} failed: {err}", self.pid);
                self.reply_status(&envelope, STATUS_FAULT);
            }
            Err(_) => {
                // A handler fault never takes the worker down with it.
                log::error!("{}: handler for {node} panicked", self.pid);
                self.reply_status(&envelope, STATUS_FAULT);
            }
        }
    }

    fn pump_once(&self, wait: Wait) -> Result<Option<InboundTransaction>, TransportError> {
        let event = match self.channel.recv(wait) {
            Ok(event) => event,
            Err(TransportError::WouldBlock | TransportError::Timeout) => return Ok(None),
            Err(err) => return Err(err),
        };
        match event {
            ChannelEvent::Frame(bytes) => Ok(self.route_frame(&bytes)),
            ChannelEvent::PeerDead(pid) => {
                self.handle_peer_death(pid);
                Ok(None)
            }
        }
    }

    fn route_frame(&self, bytes: &[u8]) -> Option<InboundTransaction> {
        let envelope = match Envelope::decode(bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                log::error!("{}: dropping malformed frame: {err}", self.pid);
                self.registry.record_fault();
                return None;
            }
        };
        if envelope.is_reply() {
            self.complete_pending(envelope);
            return None;
        }
        if wire::is_control_opcode(envelope.opcode) {
            self.apply_control(envelope);
            return None;
        }
        Some(InboundTransaction { envelope })
    }

    fn complete_pending(&self, envelope: Envelope) {
        let call = match self.pending.lock().remove(&envelope.correlation) {
            Some(call) => call,
            None => {
                // Deadline already fired locally; the reply is stale.
                log::debug!(
                    "{}: discarding late reply (correlation {})",
                    self.pid,
                    envelope.correlation
                );
                return;
            }
        };
        let outcome = match envelope.status() {
            STATUS_OK => Ok(self.inbound_parcel(&envelope)),
            STATUS_UNREACHABLE => Err(CallError::Unreachable),
            STATUS_REJECTED => Err(CallError::Rejected),
            STATUS_FAULT => Err(CallError::Protocol),
            other => {
                log::error!("{}: reply with unknown status {other}", self.pid);
                self.registry.record_fault();
                Err(CallError::Protocol)
            }
        };
        call.complete(outcome);
    }

    fn apply_control(&self, envelope: Envelope) {
        let from = envelope.sender_pid;
        let node = match envelope.target {
            WireTarget::Node(node) => node,
            WireTarget::Object { node, .. } => node,
        };
        let result = match envelope.opcode {
            OP_ACQUIRE_STRONG if !envelope.is_oneway() => {
                // Promotion attempt: confirm or refuse, never resurrect.
                let status = match self.registry.acquire_strong(node, from, true) {
                    Ok(()) => STATUS_OK,
                    Err(_) => STATUS_UNREACHABLE,
                };
                self.reply_status(&envelope, status);
                return;
            }
            OP_ACQUIRE_STRONG => self.registry.acquire_strong(node, from, false),
            OP_RELEASE_STRONG => self.registry.release_strong(node, from),
            OP_ACQUIRE_WEAK => self.registry.acquire_weak(node, from),
            OP_RELEASE_WEAK => self.registry.release_weak(node, from),
            OP_DEAD_NOTIFICATION => {
                let mut payload = Parcel::from_parts(envelope.payload.clone(), Vec::new());
                match payload.read_u32() {
                    Ok(pid) => self.handle_peer_death(Pid::new(pid)),
                    Err(_) => {
                        log::error!("{}: malformed death notification", self.pid);
                        self.registry.record_fault();
                    }
                }
                return;
            }
            OP_ENTER_LOOP | OP_EXIT_LOOP => {
                log::debug!("{}: looper announcement from {from}", self.pid);
                return;
            }
            other => {
                log::error!("{}: unknown control opcode {other:#x}", self.pid);
                self.registry.record_fault();
                return;
            }
        };
        if let Err(err) = result {
            // Counter underflow and acquire-after-destroy indicate a peer
            // bug; they are surfaced, never clamped.
            log::error!(
                "{}: control {:#x} for {node} from {from} violated protocol: {err}",
                self.pid,
                envelope.opcode
            );
        }
    }

    fn handle_peer_death(&self, peer: Pid) {
        let newly_dead = self.registry.mark_peer_dead(peer);
        self.registry.drop_holder(peer);
        let stale: Vec<Arc<PendingCall>> = {
            let mut pending = self.pending.lock();
            let stale_ids: Vec<u64> = pending
                .iter()
                .filter(|(_, call)| call.owner == peer)
                .map(|(id, _)| *id)
                .collect();
            stale_ids.into_iter().filter_map(|id| pending.remove(&id)).collect()
        };
        for call in stale {
            call.complete(Err(CallError::PeerDead));
        }
        for handle in newly_dead {
            self.death.notify_object_dead(handle);
        }
    }

    // --- parcel/object translation ---------------------------------------

    fn outbound_objects(&self, parcel: &Parcel) -> Result<Vec<WireObjectEntry>, CallError> {
        let mut entries = Vec::with_capacity(parcel.object_entries().len());
        for (offset, object) in parcel.object_entries() {
            let entry = match *object {
                ParcelObject::Local(node) => {
                    self.registry.exportable(node).map_err(|_| CallError::Protocol)?;
                    WireObjectEntry { offset: *offset, owner: self.pid, node, delta: 1 }
                }
                ParcelObject::Remote(handle) => {
                    let record =
                        self.registry.reference(handle).ok_or(CallError::Protocol)?;
                    WireObjectEntry {
                        offset: *offset,
                        owner: record.owner(),
                        node: record.node(),
                        delta: 1,
                    }
                }
            };
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Rebuilds a parcel from an inbound envelope, importing every
    /// transferred reference into the registry first.
    fn inbound_parcel(&self, envelope: &Envelope) -> Parcel {
        let mut objects = Vec::with_capacity(envelope.objects.len());
        for entry in &envelope.objects {
            let object = if entry.owner == self.pid {
                // One of our own nodes coming home.
                ParcelObject::Local(entry.node)
            } else {
                let (record, effect) = if entry.delta > 0 {
                    self.registry.import_strong(entry.owner, entry.node)
                } else {
                    self.registry.import_weak(entry.owner, entry.node)
                };
                self.reflect(&record, effect);
                ParcelObject::Remote(record.handle())
            };
            objects.push((entry.offset, object));
        }
        Parcel::from_parts(envelope.payload.clone(), objects)
    }

    /// Reflects reference-count edges to the owning process.
    pub(crate) fn reflect(&self, record: &Arc<RefRecord>, effect: RefEffect) {
        if !record.is_alive() {
            return;
        }
        if effect.acquire_weak {
            self.send_control(record, OP_ACQUIRE_WEAK);
        }
        if effect.acquire_strong {
            self.send_control(record, OP_ACQUIRE_STRONG);
        }
        if effect.release_strong {
            self.send_control(record, OP_RELEASE_STRONG);
        }
        if effect.release_weak {
            self.send_control(record, OP_RELEASE_WEAK);
        }
    }

    fn send_control(&self, record: &Arc<RefRecord>, opcode: u32) {
        let envelope = Envelope {
            target: WireTarget::Object { owner: record.owner(), node: record.node() },
            cookie: 0,
            opcode,
            flags: FLAG_ONEWAY,
            sender_pid: self.pid,
            sender_euid: self.euid,
            correlation: 0,
            payload: Vec::new(),
            objects: Vec::new(),
        };
        if let Err(err) = self.channel.send(record.owner(), &envelope.encode()) {
            log::debug!("{}: control {opcode:#x} to {} undeliverable: {err}", self.pid, record.owner());
        }
    }

    /// Announces a worker joining or leaving the receive loop.
    pub(crate) fn announce_loop(&self, enter: bool) {
        let envelope = Envelope {
            target: WireTarget::Node(NodeId::new(0)),
            cookie: 0,
            opcode: if enter { OP_ENTER_LOOP } else { OP_EXIT_LOOP },
            flags: FLAG_ONEWAY,
            sender_pid: self.pid,
            sender_euid: self.euid,
            correlation: 0,
            payload: Vec::new(),
            objects: Vec::new(),
        };
        let _ = self.channel.send(Pid::CONTROL, &envelope.encode());
    }

    // --- replies ----------------------------------------------------------

    fn reply_status(&self, request: &Envelope, status: u8) {
        self.reply(request, status, Parcel::new());
    }

    fn reply_payload(&self, request: &Envelope, reply: Parcel) {
        self.reply(request, STATUS_OK, reply);
    }

    fn reply(&self, request: &Envelope, status: u8, reply: Parcel) {
        if request.is_oneway() {
            return;
        }
        let objects = match self.outbound_objects(&reply) {
            Ok(objects) => objects,
            Err(_) => {
                log::error!("{}: reply carried an invalid object reference", self.pid);
                self.registry.record_fault();
                return self.reply(request, STATUS_FAULT, Parcel::new());
            }
        };
        let envelope = Envelope {
            target: WireTarget::Node(match request.target {
                WireTarget::Node(node) => node,
                WireTarget::Object { node, .. } => node,
            }),
            cookie: request.cookie,
            opcode: request.opcode,
            flags: Envelope::flags_with_status(FLAG_REPLY, status),
            sender_pid: self.pid,
            sender_euid: self.euid,
            correlation: request.correlation,
            payload: reply.payload().to_vec(),
            objects,
        };
        if let Err(err) = self.channel.send(request.sender_pid, &envelope.encode()) {
            log::debug!("{}: reply to {} undeliverable: {err}", self.pid, request.sender_pid);
        }
    }

    // --- local dispatch ---------------------------------------------------

    fn dispatch_local(
        &self,
        node: NodeId,
        opcode: u32,
        request: Parcel,
    ) -> Result<Parcel, CallError> {
        let ctx = CallContext { sender: self.pid, sender_euid: self.euid };
        let service = self.registry.resolve_local(node).map_err(|_| CallError::Unreachable)?;
        if !self.policy.check(&ctx, node, opcode) {
            return Err(CallError::Rejected);
        }
        let mut request = request;
        match catch_unwind(AssertUnwindSafe(|| service.on_transact(&ctx, opcode, &mut request))) {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(CallError::Protocol),
            Err(_) => {
                log::error!("{}: local handler for {node} panicked", self.pid);
                Err(CallError::Protocol)
            }
        }
    }

    // --- promotion and death links ---------------------------------------

    pub(crate) fn promote(self: &Arc<Self>, handle: Handle) -> Option<Proxy> {
        match self.registry.ref_promote_start(handle) {
            PromoteStart::Strong => Some(Proxy::from_handle(Arc::clone(self), handle)),
            PromoteStart::Dead => None,
            PromoteStart::NeedRemote => {
                let record = self.registry.reference(handle)?;
                // The owner confirms with a two-way strong acquire; a node
                // whose strong count already hit 0 refuses.
                match self.call_remote(handle, OP_ACQUIRE_STRONG, Parcel::new(), false, None) {
                    Ok(_) => {}
                    Err(_) => return None,
                }
                match self.registry.ref_promote_commit(handle) {
                    PromoteCommit::Committed => {}
                    PromoteCommit::AlreadyStrong => {
                        // A concurrent promote won the edge; hand the
                        // surplus confirmed unit back and ride the winner.
                        self.registry.ref_inc_strong(handle);
                        self.send_control(&record, OP_RELEASE_STRONG);
                    }
                }
                Some(Proxy::from_handle(Arc::clone(self), handle))
            }
        }
    }

    pub(crate) fn link_to_death(
        &self,
        handle: Handle,
        recipient: Arc<dyn DeathRecipient>,
    ) -> SubscriptionId {
        let id = self.death.link(handle, recipient);
        let dead = self
            .registry
            .reference(handle)
            .map_or(true, |record| !record.is_alive());
        if dead {
            // The object is already gone; fire the one-shot immediately.
            self.death.notify_object_dead(handle);
        }
        id
    }

    pub(crate) fn unlink_to_death(&self, handle: Handle, id: SubscriptionId) -> bool {
        self.death.unlink(handle, id)
    }

    pub(crate) fn release_strong_handle(&self, handle: Handle) {
        let record = self.registry.reference(handle);
        let effect = self.registry.ref_dec_strong(handle);
        if let Some(record) = record {
            self.reflect(&record, effect);
        }
    }

    pub(crate) fn release_weak_handle(&self, handle: Handle) {
        let record = self.registry.reference(handle);
        let effect = self.registry.ref_dec_weak(handle);
        if let Some(record) = record {
            self.reflect(&record, effect);
        }
    }

    pub(crate) fn clone_strong_handle(&self, handle: Handle) {
        self.registry.ref_inc_strong(handle);
    }

    pub(crate) fn clone_weak_handle(&self, handle: Handle) {
        self.registry.ref_inc_weak(handle);
    }
}

impl ProcessRuntime {
    /// Pulls and dispatches at most one inbound transaction.
    ///
    /// Returns `Ok(true)` when a request was dispatched, `Ok(false)` when
    /// the wait elapsed idle. Convenience for tests and hand-rolled serve
    /// loops; loopers use [`Self::next_inbound`] directly so they can do
    /// spawn accounting before dispatching.
    pub fn poll_serve(&self, wait: Wait) -> Result<bool, TransportError> {
        match self.next_inbound(wait) {
            Ok(Some(transaction)) => {
                self.dispatch(transaction);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
