// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Caller-side handles: strong and weak proxies over remote
//! references, plus the uniform local-or-remote call target.
//!
//! Proxies are RAII over the registry's local counts: cloning and dropping
//! a proxy moves the counts, and the registry tells the runtime which
//! acquire/release control messages to reflect to the owning process.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable

use std::sync::Arc;
use std::time::Duration;

use crate::death::{DeathRecipient, SubscriptionId};
use crate::error::CallError;
use crate::parcel::Parcel;
use crate::runtime::ProcessRuntime;
use crate::{Handle, NodeId};

/// A call target: either a node in this process or a handle on a remote
/// object. One uniform transact capability covers both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectRef {
    /// An object owned by this process, invoked without crossing the
    /// channel.
    Local(NodeId),
    /// An object owned elsewhere, invoked through its handle.
    Remote(Handle),
}

/// Strong handle on an object owned by another process.
pub struct Proxy {
    runtime: Arc<ProcessRuntime>,
    handle: Handle,
}

impl Proxy {
    /// Wraps a handle whose strong count has already been taken.
    pub(crate) fn from_handle(runtime: Arc<ProcessRuntime>, handle: Handle) -> Self {
        Self { runtime, handle }
    }

    /// The process-local handle this proxy holds.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Returns `false` once the owning process is known to be dead.
    pub fn is_alive(&self) -> bool {
        self.runtime
            .registry()
            .reference(self.handle)
            .map_or(false, |record| record.is_alive())
    }

    /// Issues a two-way transaction and blocks until its terminal state.
    pub fn call(&self, opcode: u32, request: Parcel) -> Result<Parcel, CallError> {
        self.runtime.call_remote(self.handle, opcode, request, false, None)
    }

    /// Two-way call with a local deadline.
    ///
    /// On expiry the call resolves to [`CallError::Timeout`] locally; the
    /// peer may still run the handler to completion and its late reply is
    /// discarded.
    pub fn call_with_deadline(
        &self,
        opcode: u32,
        request: Parcel,
        deadline: Duration,
    ) -> Result<Parcel, CallError> {
        self.runtime.call_remote(self.handle, opcode, request, false, Some(deadline))
    }

    /// Fire-and-forget transaction; returns as soon as the channel accepts
    /// the send.
    pub fn call_oneway(&self, opcode: u32, request: Parcel) -> Result<(), CallError> {
        self.runtime.call_remote(self.handle, opcode, request, true, None).map(|_| ())
    }

    /// Creates a weak proxy on the same reference.
    pub fn downgrade(&self) -> WeakProxy {
        self.runtime.clone_weak_handle(self.handle);
        WeakProxy { runtime: Arc::clone(&self.runtime), handle: self.handle }
    }

    /// Subscribes `recipient` to the death of the referenced object.
    ///
    /// If the owning process is already dead the recipient fires
    /// immediately, still exactly once.
    pub fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> SubscriptionId {
        self.runtime.link_to_death(self.handle, recipient)
    }

    /// Removes a death subscription; `false` once delivered or unlinked.
    pub fn unlink_to_death(&self, id: SubscriptionId) -> bool {
        self.runtime.unlink_to_death(self.handle, id)
    }
}

impl Clone for Proxy {
    fn clone(&self) -> Self {
        self.runtime.clone_strong_handle(self.handle);
        Self { runtime: Arc::clone(&self.runtime), handle: self.handle }
    }
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.runtime.release_strong_handle(self.handle);
    }
}

/// Weak handle on an object owned by another process.
///
/// Holds the reference record alive for lookups without keeping the remote
/// object alive. [`WeakProxy::promote`] is the only way back to a strong
/// proxy.
pub struct WeakProxy {
    runtime: Arc<ProcessRuntime>,
    handle: Handle,
}

impl WeakProxy {
    /// The process-local handle this proxy holds.
    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Attempts to regain a strong proxy.
    ///
    /// Fails when the referenced node's strong count is already 0 or the
    /// owning process is dead; it never resurrects a destroyed object.
    pub fn promote(&self) -> Option<Proxy> {
        self.runtime.promote(self.handle)
    }
}

impl Clone for WeakProxy {
    fn clone(&self) -> Self {
        self.runtime.clone_weak_handle(self.handle);
        Self { runtime: Arc::clone(&self.runtime), handle: self.handle }
    }
}

impl Drop for WeakProxy {
    fn drop(&mut self) {
        self.runtime.release_weak_handle(self.handle);
    }
}
