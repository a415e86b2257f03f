// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Object IPC runtime: remote object proxies, cross-process
//! reference counting, synchronous transaction dispatch, death notification.
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module, scenario tests in tests/e2e
//!
//! PUBLIC API:
//!   - ProcessRuntime: per-process context (registry, channel, pending calls)
//!   - Proxy / WeakProxy: strong and weak handles on objects owned elsewhere
//!   - Service trait: the callable side of an exposed object
//!   - Channel trait: narrow transport contract (host hub provided for tests)
//!
//! The production kernel transport is not part of this crate. The `host`
//! module provides a deterministic in-memory hub implementing the same
//! `Channel` contract so every runtime behavior is host-testable.

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs)]

use core::fmt;

pub mod death;
pub mod error;
pub mod host;
pub mod looper;
pub mod parcel;
pub mod proxy;
pub mod registry;
pub mod runtime;
pub mod service;
pub mod transport;
pub mod wire;

pub use death::{DeathRecipient, DeathRegistry, SubscriptionId};
pub use error::CallError;
pub use host::{HostChannel, Hub};
pub use looper::Looper;
pub use parcel::{Parcel, ParcelError, ParcelObject};
pub use proxy::{ObjectRef, Proxy, WeakProxy};
pub use registry::{Registry, RegistryError};
pub use runtime::{InboundTransaction, ProcessRuntime};
pub use service::{AllowAll, CallContext, CallPolicy, Service, ServiceError};
pub use transport::{Channel, ChannelEvent, TransportError, Wait};
pub use wire::WireError;

/// Process identity as seen by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

impl Pid {
    /// Destination reserved for the transport broker itself (looper
    /// registration, never a real process).
    pub const CONTROL: Pid = Pid(0);

    /// Wraps a raw process id.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid:{}", self.0)
    }
}

/// Process-local identity of an object exposed to other processes.
///
/// Stable for the lifetime of the node record, never reused within a
/// process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw node id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Process-local name for a reference to an object owned by another
/// process.
///
/// Handles are meaningless outside the process that allocated them; the
/// wire form of an object is always the `(owner, node)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle(u32);

impl Handle {
    /// Wraps a raw handle value.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{}", self.0)
    }
}
