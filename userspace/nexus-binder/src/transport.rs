// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Narrow transport contract the runtime consumes.
//!
//! The channel moves whole frames between processes with single-copy,
//! ordered, reliable delivery and preserves message boundaries. Peer
//! termination is folded into the receive stream as a tagged event so the
//! runtime has a single place to observe it.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable

use core::time::Duration;

use thiserror::Error;

use crate::Pid;

/// Behaviour of a blocking receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until an event arrives.
    Blocking,
    /// Return immediately if nothing is queued.
    NonBlocking,
    /// Block until an event arrives or the timeout expires.
    Timeout(Duration),
}

impl Wait {
    /// Returns `true` when the caller requested a non-blocking attempt.
    pub const fn is_non_blocking(self) -> bool {
        matches!(self, Self::NonBlocking)
    }

    /// Converts a [`Wait::Timeout`] variant into its [`Duration`].
    pub const fn timeout(self) -> Option<Duration> {
        match self {
            Self::Timeout(duration) => Some(duration),
            Self::Blocking | Self::NonBlocking => None,
        }
    }
}

/// Errors produced by a transaction channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No event could be delivered without blocking.
    #[error("operation would block")]
    WouldBlock,
    /// The receive wait expired before an event arrived.
    #[error("operation timed out")]
    Timeout,
    /// This endpoint has been closed; no further traffic is possible.
    #[error("channel closed")]
    Closed,
    /// The destination process has no endpoint on this channel.
    #[error("no route to destination process")]
    NoRoute,
}

/// One event pulled off the channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A complete transaction frame.
    Frame(Vec<u8>),
    /// Out-of-band notice that a process attached to the channel terminated.
    PeerDead(Pid),
}

/// Per-process conduit for transaction frames.
///
/// Implementations must preserve frame boundaries, never duplicate or drop
/// frames, and deliver frames between the same ordered pair of endpoints in
/// send order. The handle is shared read/write by every worker thread of a
/// process.
pub trait Channel: Send + Sync {
    /// Sends one frame to the endpoint attached as `to`.
    fn send(&self, to: Pid, frame: &[u8]) -> Result<(), TransportError>;

    /// Receives the next event for this endpoint.
    fn recv(&self, wait: Wait) -> Result<ChannelEvent, TransportError>;
}
