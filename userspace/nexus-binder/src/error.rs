// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Caller-visible transaction outcomes.

use thiserror::Error;

/// Terminal failure of a proxy call, distinguishable so callers can pick a
/// recovery strategy (retry, rediscover, reconnect, or report a bug).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum CallError {
    /// Target object or process is unknown. Retryable after rediscovery.
    #[error("target object or process unknown")]
    Unreachable,
    /// The policy hook declined the call. Not retryable without a privilege
    /// change.
    #[error("call rejected by policy")]
    Rejected,
    /// The owning process terminated while the call was outstanding.
    /// Recoverable only by reconnecting to a new instance.
    #[error("owning process terminated")]
    PeerDead,
    /// The caller-supplied deadline expired. The peer may still run the
    /// handler to completion; its late reply is discarded.
    #[error("deadline exceeded")]
    Timeout,
    /// Malformed frame, counter underflow, or a handler fault. Treated as a
    /// bug signal, never silently swallowed.
    #[error("protocol violation")]
    Protocol,
}
