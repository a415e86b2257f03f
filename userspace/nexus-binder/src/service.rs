// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Handler-side contracts: the callable service, the per-call
//! context and the injected permission hook.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable

use thiserror::Error;

use crate::parcel::Parcel;
use crate::{NodeId, Pid};

/// Identity of the caller as observed by the dispatching runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    /// Process that issued the transaction.
    pub sender: Pid,
    /// Effective user id of the sender.
    pub sender_euid: u32,
}

/// Failures a handler may surface to its caller.
///
/// Both variants reach the caller as a handler-fault reply; the split
/// exists so handlers can distinguish "I could not read the request" from
/// "I read it and refused it" in their own logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The request payload did not decode.
    #[error("malformed request payload")]
    Malformed,
    /// The handler ran and failed.
    #[error("handler failed")]
    Failed,
}

/// The callable side of an object exposed to other processes.
///
/// Handlers run synchronously on the dispatching thread and may issue
/// nested proxy calls through a runtime they captured at construction.
pub trait Service: Send + Sync {
    /// Handles one inbound transaction and produces the reply payload.
    fn on_transact(
        &self,
        ctx: &CallContext,
        opcode: u32,
        request: &mut Parcel,
    ) -> Result<Parcel, ServiceError>;
}

impl<F> Service for F
where
    F: Fn(&CallContext, u32, &mut Parcel) -> Result<Parcel, ServiceError> + Send + Sync,
{
    fn on_transact(
        &self,
        ctx: &CallContext,
        opcode: u32,
        request: &mut Parcel,
    ) -> Result<Parcel, ServiceError> {
        self(ctx, opcode, request)
    }
}

/// Permission hook consulted before a handler runs.
///
/// The runtime exposes the hook, not a policy engine: rejections produce a
/// `Rejected` reply without invoking the handler.
pub trait CallPolicy: Send + Sync {
    /// Returns `true` when the call may proceed.
    fn check(&self, ctx: &CallContext, target: NodeId, opcode: u32) -> bool;
}

/// Policy that admits every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

impl CallPolicy for AllowAll {
    fn check(&self, _ctx: &CallContext, _target: NodeId, _opcode: u32) -> bool {
        true
    }
}
