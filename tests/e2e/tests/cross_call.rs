// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Mutual cross-calls between single-worker peers must not deadlock: a
//! thread blocked on its own reply services calls addressed back to it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use nexus_binder::{AllowAll, CallContext, Hub, Parcel, Pid, ProcessRuntime, ServiceError};
use nexus_e2e::Process;

const OP_CALL_ME_BACK: u32 = 1;
const OP_CALLBACK: u32 = 2;

const A: Pid = Pid::new(1);
const B: Pid = Pid::new(2);

#[test]
fn blocked_caller_services_the_callback_itself() {
    let hub = Hub::new();
    // Process A runs no pool at all: the only thread that can serve the
    // callback is the one blocked on the outer call.
    let a = ProcessRuntime::new(
        A,
        1001,
        Arc::new(hub.attach(A).unwrap()),
        Arc::new(AllowAll),
    );
    let b = Process::spawn(&hub, B.value(), 1, 1);

    let callback_thread: Arc<Mutex<Option<ThreadId>>> = Arc::new(Mutex::new(None));
    let seen = Arc::clone(&callback_thread);
    let callback_node = a.register_service(Arc::new(
        move |_ctx: &CallContext, opcode: u32, _request: &mut Parcel| {
            if opcode != OP_CALLBACK {
                return Err(ServiceError::Failed);
            }
            *seen.lock().unwrap() = Some(thread::current().id());
            let mut reply = Parcel::new();
            reply.write_u32(7);
            Ok(reply)
        },
    ));

    let b_runtime = Arc::clone(&b.runtime);
    let outer_node = b.runtime.register_service(Arc::new(
        move |_ctx: &CallContext, opcode: u32, _request: &mut Parcel| {
            if opcode != OP_CALL_ME_BACK {
                return Err(ServiceError::Failed);
            }
            let back = b_runtime.proxy_to(A, callback_node);
            let mut answer =
                back.call(OP_CALLBACK, Parcel::new()).map_err(|_| ServiceError::Failed)?;
            let mut reply = Parcel::new();
            reply.write_u32(answer.read_u32().map_err(|_| ServiceError::Malformed)?);
            Ok(reply)
        },
    ));

    let proxy = a.proxy_to(B, outer_node);
    let mut reply = proxy.call(OP_CALL_ME_BACK, Parcel::new()).expect("no deadlock");
    assert_eq!(reply.read_u32().unwrap(), 7);

    // The callback ran on the thread that was blocked on the outer call.
    assert_eq!(
        *callback_thread.lock().unwrap(),
        Some(thread::current().id()),
        "callback was not served on the borrowed thread"
    );

    b.looper.stop();
}

#[test]
fn single_worker_pools_on_both_sides_complete_mutual_calls() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 1);
    let b = Process::spawn(&hub, B.value(), 1, 1);

    let depth = Arc::new(AtomicUsize::new(0));
    let depth_probe = Arc::clone(&depth);
    let callback_node = a.runtime.register_service(Arc::new(
        move |_ctx: &CallContext, _opcode: u32, _request: &mut Parcel| {
            depth_probe.fetch_add(1, Ordering::SeqCst);
            Ok(Parcel::new())
        },
    ));

    let b_runtime = Arc::clone(&b.runtime);
    let outer_node = b.runtime.register_service(Arc::new(
        move |_ctx: &CallContext, _opcode: u32, _request: &mut Parcel| {
            let back = b_runtime.proxy_to(A, callback_node);
            back.call(OP_CALLBACK, Parcel::new()).map_err(|_| ServiceError::Failed)?;
            back.call(OP_CALLBACK, Parcel::new()).map_err(|_| ServiceError::Failed)?;
            Ok(Parcel::new())
        },
    ));

    let proxy = a.runtime.proxy_to(B, outer_node);
    proxy.call(OP_CALL_ME_BACK, Parcel::new()).expect("no deadlock with pool size 1");
    assert_eq!(depth.load(Ordering::SeqCst), 2);

    b.looper.stop();
    a.looper.stop();
}
