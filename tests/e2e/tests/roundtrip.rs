// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Echo round-trip and handle-transfer semantics across two host
//! processes.

use std::sync::Arc;
use std::time::Duration;

use nexus_binder::{
    CallContext, CallError, Hub, Parcel, ParcelObject, Pid, Service, ServiceError,
};
use nexus_e2e::{eventually, Process};

const OP_ECHO: u32 = 1;
const OP_GET_ECHO: u32 = 2;

const A: Pid = Pid::new(1);
const B: Pid = Pid::new(2);

fn echo_service() -> Arc<dyn Service> {
    Arc::new(|_ctx: &CallContext, opcode: u32, request: &mut Parcel| {
        if opcode != OP_ECHO {
            return Err(ServiceError::Failed);
        }
        let mut reply = Parcel::new();
        reply.write_bytes(&request.read_bytes().map_err(|_| ServiceError::Malformed)?);
        Ok(reply)
    })
}

#[test]
fn two_way_echo_round_trips_across_processes() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 2);
    let b = Process::spawn(&hub, B.value(), 1, 2);
    let node = b.runtime.register_service(echo_service());

    let proxy = a.runtime.proxy_to(B, node);
    let mut request = Parcel::new();
    request.write_bytes(b"the payload must come back unchanged");
    let mut reply = proxy.call(OP_ECHO, request).expect("echo call");
    assert_eq!(reply.read_bytes().unwrap(), b"the payload must come back unchanged");

    b.looper.stop();
    a.looper.stop();
}

#[test]
fn double_import_dedups_and_acquires_once() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 2);
    let b = Process::spawn(&hub, B.value(), 1, 2);

    let echo_node = b.runtime.register_service(echo_service());
    let directory = b.runtime.register_service(Arc::new(
        move |_ctx: &CallContext, opcode: u32, _request: &mut Parcel| {
            if opcode != OP_GET_ECHO {
                return Err(ServiceError::Failed);
            }
            let mut reply = Parcel::new();
            reply.push_object(ParcelObject::Local(echo_node));
            Ok(reply)
        },
    ));

    let dir_proxy = a.runtime.proxy_to(B, directory);
    let mut first_reply = dir_proxy.call(OP_GET_ECHO, Parcel::new()).expect("first lookup");
    let first = a.runtime.adopt(first_reply.take_object().unwrap()).expect("remote object");
    let mut second_reply = dir_proxy.call(OP_GET_ECHO, Parcel::new()).expect("second lookup");
    let second = a.runtime.adopt(second_reply.take_object().unwrap()).expect("remote object");

    // Same identity, same reference record, same handle.
    assert_eq!(first.handle(), second.handle());

    // One holding process means one strong unit, no matter how many times
    // the handle arrived.
    let b_registry = Arc::clone(&b.runtime);
    assert!(eventually(Duration::from_secs(1), || {
        b_registry.registry().node_counts(echo_node) == Some((1, 1))
    }));

    // Both proxies work; dropping both releases the single unit and the
    // node's implementation goes away with it.
    let mut request = Parcel::new();
    request.write_bytes(b"dedup");
    assert!(first.call(OP_ECHO, request).is_ok());
    drop(first);
    drop(second);
    assert!(eventually(Duration::from_secs(1), || {
        b_registry.registry().node_counts(echo_node).is_none()
    }));

    // A fresh call to the destroyed object is unreachable, not a crash.
    let probe = a.runtime.proxy_to(B, echo_node);
    let mut request = Parcel::new();
    request.write_bytes(b"gone");
    assert_eq!(probe.call(OP_ECHO, request).unwrap_err(), CallError::Unreachable);

    b.looper.stop();
    a.looper.stop();
}
