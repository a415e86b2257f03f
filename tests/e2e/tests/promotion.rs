// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Weak references across processes: downgrade, promote, and the
//! no-resurrection guarantee.

use std::sync::Arc;
use std::time::Duration;

use nexus_binder::{CallContext, Hub, Parcel, Pid, Service, ServiceError};
use nexus_e2e::{eventually, Process};

const OP_POKE: u32 = 1;

const A: Pid = Pid::new(1);
const B: Pid = Pid::new(2);
const C: Pid = Pid::new(3);

fn poke_service() -> Arc<dyn Service> {
    Arc::new(|_ctx: &CallContext, _opcode: u32, _request: &mut Parcel| Ok(Parcel::new()))
}

#[test]
fn promote_succeeds_while_another_holder_keeps_the_node_strong() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 1);
    let b = Process::spawn(&hub, B.value(), 1, 2);
    let c = Process::spawn(&hub, C.value(), 1, 1);

    let node = b.runtime.register_service(poke_service());
    let a_strong = a.runtime.proxy_to(B, node);
    let _c_strong = c.runtime.proxy_to(B, node);

    let b_probe = Arc::clone(&b.runtime);
    assert!(eventually(Duration::from_secs(1), || {
        b_probe.registry().node_counts(node) == Some((2, 2))
    }));

    // A keeps only a weak reference; C still pins the node.
    let weak = a_strong.downgrade();
    drop(a_strong);
    assert!(eventually(Duration::from_secs(1), || {
        b_probe.registry().node_counts(node).map(|(s, _)| s) == Some(1)
    }));

    let promoted = weak.promote().expect("node is still strong elsewhere");
    assert!(eventually(Duration::from_secs(1), || {
        b_probe.registry().node_counts(node).map(|(s, _)| s) == Some(2)
    }));
    assert!(promoted.call(OP_POKE, Parcel::new()).is_ok());

    c.looper.stop();
    b.looper.stop();
    a.looper.stop();
}

#[test]
fn promote_fails_once_the_node_lost_its_last_strong_count() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 1);
    let b = Process::spawn(&hub, B.value(), 1, 2);

    let node = b.runtime.register_service(poke_service());
    let strong = a.runtime.proxy_to(B, node);
    let weak = strong.downgrade();

    // Last strong count goes away; the implementation is released.
    drop(strong);
    let b_probe = Arc::clone(&b.runtime);
    assert!(eventually(Duration::from_secs(1), || {
        b_probe.registry().node_counts(node).map(|(s, _)| s) == Some(0)
    }));

    // No resurrection: the owner refuses the promotion attempt.
    assert!(weak.promote().is_none());

    b.looper.stop();
    a.looper.stop();
}

#[test]
fn promote_fails_when_the_owner_is_dead() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 1);
    let b = Process::spawn(&hub, B.value(), 1, 1);

    let node = b.runtime.register_service(poke_service());
    let strong = a.runtime.proxy_to(B, node);
    let weak = strong.downgrade();
    drop(strong);

    hub.kill(B);
    let weak_probe = weak.clone();
    assert!(eventually(Duration::from_secs(1), || weak_probe.promote().is_none()));
    assert!(weak.promote().is_none());

    b.looper.stop();
    a.looper.stop();
}
