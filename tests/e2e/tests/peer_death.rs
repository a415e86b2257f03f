// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Abrupt peer termination: outstanding calls resolve to peer-death and
//! every linked subscriber fires exactly once.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nexus_binder::{
    CallContext, CallError, Handle, Hub, Parcel, Pid, Service, ServiceError,
};
use nexus_e2e::{eventually, Process};

const OP_HANG: u32 = 1;

const A: Pid = Pid::new(1);
const B: Pid = Pid::new(2);

fn slow_service() -> Arc<dyn Service> {
    Arc::new(|_ctx: &CallContext, _opcode: u32, _request: &mut Parcel| {
        thread::sleep(Duration::from_millis(500));
        Ok(Parcel::new())
    })
}

#[test]
fn termination_fails_outstanding_calls_and_fires_subscribers_once() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 2);
    let b = Process::spawn(&hub, B.value(), 3, 3);

    let nodes = [
        b.runtime.register_service(slow_service()),
        b.runtime.register_service(slow_service()),
        b.runtime.register_service(slow_service()),
    ];
    let proxies: Vec<_> = nodes.iter().map(|node| a.runtime.proxy_to(B, *node)).collect();

    let fired: Vec<Arc<AtomicUsize>> =
        (0..3).map(|_| Arc::new(AtomicUsize::new(0))).collect();
    for (proxy, counter) in proxies.iter().zip(&fired) {
        let counter = Arc::clone(counter);
        proxy.link_to_death(Arc::new(move |_handle: Handle| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
    }

    let callers: Vec<_> = proxies
        .iter()
        .map(|proxy| {
            let proxy = proxy.clone();
            thread::spawn(move || proxy.call(OP_HANG, Parcel::new()))
        })
        .collect();

    // Let all three transactions reach their handlers, then die abruptly.
    thread::sleep(Duration::from_millis(100));
    hub.kill(B);
    hub.kill(B);

    for caller in callers {
        assert_eq!(caller.join().unwrap().unwrap_err(), CallError::PeerDead);
    }
    for counter in &fired {
        assert!(eventually(Duration::from_secs(1), || {
            counter.load(Ordering::SeqCst) == 1
        }));
        assert_eq!(counter.load(Ordering::SeqCst), 1, "subscriber fired more than once");
    }

    // Liveness is cleared and later calls fail fast.
    for proxy in &proxies {
        assert!(!proxy.is_alive());
        assert_eq!(proxy.call(OP_HANG, Parcel::new()).unwrap_err(), CallError::PeerDead);
    }

    // Linking against an already-dead reference fires immediately, once.
    let late = Arc::new(AtomicUsize::new(0));
    let late_probe = Arc::clone(&late);
    let id = proxies[0].link_to_death(Arc::new(move |_handle: Handle| {
        late_probe.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(late.load(Ordering::SeqCst), 1);
    // Already delivered, so unlink reports nothing left to remove.
    assert!(!proxies[0].unlink_to_death(id));

    b.looper.stop();
    a.looper.stop();
}

#[test]
fn unlinked_subscribers_stay_silent() {
    let hub = Hub::new();
    let a = Process::spawn(&hub, A.value(), 1, 1);
    let b = Process::spawn(&hub, B.value(), 1, 1);
    let node = b.runtime.register_service(slow_service());

    let proxy = a.runtime.proxy_to(B, node);
    let fired = Arc::new(AtomicUsize::new(0));
    let probe = Arc::clone(&fired);
    let id = proxy.link_to_death(Arc::new(move |_handle: Handle| {
        probe.fetch_add(1, Ordering::SeqCst);
    }));
    assert!(proxy.unlink_to_death(id));

    hub.kill(B);
    assert!(eventually(Duration::from_millis(500), || !proxy.is_alive()));
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    a.looper.stop();
    b.looper.stop();
}
