// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Bounded worker pool blocking on the transaction pump.
//!
//! Workers loop on [`ProcessRuntime::next_inbound`] in short slices so the
//! pump gate rotates between them and blocked callers. When a worker picks
//! up a request while every other worker is busy, one extra worker is
//! spawned, up to the configured maximum. Borrowed-thread execution never
//! spawns: a caller servicing calls while blocked is not pool growth.
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::runtime::ProcessRuntime;
use crate::transport::Wait;

const SERVE_SLICE: Duration = Duration::from_millis(1);

struct LooperShared {
    stop: AtomicBool,
    busy: AtomicUsize,
    spawned: AtomicUsize,
    max: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// Worker pool serving one runtime's inbound transactions.
pub struct Looper {
    shared: Arc<LooperShared>,
}

impl Looper {
    /// Starts a pool with `initial` workers, growing on demand to `max`.
    pub fn start(runtime: Arc<ProcessRuntime>, initial: usize, max: usize) -> Self {
        let shared = Arc::new(LooperShared {
            stop: AtomicBool::new(false),
            busy: AtomicUsize::new(0),
            spawned: AtomicUsize::new(0),
            max: max.max(initial).max(1),
            workers: Mutex::new(Vec::new()),
        });
        let looper = Self { shared };
        for _ in 0..initial.max(1) {
            spawn_worker(&runtime, &looper.shared);
        }
        looper
    }

    /// Number of workers spawned over the pool's lifetime.
    pub fn spawned(&self) -> usize {
        self.shared.spawned.load(Ordering::SeqCst)
    }

    /// Tells every worker to stop and joins them.
    ///
    /// A worker that already dispatched a transaction finishes its handler
    /// before exiting; none is abandoned mid-handler.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        loop {
            let drained: Vec<JoinHandle<()>> = {
                let mut workers = self.shared.workers.lock();
                workers.drain(..).collect()
            };
            if drained.is_empty() {
                return;
            }
            for handle in drained {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for Looper {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker(runtime: &Arc<ProcessRuntime>, shared: &Arc<LooperShared>) {
    shared.spawned.fetch_add(1, Ordering::SeqCst);
    let runtime = Arc::clone(runtime);
    let shared_for_worker = Arc::clone(shared);
    let handle = thread::spawn(move || worker_loop(runtime, shared_for_worker));
    shared.workers.lock().push(handle);
}

fn worker_loop(runtime: Arc<ProcessRuntime>, shared: Arc<LooperShared>) {
    runtime.announce_loop(true);
    log::debug!("{}: looper worker entering", runtime.pid());
    while !shared.stop.load(Ordering::SeqCst) {
        match runtime.next_inbound(Wait::Timeout(SERVE_SLICE)) {
            Ok(Some(transaction)) => {
                let busy = shared.busy.fetch_add(1, Ordering::SeqCst) + 1;
                let spawned = shared.spawned.load(Ordering::SeqCst);
                if busy >= spawned
                    && spawned < shared.max
                    && !shared.stop.load(Ordering::SeqCst)
                {
                    // Every worker is occupied; add capacity for whatever
                    // is queued behind this transaction.
                    spawn_worker(&runtime, &shared);
                }
                runtime.dispatch(transaction);
                shared.busy.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(None) => {}
            Err(_) => break,
        }
    }
    log::debug!("{}: looper worker exiting", runtime.pid());
    runtime.announce_loop(false);
}
