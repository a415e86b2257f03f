// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Shared helpers for cross-process binder scenarios over the host hub.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nexus_binder::{AllowAll, Hub, Looper, Pid, ProcessRuntime};

/// One emulated process: its runtime plus the worker pool serving it.
pub struct Process {
    /// The process's IPC context.
    pub runtime: Arc<ProcessRuntime>,
    /// Worker pool draining the process's channel.
    pub looper: Looper,
}

impl Process {
    /// Attaches a fresh process to the hub and starts its pool.
    pub fn spawn(hub: &Hub, pid: u32, initial: usize, max: usize) -> Self {
        let pid = Pid::new(pid);
        let channel = hub.attach(pid).expect("attach endpoint");
        let runtime =
            ProcessRuntime::new(pid, 1000 + pid.value(), Arc::new(channel), Arc::new(AllowAll));
        let looper = Looper::start(Arc::clone(&runtime), initial, max);
        Self { runtime, looper }
    }
}

/// Polls `probe` until it holds or `timeout` passes; returns the final
/// observation.
pub fn eventually(timeout: Duration, probe: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if probe() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    probe()
}
