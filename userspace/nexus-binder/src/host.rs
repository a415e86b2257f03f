// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: In-memory hub transport for host-based testing.
//!
//! The hub stands in for the kernel driver: one endpoint per "process",
//! frame boundaries preserved, per-pair FIFO delivery, and peer-death
//! injection via [`Hub::kill`]. Frames addressed to [`Pid::CONTROL`] are
//! absorbed by the hub itself (looper announcements).
//!
//! OWNERS: @runtime
//! STATUS: Experimental
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests here; every scenario test in tests/e2e runs
//! over this transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::transport::{Channel, ChannelEvent, TransportError, Wait};
use crate::Pid;

struct HubInner {
    endpoints: Mutex<HashMap<Pid, Sender<ChannelEvent>>>,
    control_frames: AtomicU64,
}

/// Process-connecting hub; clone handles share the same fabric.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                endpoints: Mutex::new(HashMap::new()),
                control_frames: AtomicU64::new(0),
            }),
        }
    }

    /// Attaches a new process endpoint.
    pub fn attach(&self, pid: Pid) -> Result<HostChannel, TransportError> {
        let mut endpoints = self.inner.endpoints.lock();
        if endpoints.contains_key(&pid) {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = mpsc::channel();
        endpoints.insert(pid, tx);
        Ok(HostChannel { inner: Arc::clone(&self.inner), pid, rx: Mutex::new(rx) })
    }

    /// Terminates a process: detaches its endpoint and tells every other
    /// endpoint about the death. Idempotent.
    pub fn kill(&self, pid: Pid) {
        let mut endpoints = self.inner.endpoints.lock();
        if endpoints.remove(&pid).is_none() {
            return;
        }
        for sender in endpoints.values() {
            let _ = sender.send(ChannelEvent::PeerDead(pid));
        }
    }

    /// Number of frames absorbed on the control destination.
    pub fn control_frames(&self) -> u64 {
        self.inner.control_frames.load(Ordering::SeqCst)
    }
}

/// One process's endpoint on the hub.
pub struct HostChannel {
    inner: Arc<HubInner>,
    pid: Pid,
    rx: Mutex<Receiver<ChannelEvent>>,
}

impl HostChannel {
    /// Process this endpoint is attached as.
    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl Channel for HostChannel {
    fn send(&self, to: Pid, frame: &[u8]) -> Result<(), TransportError> {
        if to == Pid::CONTROL {
            self.inner.control_frames.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }
        let endpoints = self.inner.endpoints.lock();
        if !endpoints.contains_key(&self.pid) {
            return Err(TransportError::Closed);
        }
        let sender = endpoints.get(&to).ok_or(TransportError::NoRoute)?;
        sender.send(ChannelEvent::Frame(frame.to_vec())).map_err(|_| TransportError::NoRoute)
    }

    fn recv(&self, wait: Wait) -> Result<ChannelEvent, TransportError> {
        let receiver = self.rx.lock();
        match wait {
            Wait::Blocking => receiver.recv().map_err(|_| TransportError::Closed),
            Wait::NonBlocking => receiver.try_recv().map_err(|err| match err {
                TryRecvError::Empty => TransportError::WouldBlock,
                TryRecvError::Disconnected => TransportError::Closed,
            }),
            Wait::Timeout(timeout) => {
                if timeout.is_zero() {
                    return receiver.try_recv().map_err(|err| match err {
                        TryRecvError::Empty => TransportError::WouldBlock,
                        TryRecvError::Disconnected => TransportError::Closed,
                    });
                }
                receiver.recv_timeout(timeout).map_err(|err| match err {
                    RecvTimeoutError::Timeout => TransportError::Timeout,
                    RecvTimeoutError::Disconnected => TransportError::Closed,
                })
            }
        }
    }
}

impl Drop for HostChannel {
    fn drop(&mut self) {
        // Dropping the endpoint is process termination as far as the other
        // endpoints can tell.
        let mut endpoints = self.inner.endpoints.lock();
        if endpoints.remove(&self.pid).is_none() {
            return;
        }
        for sender in endpoints.values() {
            let _ = sender.send(ChannelEvent::PeerDead(self.pid));
        }
    }
}
