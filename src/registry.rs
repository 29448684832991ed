// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Per-peer response queues and telemetry snapshots.
//!
//! The registry is the correlation point between the two listener threads
//! (producers) and each session's dispatcher (consumer):
//!
//! ```text
//! cmd listener    -> append_response(ip, bytes) -+
//!                                                +-> PeerRecord
//! state listener  -> set_telemetry(ip, map)     -+      |
//!                                                       v
//! dispatcher      <- wait_response(ip, deadline) / telemetry(ip)
//! ```
//!
//! Exactly one record exists per distinct peer IP, created lazily at
//! session construction and never removed for the life of the process
//! (bounded by the number of controlled devices). Datagrams from source
//! addresses with no record are counted and discarded - a deliberate
//! robustness boundary against stray traffic on the listening ports.

use crate::telemetry::TelemetryMap;
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Per-peer state: pending response queue plus latest telemetry snapshot.
///
/// Both halves are guarded by short-scope mutexes, held only across a
/// single push/pop or snapshot replace - never across a wait. The condvar
/// wakes a dispatcher blocked in [`PeerRegistry::wait_response`] as soon
/// as the command listener appends a payload.
#[derive(Debug, Default)]
pub(crate) struct PeerRecord {
    responses: Mutex<VecDeque<Vec<u8>>>,
    response_ready: Condvar,
    telemetry: Mutex<TelemetryMap>,
}

/// Process-wide table of known peers, keyed by source IP.
///
/// Responses are matched by IP only: the device replies from its command
/// port but that is not guaranteed by the protocol, and telemetry arrives
/// from an unrelated source port.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<IpAddr, Arc<PeerRecord>>>,
    routed: AtomicU64,
    unroutable: AtomicU64,
}

impl PeerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the record for `ip`, creating it if absent.
    pub(crate) fn get_or_create(&self, ip: IpAddr) -> Arc<PeerRecord> {
        if let Some(record) = self.peers.read().get(&ip) {
            return Arc::clone(record);
        }
        let mut peers = self.peers.write();
        Arc::clone(peers.entry(ip).or_default())
    }

    /// Whether `ip` has a registered record.
    #[must_use]
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.peers.read().contains_key(&ip)
    }

    /// Append a raw response payload to the peer's FIFO queue.
    ///
    /// Returns `false` (and counts the drop) when the source IP has no
    /// registered record.
    pub fn append_response(&self, ip: IpAddr, payload: Vec<u8>) -> bool {
        let Some(record) = self.lookup(ip) else {
            self.unroutable.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        self.routed.fetch_add(1, Ordering::Relaxed);
        let mut queue = record.responses.lock();
        queue.push_back(payload);
        record.response_ready.notify_one();
        true
    }

    /// Pop the oldest queued response without waiting.
    #[must_use]
    pub fn pop_response(&self, ip: IpAddr) -> Option<Vec<u8>> {
        let record = self.lookup(ip)?;
        let mut queue = record.responses.lock();
        queue.pop_front()
    }

    /// Block until a response is queued for `ip` or `deadline` passes.
    ///
    /// The queue lock is released while waiting; the wake-up comes from
    /// the command listener's `append_response`. Returns `None` on timeout
    /// or when `ip` was never registered.
    #[must_use]
    pub fn wait_response(&self, ip: IpAddr, deadline: Instant) -> Option<Vec<u8>> {
        let record = self.lookup(ip)?;
        let mut queue = record.responses.lock();
        loop {
            if let Some(payload) = queue.pop_front() {
                return Some(payload);
            }
            if record.response_ready.wait_until(&mut queue, deadline).timed_out() {
                return queue.pop_front();
            }
        }
    }

    /// Discard every queued response for `ip`, returning how many.
    ///
    /// Called by the dispatcher immediately before each send: with one
    /// command in flight per device, anything still queued is a stray
    /// arrival from a command that already timed out.
    pub fn drain_responses(&self, ip: IpAddr) -> usize {
        let Some(record) = self.lookup(ip) else {
            return 0;
        };
        let mut queue = record.responses.lock();
        let stale = queue.len();
        queue.clear();
        stale
    }

    /// Replace the peer's telemetry snapshot wholesale.
    ///
    /// Never merged field-by-field: a snapshot is one decoded datagram.
    /// Returns `false` (and counts the drop) for unregistered sources.
    pub fn set_telemetry(&self, ip: IpAddr, snapshot: TelemetryMap) -> bool {
        let Some(record) = self.lookup(ip) else {
            self.unroutable.fetch_add(1, Ordering::Relaxed);
            return false;
        };
        self.routed.fetch_add(1, Ordering::Relaxed);
        *record.telemetry.lock() = snapshot;
        true
    }

    /// Clone the latest telemetry snapshot for `ip` (empty if unknown).
    #[must_use]
    pub fn telemetry(&self, ip: IpAddr) -> TelemetryMap {
        match self.lookup(ip) {
            Some(record) => record.telemetry.lock().clone(),
            None => TelemetryMap::new(),
        }
    }

    /// Datagrams routed to a registered peer since startup.
    #[must_use]
    pub fn routed(&self) -> u64 {
        self.routed.load(Ordering::Relaxed)
    }

    /// Datagrams discarded because their source IP was unknown.
    #[must_use]
    pub fn unroutable(&self) -> u64 {
        self.unroutable.load(Ordering::Relaxed)
    }

    fn lookup(&self, ip: IpAddr) -> Option<Arc<PeerRecord>> {
        self.peers.read().get(&ip).map(Arc::clone)
    }
}
