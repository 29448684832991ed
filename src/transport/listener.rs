// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Background socket listener workers.
//!
//! Each [`Link`](crate::Link) runs exactly two of these, one per socket:
//!
//! ```text
//! command socket   recv_from -> registry.append_response(src_ip, bytes)
//! telemetry socket recv_from -> telemetry::decode -> registry.set_telemetry
//! ```
//!
//! The loops block in `recv_from` under the socket's read timeout so they
//! observe the shutdown flag within [`LISTENER_READ_TIMEOUT`]. A receive
//! error that is not a timeout terminates the worker: commands issued
//! afterwards surface as permanent timeouts (logged degraded mode rather
//! than a crash), and a dead telemetry worker never stops command traffic
//! or vice versa.

use crate::config::MAX_DATAGRAM_SIZE;
use crate::registry::PeerRegistry;
use crate::telemetry;
use std::io;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// What a listener does with each routed datagram.
#[derive(Debug, Clone, Copy)]
enum Route {
    /// Raw payload into the peer's response queue.
    Command,
    /// Decode as a telemetry line, replace the peer's snapshot.
    Telemetry,
}

impl Route {
    fn tag(self) -> &'static str {
        match self {
            Route::Command => "CMD-RX",
            Route::Telemetry => "STATE-RX",
        }
    }

    fn thread_name(self) -> &'static str {
        match self {
            Route::Command => "rotorlink-cmd-rx",
            Route::Telemetry => "rotorlink-state-rx",
        }
    }
}

/// Handle to one background listener thread.
///
/// Dropping the handle signals the running flag and joins the thread.
pub struct SocketListener {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl SocketListener {
    /// Spawn the command-response listener on `socket`.
    pub fn spawn_command(
        socket: Arc<UdpSocket>,
        registry: Arc<PeerRegistry>,
    ) -> io::Result<Self> {
        Self::spawn(Route::Command, socket, registry)
    }

    /// Spawn the telemetry listener on `socket`.
    pub fn spawn_telemetry(
        socket: Arc<UdpSocket>,
        registry: Arc<PeerRegistry>,
    ) -> io::Result<Self> {
        Self::spawn(Route::Telemetry, socket, registry)
    }

    fn spawn(
        route: Route,
        socket: Arc<UdpSocket>,
        registry: Arc<PeerRegistry>,
    ) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name(route.thread_name().to_string())
            .spawn(move || {
                Self::run_loop(route, &socket, &registry, &running_clone);
            })?;

        Ok(Self {
            handle: Some(handle),
            running,
        })
    }

    /// Receive loop (runs in the dedicated thread).
    fn run_loop(
        route: Route,
        socket: &UdpSocket,
        registry: &PeerRegistry,
        running: &AtomicBool,
    ) {
        let tag = route.tag();
        log::debug!(
            "[{}] listener started local_addr={:?} thread={:?}",
            tag,
            socket.local_addr(),
            std::thread::current().id()
        );

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        while running.load(Ordering::Relaxed) {
            let (len, src) = match socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    // Read timeout: loop around and re-check the flag.
                    continue;
                }
                Err(e) => {
                    // Fatal for this worker. Later commands on this link
                    // will only ever time out.
                    log::error!("[{}] receive failed, worker terminating: {}", tag, e);
                    break;
                }
            };

            crate::trace_datagram!("[{}] recv len={} src={}", tag, len, src);

            let src_ip = src.ip();
            match route {
                Route::Command => {
                    if !registry.append_response(src_ip, buf[..len].to_vec()) {
                        log::debug!("[{}] dropping datagram from unknown peer {}", tag, src_ip);
                    }
                }
                Route::Telemetry => {
                    let Ok(line) = std::str::from_utf8(&buf[..len]) else {
                        log::warn!("[{}] non-UTF-8 telemetry datagram from {}", tag, src_ip);
                        continue;
                    };
                    let snapshot = telemetry::decode(line);
                    if !registry.set_telemetry(src_ip, snapshot) {
                        log::debug!("[{}] dropping datagram from unknown peer {}", tag, src_ip);
                    }
                }
            }
        }

        log::debug!("[{}] listener stopped", tag);
    }

    /// Signal the worker to stop and wait for it to exit.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
