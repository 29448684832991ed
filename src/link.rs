// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Shared link: sockets, registry and listener lifecycle.
//!
//! Only one socket can own the local command port, so every session in the
//! process shares one [`Link`]: the command socket, the telemetry socket,
//! the [`PeerRegistry`] and the two listener threads. The registry is an
//! owned object injected into both listeners - never ambient global state.
//!
//! The default link is reference-counted and lazy: the first session
//! creates it, later sessions upgrade the stored `Weak`, and when the last
//! session drops its `Arc` the listeners shut down and the ports are
//! released. Test rigs bind their own links on ephemeral ports instead.

use crate::config::{COMMAND_PORT, TELEMETRY_PORT};
use crate::error::{Error, Result};
use crate::registry::PeerRegistry;
use crate::transport::bind_listener_socket;
use crate::transport::listener::SocketListener;
use parking_lot::Mutex;
use std::net::UdpSocket;
use std::sync::{Arc, OnceLock, Weak};

/// Local port assignment for one link.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// Local port for the command socket (0 = ephemeral).
    pub command_port: u16,
    /// Local port for the telemetry socket (0 = ephemeral).
    pub telemetry_port: u16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_port: COMMAND_PORT,
            telemetry_port: TELEMETRY_PORT,
        }
    }
}

/// Process-shared transport bundle.
///
/// Listener threads stop when the link is dropped; per-peer records in the
/// registry live as long as the link itself.
pub struct Link {
    command_socket: Arc<UdpSocket>,
    telemetry_socket: Arc<UdpSocket>,
    registry: Arc<PeerRegistry>,
    // Held for their Drop impls: signal + join the worker threads.
    _command_listener: SocketListener,
    _telemetry_listener: SocketListener,
}

static SHARED_LINK: OnceLock<Mutex<Weak<Link>>> = OnceLock::new();

impl Link {
    /// Bind both sockets and start both listeners.
    pub fn bind(config: LinkConfig) -> Result<Arc<Self>> {
        let command_socket =
            Arc::new(bind_listener_socket(config.command_port).map_err(Error::Bind)?);
        let telemetry_socket =
            Arc::new(bind_listener_socket(config.telemetry_port).map_err(Error::Bind)?);
        let registry = Arc::new(PeerRegistry::new());

        let command_listener =
            SocketListener::spawn_command(Arc::clone(&command_socket), Arc::clone(&registry))
                .map_err(Error::Bind)?;
        let telemetry_listener =
            SocketListener::spawn_telemetry(Arc::clone(&telemetry_socket), Arc::clone(&registry))
                .map_err(Error::Bind)?;

        log::info!(
            "[LINK] up command_port={} telemetry_port={}",
            command_socket.local_addr().map(|a| a.port()).unwrap_or(0),
            telemetry_socket.local_addr().map(|a| a.port()).unwrap_or(0),
        );

        Ok(Arc::new(Self {
            command_socket,
            telemetry_socket,
            registry,
            _command_listener: command_listener,
            _telemetry_listener: telemetry_listener,
        }))
    }

    /// Process-wide link on the standard ports, created on first use.
    ///
    /// Sessions share one instance; when the last holder drops it the
    /// listeners stop and the next call binds a fresh link.
    pub fn shared() -> Result<Arc<Self>> {
        let slot = SHARED_LINK.get_or_init(|| Mutex::new(Weak::new()));
        let mut guard = slot.lock();
        if let Some(link) = guard.upgrade() {
            return Ok(link);
        }
        let link = Self::bind(LinkConfig::default())?;
        *guard = Arc::downgrade(&link);
        Ok(link)
    }

    /// Registry shared by both listeners and all sessions on this link.
    #[must_use]
    pub fn registry(&self) -> &Arc<PeerRegistry> {
        &self.registry
    }

    /// Command socket handle for outbound sends.
    #[must_use]
    pub fn command_socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.command_socket)
    }

    /// Local port of the command socket (useful with ephemeral binds).
    #[must_use]
    pub fn local_command_port(&self) -> u16 {
        self.command_socket
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(0)
    }

    /// Local port of the telemetry socket (useful with ephemeral binds).
    #[must_use]
    pub fn local_telemetry_port(&self) -> u16 {
        self.telemetry_socket
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_link_binds_distinct_ports() {
        let link = Link::bind(LinkConfig {
            command_port: 0,
            telemetry_port: 0,
        })
        .expect("ephemeral link should bind");
        assert_ne!(link.local_command_port(), 0);
        assert_ne!(link.local_telemetry_port(), 0);
        assert_ne!(link.local_command_port(), link.local_telemetry_port());
    }

    #[test]
    #[ignore = "binds fixed ports 8889/8890, conflicts with parallel runs"]
    fn shared_link_is_process_wide() {
        let a = Link::shared().expect("shared link");
        let b = Link::shared().expect("shared link");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.local_command_port(), COMMAND_PORT);
        assert_eq!(a.local_telemetry_port(), TELEMETRY_PORT);
    }
}
