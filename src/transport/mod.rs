// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! UDP socket construction and the outbound transport seam.
//!
//! Two sockets exist per [`Link`](crate::Link): the command socket (send
//! commands, receive acknowledgements) and the telemetry socket (receive
//! only). Both are built through `socket2` so SO_REUSEADDR and the receive
//! timeout are applied before bind, then converted into plain
//! `std::net::UdpSocket` shared via `Arc`.
//!
//! [`CommandTransport`] is the seam between the dispatcher and the wire;
//! production code sends through the shared command socket, tests inject
//! scripted fakes.

pub mod listener;

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};

use crate::config::{COMMAND_PORT, LISTENER_READ_TIMEOUT};

/// Network identity of one controllable device.
///
/// The IP is the identity key for all per-device state; the command port
/// is fixed by the protocol but overridable for loopback test rigs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerAddress {
    /// Device IP address (registry key).
    pub ip: IpAddr,
    /// UDP port the device accepts commands on.
    pub command_port: u16,
}

impl PeerAddress {
    /// Peer at `ip` with the protocol's standard command port.
    #[must_use]
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            command_port: COMMAND_PORT,
        }
    }

    /// Destination for outgoing command datagrams.
    #[must_use]
    pub fn command_target(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.command_port)
    }
}

/// Outbound datagram seam used by the dispatcher.
///
/// Fire-and-forget by contract: correlation with the asynchronous reply
/// happens in the registry, never here.
pub trait CommandTransport: Send + Sync {
    /// Send one encoded command datagram to `dest`.
    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize>;
}

impl CommandTransport for UdpSocket {
    fn send_to(&self, payload: &[u8], dest: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, payload, dest)
    }
}

/// Bind a wildcard UDP socket for a listener worker.
///
/// SO_REUSEADDR tolerates fast restarts while a previous socket lingers in
/// TIME_WAIT-like states; the read timeout keeps the owning listener loop
/// responsive to its shutdown flag. Port 0 asks the OS for an ephemeral
/// port (test rigs).
pub fn bind_listener_socket(port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_read_timeout(Some(LISTENER_READ_TIMEOUT))?;

    let bind_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
    socket.bind(&bind_addr.into())?;

    let socket: UdpSocket = socket.into();
    log::debug!(
        "[UDP] bound listener socket local_addr={:?}",
        socket.local_addr()
    );
    Ok(socket)
}
