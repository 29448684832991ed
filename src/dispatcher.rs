// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 rotorlink project

//! Per-device command dispatcher: pacing, correlation wait, retry.
//!
//! One dispatcher exists per session and serializes that device's command
//! traffic:
//!
//! ```text
//! caller -> pace() -> drain stale -> send_to -> wait_response(deadline)
//!                                                    ^
//!                                    command listener appends + notifies
//! ```
//!
//! The protocol carries no correlation id, so request/response matching
//! rests on one command being in flight per device at a time. Two
//! consequences, both deliberate:
//!
//! - Callers must not issue concurrent commands to the same device from
//!   multiple threads; the dispatcher adds no cross-thread exclusion.
//! - A response that arrives after its command already timed out cannot be
//!   told apart from the next command's response. The dispatcher therefore
//!   drains the queue immediately before each send and discards the strays
//!   (perfect correlation across a timeout is unavailable without
//!   device-side support).

use crate::config::{COMMAND_SPACING, RETRY_COUNT};
use crate::error::{Error, Result};
use crate::registry::PeerRegistry;
use crate::transport::{CommandTransport, PeerAddress};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-device command facade.
pub struct Dispatcher {
    peer: PeerAddress,
    transport: Arc<dyn CommandTransport>,
    registry: Arc<PeerRegistry>,
    /// Instant of the last dispatched datagram (pacing state).
    last_dispatch: Mutex<Option<Instant>>,
    retry_count: u32,
}

impl Dispatcher {
    /// Build a dispatcher for `peer`, registering it with the registry.
    pub fn new(
        peer: PeerAddress,
        transport: Arc<dyn CommandTransport>,
        registry: Arc<PeerRegistry>,
    ) -> Self {
        registry.get_or_create(peer.ip);
        Self {
            peer,
            transport,
            registry,
            last_dispatch: Mutex::new(None),
            retry_count: RETRY_COUNT,
        }
    }

    /// Override the acknowledged-command retry budget.
    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count.max(1);
        self
    }

    /// Peer this dispatcher talks to.
    #[must_use]
    pub fn peer(&self) -> PeerAddress {
        self.peer
    }

    /// Configured retry budget for acknowledged commands.
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Send one command and block for its response.
    ///
    /// Enforces inter-command spacing before the send, then waits until a
    /// response is queued or `deadline = send instant + timeout` passes.
    ///
    /// # Errors
    /// - [`Error::CommandTimeout`] when no response arrived in time (a
    ///   different shape from a negative acknowledgement, which comes back
    ///   as `Ok("error ...")`).
    /// - [`Error::ResponseDecode`] when the response bytes are not UTF-8.
    /// - [`Error::Send`] when the datagram could not be written.
    pub fn send_and_await(&self, command: &str, timeout: Duration) -> Result<String> {
        self.pace(command);

        let stale = self.registry.drain_responses(self.peer.ip);
        if stale > 0 {
            log::debug!(
                "[DISPATCH] discarded {} stale response(s) for {} before '{}'",
                stale,
                self.peer.ip,
                command
            );
        }

        log::debug!("[DISPATCH] send '{}' -> {}", command, self.peer.command_target());
        self.transport
            .send_to(command.as_bytes(), self.peer.command_target())
            .map_err(Error::Send)?;
        let sent_at = Instant::now();
        *self.last_dispatch.lock() = Some(sent_at);

        match self.registry.wait_response(self.peer.ip, sent_at + timeout) {
            Some(raw) => {
                let text = String::from_utf8(raw).map_err(|_| {
                    log::warn!("[DISPATCH] non-UTF-8 response to '{}'", command);
                    Error::ResponseDecode {
                        command: command.to_string(),
                    }
                })?;
                let response = text.trim_end_matches(['\r', '\n']).to_string();
                log::debug!("[DISPATCH] response to '{}': '{}'", command, response);
                Ok(response)
            }
            None => {
                log::warn!(
                    "[DISPATCH] aborting '{}': no response after {:?}",
                    command,
                    timeout
                );
                Err(Error::CommandTimeout {
                    command: command.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Send an acknowledged command, retrying up to the configured budget.
    ///
    /// Succeeds as soon as any attempt's response case-insensitively
    /// contains `ok`. Every retry is a full pacing+send+wait cycle.
    pub fn send_command(&self, command: &str, timeout: Duration) -> bool {
        for attempt in 1..=self.retry_count {
            match self.send_and_await(command, timeout) {
                Ok(response) if response.to_ascii_lowercase().contains("ok") => {
                    return true;
                }
                Ok(response) => {
                    log::debug!(
                        "[DISPATCH] attempt {}/{} for '{}' rejected: '{}'",
                        attempt,
                        self.retry_count,
                        command,
                        response
                    );
                }
                Err(e) => {
                    log::debug!(
                        "[DISPATCH] attempt {}/{} for '{}' failed: {}",
                        attempt,
                        self.retry_count,
                        command,
                        e
                    );
                }
            }
        }
        log::error!(
            "[DISPATCH] command '{}' failed after {} attempts",
            command,
            self.retry_count
        );
        false
    }

    /// Fire-and-forget send for commands the firmware never acknowledges
    /// (`rc` joystick control, `reboot`). Bypasses the response wait and
    /// the retry loop; still paced so a burst cannot starve the firmware.
    pub fn send_unacknowledged(&self, command: &str) -> Result<()> {
        self.pace(command);
        log::debug!(
            "[DISPATCH] send unacknowledged '{}' -> {}",
            command,
            self.peer.command_target()
        );
        self.transport
            .send_to(command.as_bytes(), self.peer.command_target())
            .map_err(Error::Send)?;
        *self.last_dispatch.lock() = Some(Instant::now());
        Ok(())
    }

    /// Block for the remainder of the inter-command spacing window.
    fn pace(&self, command: &str) {
        let elapsed = self.last_dispatch.lock().map(|t| t.elapsed());
        if let Some(elapsed) = elapsed {
            if elapsed < COMMAND_SPACING {
                let remaining = COMMAND_SPACING - elapsed;
                log::debug!(
                    "[DISPATCH] pacing {:?} before '{}'",
                    remaining,
                    command
                );
                std::thread::sleep(remaining);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    const PEER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 168, 10, 1));

    /// Fake wire: records send instants and enqueues a scripted reply into
    /// the registry from a configured attempt onwards.
    struct ScriptedTransport {
        registry: Arc<PeerRegistry>,
        sends: Mutex<Vec<Instant>>,
        reply_from_attempt: usize,
        reply: Vec<u8>,
    }

    impl ScriptedTransport {
        fn new(registry: Arc<PeerRegistry>, reply_from_attempt: usize, reply: &[u8]) -> Self {
            Self {
                registry,
                sends: Mutex::new(Vec::new()),
                reply_from_attempt,
                reply: reply.to_vec(),
            }
        }

        fn send_count(&self) -> usize {
            self.sends.lock().len()
        }

        fn send_instants(&self) -> Vec<Instant> {
            self.sends.lock().clone()
        }
    }

    impl CommandTransport for ScriptedTransport {
        fn send_to(&self, payload: &[u8], _dest: SocketAddr) -> io::Result<usize> {
            let mut sends = self.sends.lock();
            sends.push(Instant::now());
            if sends.len() >= self.reply_from_attempt {
                self.registry.append_response(PEER_IP, self.reply.clone());
            }
            Ok(payload.len())
        }
    }

    fn dispatcher_with(
        reply_from_attempt: usize,
        reply: &[u8],
    ) -> (Dispatcher, Arc<ScriptedTransport>) {
        let registry = Arc::new(PeerRegistry::new());
        let transport = Arc::new(ScriptedTransport::new(
            Arc::clone(&registry),
            reply_from_attempt,
            reply,
        ));
        let dispatcher = Dispatcher::new(
            PeerAddress::new(PEER_IP),
            Arc::clone(&transport) as Arc<dyn CommandTransport>,
            registry,
        );
        (dispatcher, transport)
    }

    #[test]
    fn response_round_trip_strips_crlf() {
        let (dispatcher, _) = dispatcher_with(1, b"ok\r\n");
        let response = dispatcher
            .send_and_await("command", Duration::from_secs(1))
            .expect("should receive scripted reply");
        assert_eq!(response, "ok");
    }

    #[test]
    fn new_registers_the_peer_it_reports() {
        let (dispatcher, transport) = dispatcher_with(1, b"ok");
        assert_eq!(dispatcher.peer(), PeerAddress::new(PEER_IP));
        assert!(transport.registry.contains(PEER_IP));
    }

    #[test]
    fn back_to_back_sends_respect_spacing() {
        let (dispatcher, transport) = dispatcher_with(1, b"ok");
        dispatcher
            .send_and_await("takeoff", Duration::from_secs(1))
            .expect("first command");
        dispatcher
            .send_and_await("land", Duration::from_secs(1))
            .expect("second command");

        let instants = transport.send_instants();
        assert_eq!(instants.len(), 2);
        assert!(
            instants[1] - instants[0] >= COMMAND_SPACING,
            "sends were {:?} apart",
            instants[1] - instants[0]
        );
    }

    #[test]
    fn retry_succeeds_on_third_attempt_with_exactly_three_sends() {
        let (dispatcher, transport) = dispatcher_with(3, b"ok");
        assert!(dispatcher.send_command("takeoff", Duration::from_millis(50)));
        assert_eq!(transport.send_count(), 3);
    }

    #[test]
    fn retry_exhaustion_returns_false() {
        let (dispatcher, transport) = dispatcher_with(usize::MAX, b"ok");
        assert!(!dispatcher.send_command("takeoff", Duration::from_millis(20)));
        assert_eq!(transport.send_count(), RETRY_COUNT as usize);
    }

    #[test]
    fn timeout_is_distinguishable_from_negative_ack() {
        let (dispatcher, _) = dispatcher_with(usize::MAX, b"ok");
        let err = dispatcher
            .send_and_await("takeoff", Duration::from_millis(20))
            .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));

        // A negative acknowledgement is a successful receive.
        let (dispatcher, _) = dispatcher_with(1, b"error Motor stop");
        let response = dispatcher
            .send_and_await("takeoff", Duration::from_secs(1))
            .expect("negative ack still decodes");
        assert_eq!(response, "error Motor stop");
    }

    #[test]
    fn invalid_utf8_response_is_decode_error() {
        let (dispatcher, _) = dispatcher_with(1, &[0xff, 0xfe, 0xfd]);
        let err = dispatcher
            .send_and_await("sn?", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::ResponseDecode { .. }));
    }

    #[test]
    fn stale_response_is_drained_before_next_send() {
        let (dispatcher, transport) = dispatcher_with(1, b"ok");
        // Simulate a late arrival from a command that already timed out.
        transport
            .registry
            .append_response(PEER_IP, b"late stray".to_vec());

        let response = dispatcher
            .send_and_await("battery?", Duration::from_secs(1))
            .expect("fresh response expected");
        assert_eq!(response, "ok", "stray must not be misattributed");
    }

    #[test]
    fn unacknowledged_send_does_not_wait() {
        let (dispatcher, transport) = dispatcher_with(usize::MAX, b"");
        let started = Instant::now();
        dispatcher
            .send_unacknowledged("rc 0 0 0 0")
            .expect("direct send");
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(transport.send_count(), 1);
    }
}
