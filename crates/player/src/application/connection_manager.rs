//! Push-channel lifecycle: when to connect, how frames become version
//! pushes, and when to reconnect.
//!
//! The manager is sans-IO. Every socket attempt gets its own generation; the
//! task driving that socket tags its events with it, so events from a socket
//! that was replaced or shut down are ignored.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

/// Connectivity as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    /// Not connected and not trying to be
    Disconnected,
    /// First attempt in progress
    Connecting,
    /// Socket open
    Connected,
    /// Connection lost, attempting to reconnect
    Reconnecting,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Reconnecting => 3,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Read-only view of the connection state, cheap to clone into a UI.
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SocketGeneration(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Idle,
    Opening,
    Open,
    WaitingToReconnect,
}

pub struct ConnectionManager {
    state: Arc<AtomicU8>,
    link: Link,
    active: bool,
    info_installed: bool,
    /// True once any socket opened during this activation.
    has_connected: bool,
    generation: u64,
    reconnect_delay: Duration,
}

impl ConnectionManager {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8())),
            link: Link::Idle,
            active: false,
            info_installed: false,
            has_connected: false,
            generation: 0,
            reconnect_delay,
        }
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver {
            state: Arc::clone(&self.state),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn set_info_installed(&mut self, installed: bool) {
        self.info_installed = installed;
    }

    /// Start a socket attempt if one is wanted and none is underway.
    pub fn poll_connect(&mut self) -> Option<SocketGeneration> {
        if !self.active || !self.info_installed || self.link != Link::Idle {
            return None;
        }
        self.generation += 1;
        self.link = Link::Opening;
        self.set_state(if self.has_connected {
            ConnectionState::Reconnecting
        } else {
            ConnectionState::Connecting
        });
        Some(SocketGeneration(self.generation))
    }

    /// Socket opened. Returns `Some(true)` for a reconnect, which calls for
    /// an info refresh to recover pushes missed while offline.
    pub fn on_open(&mut self, generation: SocketGeneration) -> Option<bool> {
        if !self.is_current(generation) || self.link != Link::Opening {
            return None;
        }
        self.link = Link::Open;
        self.set_state(ConnectionState::Connected);
        let reconnected = self.has_connected;
        self.has_connected = true;
        tracing::info!(reconnected, "Push channel connected");
        Some(reconnected)
    }

    /// Parse a text frame into an announced version.
    pub fn on_frame(&self, generation: SocketGeneration, text: &str) -> Option<i64> {
        if !self.is_current(generation) {
            return None;
        }
        match text.trim().parse::<i64>() {
            Ok(version) => Some(version),
            Err(_) => {
                tracing::debug!(frame = text, "Ignoring non-numeric push frame");
                None
            }
        }
    }

    /// Socket closed or failed to open. Returns the delay after which
    /// [`ConnectionManager::on_reconnect_due`] should be called.
    pub fn on_closed(&mut self, generation: SocketGeneration) -> Option<Duration> {
        if !self.is_current(generation) || !self.active {
            return None;
        }
        if !matches!(self.link, Link::Opening | Link::Open) {
            return None;
        }
        self.link = Link::WaitingToReconnect;
        // A failed first attempt still counts as lost connectivity.
        self.has_connected = true;
        self.set_state(ConnectionState::Reconnecting);
        tracing::warn!(
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "Push channel closed; reconnecting"
        );
        Some(self.reconnect_delay)
    }

    pub fn on_reconnect_due(&mut self, generation: SocketGeneration) -> Option<SocketGeneration> {
        if !self.is_current(generation) || self.link != Link::WaitingToReconnect {
            return None;
        }
        self.link = Link::Idle;
        self.poll_connect()
    }

    /// Forget every socket and stop connecting.
    pub fn shutdown(&mut self) {
        self.generation += 1;
        self.active = false;
        self.info_installed = false;
        self.has_connected = false;
        self.link = Link::Idle;
        self.set_state(ConnectionState::Disconnected);
    }

    fn is_current(&self, generation: SocketGeneration) -> bool {
        generation.0 == self.generation
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> ConnectionManager {
        let mut manager = ConnectionManager::new(Duration::from_millis(250));
        manager.set_active(true);
        manager.set_info_installed(true);
        manager
    }

    #[test]
    fn test_connection_state_roundtrip() {
        let states = [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
        ];

        for state in states {
            assert_eq!(ConnectionState::from_u8(state.to_u8()), state);
        }
    }

    #[test]
    fn connects_only_when_active_with_info() {
        let mut manager = ConnectionManager::new(Duration::from_millis(250));
        assert!(manager.poll_connect().is_none());

        manager.set_active(true);
        assert!(manager.poll_connect().is_none());

        manager.set_info_installed(true);
        assert!(manager.poll_connect().is_some());
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert!(manager.poll_connect().is_none(), "one attempt at a time");
    }

    #[test]
    fn numeric_frames_become_versions() {
        let mut manager = ready();
        let generation = manager.poll_connect().unwrap();
        assert_eq!(manager.on_open(generation), Some(false));

        assert_eq!(manager.on_frame(generation, "12"), Some(12));
        assert_eq!(manager.on_frame(generation, " 7\n"), Some(7));
        assert_eq!(manager.on_frame(generation, "hello"), None);
        assert_eq!(manager.on_frame(generation, ""), None);
    }

    #[test]
    fn close_schedules_a_fixed_delay_reconnect() {
        let mut manager = ready();
        let observer = manager.observer();
        let first = manager.poll_connect().unwrap();
        manager.on_open(first);
        assert!(observer.is_connected());

        assert_eq!(manager.on_closed(first), Some(Duration::from_millis(250)));
        assert_eq!(observer.state(), ConnectionState::Reconnecting);
        assert!(manager.poll_connect().is_none());

        let second = manager.on_reconnect_due(first).unwrap();
        assert_eq!(manager.on_open(second), Some(true));
        assert!(observer.is_connected());

        // Same delay every time: no backoff.
        assert_eq!(manager.on_closed(second), Some(Duration::from_millis(250)));
    }

    #[test]
    fn failed_first_attempt_retries() {
        let mut manager = ready();
        let first = manager.poll_connect().unwrap();

        assert!(manager.on_closed(first).is_some());
        let second = manager.on_reconnect_due(first).unwrap();
        assert_eq!(manager.state(), ConnectionState::Reconnecting);
        assert_eq!(manager.on_open(second), Some(true));
    }

    #[test]
    fn events_from_old_sockets_are_ignored() {
        let mut manager = ready();
        let first = manager.poll_connect().unwrap();
        manager.on_open(first);
        manager.on_closed(first);
        let second = manager.on_reconnect_due(first).unwrap();

        assert_eq!(manager.on_frame(first, "9"), None);
        assert!(manager.on_open(first).is_none());
        assert!(manager.on_closed(first).is_none());
        assert!(manager.on_reconnect_due(first).is_none());
        assert!(manager.on_open(second).is_some());
    }

    #[test]
    fn shutdown_cancels_pending_reconnect() {
        let mut manager = ready();
        let generation = manager.poll_connect().unwrap();
        manager.on_open(generation);
        manager.on_closed(generation);

        manager.shutdown();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.on_reconnect_due(generation).is_none());
        assert!(manager.poll_connect().is_none());
    }
}
