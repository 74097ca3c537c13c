//! Observable session state.
//!
//! The reader task publishes television state through these channels; the
//! UI subscribes with `watch` receivers. The IME counters sit in atomics
//! because the writer needs the reader's latest values to build text-input
//! messages.

use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::watch;

/// Connection lifecycle of the command channel.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(IpAddr),
    Error(String),
}

/// Volume as last broadcast by the television.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeState {
    pub max: u32,
    pub level: u32,
    pub muted: bool,
}

/// State shared between the command task and the reader task.
pub struct SessionState {
    pub connection: watch::Sender<ConnectionState>,
    pub volume: watch::Sender<Option<VolumeState>>,
    pub power: watch::Sender<Option<bool>>,
    pub current_app: watch::Sender<Option<String>>,
    ime_counter: AtomicU32,
    ime_field_counter: AtomicU32,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            connection: watch::channel(ConnectionState::Disconnected).0,
            volume: watch::channel(None).0,
            power: watch::channel(None).0,
            current_app: watch::channel(None).0,
            ime_counter: AtomicU32::new(0),
            ime_field_counter: AtomicU32::new(0),
        }
    }

    /// Record the counters from an inbound IME batch edit.
    pub fn store_ime_counters(&self, ime_counter: u32, field_counter: u32) {
        self.ime_counter.store(ime_counter, Ordering::SeqCst);
        self.ime_field_counter.store(field_counter, Ordering::SeqCst);
    }

    /// Counters to echo on outgoing text input.
    pub fn ime_counters(&self) -> (u32, u32) {
        (
            self.ime_counter.load(Ordering::SeqCst),
            self.ime_field_counter.load(Ordering::SeqCst),
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
