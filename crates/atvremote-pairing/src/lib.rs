//! # atvremote-pairing
//!
//! The Android TV Remote v2 pairing handshake on tcp/6467.
//!
//! This crate provides:
//! - The five-step pairing engine with an observable state machine
//! - Pairing-secret derivation binding both certificates to the displayed
//!   code

mod engine;
mod secret;

pub use engine::{
    PairingAttempt, PairingState, CODE_WAIT_TIMEOUT, CONNECT_TIMEOUT, POST_PAIR_SETTLE,
};
pub use secret::{pairing_secret, secret_hash, PairingCode};
