//! # atvremote-core
//!
//! Core types and error definitions shared across all Android TV remote
//! crates.
//!
//! This crate provides:
//! - Discovered-television representation
//! - Android `KeyEvent` code and press-direction types
//! - Protocol port constants
//! - Common error types

pub mod error;
pub mod keycode;
pub mod television;

pub use error::{
    DiscoveryError, Error, IdentityError, PairingError, Result, SessionError, WireError,
};
pub use keycode::{Direction, KeyCode};
pub use television::{Television, COMMAND_PORT, PAIRING_PORT};
