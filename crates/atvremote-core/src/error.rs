//! Error types for the Android TV remote client.

use thiserror::Error;

/// Primary error type for all remote-control operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Wire format error: {0}")]
    Wire(#[from] WireError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Pairing error: {0}")]
    Pairing(#[from] PairingError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Operation timed out")]
    Timeout,
}

/// Errors during mDNS service discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("mDNS daemon error: {0}")]
    Daemon(String),

    #[error("Service resolution failed for {service}: {reason}")]
    Resolution { service: String, reason: String },
}

/// Errors in the varint/tagged wire codec.
#[derive(Error, Debug)]
pub enum WireError {
    #[error("Varint exceeds 64 bits")]
    VarintOverflow,

    #[error("Truncated varint")]
    TruncatedVarint,

    #[error("Frame length {0} exceeds sanity bound")]
    FrameTooLarge(usize),

    #[error("Truncated field value (wanted {wanted} bytes, {remaining} left)")]
    TruncatedField { wanted: usize, remaining: usize },

    #[error("Unsupported wire type {0}")]
    UnsupportedWireType(u8),

    #[error("Missing required field {0}")]
    MissingField(u32),

    #[error("Invalid value in field {field}: {reason}")]
    InvalidField { field: u32, reason: String },
}

/// Errors around the client identity (key pair + certificate).
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Certificate generation failed: {0}")]
    CertGeneration(String),

    #[error("Identity store unreadable: {0}")]
    Store(String),

    #[error("Certificate parse error: {0}")]
    CertParse(String),

    #[error("TLS configuration rejected the identity: {0}")]
    TlsConfig(String),
}

/// Errors during the five-step pairing handshake.
#[derive(Error, Debug)]
pub enum PairingError {
    #[error("Could not connect to the television: {0}")]
    ConnectFailed(String),

    #[error("TLS handshake with the television failed: {0}")]
    HandshakeFailed(String),

    #[error("Television rejected pairing (status {0})")]
    Rejected(u32),

    #[error("Television rejected the code")]
    BadCode,

    #[error("Code must be 6 hexadecimal characters, got {0:?}")]
    MalformedCode(String),

    #[error("Pairing cancelled")]
    Cancelled,

    #[error("Pairing timed out")]
    Timeout,

    #[error("Pairing attempt is in state {0}, cannot continue")]
    InvalidState(&'static str),
}

/// Errors on the persistent command channel.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Television {0} is not paired")]
    NotPaired(String),

    #[error("Television {0} no longer trusts this identity; re-pair required")]
    CertificateRejected(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Not connected")]
    NotConnected,
}

/// Convenience Result type.
pub type Result<T> = std::result::Result<T, Error>;
