//! # atvremote-identity
//!
//! Persistent client identity and transport security for the Android TV
//! remote protocol.
//!
//! This crate provides:
//! - Generation and reuse of the RSA-2048 key pair + self-signed X.509
//!   certificate that televisions pin during pairing
//! - The shared trust-any TLS transport used by both protocol channels
//! - The persistent paired-device registry

pub mod identity;
pub mod registry;
pub mod tls;

pub use identity::{rsa_params_from_cert, ClientIdentity, RsaPublicParams};
pub use registry::PairedRegistry;
pub use tls::{is_certificate_alert, peer_certificate, TlsTransport};
