//! # atvremote-client
//!
//! High-level Android TV Remote v2 client.
//!
//! This crate provides:
//! - Simple API for discovering, pairing with, and controlling televisions
//! - The persistent command-channel session engine with observable state
//!
//! ## Example
//!
//! ```ignore
//! use atvremote_client::{ClientConfig, RemoteClient};
//! use atvremote_core::KeyCode;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RemoteClient::new(ClientConfig::new("~/.config/atvremote"))?;
//!
//!     let televisions = client.scan(Duration::from_secs(20)).await?;
//!     let tv = televisions.first().unwrap();
//!
//!     if !tv.paired {
//!         let mut attempt = client.begin_pairing(tv.clone()).await?;
//!         // ...show the code prompt, then:
//!         attempt.submit_code("6AE4D0").await?;
//!     }
//!
//!     client.session().connect(tv.ip).await?;
//!     client.session().send_key(tv.ip, KeyCode::DpadUp).await?;
//!     Ok(())
//! }
//! ```

mod client;
mod session;
mod state;

pub use client::{ClientConfig, RemoteClient};
pub use session::{RemoteSession, SessionConfig};
pub use state::{ConnectionState, SessionState, VolumeState};

// Re-export commonly used types.
pub use atvremote_core::{Direction, Error, KeyCode, Result, Television};
pub use atvremote_discovery::{BrowseEvent, Discovery};
pub use atvremote_pairing::{PairingAttempt, PairingState};
