//! # atvremote-discovery
//!
//! mDNS discovery of televisions advertising the Android TV Remote v2
//! service.
//!
//! This crate provides:
//! - Async browsing with a live event stream
//! - Bounded scans (20-second default window)
//! - Deduplication by ip address
//! - TXT record extraction (`mn` model name, `md` manufacturer)
//!
//! ## Example
//!
//! ```ignore
//! use atvremote_discovery::{Discovery, ServiceBrowser, DEFAULT_SCAN_WINDOW};
//!
//! let browser = ServiceBrowser::new()?;
//! for tv in browser.scan(DEFAULT_SCAN_WINDOW).await? {
//!     println!("Found: {} ({})", tv.label(), tv.ip);
//! }
//! ```

mod browser;
mod traits;

pub use browser::{ServiceBrowser, DEFAULT_SCAN_WINDOW};
pub use traits::{BrowseEvent, Discovery};

/// Android TV Remote v2 service type for mDNS discovery.
pub const REMOTE_SERVICE_TYPE: &str = "_androidtvremote2._tcp.local.";
