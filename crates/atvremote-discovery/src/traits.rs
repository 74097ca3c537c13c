//! Trait definitions for service discovery (enables mocking in tests).

use atvremote_core::{Result, Television};
use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;
use tokio_stream::Stream;

/// Event emitted during television browsing.
#[derive(Debug, Clone)]
pub enum BrowseEvent {
    /// New television discovered.
    Added(Television),
    /// Known television re-resolved (name or TXT data changed).
    Updated(Television),
    /// Television went offline.
    Removed(IpAddr),
}

impl BrowseEvent {
    /// Get the television from an Added or Updated event.
    pub fn television(&self) -> Option<&Television> {
        match self {
            BrowseEvent::Added(tv) | BrowseEvent::Updated(tv) => Some(tv),
            BrowseEvent::Removed(_) => None,
        }
    }

    /// Get the ip address from any event.
    pub fn ip(&self) -> IpAddr {
        match self {
            BrowseEvent::Added(tv) | BrowseEvent::Updated(tv) => tv.ip,
            BrowseEvent::Removed(ip) => *ip,
        }
    }
}

/// Trait for television discovery implementations.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait Discovery: Send + Sync {
    /// Start continuous browsing.
    ///
    /// Returns a stream of browse events that runs until [`Discovery::stop`].
    async fn browse(&self) -> Result<Box<dyn Stream<Item = BrowseEvent> + Send + Unpin>>;

    /// Browse for `timeout`, then return everything found.
    async fn scan(&self, timeout: Duration) -> Result<Vec<Television>>;

    /// Stop browsing.
    async fn stop(&self);

    /// Get a cached television by ip.
    async fn get(&self, ip: IpAddr) -> Option<Television>;

    /// Get all cached televisions.
    async fn list(&self) -> Vec<Television>;
}
