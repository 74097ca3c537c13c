//! mDNS service browser for Android TV Remote v2 televisions.

use crate::traits::{BrowseEvent, Discovery};
use crate::REMOTE_SERVICE_TYPE;
use atvremote_core::error::DiscoveryError;
use atvremote_core::{Result, Television};
use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_stream::Stream;
use tracing::{debug, trace, warn};

/// Default browse window before auto-stop.
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(20);

/// mDNS browser emitting a deduplicated, live television list.
pub struct ServiceBrowser {
    televisions: Arc<RwLock<HashMap<IpAddr, Television>>>,
    daemon: ServiceDaemon,
    running: Arc<AtomicBool>,
}

impl ServiceBrowser {
    /// Create a new service browser.
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| DiscoveryError::Daemon(format!("Failed to create mDNS daemon: {e}")))?;

        Ok(Self {
            televisions: Arc::new(RwLock::new(HashMap::new())),
            daemon,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Parse a resolved mDNS service into a Television.
    fn parse_service_info(info: &mdns_sd::ServiceInfo) -> Option<Television> {
        let fullname = info.get_fullname();

        // Prefer an IPv4 address; televisions announce both families.
        let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
        let ip = addresses
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addresses.first())
            .copied();
        let Some(ip) = ip else {
            debug!("Service {fullname} has no addresses, skipping");
            return None;
        };

        let name = fullname.split('.').next().unwrap_or(fullname).to_string();

        let mut tv = Television::new(name, ip);
        tv.command_port = info.get_port();
        for prop in info.get_properties().iter() {
            match prop.key() {
                "mn" => tv.model_name = Some(prop.val_str().to_string()),
                "md" => tv.manufacturer = Some(prop.val_str().to_string()),
                _ => {}
            }
        }

        debug!("Resolved television {} at {}", tv.label(), tv.ip);
        Some(tv)
    }

    /// Handle a service event and optionally return a browse event.
    async fn handle_service_event(
        event: ServiceEvent,
        televisions: &Arc<RwLock<HashMap<IpAddr, Television>>>,
    ) -> Option<BrowseEvent> {
        match event {
            ServiceEvent::ServiceResolved(info) => {
                trace!("Service resolved: {}", info.get_fullname());
                let tv = Self::parse_service_info(&info)?;
                let mut guard = televisions.write().await;
                match guard.insert(tv.ip, tv.clone()) {
                    None => Some(BrowseEvent::Added(tv)),
                    Some(_) => Some(BrowseEvent::Updated(tv)),
                }
            }
            ServiceEvent::ServiceRemoved(_, fullname) => {
                trace!("Service removed: {fullname}");
                let name = fullname.split('.').next()?;
                let mut guard = televisions.write().await;
                let ip = guard
                    .iter()
                    .find(|(_, tv)| tv.name == name)
                    .map(|(ip, _)| *ip)?;
                guard.remove(&ip);
                Some(BrowseEvent::Removed(ip))
            }
            ServiceEvent::SearchStarted(_) => {
                trace!("Search started");
                None
            }
            ServiceEvent::SearchStopped(_) => {
                trace!("Search stopped");
                None
            }
            _ => None,
        }
    }

    /// Flip the `paired` flag on every cached television that appears in
    /// `paired_ips`.
    pub async fn mark_paired(&self, paired_ips: &[IpAddr]) {
        let mut guard = self.televisions.write().await;
        for (ip, tv) in guard.iter_mut() {
            tv.paired = paired_ips.contains(ip);
        }
    }

    /// Drop every cached television.
    pub async fn clear(&self) {
        self.televisions.write().await.clear();
    }
}

#[async_trait]
impl Discovery for ServiceBrowser {
    async fn browse(&self) -> Result<Box<dyn Stream<Item = BrowseEvent> + Send + Unpin>> {
        self.running.store(true, Ordering::SeqCst);

        let receiver = self
            .daemon
            .browse(REMOTE_SERVICE_TYPE)
            .map_err(|e| DiscoveryError::Daemon(format!("Failed to browse: {e}")))?;

        let televisions = Arc::clone(&self.televisions);
        let running = Arc::clone(&self.running);

        let stream = async_stream::stream! {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                if let Ok(event) = receiver.recv_timeout(Duration::from_millis(100)) {
                    if let Some(browse_event) =
                        Self::handle_service_event(event, &televisions).await
                    {
                        yield browse_event;
                    }
                }
            }
        };

        Ok(Box::new(Box::pin(stream)))
    }

    async fn scan(&self, timeout: Duration) -> Result<Vec<Television>> {
        self.running.store(true, Ordering::SeqCst);

        let receiver = self
            .daemon
            .browse(REMOTE_SERVICE_TYPE)
            .map_err(|e| DiscoveryError::Daemon(format!("Failed to browse: {e}")))?;

        let televisions = Arc::clone(&self.televisions);
        let start = std::time::Instant::now();

        while start.elapsed() < timeout && self.running.load(Ordering::SeqCst) {
            let remaining = timeout.saturating_sub(start.elapsed());
            let recv_timeout = remaining.min(Duration::from_millis(100));

            if let Ok(event) = receiver.recv_timeout(recv_timeout) {
                Self::handle_service_event(event, &televisions).await;
            }
        }

        if let Err(e) = self.daemon.stop_browse(REMOTE_SERVICE_TYPE) {
            warn!("Failed to stop mDNS browse: {e}");
        }
        self.running.store(false, Ordering::SeqCst);

        Ok(self.list().await)
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.daemon.stop_browse(REMOTE_SERVICE_TYPE);
    }

    async fn get(&self, ip: IpAddr) -> Option<Television> {
        self.televisions.read().await.get(&ip).cloned()
    }

    async fn list(&self) -> Vec<Television> {
        self.televisions.read().await.values().cloned().collect()
    }
}
