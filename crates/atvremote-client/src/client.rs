//! High-level remote-control client.

use crate::session::{RemoteSession, SessionConfig};
use atvremote_core::{Result, Television};
use atvremote_discovery::{Discovery, ServiceBrowser};
use atvremote_identity::{ClientIdentity, PairedRegistry, TlsTransport};
use atvremote_pairing::PairingAttempt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Directory holding the identity keystore and the paired-device set.
    pub storage_dir: PathBuf,
    /// Local device model, shown on the television during pairing.
    pub device_name: String,
    /// Local vendor string for the configure reply.
    pub vendor: String,
}

impl ClientConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            device_name: "atvremote".to_string(),
            vendor: "atvremote".to_string(),
        }
    }

    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }
}

/// Process-wide remote-control client.
///
/// Owns the long-lived identity, the paired-device registry, discovery, and
/// the command-channel session engine. Create one at application start and
/// pass it by reference; the identity and the TLS configuration built from
/// it must be shared by every pairing and command connection.
pub struct RemoteClient {
    identity: ClientIdentity,
    transport: TlsTransport,
    registry: Arc<PairedRegistry>,
    browser: ServiceBrowser,
    session: RemoteSession,
    device_name: String,
}

impl RemoteClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let identity = ClientIdentity::load_or_generate(&config.storage_dir, &config.device_name)?;
        let transport = TlsTransport::new(&identity)?;
        let registry = Arc::new(PairedRegistry::open(&config.storage_dir)?);
        let browser = ServiceBrowser::new()?;
        let session = RemoteSession::new(
            transport.clone(),
            Arc::clone(&registry),
            SessionConfig {
                device_name: config.device_name.clone(),
                vendor: config.vendor.clone(),
                ..SessionConfig::default()
            },
        );

        Ok(Self {
            identity,
            transport,
            registry,
            browser,
            session,
            device_name: config.device_name,
        })
    }

    /// Scan for televisions, with `paired` flags reflecting the registry.
    pub async fn scan(&self, window: Duration) -> Result<Vec<Television>> {
        self.browser.scan(window).await?;
        self.browser.mark_paired(&self.registry.list()).await;
        Ok(self.browser.list().await)
    }

    /// Discovery surface for continuous browsing.
    pub fn discovery(&self) -> &ServiceBrowser {
        &self.browser
    }

    /// Begin pairing with a television. The returned attempt is waiting
    /// for the code once this resolves.
    pub async fn begin_pairing(&self, tv: Television) -> Result<PairingAttempt> {
        PairingAttempt::begin(
            tv,
            &self.transport,
            &self.identity,
            Arc::clone(&self.registry),
            &self.device_name,
        )
        .await
    }

    /// The command-channel session engine.
    pub fn session(&self) -> &RemoteSession {
        &self.session
    }

    pub fn is_paired(&self, ip: IpAddr) -> bool {
        self.registry.is_paired(ip)
    }

    /// Forget a pairing. The television keeps its side until re-paired.
    pub fn unpair(&self, ip: IpAddr) -> Result<bool> {
        self.registry.remove(ip)
    }

    pub fn registry(&self) -> &Arc<PairedRegistry> {
        &self.registry
    }
}
