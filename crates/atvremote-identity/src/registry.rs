//! Persistent set of paired television addresses.
//!
//! The set is the source of truth for whether the command channel will
//! accept this client: the pairing engine adds on success, explicit unpair
//! and certificate rejection remove.

use atvremote_core::error::{IdentityError, Result};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::debug;

const REGISTRY_FILE: &str = "paired.txt";

/// Persistent paired-device set with an observable change stream.
#[derive(Debug)]
pub struct PairedRegistry {
    path: PathBuf,
    inner: Mutex<BTreeSet<IpAddr>>,
    changes: watch::Sender<Vec<IpAddr>>,
}

impl PairedRegistry {
    /// Open (or create) the registry stored under `dir`.
    pub fn open(dir: &std::path::Path) -> Result<Self> {
        let path = dir.join(REGISTRY_FILE);
        let mut set = BTreeSet::new();
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                for line in contents.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match line.parse::<IpAddr>() {
                        Ok(ip) => {
                            set.insert(ip);
                        }
                        Err(_) => {
                            debug!("Skipping unparseable registry entry {line:?}");
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(IdentityError::Store(e.to_string()).into()),
        }

        let (changes, _) = watch::channel(set.iter().copied().collect());
        Ok(Self {
            path,
            inner: Mutex::new(set),
            changes,
        })
    }

    pub fn is_paired(&self, ip: IpAddr) -> bool {
        self.inner.lock().unwrap().contains(&ip)
    }

    /// Record a completed pairing. Returns false if already present.
    pub fn add(&self, ip: IpAddr) -> Result<bool> {
        let snapshot = {
            let mut set = self.inner.lock().unwrap();
            if !set.insert(ip) {
                return Ok(false);
            }
            set.iter().copied().collect::<Vec<_>>()
        };
        self.persist(&snapshot)?;
        self.changes.send_replace(snapshot);
        Ok(true)
    }

    /// Forget a pairing. Returns false if the ip was not present.
    pub fn remove(&self, ip: IpAddr) -> Result<bool> {
        let snapshot = {
            let mut set = self.inner.lock().unwrap();
            if !set.remove(&ip) {
                return Ok(false);
            }
            set.iter().copied().collect::<Vec<_>>()
        };
        self.persist(&snapshot)?;
        self.changes.send_replace(snapshot);
        Ok(true)
    }

    pub fn list(&self) -> Vec<IpAddr> {
        self.inner.lock().unwrap().iter().copied().collect()
    }

    /// Observe the paired set; the receiver always holds the current list.
    pub fn subscribe(&self) -> watch::Receiver<Vec<IpAddr>> {
        self.changes.subscribe()
    }

    fn persist(&self, ips: &[IpAddr]) -> Result<()> {
        let mut contents = String::new();
        for ip in ips {
            contents.push_str(&ip.to_string());
            contents.push('\n');
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents).map_err(|e| IdentityError::Store(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| IdentityError::Store(e.to_string()))?;
        Ok(())
    }
}
