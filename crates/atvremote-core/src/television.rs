//! Discovered-television representation.

use std::net::{IpAddr, SocketAddr};

/// Port the pairing handshake runs on.
pub const PAIRING_PORT: u16 = 6467;

/// Port the persistent command channel runs on.
pub const COMMAND_PORT: u16 = 6466;

/// A television discovered on the local network.
///
/// Equality is by ip address only: the same device re-announcing with a
/// different instance name is still the same television.
#[derive(Debug, Clone)]
pub struct Television {
    /// mDNS instance name (without the service-type suffix).
    pub name: String,
    pub ip: IpAddr,
    pub pairing_port: u16,
    pub command_port: u16,
    /// Model name from the `mn` TXT record, if present.
    pub model_name: Option<String>,
    /// Manufacturer from the `md` TXT record, if present.
    pub manufacturer: Option<String>,
    /// Whether this television's ip is in the paired-device set.
    pub paired: bool,
}

impl Television {
    /// Create a television with the default protocol ports.
    pub fn new(name: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            ip,
            pairing_port: PAIRING_PORT,
            command_port: COMMAND_PORT,
            model_name: None,
            manufacturer: None,
            paired: false,
        }
    }

    /// Socket address of the pairing channel.
    pub fn pairing_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.pairing_port)
    }

    /// Socket address of the command channel.
    pub fn command_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.command_port)
    }

    /// Display label: model name when known, instance name otherwise.
    pub fn label(&self) -> &str {
        self.model_name.as_deref().unwrap_or(&self.name)
    }
}

impl PartialEq for Television {
    fn eq(&self, other: &Self) -> bool {
        self.ip == other.ip
    }
}

impl Eq for Television {}
