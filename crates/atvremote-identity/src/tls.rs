//! TLS transport shared by the pairing and command channels.
//!
//! Televisions present self-signed certificates, so the server side of the
//! handshake is accepted unconditionally; authentication comes from the
//! mutual-auth binding established during pairing. The client certificate
//! is presented on every connection regardless of the server's
//! accepted-issuers list (televisions do not advertise any).

use crate::identity::ClientIdentity;
use atvremote_core::error::{IdentityError, Result};
use atvremote_core::Error;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Accepts any server certificate. Signature checks still run so the
/// handshake itself is well-formed.
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Cached TLS client configuration built from the client identity.
///
/// One instance serves both the pairing and command channels: some
/// televisions pin the precise TLS identity used during pairing and reject
/// a structurally identical but freshly built configuration.
#[derive(Clone)]
pub struct TlsTransport {
    connector: TlsConnector,
}

impl TlsTransport {
    pub fn new(identity: &ClientIdentity) -> Result<Self> {
        let certs = vec![CertificateDer::from(identity.cert_der().to_vec())];
        let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key_der().to_vec()));

        let config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
        .map_err(|e| IdentityError::TlsConfig(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
        .with_client_auth_cert(certs, key)
        .map_err(|e| IdentityError::TlsConfig(e.to_string()))?;

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    /// Open a TLS connection to `addr`, bounding the TCP connect by
    /// `connect_timeout`.
    pub async fn connect(
        &self,
        addr: SocketAddr,
        connect_timeout: Duration,
    ) -> Result<TlsStream<TcpStream>> {
        let tcp = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout)??;
        tcp.set_nodelay(true)?;

        let server_name = ServerName::from(addr.ip());
        let stream = self.connector.connect(server_name, tcp).await?;
        debug!("TLS established with {addr}");
        Ok(stream)
    }
}

/// DER of the server's leaf certificate, readable after the handshake.
pub fn peer_certificate(stream: &TlsStream<TcpStream>) -> Option<Vec<u8>> {
    stream
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|chain| chain.first())
        .map(|cert| cert.as_ref().to_vec())
}

/// Whether an I/O error is a TLS alert saying the peer rejected our
/// certificate (the television no longer trusts this identity).
pub fn is_certificate_alert(err: &std::io::Error) -> bool {
    let Some(inner) = err.get_ref() else {
        return false;
    };
    let Some(tls) = inner.downcast_ref::<rustls::Error>() else {
        return false;
    };
    matches!(
        tls,
        rustls::Error::AlertReceived(
            rustls::AlertDescription::CertificateUnknown
                | rustls::AlertDescription::BadCertificate
                | rustls::AlertDescription::UnknownCA
                | rustls::AlertDescription::AccessDenied
        )
    )
}
