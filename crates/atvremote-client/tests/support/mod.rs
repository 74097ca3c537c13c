//! In-process mock television for command-channel tests.

use atvremote_identity::ClientIdentity;
use atvremote_wire::{read_frame, write_frame, RemoteMessage};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

/// Server-side actions a test can script.
pub enum Inject {
    /// Write one message to the client.
    Msg(RemoteMessage),
    /// Write one raw frame payload (for malformed-input tests).
    Raw(Vec<u8>),
    /// Close the current connection; the server goes back to accepting.
    Drop,
}

pub struct MockTv {
    pub addr: SocketAddr,
    /// Every well-formed message the client sent, in arrival order.
    pub received: mpsc::UnboundedReceiver<RemoteMessage>,
    pub inject: mpsc::UnboundedSender<Inject>,
    /// Number of TCP connections accepted.
    pub accepted: Arc<AtomicUsize>,
}

#[derive(Debug)]
struct AcceptAnyClient;

impl ClientCertVerifier for AcceptAnyClient {
    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Ok(ClientCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
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
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
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

/// Rejects every client certificate, which the television does once it no
/// longer trusts an identity.
#[derive(Debug)]
struct RejectEveryClient;

impl ClientCertVerifier for RejectEveryClient {
    fn root_hint_subjects(&self) -> &[rustls::DistinguishedName] {
        &[]
    }

    fn verify_client_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<ClientCertVerified, rustls::Error> {
        Err(rustls::Error::InvalidCertificate(
            rustls::CertificateError::UnknownIssuer,
        ))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
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
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
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

/// RSA key generation dominates test time in debug builds; the mock
/// television shares one identity across tests.
fn server_identity() -> &'static ClientIdentity {
    use std::sync::OnceLock;
    static IDENTITY: OnceLock<ClientIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| ClientIdentity::generate("MockTv").unwrap())
}

fn server_config(reject_clients: bool) -> Arc<rustls::ServerConfig> {
    let identity = server_identity();
    let certs = vec![CertificateDer::from(identity.cert_der().to_vec())];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key_der().to_vec()));

    // TLS 1.2 only when rejecting: the client-certificate verdict is then
    // part of the handshake, so the client's connect observes the alert
    // deterministically. Real televisions speak TLS 1.2 here anyway.
    let versions: &[&'static rustls::SupportedProtocolVersion] = if reject_clients {
        &[&rustls::version::TLS12]
    } else {
        &[&rustls::version::TLS12, &rustls::version::TLS13]
    };

    let builder = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(versions)
    .unwrap();

    let config = if reject_clients {
        builder
            .with_client_cert_verifier(Arc::new(RejectEveryClient))
            .with_single_cert(certs, key)
    } else {
        builder
            .with_client_cert_verifier(Arc::new(AcceptAnyClient))
            .with_single_cert(certs, key)
    };
    Arc::new(config.unwrap())
}

/// Spawn a mock television command server on an ephemeral port.
///
/// The server accepts connections sequentially for the lifetime of the
/// test, so a client reconnect lands back on the same mock.
pub fn spawn_command_tv(reject_clients: bool) -> MockTv {
    let acceptor = TlsAcceptor::from(server_config(reject_clients));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    let (received_tx, received) = mpsc::unbounded_channel();
    let (inject_tx, mut inject_rx) = mpsc::unbounded_channel::<Inject>();
    let accepted = Arc::new(AtomicUsize::new(0));
    let accepted_clone = Arc::clone(&accepted);

    tokio::spawn(async move {
        let listener = TcpListener::from_std(listener).unwrap();
        loop {
            let Ok((tcp, _)) = listener.accept().await else {
                return;
            };
            accepted_clone.fetch_add(1, std::sync::atomic::Ordering::SeqCst);

            let stream = match acceptor.accept(tcp).await {
                Ok(stream) => stream,
                // Rejected handshake; wait for the next connection.
                Err(_) => continue,
            };
            let (mut reader, mut writer) = tokio::io::split(stream);

            let received_tx = received_tx.clone();
            let mut reader_task = tokio::spawn(async move {
                while let Ok(frame) = read_frame(&mut reader).await {
                    if let Ok(msg) = RemoteMessage::decode(&frame) {
                        let _ = received_tx.send(msg);
                    }
                }
            });

            loop {
                tokio::select! {
                    // Client closed the connection; accept the next one.
                    _ = &mut reader_task => break,
                    cmd = inject_rx.recv() => match cmd {
                        Some(Inject::Msg(msg)) => {
                            if write_frame(&mut writer, &msg.encode()).await.is_err() {
                                break;
                            }
                        }
                        Some(Inject::Raw(payload)) => {
                            if write_frame(&mut writer, &payload).await.is_err() {
                                break;
                            }
                        }
                        Some(Inject::Drop) | None => break,
                    },
                }
            }

            reader_task.abort();
            let _ = writer.shutdown().await;
        }
    });

    MockTv {
        addr,
        received,
        inject: inject_tx,
        accepted,
    }
}
