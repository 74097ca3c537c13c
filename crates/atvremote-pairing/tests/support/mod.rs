//! In-process mock television for pairing tests.

use atvremote_identity::{rsa_params_from_cert, ClientIdentity};
use atvremote_pairing::secret_hash;
use atvremote_wire::{read_frame, write_frame, MessageWriter, PairingMessage, PairingPayload};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::danger::{ClientCertVerified, ClientCertVerifier};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

/// Accepts any client certificate; the mock only needs to see it.
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

pub fn acceptor_for(identity: &ClientIdentity) -> TlsAcceptor {
    let certs = vec![CertificateDer::from(identity.cert_der().to_vec())];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(identity.key_der().to_vec()));
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_protocol_versions(&[&rustls::version::TLS12, &rustls::version::TLS13])
    .unwrap()
    .with_client_cert_verifier(Arc::new(AcceptAnyClient))
    .with_single_cert(certs, key)
    .unwrap();
    TlsAcceptor::from(Arc::new(config))
}

/// Code bytes the mock "displays"; the check digit is derived per session.
pub const CODE_TAIL: [u8; 2] = [0xe4, 0xd0];

fn status_ack(status: u32) -> Vec<u8> {
    let mut w = MessageWriter::new();
    w.varint(1, 2).varint(2, u64::from(status));
    w.into_bytes()
}

/// Mock pairing server: handles one attempt, sends the displayed code
/// through `code_tx` after step 3, verifies the secret at step 5.
///
/// `fail_at_step` replaces the acknowledgement of the given step (1-based)
/// with the given status.
/// RSA key generation dominates test time in debug builds; the mock
/// television shares one identity across tests.
fn server_identity() -> &'static ClientIdentity {
    use std::sync::OnceLock;
    static IDENTITY: OnceLock<ClientIdentity> = OnceLock::new();
    IDENTITY.get_or_init(|| ClientIdentity::generate("MockTv").unwrap())
}

pub fn spawn_pairing_tv(
    fail_at_step: Option<(u8, u32)>,
) -> (SocketAddr, oneshot::Receiver<String>, JoinHandle<()>) {
    let identity = server_identity();
    let acceptor = acceptor_for(identity);
    let server_params = identity.public_params().unwrap();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let (code_tx, code_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let listener = TcpListener::from_std(listener).unwrap();
        let (tcp, _) = listener.accept().await.unwrap();
        let mut stream = acceptor.accept(tcp).await.unwrap();

        let client_cert = stream
            .get_ref()
            .1
            .peer_certificates()
            .and_then(|c| c.first())
            .expect("client must present a certificate")
            .as_ref()
            .to_vec();
        let client_params = rsa_params_from_cert(&client_cert).unwrap();
        let expected = secret_hash(&client_params, &server_params, CODE_TAIL);

        let mut code_tx = Some(code_tx);
        for step in 1u8..=4 {
            let frame = match read_frame(&mut stream).await {
                Ok(frame) => frame,
                // Client bailed out (bad code precheck, cancel).
                Err(_) => return,
            };
            let msg = PairingMessage::decode(&frame).unwrap();

            if let Some((fail_step, status)) = fail_at_step {
                if fail_step == step {
                    write_frame(&mut stream, &status_ack(status)).await.unwrap();
                    return;
                }
            }

            let status = match (step, msg.payload) {
                (1, Some(PairingPayload::Request { .. }))
                | (2, Some(PairingPayload::EncodingOption)) => 200,
                (3, Some(PairingPayload::Configuration)) => {
                    let code =
                        format!("{:02X}{:02X}{:02X}", expected[0], CODE_TAIL[0], CODE_TAIL[1]);
                    let _ = code_tx.take().unwrap().send(code);
                    200
                }
                (4, Some(PairingPayload::Secret { secret })) => {
                    if secret == expected {
                        200
                    } else {
                        400
                    }
                }
                (step, payload) => panic!("unexpected step {step} payload {payload:?}"),
            };
            write_frame(&mut stream, &status_ack(status)).await.unwrap();
        }
    });

    (addr, code_rx, handle)
}
