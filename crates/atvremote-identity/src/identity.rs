//! Long-lived client identity: RSA-2048 key pair plus a self-signed
//! X.509 certificate.
//!
//! The television pins this identity during pairing, so the same material
//! must be reused for every pairing and every command session. It is
//! generated lazily on first need and only regenerated if the store is
//! destroyed or unreadable.

use atvremote_core::error::{IdentityError, Result};
use rsa::pkcs8::EncodePrivateKey;
use rsa::RsaPrivateKey;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

/// Organization written into the certificate subject.
const APP_ID: &str = "atvremote";

/// Validity window of the self-signed certificate.
const VALIDITY_DAYS: i64 = 3650;

const CERT_FILE: &str = "cert.pem";
const KEY_FILE: &str = "key.pem";

/// RSA public-key parameters as big-endian byte strings.
///
/// These feed the pairing-secret hash, for both our certificate and the
/// television's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicParams {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

/// Extract RSA public-key parameters from a DER certificate.
pub fn rsa_params_from_cert(cert_der: &[u8]) -> Result<RsaPublicParams> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| IdentityError::CertParse(format!("{e:?}")))?;
    match cert
        .public_key()
        .parsed()
        .map_err(|e| IdentityError::CertParse(format!("{e:?}")))?
    {
        PublicKey::RSA(rsa) => Ok(RsaPublicParams {
            modulus: rsa.modulus.to_vec(),
            exponent: rsa.exponent.to_vec(),
        }),
        _ => Err(IdentityError::CertParse("certificate key is not RSA".to_string()).into()),
    }
}

/// The client's TLS identity (certificate + private key, DER encoded).
#[derive(Clone)]
pub struct ClientIdentity {
    cert_der: Vec<u8>,
    key_der: Vec<u8>,
}

impl ClientIdentity {
    /// Generate a fresh identity for this device.
    ///
    /// The certificate is self-signed RSA-2048/SHA-256 with a ten-year
    /// validity, serial = current epoch milliseconds, subject = issuer =
    /// `CN=AndroidTvRemote_<name>, O=atvremote, C=US`, KeyUsage
    /// {digitalSignature, keyEncipherment} critical and EKU {clientAuth}
    /// only. Adding serverAuth breaks command-channel acceptance on some
    /// televisions.
    pub fn generate(device_name: &str) -> Result<Self> {
        let mut rng = rand::rngs::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?;
        let key_der = private_key
            .to_pkcs8_der()
            .map_err(|e| IdentityError::KeyGeneration(e.to_string()))?
            .as_bytes()
            .to_vec();

        let key_pair = rcgen::KeyPair::from_pkcs8_der_and_sign_algo(
            &PrivatePkcs8KeyDer::from(key_der.as_slice()),
            &rcgen::PKCS_RSA_SHA256,
        )
        .map_err(|e| IdentityError::CertGeneration(e.to_string()))?;

        let mut params = rcgen::CertificateParams::default();
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(
            rcgen::DnType::CommonName,
            format!("AndroidTvRemote_{}", sanitize_name(device_name)),
        );
        dn.push(rcgen::DnType::OrganizationName, APP_ID);
        dn.push(rcgen::DnType::CountryName, "US");
        params.distinguished_name = dn;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        params.serial_number = Some(rcgen::SerialNumber::from(millis));

        params.not_before = ::time::OffsetDateTime::now_utc();
        params.not_after = params.not_before + ::time::Duration::days(VALIDITY_DAYS);

        params.key_usages = vec![
            rcgen::KeyUsagePurpose::DigitalSignature,
            rcgen::KeyUsagePurpose::KeyEncipherment,
        ];
        params.extended_key_usages = vec![rcgen::ExtendedKeyUsagePurpose::ClientAuth];

        let cert = params
            .self_signed(&key_pair)
            .map_err(|e| IdentityError::CertGeneration(e.to_string()))?;

        Ok(Self {
            cert_der: cert.der().to_vec(),
            key_der,
        })
    }

    /// Load the identity from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let cert_pem = std::fs::read_to_string(dir.join(CERT_FILE))
            .map_err(|e| IdentityError::Store(e.to_string()))?;
        let key_pem = std::fs::read_to_string(dir.join(KEY_FILE))
            .map_err(|e| IdentityError::Store(e.to_string()))?;

        let cert_der = ::pem::parse(&cert_pem)
            .map_err(|e| IdentityError::Store(format!("certificate: {e}")))?
            .contents()
            .to_vec();
        let key_der = ::pem::parse(&key_pem)
            .map_err(|e| IdentityError::Store(format!("key: {e}")))?
            .contents()
            .to_vec();

        // Reject stores whose certificate no longer parses.
        rsa_params_from_cert(&cert_der)?;

        Ok(Self { cert_der, key_der })
    }

    /// Persist the identity under `dir`, atomically per file.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).map_err(|e| IdentityError::Store(e.to_string()))?;

        let cert_pem = ::pem::encode(&::pem::Pem::new("CERTIFICATE", self.cert_der.clone()));
        let key_pem = ::pem::encode(&::pem::Pem::new("PRIVATE KEY", self.key_der.clone()));

        write_atomic(&dir.join(CERT_FILE), cert_pem.as_bytes())?;
        write_atomic(&dir.join(KEY_FILE), key_pem.as_bytes())?;
        Ok(())
    }

    /// Load the stored identity, or generate and persist a new one.
    ///
    /// An unreadable or corrupt store is unrecoverable: a fresh identity is
    /// generated (the user will have to re-pair) and a warning is emitted
    /// once.
    pub fn load_or_generate(dir: &Path, device_name: &str) -> Result<Self> {
        match Self::load(dir) {
            Ok(identity) => {
                debug!("Loaded client identity from {}", dir.display());
                Ok(identity)
            }
            Err(e) => {
                if dir.join(CERT_FILE).exists() {
                    warn!(
                        "Identity store at {} is unreadable ({e}); generating a new identity. \
                         Paired televisions will require re-pairing.",
                        dir.display()
                    );
                }
                let identity = Self::generate(device_name)?;
                identity.save(dir)?;
                debug!("Generated new client identity in {}", dir.display());
                Ok(identity)
            }
        }
    }

    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    pub fn key_der(&self) -> &[u8] {
        &self.key_der
    }

    /// RSA public-key parameters of this identity's certificate.
    pub fn public_params(&self) -> Result<RsaPublicParams> {
        rsa_params_from_cert(&self.cert_der)
    }

    /// Certificate serial number as big-endian bytes.
    pub fn serial_bytes(&self) -> Result<Vec<u8>> {
        let (_, cert) = X509Certificate::from_der(&self.cert_der)
            .map_err(|e| IdentityError::CertParse(format!("{e:?}")))?;
        Ok(cert.serial.to_bytes_be())
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

fn write_atomic(path: &PathBuf, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, contents).map_err(|e| IdentityError::Store(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| IdentityError::Store(e.to_string()))?;
    Ok(())
}
