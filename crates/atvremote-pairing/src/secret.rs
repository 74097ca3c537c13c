//! Pairing-secret derivation.
//!
//! The secret binds both certificates to the code on the television's
//! screen: SHA-256 over the client and server RSA public-key parameters
//! followed by the last two code bytes. The first code byte is a check
//! digit that must equal the first hash byte.
//!
//! The key parameters go through an uppercase-hex round trip (leading zero
//! nibbles dropped, odd-length hex left-padded) before hashing. That
//! convention comes from the reference client and is part of the protocol
//! contract; the consistency tests below are the ground truth for it.

use atvremote_core::error::{PairingError, Result};
use atvremote_identity::RsaPublicParams;
use sha2::{Digest, Sha256};

/// The three bytes of a six-hex-character pairing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairingCode {
    pub check: u8,
    pub tail: [u8; 2],
}

impl PairingCode {
    /// Parse the code the user typed. Whitespace is trimmed; case is
    /// insensitive.
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(PairingError::MalformedCode(code.to_string()).into());
        }
        let byte = |i: usize| u8::from_str_radix(&code[i..i + 2], 16).expect("checked hex");
        Ok(Self {
            check: byte(0),
            tail: [byte(2), byte(4)],
        })
    }
}

/// Derive the 32-byte pairing secret for `code`.
///
/// Fails with [`PairingError::BadCode`] when the hash's first byte does not
/// match the code's check digit: the user mistyped, or one of the
/// certificates is not the one the television sees.
pub fn pairing_secret(
    client: &RsaPublicParams,
    server: &RsaPublicParams,
    code: &str,
) -> Result<[u8; 32]> {
    let code = PairingCode::parse(code)?;
    let hash = secret_hash(client, server, code.tail);
    if hash[0] != code.check {
        return Err(PairingError::BadCode.into());
    }
    Ok(hash)
}

/// The raw hash, without the check-digit comparison.
pub fn secret_hash(client: &RsaPublicParams, server: &RsaPublicParams, tail: [u8; 2]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(hex_roundtrip(&client.modulus));
    hasher.update(hex_roundtrip(&client.exponent));
    hasher.update(hex_roundtrip(&server.modulus));
    hasher.update(hex_roundtrip(&server.exponent));
    hasher.update(tail);
    hasher.finalize().into()
}

/// Render a big-endian magnitude as uppercase hex the way the reference
/// client's big-integer formatting does (no leading zero nibbles, then
/// left-padded to an even length) and parse it back to bytes.
fn hex_roundtrip(raw: &[u8]) -> Vec<u8> {
    let mut hex = String::with_capacity(raw.len() * 2);
    for byte in raw {
        hex.push_str(&format!("{byte:02X}"));
    }
    let trimmed = hex.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };

    let padded = if trimmed.len() % 2 == 0 {
        trimmed.to_string()
    } else {
        format!("0{trimmed}")
    };

    (0..padded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&padded[i..i + 2], 16).expect("own hex output"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use atvremote_core::Error;

    fn client_params() -> RsaPublicParams {
        RsaPublicParams {
            modulus: vec![0x00, 0xc3, 0x52, 0x17, 0xa9, 0x4b, 0x01, 0xee],
            exponent: vec![0x01, 0x00, 0x01],
        }
    }

    fn server_params() -> RsaPublicParams {
        RsaPublicParams {
            modulus: vec![0x00, 0xde, 0xad, 0xbe, 0xef, 0x00, 0x33, 0x71],
            exponent: vec![0x01, 0x00, 0x01],
        }
    }

    /// A code the television would actually display for these parameters:
    /// check digit taken from the hash itself.
    fn displayed_code(tail: [u8; 2]) -> String {
        let hash = secret_hash(&client_params(), &server_params(), tail);
        format!("{:02X}{:02X}{:02X}", hash[0], tail[0], tail[1])
    }

    mod code_parsing {
        use super::*;

        #[test]
        fn parses_six_hex_chars() {
            let code = PairingCode::parse("6AE4D0").unwrap();
            assert_eq!(code.check, 0x6a);
            assert_eq!(code.tail, [0xe4, 0xd0]);
        }

        #[test]
        fn is_case_insensitive_and_trims() {
            let upper = PairingCode::parse("6AE4D0").unwrap();
            let lower = PairingCode::parse("  6ae4d0 ").unwrap();
            assert_eq!(upper, lower);
        }

        #[test]
        fn rejects_wrong_lengths_and_non_hex() {
            for bad in ["", "6AE4D", "6AE4D00", "6AE4G0", "paired"] {
                let err = PairingCode::parse(bad).unwrap_err();
                assert!(
                    matches!(err, Error::Pairing(PairingError::MalformedCode(_))),
                    "{bad:?} gave {err:?}"
                );
            }
        }
    }

    mod hash_law {
        use super::*;

        #[test]
        fn first_hash_byte_is_the_check_digit() {
            let tail = [0xe4, 0xd0];
            let code = displayed_code(tail);

            let secret =
                pairing_secret(&client_params(), &server_params(), &code).unwrap();
            assert_eq!(secret.len(), 32);
            assert_eq!(format!("{:02X}", secret[0]), code[..2]);
            assert_eq!(secret, secret_hash(&client_params(), &server_params(), tail));
        }

        #[test]
        fn wrong_check_digit_is_rejected_locally() {
            let tail = [0xe4, 0xd0];
            let good = displayed_code(tail);
            let flipped = format!(
                "{:02X}{}",
                u8::from_str_radix(&good[..2], 16).unwrap() ^ 0xff,
                &good[2..]
            );

            let err =
                pairing_secret(&client_params(), &server_params(), &flipped).unwrap_err();
            assert!(matches!(err, Error::Pairing(PairingError::BadCode)));
        }

        #[test]
        fn hash_is_deterministic() {
            let a = secret_hash(&client_params(), &server_params(), [0x12, 0x34]);
            let b = secret_hash(&client_params(), &server_params(), [0x12, 0x34]);
            assert_eq!(a, b);
        }

        #[test]
        fn hash_depends_on_every_input() {
            let base = secret_hash(&client_params(), &server_params(), [0x12, 0x34]);

            let other_tail = secret_hash(&client_params(), &server_params(), [0x12, 0x35]);
            assert_ne!(base, other_tail);

            let mut other_client = client_params();
            other_client.modulus[2] ^= 1;
            assert_ne!(
                base,
                secret_hash(&other_client, &server_params(), [0x12, 0x34])
            );

            // Swapping roles changes the concatenation order.
            assert_ne!(
                base,
                secret_hash(&server_params(), &client_params(), [0x12, 0x34])
            );
        }
    }

    mod hex_convention {
        use super::*;

        #[test]
        fn leading_zero_bytes_are_dropped() {
            assert_eq!(hex_roundtrip(&[0x00, 0x01, 0x02]), vec![0x01, 0x02]);
            assert_eq!(hex_roundtrip(&[0x00, 0x00, 0xff]), vec![0xff]);
        }

        #[test]
        fn leading_zero_nibble_survives_via_padding() {
            // 0x0A3F renders as "A3F", pads to "0A3F": same bytes back.
            assert_eq!(hex_roundtrip(&[0x0a, 0x3f]), vec![0x0a, 0x3f]);
        }

        #[test]
        fn common_exponent_is_stable() {
            assert_eq!(hex_roundtrip(&[0x01, 0x00, 0x01]), vec![0x01, 0x00, 0x01]);
        }

        #[test]
        fn zero_collapses_to_one_byte() {
            assert_eq!(hex_roundtrip(&[0x00, 0x00]), vec![0x00]);
        }

        #[test]
        fn stripped_and_unstripped_moduli_hash_identically() {
            let padded = RsaPublicParams {
                modulus: vec![0x00, 0x01],
                exponent: vec![0x01, 0x00, 0x01],
            };
            let stripped = RsaPublicParams {
                modulus: vec![0x01],
                exponent: vec![0x01, 0x00, 0x01],
            };
            assert_eq!(
                secret_hash(&padded, &server_params(), [0, 0]),
                secret_hash(&stripped, &server_params(), [0, 0])
            );
        }
    }
}
