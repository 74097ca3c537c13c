//! Pairing-channel messages (tcp/6467).
//!
//! Every message is a `PairingMessage` envelope carrying the protocol
//! version, a status, and at most one phase-selecting sub-message. The
//! field numbers are the protocol contract and are named here.

use crate::tag::{FieldReader, MessageWriter};
use atvremote_core::error::{Result, WireError};

/// The only protocol version this client speaks.
pub const PROTOCOL_VERSION: u32 = 2;

/// Server status meaning the step was accepted.
pub const STATUS_OK: u32 = 200;

/// Server status meaning the submitted secret did not match the code.
pub const STATUS_BAD_SECRET: u32 = 400;

/// Code-encoding selector: hexadecimal symbols.
pub const ENCODING_HEXADECIMAL: u32 = 3;

/// Number of symbols in the displayed code.
pub const CODE_SYMBOL_LENGTH: u32 = 6;

/// Role selector: this endpoint types the code in.
pub const ROLE_INPUT: u32 = 1;

// Envelope fields.
const F_PROTOCOL_VERSION: u32 = 1;
const F_STATUS: u32 = 2;
const F_PAIRING_REQUEST: u32 = 10;
const F_PAIRING_OPTION: u32 = 20;
const F_PAIRING_CONFIGURATION: u32 = 30;
const F_PAIRING_SECRET: u32 = 40;

// PairingRequest fields.
const F_SERVICE_NAME: u32 = 1;
const F_CLIENT_NAME: u32 = 2;

// PairingEncoding fields.
const F_ENCODING_TYPE: u32 = 1;
const F_SYMBOL_LENGTH: u32 = 2;

// PairingOption fields.
const F_INPUT_ENCODINGS: u32 = 1;
const F_PREFERRED_ROLE: u32 = 3;

// PairingConfiguration fields.
const F_CONF_ENCODING: u32 = 1;
const F_CLIENT_ROLE: u32 = 2;

// PairingSecret fields.
const F_SECRET: u32 = 1;

/// Phase-selecting payload of a pairing envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingPayload {
    Request {
        service_name: String,
        client_name: String,
    },
    /// Offer: one hexadecimal six-symbol encoding, client as input role.
    EncodingOption,
    /// Commitment to the offered encoding and role.
    Configuration,
    Secret {
        secret: Vec<u8>,
    },
}

/// One message on the pairing channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingMessage {
    pub protocol_version: u32,
    pub status: u32,
    /// Absent on server acknowledgements; the client only checks `status`.
    pub payload: Option<PairingPayload>,
}

impl PairingMessage {
    fn outgoing(payload: PairingPayload) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            status: STATUS_OK,
            payload: Some(payload),
        }
    }

    /// Step 1a: introduce the client.
    pub fn request(client_name: &str) -> Self {
        Self::outgoing(PairingPayload::Request {
            service_name: "androidtvremote".to_string(),
            client_name: client_name.to_string(),
        })
    }

    /// Step 2a: offer the hexadecimal encoding.
    pub fn encoding_option() -> Self {
        Self::outgoing(PairingPayload::EncodingOption)
    }

    /// Step 3a: commit to the encoding; the television shows the code next.
    pub fn configuration() -> Self {
        Self::outgoing(PairingPayload::Configuration)
    }

    /// Step 5a: submit the derived secret.
    pub fn secret(secret: impl Into<Vec<u8>>) -> Self {
        Self::outgoing(PairingPayload::Secret {
            secret: secret.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = MessageWriter::new();
        w.varint(F_PROTOCOL_VERSION, u64::from(self.protocol_version));
        w.varint(F_STATUS, u64::from(self.status));

        match &self.payload {
            Some(PairingPayload::Request {
                service_name,
                client_name,
            }) => {
                let mut request = MessageWriter::new();
                request
                    .string(F_SERVICE_NAME, service_name)
                    .string(F_CLIENT_NAME, client_name);
                w.message(F_PAIRING_REQUEST, request);
            }
            Some(PairingPayload::EncodingOption) => {
                let mut option = MessageWriter::new();
                option.message(F_INPUT_ENCODINGS, hex_encoding());
                option.varint(F_PREFERRED_ROLE, u64::from(ROLE_INPUT));
                w.message(F_PAIRING_OPTION, option);
            }
            Some(PairingPayload::Configuration) => {
                let mut conf = MessageWriter::new();
                conf.message(F_CONF_ENCODING, hex_encoding());
                conf.varint(F_CLIENT_ROLE, u64::from(ROLE_INPUT));
                w.message(F_PAIRING_CONFIGURATION, conf);
            }
            Some(PairingPayload::Secret { secret }) => {
                let mut inner = MessageWriter::new();
                inner.bytes(F_SECRET, secret);
                w.message(F_PAIRING_SECRET, inner);
            }
            None => {}
        }

        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut protocol_version = None;
        let mut status = None;
        let mut payload = None;

        for field in FieldReader::new(data) {
            let (number, value) = field?;
            match number {
                F_PROTOCOL_VERSION => protocol_version = Some(value.as_u32(number)?),
                F_STATUS => status = Some(value.as_u32(number)?),
                F_PAIRING_REQUEST => {
                    payload = Some(decode_request(value.as_bytes(number)?)?);
                }
                F_PAIRING_OPTION => payload = Some(PairingPayload::EncodingOption),
                F_PAIRING_CONFIGURATION => payload = Some(PairingPayload::Configuration),
                F_PAIRING_SECRET => {
                    payload = Some(decode_secret(value.as_bytes(number)?)?);
                }
                // Acknowledgement sub-messages and anything newer.
                _ => {}
            }
        }

        Ok(Self {
            protocol_version: protocol_version.ok_or(WireError::MissingField(F_PROTOCOL_VERSION))?,
            status: status.ok_or(WireError::MissingField(F_STATUS))?,
            payload,
        })
    }
}

fn hex_encoding() -> MessageWriter {
    let mut encoding = MessageWriter::new();
    encoding
        .varint(F_ENCODING_TYPE, u64::from(ENCODING_HEXADECIMAL))
        .varint(F_SYMBOL_LENGTH, u64::from(CODE_SYMBOL_LENGTH));
    encoding
}

fn decode_request(data: &[u8]) -> Result<PairingPayload> {
    let mut service_name = String::new();
    let mut client_name = String::new();
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        match number {
            F_SERVICE_NAME => service_name = value.as_string(number)?,
            F_CLIENT_NAME => client_name = value.as_string(number)?,
            _ => {}
        }
    }
    Ok(PairingPayload::Request {
        service_name,
        client_name,
    })
}

fn decode_secret(data: &[u8]) -> Result<PairingPayload> {
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        if number == F_SECRET {
            return Ok(PairingPayload::Secret {
                secret: value.as_bytes(number)?.to_vec(),
            });
        }
    }
    Ok(PairingPayload::Secret { secret: Vec::new() })
}
