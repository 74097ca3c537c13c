//! # atvremote-wire
//!
//! Hand-rolled wire codec for the Android TV Remote v2 protocol.
//!
//! The protocol is protobuf-shaped but the message surface is small enough
//! that the exact field numbers are written out as code rather than hidden
//! behind a schema dependency; the numbers are part of the protocol
//! contract.
//!
//! This crate provides:
//! - Base-128 varints with a frame sanity bound
//! - `(field, wire-type)` tagged-field encode/decode with unknown-field
//!   skipping
//! - Async length-delimited framing over any byte stream
//! - `PairingMessage` (tcp/6467) and `RemoteMessage` (tcp/6466) shapes

pub mod frame;
pub mod pairing;
pub mod remote;
pub mod tag;
pub mod varint;

pub use frame::{read_frame, write_frame};
pub use pairing::{PairingMessage, PairingPayload, STATUS_BAD_SECRET, STATUS_OK};
pub use remote::{DeviceInfo, ImeEdit, RemoteMessage, TextFieldStatus, FEATURE_MASK};
pub use tag::{FieldReader, FieldValue, MessageWriter};
pub use varint::{put_varint, read_varint, MAX_FRAME_LEN};
