//! Command-channel messages (tcp/6466).
//!
//! A `RemoteMessage` envelope carries exactly one sub-message; the outer
//! field number selects the variant. Inbound messages the client does not
//! model decode to [`RemoteMessage::Unknown`] so the reader can ignore them
//! without aborting the stream.

use crate::tag::{FieldReader, FieldValue, MessageWriter};
use atvremote_core::error::{Result, WireError};

/// Feature bitmask sent in `RemoteConfigure` and `RemoteSetActive`,
/// covering KEY + APP_LINK + IME. Preserved verbatim from the protocol;
/// its bit-level meaning is not fully documented.
pub const FEATURE_MASK: u32 = 622;

// Envelope fields.
const F_CONFIGURE: u32 = 1;
const F_SET_ACTIVE: u32 = 2;
const F_PING_REQUEST: u32 = 8;
const F_PING_RESPONSE: u32 = 9;
const F_KEY_INJECT: u32 = 10;
const F_IME_KEY_INJECT: u32 = 20;
const F_IME_BATCH_EDIT: u32 = 21;
const F_START: u32 = 40;
const F_SET_VOLUME_LEVEL: u32 = 50;

// RemoteConfigure fields.
const F_CODE1: u32 = 1;
const F_DEVICE_INFO: u32 = 2;

// RemoteDeviceInfo fields.
const F_MODEL: u32 = 1;
const F_VENDOR: u32 = 2;
const F_UNKNOWN1: u32 = 3;
const F_UNKNOWN2: u32 = 4;
const F_PACKAGE_NAME: u32 = 5;
const F_APP_VERSION: u32 = 6;

// RemoteSetActive fields.
const F_ACTIVE: u32 = 1;

// Ping fields.
const F_VAL1: u32 = 1;

// RemoteKeyInject fields.
const F_KEY_CODE: u32 = 1;
const F_DIRECTION: u32 = 2;

// RemoteImeKeyInject: foreground application package.
const F_APP_PACKAGE: u32 = 12;

// RemoteImeBatchEdit fields.
const F_IME_COUNTER: u32 = 1;
const F_FIELD_COUNTER: u32 = 2;
const F_EDIT_INFO: u32 = 3;

// EditInfo fields.
const F_INSERT: u32 = 1;
const F_TEXT_FIELD_STATUS: u32 = 2;

// TextFieldStatus fields.
const F_TFS_START: u32 = 1;
const F_TFS_END: u32 = 2;
const F_TFS_VALUE: u32 = 3;

// RemoteStart fields.
const F_STARTED: u32 = 1;

// RemoteSetVolumeLevel fields.
const F_VOLUME_MAX: u32 = 6;
const F_VOLUME_LEVEL: u32 = 7;
const F_VOLUME_MUTED: u32 = 8;

/// Client device description inside the configure reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: String,
    pub vendor: String,
    pub unknown1: u32,
    pub unknown2: String,
    pub package_name: String,
    pub app_version: String,
}

impl DeviceInfo {
    /// Device info with the literal fields televisions expect.
    pub fn new(model: impl Into<String>, vendor: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            vendor: vendor.into(),
            unknown1: 1,
            unknown2: "1".to_string(),
            package_name: "atvremote".to_string(),
            app_version: "1.0.0".to_string(),
        }
    }
}

/// Cursor state of the focused text field on the television.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFieldStatus {
    pub start: u32,
    pub end: u32,
    pub value: String,
}

/// One edit inside an IME batch edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImeEdit {
    pub insert: u32,
    pub status: TextFieldStatus,
}

/// One message on the command channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteMessage {
    Configure {
        code1: u32,
        device_info: DeviceInfo,
    },
    SetActive {
        active: u32,
    },
    PingRequest {
        val1: u32,
    },
    PingResponse {
        val1: u32,
    },
    KeyInject {
        key_code: u32,
        direction: u32,
    },
    /// Television-side key event; carries the foreground application.
    ImeKeyInject {
        app_package: String,
    },
    ImeBatchEdit {
        ime_counter: u32,
        field_counter: u32,
        edits: Vec<ImeEdit>,
    },
    Start {
        started: bool,
    },
    SetVolumeLevel {
        max: u32,
        level: u32,
        muted: bool,
    },
    /// Envelope field this client does not model; ignored by the reader.
    Unknown {
        field: u32,
    },
}

impl RemoteMessage {
    /// Configure reply announcing this client's capabilities.
    pub fn configure(device_info: DeviceInfo) -> Self {
        RemoteMessage::Configure {
            code1: FEATURE_MASK,
            device_info,
        }
    }

    /// Reply to the television's set-active.
    pub fn set_active() -> Self {
        RemoteMessage::SetActive {
            active: FEATURE_MASK,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = MessageWriter::new();
        match self {
            RemoteMessage::Configure { code1, device_info } => {
                let mut info = MessageWriter::new();
                info.string(F_MODEL, &device_info.model)
                    .string(F_VENDOR, &device_info.vendor)
                    .varint(F_UNKNOWN1, u64::from(device_info.unknown1))
                    .string(F_UNKNOWN2, &device_info.unknown2)
                    .string(F_PACKAGE_NAME, &device_info.package_name)
                    .string(F_APP_VERSION, &device_info.app_version);
                let mut configure = MessageWriter::new();
                configure.varint(F_CODE1, u64::from(*code1));
                configure.message(F_DEVICE_INFO, info);
                w.message(F_CONFIGURE, configure);
            }
            RemoteMessage::SetActive { active } => {
                let mut inner = MessageWriter::new();
                inner.varint(F_ACTIVE, u64::from(*active));
                w.message(F_SET_ACTIVE, inner);
            }
            RemoteMessage::PingRequest { val1 } => {
                let mut inner = MessageWriter::new();
                inner.varint(F_VAL1, u64::from(*val1));
                w.message(F_PING_REQUEST, inner);
            }
            RemoteMessage::PingResponse { val1 } => {
                let mut inner = MessageWriter::new();
                inner.varint(F_VAL1, u64::from(*val1));
                w.message(F_PING_RESPONSE, inner);
            }
            RemoteMessage::KeyInject {
                key_code,
                direction,
            } => {
                let mut inner = MessageWriter::new();
                inner
                    .varint(F_KEY_CODE, u64::from(*key_code))
                    .varint(F_DIRECTION, u64::from(*direction));
                w.message(F_KEY_INJECT, inner);
            }
            RemoteMessage::ImeKeyInject { app_package } => {
                let mut inner = MessageWriter::new();
                inner.string(F_APP_PACKAGE, app_package);
                w.message(F_IME_KEY_INJECT, inner);
            }
            RemoteMessage::ImeBatchEdit {
                ime_counter,
                field_counter,
                edits,
            } => {
                let mut inner = MessageWriter::new();
                inner
                    .varint(F_IME_COUNTER, u64::from(*ime_counter))
                    .varint(F_FIELD_COUNTER, u64::from(*field_counter));
                for edit in edits {
                    let mut status = MessageWriter::new();
                    status
                        .varint(F_TFS_START, u64::from(edit.status.start))
                        .varint(F_TFS_END, u64::from(edit.status.end))
                        .string(F_TFS_VALUE, &edit.status.value);
                    let mut edit_info = MessageWriter::new();
                    edit_info.varint(F_INSERT, u64::from(edit.insert));
                    edit_info.message(F_TEXT_FIELD_STATUS, status);
                    inner.message(F_EDIT_INFO, edit_info);
                }
                w.message(F_IME_BATCH_EDIT, inner);
            }
            RemoteMessage::Start { started } => {
                let mut inner = MessageWriter::new();
                inner.varint(F_STARTED, u64::from(*started));
                w.message(F_START, inner);
            }
            RemoteMessage::SetVolumeLevel { max, level, muted } => {
                let mut inner = MessageWriter::new();
                inner
                    .varint(F_VOLUME_MAX, u64::from(*max))
                    .varint(F_VOLUME_LEVEL, u64::from(*level))
                    .varint(F_VOLUME_MUTED, u64::from(*muted));
                w.message(F_SET_VOLUME_LEVEL, inner);
            }
            RemoteMessage::Unknown { field } => {
                w.bytes(*field, &[]);
            }
        }
        w.into_bytes()
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        for field in FieldReader::new(data) {
            let (number, value) = field?;
            let body = match value {
                FieldValue::Bytes(b) => b,
                // An envelope field is always a sub-message.
                FieldValue::Varint(_) => continue,
            };
            let msg = match number {
                F_CONFIGURE => decode_configure(body)?,
                F_SET_ACTIVE => RemoteMessage::SetActive {
                    active: single_varint(body, F_ACTIVE)?,
                },
                F_PING_REQUEST => RemoteMessage::PingRequest {
                    val1: single_varint(body, F_VAL1)?,
                },
                F_PING_RESPONSE => RemoteMessage::PingResponse {
                    val1: single_varint(body, F_VAL1)?,
                },
                F_KEY_INJECT => decode_key_inject(body)?,
                F_IME_KEY_INJECT => decode_ime_key_inject(body)?,
                F_IME_BATCH_EDIT => decode_ime_batch_edit(body)?,
                F_START => RemoteMessage::Start {
                    started: single_varint(body, F_STARTED)? != 0,
                },
                F_SET_VOLUME_LEVEL => decode_set_volume(body)?,
                other => RemoteMessage::Unknown { field: other },
            };
            return Ok(msg);
        }
        Err(WireError::MissingField(0).into())
    }
}

fn single_varint(data: &[u8], wanted: u32) -> Result<u32> {
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        if number == wanted {
            return Ok(value.as_u32(number)?);
        }
    }
    Ok(0)
}

fn decode_configure(data: &[u8]) -> Result<RemoteMessage> {
    let mut code1 = 0;
    let mut device_info = DeviceInfo::new("", "");
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        match number {
            F_CODE1 => code1 = value.as_u32(number)?,
            F_DEVICE_INFO => {
                for inner in FieldReader::new(value.as_bytes(number)?) {
                    let (n, v) = inner?;
                    match n {
                        F_MODEL => device_info.model = v.as_string(n)?,
                        F_VENDOR => device_info.vendor = v.as_string(n)?,
                        F_UNKNOWN1 => device_info.unknown1 = v.as_u32(n)?,
                        F_UNKNOWN2 => device_info.unknown2 = v.as_string(n)?,
                        F_PACKAGE_NAME => device_info.package_name = v.as_string(n)?,
                        F_APP_VERSION => device_info.app_version = v.as_string(n)?,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(RemoteMessage::Configure { code1, device_info })
}

fn decode_key_inject(data: &[u8]) -> Result<RemoteMessage> {
    let mut key_code = 0;
    let mut direction = 0;
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        match number {
            F_KEY_CODE => key_code = value.as_u32(number)?,
            F_DIRECTION => direction = value.as_u32(number)?,
            _ => {}
        }
    }
    Ok(RemoteMessage::KeyInject {
        key_code,
        direction,
    })
}

fn decode_ime_key_inject(data: &[u8]) -> Result<RemoteMessage> {
    let mut app_package = String::new();
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        if number == F_APP_PACKAGE {
            app_package = value.as_string(number)?;
        }
    }
    Ok(RemoteMessage::ImeKeyInject { app_package })
}

fn decode_ime_batch_edit(data: &[u8]) -> Result<RemoteMessage> {
    let mut ime_counter = 0;
    let mut field_counter = 0;
    let mut edits = Vec::new();
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        match number {
            F_IME_COUNTER => ime_counter = value.as_u32(number)?,
            F_FIELD_COUNTER => field_counter = value.as_u32(number)?,
            F_EDIT_INFO => edits.push(decode_edit_info(value.as_bytes(number)?)?),
            _ => {}
        }
    }
    Ok(RemoteMessage::ImeBatchEdit {
        ime_counter,
        field_counter,
        edits,
    })
}

fn decode_edit_info(data: &[u8]) -> Result<ImeEdit> {
    let mut insert = 0;
    let mut status = TextFieldStatus {
        start: 0,
        end: 0,
        value: String::new(),
    };
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        match number {
            F_INSERT => insert = value.as_u32(number)?,
            F_TEXT_FIELD_STATUS => {
                for inner in FieldReader::new(value.as_bytes(number)?) {
                    let (n, v) = inner?;
                    match n {
                        F_TFS_START => status.start = v.as_u32(n)?,
                        F_TFS_END => status.end = v.as_u32(n)?,
                        F_TFS_VALUE => status.value = v.as_string(n)?,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(ImeEdit { insert, status })
}

fn decode_set_volume(data: &[u8]) -> Result<RemoteMessage> {
    let mut max = 0;
    let mut level = 0;
    let mut muted = false;
    for field in FieldReader::new(data) {
        let (number, value) = field?;
        match number {
            F_VOLUME_MAX => max = value.as_u32(number)?,
            F_VOLUME_LEVEL => level = value.as_u32(number)?,
            F_VOLUME_MUTED => muted = value.as_u32(number)? != 0,
            _ => {}
        }
    }
    Ok(RemoteMessage::SetVolumeLevel { max, level, muted })
}
