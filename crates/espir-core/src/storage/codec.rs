//! Persistence codec for the catalog.
//!
//! Record format:
//! ```text
//! [0xAA][0x55][device_count:1]
//! device  := [len:1][name][len:1][type][len:1][manufacturer][len:1][model]
//!            [command_count:1] command*
//! command := [len:1][name][len:1][description] ir_code
//! ir_code := [protocol:1][bits:2][data:8][raw_len:2][raw:2*raw_len]
//!            [len:1][code_description]
//! ```
//! All multi-byte integers are big-endian.  Every field of every device,
//! command, and IR code is stored; a field that does not fit its one-byte
//! length prefix is refused rather than truncated.

use std::collections::HashSet;

use thiserror::Error;

use crate::domain::catalog::{CommandEntry, DeviceProfile};
use crate::domain::ir_code::{IrCode, IrProtocol};
use crate::domain::limits::{
    MAX_COMMANDS, MAX_DEVICES, MAX_FIELD_LEN, MAX_NAME_LEN, MAX_RAW_TIMINGS, STORE_MAGIC,
};

/// Size of the region header: magic (2) + device count (1).
pub const HEADER_SIZE: usize = 3;

/// Errors raised while encoding, decoding, or writing the catalog region.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The region does not hold a decodable catalog.
    #[error("corrupt catalog store: {0}")]
    CorruptStore(String),

    /// The encoded catalog does not fit the backing region.
    #[error("catalog needs {needed} bytes but the store holds {capacity}")]
    StorageFull { needed: usize, capacity: usize },

    /// A text field is longer than its one-byte length prefix allows.
    #[error("field {field} is {len} bytes, maximum is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A record list is longer than the format can describe.
    #[error("{what} count {count} exceeds maximum {max}")]
    TooManyRecords {
        what: &'static str,
        count: usize,
        max: usize,
    },

    /// The backing store failed to read, write, or erase.
    #[error("store backend fault: {0}")]
    Backend(String),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `devices` into the record format.
///
/// The returned buffer holds only the used bytes; the caller writes it at
/// offset 0 of the region.
///
/// # Errors
///
/// - [`StoreError::FieldTooLong`] if any text field exceeds 255 bytes.
/// - [`StoreError::TooManyRecords`] if a device, command, or raw-timing list
///   exceeds its limit.
/// - [`StoreError::StorageFull`] if the result would be larger than `capacity`.
pub fn encode_catalog(devices: &[DeviceProfile], capacity: usize) -> Result<Vec<u8>, StoreError> {
    check_count("device", devices.len(), MAX_DEVICES)?;

    let mut buf = Vec::with_capacity(capacity.min(1024));
    buf.extend_from_slice(&STORE_MAGIC);
    buf.push(devices.len() as u8);

    for device in devices {
        encode_device(&mut buf, device)?;
    }

    if buf.len() > capacity {
        return Err(StoreError::StorageFull {
            needed: buf.len(),
            capacity,
        });
    }
    Ok(buf)
}

/// Decodes a catalog from the start of `region`.
///
/// Returns the devices and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`StoreError::CorruptStore`] when the magic marker is missing, a
/// declared count exceeds its maximum, a record would run past the end of the
/// region, a text field is not UTF-8, a protocol id is unknown, or the decoded
/// data breaks a catalog invariant (empty/oversized or duplicate names,
/// invalid IR code).
pub fn decode_catalog(region: &[u8]) -> Result<(Vec<DeviceProfile>, usize), StoreError> {
    let mut reader = Reader::new(region);

    let magic = [reader.u8("magic")?, reader.u8("magic")?];
    if magic != STORE_MAGIC {
        return Err(StoreError::CorruptStore(format!(
            "missing magic marker (found {:02X} {:02X})",
            magic[0], magic[1]
        )));
    }

    let device_count = reader.u8("device count")? as usize;
    if device_count > MAX_DEVICES {
        return Err(StoreError::CorruptStore(format!(
            "device count {device_count} exceeds maximum {MAX_DEVICES}"
        )));
    }

    let mut devices = Vec::with_capacity(device_count);
    let mut device_names = HashSet::new();
    for _ in 0..device_count {
        let device = decode_device(&mut reader)?;
        if !device_names.insert(device.name.clone()) {
            return Err(StoreError::CorruptStore(format!(
                "duplicate device name {:?}",
                device.name
            )));
        }
        devices.push(device);
    }

    Ok((devices, reader.pos))
}

/// Returns `true` if `region` looks freshly erased or zeroed rather than
/// damaged.  Used only to pick a log level at start-up.
pub fn is_blank(region: &[u8]) -> bool {
    let head = &region[..region.len().min(HEADER_SIZE)];
    head.iter().all(|b| *b == 0xFF) || head.iter().all(|b| *b == 0x00)
}

// ── Encoding helpers ──────────────────────────────────────────────────────────

fn encode_device(buf: &mut Vec<u8>, device: &DeviceProfile) -> Result<(), StoreError> {
    write_field(buf, "device.name", &device.name)?;
    write_field(buf, "device.type", &device.device_type)?;
    write_field(buf, "device.manufacturer", &device.manufacturer)?;
    write_field(buf, "device.model", &device.model)?;

    check_count("command", device.commands.len(), MAX_COMMANDS)?;
    buf.push(device.commands.len() as u8);
    for command in &device.commands {
        write_field(buf, "command.name", &command.name)?;
        write_field(buf, "command.description", &command.description)?;
        encode_ir_code(buf, &command.code)?;
    }
    Ok(())
}

fn encode_ir_code(buf: &mut Vec<u8>, code: &IrCode) -> Result<(), StoreError> {
    check_count("raw timing", code.raw_timing.len(), MAX_RAW_TIMINGS)?;

    buf.push(code.protocol as u8);
    buf.extend_from_slice(&code.bits.to_be_bytes());
    buf.extend_from_slice(&code.data.to_be_bytes());
    buf.extend_from_slice(&(code.raw_timing.len() as u16).to_be_bytes());
    for duration in &code.raw_timing {
        buf.extend_from_slice(&duration.to_be_bytes());
    }
    write_field(buf, "code.description", &code.description)
}

/// Writes a 1-byte length prefix followed by the UTF-8 bytes.
fn write_field(buf: &mut Vec<u8>, field: &'static str, s: &str) -> Result<(), StoreError> {
    let bytes = s.as_bytes();
    if bytes.len() > MAX_FIELD_LEN {
        return Err(StoreError::FieldTooLong {
            field,
            len: bytes.len(),
            max: MAX_FIELD_LEN,
        });
    }
    buf.push(bytes.len() as u8);
    buf.extend_from_slice(bytes);
    Ok(())
}

fn check_count(what: &'static str, count: usize, max: usize) -> Result<(), StoreError> {
    if count > max {
        Err(StoreError::TooManyRecords { what, count, max })
    } else {
        Ok(())
    }
}

// ── Decoding helpers ──────────────────────────────────────────────────────────

fn decode_device(reader: &mut Reader<'_>) -> Result<DeviceProfile, StoreError> {
    let name = reader.name("device name")?;
    let device_type = reader.string("device type")?;
    let manufacturer = reader.string("device manufacturer")?;
    let model = reader.string("device model")?;

    let command_count = reader.u8("command count")? as usize;
    if command_count > MAX_COMMANDS {
        return Err(StoreError::CorruptStore(format!(
            "device {name:?} declares {command_count} commands, maximum is {MAX_COMMANDS}"
        )));
    }

    let mut commands: Vec<CommandEntry> = Vec::with_capacity(command_count);
    for _ in 0..command_count {
        let command_name = reader.name("command name")?;
        if commands.iter().any(|c| c.name == command_name) {
            return Err(StoreError::CorruptStore(format!(
                "duplicate command {command_name:?} in device {name:?}"
            )));
        }
        let description = reader.string("command description")?;
        let code = decode_ir_code(reader)?;
        commands.push(CommandEntry {
            name: command_name,
            description,
            code,
        });
    }

    Ok(DeviceProfile {
        name,
        device_type,
        manufacturer,
        model,
        commands,
    })
}

fn decode_ir_code(reader: &mut Reader<'_>) -> Result<IrCode, StoreError> {
    let protocol_id = reader.u8("protocol")?;
    let protocol = IrProtocol::try_from(protocol_id).map_err(|_| {
        StoreError::CorruptStore(format!("unknown protocol id 0x{protocol_id:02X}"))
    })?;
    let bits = reader.u16("bits")?;
    let data = reader.u64("data")?;

    let raw_len = reader.u16("raw length")? as usize;
    if raw_len > MAX_RAW_TIMINGS {
        return Err(StoreError::CorruptStore(format!(
            "raw timing length {raw_len} exceeds maximum {MAX_RAW_TIMINGS}"
        )));
    }
    let mut raw_timing = Vec::with_capacity(raw_len);
    for _ in 0..raw_len {
        raw_timing.push(reader.u16("raw timing")?);
    }
    let description = reader.string("code description")?;

    let code = IrCode {
        protocol,
        data,
        bits,
        raw_timing,
        description,
    };
    code.validate()
        .map_err(|e| StoreError::CorruptStore(format!("stored IR code is invalid: {e}")))?;
    Ok(code)
}

/// Bounds-checked cursor over the region.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, context: &str) -> Result<&'a [u8], StoreError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len());
        match end {
            Some(end) => {
                let slice = &self.buf[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(StoreError::CorruptStore(format!(
                "{context}: need {n} bytes at offset {}, region is {} bytes",
                self.pos,
                self.buf.len()
            ))),
        }
    }

    fn u8(&mut self, context: &str) -> Result<u8, StoreError> {
        Ok(self.take(1, context)?[0])
    }

    fn u16(&mut self, context: &str) -> Result<u16, StoreError> {
        let b = self.take(2, context)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u64(&mut self, context: &str) -> Result<u64, StoreError> {
        let b = self.take(8, context)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(b);
        Ok(u64::from_be_bytes(word))
    }

    fn string(&mut self, context: &str) -> Result<String, StoreError> {
        let len = self.u8(context)? as usize;
        let bytes = self.take(len, context)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| StoreError::CorruptStore(format!("{context}: invalid UTF-8: {e}")))
    }

    /// Reads a string that must satisfy the name bounds.
    fn name(&mut self, context: &str) -> Result<String, StoreError> {
        let name = self.string(context)?;
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(StoreError::CorruptStore(format!(
                "{context} has invalid length {}",
                name.len()
            )));
        }
        Ok(name)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
