//! The infrared code value type.
//!
//! An [`IrCode`] describes one infrared signal in two complementary ways:
//!
//! - **Decoded**: a vendor protocol, a data word, and a bit length.  The IR
//!   driver regenerates the waveform from these three values.
//! - **Raw**: the captured mark/space durations in microseconds.  Used when
//!   the protocol is unknown, and kept as a fallback when it is known.
//!
//! The type has no behaviour beyond validation and conversion to and from
//! the JSON "transport form" exchanged with the companion app:
//!
//! ```json
//! {"protocol":"NEC","value":"20df10ef","bits":32,"raw":[9000,4500],"description":"power"}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::limits::MAX_RAW_TIMINGS;

/// Errors raised while converting an IR code from its transport form.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IrCodeError {
    /// The transport form could not be turned into a valid [`IrCode`].
    #[error("invalid IR code encoding: {0}")]
    InvalidEncoding(String),
}

// ── Protocol identifiers ──────────────────────────────────────────────────────

/// IR protocol identifier, persisted as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum IrProtocol {
    /// No protocol was recognised; only raw timing is meaningful.
    #[default]
    Unknown = 0x00,
    /// Explicitly raw: the code is a timing sequence only.
    Raw = 0x01,
    Nec = 0x02,
    Sony = 0x03,
    Rc5 = 0x04,
    Rc6 = 0x05,
    Samsung = 0x06,
    Lg = 0x07,
    Panasonic = 0x08,
    Jvc = 0x09,
    Sharp = 0x0A,
    Denon = 0x0B,
}

impl IrProtocol {
    /// Every protocol in id order.
    pub const ALL: [IrProtocol; 12] = [
        IrProtocol::Unknown,
        IrProtocol::Raw,
        IrProtocol::Nec,
        IrProtocol::Sony,
        IrProtocol::Rc5,
        IrProtocol::Rc6,
        IrProtocol::Samsung,
        IrProtocol::Lg,
        IrProtocol::Panasonic,
        IrProtocol::Jvc,
        IrProtocol::Sharp,
        IrProtocol::Denon,
    ];

    /// Upper-case name used in the transport form.
    pub fn name(self) -> &'static str {
        match self {
            IrProtocol::Unknown => "UNKNOWN",
            IrProtocol::Raw => "RAW",
            IrProtocol::Nec => "NEC",
            IrProtocol::Sony => "SONY",
            IrProtocol::Rc5 => "RC5",
            IrProtocol::Rc6 => "RC6",
            IrProtocol::Samsung => "SAMSUNG",
            IrProtocol::Lg => "LG",
            IrProtocol::Panasonic => "PANASONIC",
            IrProtocol::Jvc => "JVC",
            IrProtocol::Sharp => "SHARP",
            IrProtocol::Denon => "DENON",
        }
    }

    /// `true` for protocols that can be regenerated from `data` + `bits`.
    pub fn is_fixed_format(self) -> bool {
        !matches!(self, IrProtocol::Unknown | IrProtocol::Raw)
    }
}

impl TryFrom<u8> for IrProtocol {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        IrProtocol::ALL
            .iter()
            .copied()
            .find(|p| *p as u8 == value)
            .ok_or(())
    }
}

impl FromStr for IrProtocol {
    type Err = IrCodeError;

    /// Parses a protocol name case-insensitively (`"nec"`, `"NEC"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IrProtocol::ALL
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| IrCodeError::InvalidEncoding(format!("unknown protocol: {s:?}")))
    }
}

impl fmt::Display for IrProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── IR code value type ────────────────────────────────────────────────────────

/// One infrared signal.
///
/// Equality is structural over every field, including `description`.
///
/// # Invariant
///
/// Either `raw_timing` is non-empty, or `protocol` is a fixed-format protocol
/// with non-zero `bits`.  Both may hold at once (raw timing kept as a
/// fallback).  [`IrCode::validate`] checks this.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IrCode {
    pub protocol: IrProtocol,
    /// Data word; meaningful only for fixed-format protocols.
    pub data: u64,
    /// Number of bits of `data` to transmit.
    pub bits: u16,
    /// Mark/space durations in microseconds.  May be empty.
    pub raw_timing: Vec<u16>,
    /// Free text; not part of the signal.
    pub description: String,
}

impl IrCode {
    /// Creates a decoded code with no raw fallback.
    pub fn decoded(protocol: IrProtocol, data: u64, bits: u16) -> Self {
        Self {
            protocol,
            data,
            bits,
            ..Self::default()
        }
    }

    /// Creates a raw-only code.
    pub fn raw(raw_timing: Vec<u16>) -> Self {
        Self {
            protocol: IrProtocol::Raw,
            raw_timing,
            ..Self::default()
        }
    }

    /// Attaches a raw-timing fallback.
    pub fn with_raw_timing(mut self, raw_timing: Vec<u16>) -> Self {
        self.raw_timing = raw_timing;
        self
    }

    /// Sets the free-text description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// `true` when the code can be sent from its decoded form alone.
    pub fn has_decoded_form(&self) -> bool {
        self.protocol.is_fixed_format() && self.bits > 0
    }

    /// Checks the value-type invariant.
    ///
    /// # Errors
    ///
    /// Returns [`IrCodeError::InvalidEncoding`] when the code carries neither a
    /// usable decoded form nor raw timing, when `bits` exceeds the 64-bit data
    /// word, or when the raw timing is longer than [`MAX_RAW_TIMINGS`].
    pub fn validate(&self) -> Result<(), IrCodeError> {
        if self.raw_timing.len() > MAX_RAW_TIMINGS {
            return Err(IrCodeError::InvalidEncoding(format!(
                "raw timing has {} entries, maximum is {MAX_RAW_TIMINGS}",
                self.raw_timing.len()
            )));
        }
        if self.protocol.is_fixed_format() && self.bits > 64 {
            return Err(IrCodeError::InvalidEncoding(format!(
                "{} code declares {} bits, data word holds 64",
                self.protocol, self.bits
            )));
        }
        if self.raw_timing.is_empty() && !self.has_decoded_form() {
            return Err(IrCodeError::InvalidEncoding(format!(
                "{} code has no raw timing and no transmittable data",
                self.protocol
            )));
        }
        Ok(())
    }

    /// Converts to the JSON-friendly transport form.
    pub fn to_transport(&self) -> IrCodeJson {
        IrCodeJson {
            protocol: self.protocol.name().to_string(),
            value: format!("{:x}", self.data),
            bits: self.bits,
            raw: self.raw_timing.clone(),
            description: self.description.clone(),
        }
    }

    /// Builds a validated code from its transport form.
    ///
    /// # Errors
    ///
    /// Returns [`IrCodeError::InvalidEncoding`] for an unknown protocol name, a
    /// `value` that is not a 64-bit hex number, or a result that fails
    /// [`IrCode::validate`].  No partially-built value is ever returned.
    pub fn from_transport(json: &IrCodeJson) -> Result<Self, IrCodeError> {
        let protocol: IrProtocol = json.protocol.parse()?;
        let data = parse_hex_word(&json.value)?;
        let code = Self {
            protocol,
            data,
            bits: json.bits,
            raw_timing: json.raw.clone(),
            description: json.description.clone(),
        };
        code.validate()?;
        Ok(code)
    }

    /// Parses a transport-form JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`IrCodeError::InvalidEncoding`] if the text is not a valid
    /// transport object or describes an invalid code.
    pub fn from_json(text: &str) -> Result<Self, IrCodeError> {
        let json: IrCodeJson = serde_json::from_str(text)
            .map_err(|e| IrCodeError::InvalidEncoding(format!("malformed IR code JSON: {e}")))?;
        Self::from_transport(&json)
    }

    /// Serialises the transport form as compact JSON.
    pub fn to_json(&self) -> String {
        // Serialising a struct of strings and integers cannot fail.
        serde_json::to_string(&self.to_transport()).unwrap_or_default()
    }
}

/// Parses a hex data word, accepting one optional `0x` prefix.  An absent
/// value means 0.
fn parse_hex_word(value: &str) -> Result<u64, IrCodeError> {
    if value.is_empty() {
        return Ok(0);
    }
    let trimmed = value.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(IrCodeError::InvalidEncoding(format!(
            "bad hex value {value:?}: expected hex digits"
        )));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| IrCodeError::InvalidEncoding(format!("bad hex value {value:?}: {e}")))
}

// ── Transport form ────────────────────────────────────────────────────────────

/// JSON transport form of an [`IrCode`].
///
/// `value` is the data word in lower-case hex; `raw` is omitted when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrCodeJson {
    pub protocol: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub bits: u16,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw: Vec<u16>,
    #[serde(default)]
    pub description: String,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
