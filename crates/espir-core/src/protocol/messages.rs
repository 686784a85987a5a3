//! Message types for the JSON command protocol.
//!
//! # Response envelope (for beginners)
//!
//! Every request, good or bad, is answered with the same four-field object:
//!
//! ```json
//! {"status":"ERROR","message":"Command failed","timestamp":5120,
//!  "data":{"error":"ALREADY_EXISTS","details":"device already exists: TV1"}}
//! ```
//!
//! `data` is a typed payload chosen per command.  [`ResponseData`] is an
//! *untagged* enum, so serde writes the inner struct's fields directly with
//! no variant name wrapped around them.  That keeps the wire shape a plain
//! object while every possible payload stays enumerable in Rust.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{CatalogSnapshot, CatalogStatus, CommandSummary, DeviceSummary};
use crate::domain::ir_code::IrCodeJson;

/// Message used by every error response unless a handler supplies its own.
pub const FAILURE_MESSAGE: &str = "Command failed";

// ── Command kinds ─────────────────────────────────────────────────────────────

/// Every command name the dispatcher recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Learn,
    Transmit,
    ListDevices,
    AddDevice,
    DeleteDevice,
    GetStatus,
    Reset,
    ListCommands,
    AddCommand,
    DeleteCommand,
    Export,
    Import,
}

impl CommandKind {
    pub const ALL: [CommandKind; 12] = [
        CommandKind::Learn,
        CommandKind::Transmit,
        CommandKind::ListDevices,
        CommandKind::AddDevice,
        CommandKind::DeleteDevice,
        CommandKind::GetStatus,
        CommandKind::Reset,
        CommandKind::ListCommands,
        CommandKind::AddCommand,
        CommandKind::DeleteCommand,
        CommandKind::Export,
        CommandKind::Import,
    ];

    /// Wire name, e.g. `"LIST_DEVICES"`.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::Learn => "LEARN",
            CommandKind::Transmit => "TRANSMIT",
            CommandKind::ListDevices => "LIST_DEVICES",
            CommandKind::AddDevice => "ADD_DEVICE",
            CommandKind::DeleteDevice => "DELETE_DEVICE",
            CommandKind::GetStatus => "GET_STATUS",
            CommandKind::Reset => "RESET",
            CommandKind::ListCommands => "LIST_COMMANDS",
            CommandKind::AddCommand => "ADD_COMMAND",
            CommandKind::DeleteCommand => "DELETE_COMMAND",
            CommandKind::Export => "EXPORT",
            CommandKind::Import => "IMPORT",
        }
    }
}

/// The name did not match any [`CommandKind`].  Matching is case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl FromStr for CommandKind {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Status and error codes ────────────────────────────────────────────────────

/// Top-level outcome of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Ok,
    Error,
    Timeout,
    NotFound,
    Invalid,
}

/// Machine-readable error code carried in `data.error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidJson,
    MissingCommand,
    UnknownCommand,
    MissingParameters,
    InvalidParameter,
    NotFound,
    AlreadyExists,
    CapacityExceeded,
    CorruptStore,
    StorageFull,
    HardwareUnavailable,
    Timeout,
}

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorData {
    pub error: ErrorCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Immediate acknowledgement of a LEARN request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnStartedData {
    pub timeout: u64,
    /// Always `"learning"`.
    pub status: &'static str,
}

/// Terminal LEARN payload: the captured code plus the save outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnedData {
    #[serde(flatten)]
    pub code: IrCodeJson,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
}

/// Terminal LEARN payload when the window closed without a code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnTimeoutData {
    /// Always [`ErrorCode::Timeout`].
    pub error: ErrorCode,
    pub timeout: u64,
}

/// Terminal LEARN payload when the code was captured but could not be saved.
///
/// Carries the code so the client can retry with ADD_COMMAND.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LearnUnsavedData {
    pub error: ErrorCode,
    pub details: String,
    pub code: IrCodeJson,
    pub device: String,
    pub command: String,
    pub saved: bool,
}

/// EXPORT payload: the backup snapshot plus the time it was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportData {
    /// Milliseconds since start-up.
    pub exported: u64,
    #[serde(flatten)]
    pub snapshot: CatalogSnapshot,
}

/// Identifies one device, and optionally one of its commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetData {
    pub device: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl TargetData {
    pub fn device(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            device_type: None,
            command: None,
        }
    }

    pub fn command(device: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::device(device)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceListData {
    pub devices: Vec<DeviceSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandListData {
    pub device: String,
    pub commands: Vec<CommandSummary>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportData {
    pub devices: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetData {
    #[serde(rename = "type")]
    pub kind: String,
    pub restart_in_ms: u64,
}

// ── Status snapshots ──────────────────────────────────────────────────────────

/// IR hardware section of GET_STATUS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrStatus {
    pub ready: bool,
    pub learning: bool,
    pub has_learned: bool,
}

/// Transport section of GET_STATUS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStatus {
    pub connected: bool,
    pub advertising: bool,
    pub address: String,
}

/// Full GET_STATUS payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub ir: IrStatus,
    pub transport: TransportStatus,
    pub devices: CatalogStatus,
    pub firmware: String,
    /// Milliseconds since start-up.
    pub uptime: u64,
    /// `None` (serialised as `null`) where the platform cannot tell.
    pub free_heap: Option<u64>,
    /// `CORRUPT_STORE` when start-up discarded an unreadable catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_error: Option<ErrorCode>,
}

/// Every payload a response can carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    Error(ErrorData),
    LearnStarted(LearnStartedData),
    Learned(LearnedData),
    LearnTimeout(LearnTimeoutData),
    LearnUnsaved(LearnUnsavedData),
    Target(TargetData),
    Devices(DeviceListData),
    Commands(CommandListData),
    Export(ExportData),
    Imported(ImportData),
    Status(Box<SystemStatus>),
    Reset(ResetData),
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// The response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub status: ResponseStatus,
    pub message: String,
    /// Milliseconds since start-up when the response was built.
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl Response {
    pub fn new(status: ResponseStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timestamp: 0,
            data: None,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Ok, message)
    }

    /// An error response with `{"error": code, "details": details}` data.
    pub fn failure(status: ResponseStatus, code: ErrorCode, details: impl Into<String>) -> Self {
        Self::new(status, FAILURE_MESSAGE).with_data(ResponseData::Error(ErrorData {
            error: code,
            details: Some(details.into()),
        }))
    }

    pub fn with_data(mut self, data: ResponseData) -> Self {
        self.data = Some(data);
        self
    }

    pub fn stamped(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// The error code, for error responses.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match &self.data {
            Some(ResponseData::Error(e)) => Some(e.error),
            _ => None,
        }
    }

    /// Serialises the envelope as compact JSON.
    pub fn to_json(&self) -> String {
        // Every payload is plain structs, strings, and integers; cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}
