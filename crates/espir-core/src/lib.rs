//! # espir-core
//!
//! Shared library for the ESPIR IR blaster containing the device/command
//! catalog, the persistence codec that stores it in a fixed-size byte region,
//! and the text command protocol spoken by the companion apps.
//!
//! It has zero dependencies on OS APIs, async runtimes, radios, or IR
//! peripherals.  The firmware crate supplies those through facades.
//!
//! # Architecture overview (for beginners)
//!
//! ESPIR is a small appliance that learns infrared remote-control codes and
//! plays them back on request.  A phone app talks to it with short JSON
//! commands ("add a device called Living Room TV", "send Power to it").
//!
//! This crate (`espir-core`) is the foundation.  It defines:
//!
//! - **`domain`** – Pure business types.  The [`IrCode`] value type describes
//!   one infrared signal; the [`Catalog`] owns every named device and the IR
//!   commands attached to it, and guarantees names stay unique and lists stay
//!   within their fixed limits.
//!
//! - **`storage`** – How the catalog survives power loss.  The whole catalog
//!   is encoded into a compact, versioned, length-prefixed record format and
//!   written to a [`storage::ByteStore`] (an EEPROM-like linear byte region).
//!
//! - **`protocol`** – The request and response envelopes exchanged with the
//!   companion app, including the closed error taxonomy.

pub mod domain;
pub mod protocol;
pub mod storage;

// Re-export the most-used types at the crate root so callers can write
// `espir_core::Catalog` instead of `espir_core::domain::catalog::Catalog`.
pub use domain::catalog::{
    Catalog, CatalogError, CatalogErrorKind, CatalogSnapshot, CatalogStatus, CommandEntry,
    CommandSummary, DeviceProfile, DeviceSummary, LoadOutcome,
};
pub use domain::ir_code::{IrCode, IrCodeError, IrCodeJson, IrProtocol};
pub use protocol::messages::{CommandKind, ErrorCode, Response, ResponseData, ResponseStatus};
pub use protocol::request::{parse_request, Parameters, Request, RequestError};
pub use storage::backend::{ByteStore, MemoryStore};
pub use storage::codec::{decode_catalog, encode_catalog, StoreError};
