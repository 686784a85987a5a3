//! Durable storage for the catalog.
//!
//! - `codec` turns a list of devices into the versioned byte-record format
//!   and back.  It is pure: no I/O, no clocks.
//! - `backend` defines the [`ByteStore`] trait, the fixed-size linear byte
//!   region the encoded catalog is written to, plus an in-memory store used
//!   by tests and host simulations.
//!
//! Keeping these separate means the firmware can back the catalog with flash,
//! a file, or RAM without touching the record format.

pub mod backend;
pub mod codec;

pub use backend::{ByteStore, MemoryStore};
pub use codec::{decode_catalog, encode_catalog, StoreError};
