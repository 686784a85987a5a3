//! Persistent storage for the firmware.
//!
//! - `file_store` – a fixed-size file acting as the EEPROM region that holds
//!   the encoded catalog.
//! - `config` – TOML-based firmware configuration.

pub mod config;
pub mod file_store;
