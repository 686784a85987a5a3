//! Infrastructure layer for the firmware.
//!
//! Contains the facades the application layer talks to, each with at least
//! one implementation that runs on a host machine.
//!
//! # Sub-modules
//!
//! - **`hardware`** – the IR Hardware Facade (`transmit`, learn mode) and a
//!   simulated IR front end.
//! - **`transport`** – the Transport Facade that carries request and
//!   response text to the single connected peer: an in-memory transport for
//!   tests and a line-oriented stdin/stdout transport for the host binary.
//! - **`platform`** – monotonic clock, free-memory probe, and restart sink.
//! - **`storage`** – the file-backed catalog region and the TOML config.

pub mod hardware;
pub mod platform;
pub mod storage;
pub mod transport;
