//! espir-firmware library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the firmware do? (for beginners)
//!
//! The firmware is the program running on the IR blaster itself.  A phone
//! app sends it short JSON commands; the firmware answers each one with a
//! JSON response.  In between it:
//!
//! 1. Keeps the device/command catalog (from `espir-core`) in non-volatile
//!    storage so it survives power loss.
//! 2. Drives the IR hardware: transmitting stored codes and "learning" new
//!    ones by listening for a remote control's signal.
//! 3. Reports its own health (uptime, free memory, radio state).
//!
//! Everything runs on one thread.  A control loop wakes up every few tens
//! of milliseconds, pulls pending commands from the transport, lets the
//! dispatcher answer them, and advances any long-running operation (an IR
//! learn window, a scheduled restart) by one step.  Nothing ever blocks.
//!
//! The radio, the IR peripherals, the clock, and the flash are reached
//! through facade traits, so the same dispatcher runs on a host machine
//! with simulated hardware and a stdin/stdout transport.

/// Application layer: the command dispatcher, learn cycle, and control loop.
pub mod application;

/// Infrastructure layer: hardware, transport, platform, and storage adapters.
pub mod infrastructure;
