//! Platform services: time, memory, and restart.
//!
//! The dispatcher never reads a wall clock or reboots the chip itself.  It
//! asks a [`Clock`] for milliseconds since start-up and hands restart
//! requests to a [`Platform`], which on the device resets the MCU and on a
//! host lets the run loop exit so a process supervisor can start it again.

pub mod clock;
pub mod system;

pub use clock::{ManualClock, SystemClock};
pub use system::HostPlatform;

/// Monotonic millisecond clock, zero at start-up.
pub trait Clock: Send {
    fn now_ms(&self) -> u64;
}

/// Why a restart was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartKind {
    /// Plain restart; the catalog is kept.
    Plain,
    /// Restart after the catalog was wiped.
    Factory,
}

impl RestartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartKind::Plain => "restart",
            RestartKind::Factory => "factory",
        }
    }
}

/// Memory probe and restart sink.
pub trait Platform: Send {
    /// Free heap in bytes, or `None` where the platform cannot tell.
    fn free_memory(&self) -> Option<u64>;

    /// Asks for a restart.  Returns immediately; the restart happens later.
    fn request_restart(&mut self, kind: RestartKind);
}
