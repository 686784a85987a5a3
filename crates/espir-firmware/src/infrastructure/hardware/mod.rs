//! IR Hardware Facade.
//!
//! On the device this is the IR LED driver plus the demodulating receiver.
//! The dispatcher only ever sees the [`HardwareFacade`] trait, so tests can
//! swap in [`simulated::SimulatedHardware`] or a `mockall` mock.
//!
//! # Learn mode (for beginners)
//!
//! "Learning" means listening for one IR burst from a physical remote.  The
//! facade is switched into learn mode with `start_learning`, and `update` is
//! called on every control-loop tick so the driver can check whether a
//! signal has been decoded.  Once one arrives, the facade leaves learn mode
//! by itself and `has_learned_code` turns `true`.  Deadlines are the
//! caller's business; the facade never times out on its own.

use espir_core::protocol::messages::IrStatus;
use espir_core::{IrCode, IrProtocol};
use thiserror::Error;

pub mod simulated;

/// Error type for IR hardware operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HardwareError {
    #[error("IR hardware is not ready")]
    NotReady,
    #[error("protocol {0} cannot be transmitted from its decoded form")]
    UnsupportedProtocol(IrProtocol),
    #[error("IR driver fault: {0}")]
    Driver(String),
}

/// Trait abstracting the IR transmitter and receiver.
#[cfg_attr(test, mockall::automock)]
pub trait HardwareFacade: Send {
    /// Enters learn mode and discards any previously learned code.
    fn start_learning(&mut self) -> Result<(), HardwareError>;

    /// Leaves learn mode without capturing anything.
    fn stop_learning(&mut self);

    fn is_learning(&self) -> bool;

    /// `true` once learn mode ended with a captured code.
    fn has_learned_code(&self) -> bool;

    /// The most recently captured code, if any.
    fn learned_code(&self) -> Option<IrCode>;

    /// Sends `code`, preferring raw timing when present.
    fn transmit(&mut self, code: &IrCode) -> Result<(), HardwareError>;

    fn status(&self) -> IrStatus;

    /// Housekeeping, called once per control-loop tick.
    fn update(&mut self);
}
