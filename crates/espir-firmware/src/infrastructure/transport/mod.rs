//! Transport Facade.
//!
//! Carries request and response text between the firmware and its single
//! connected peer (the companion app over BLE on the device, a terminal on a
//! host).  Inbound text is pulled by the control loop with
//! [`TransportFacade::poll_command`]; nothing calls back into the dispatcher
//! from inside the transport.
//!
//! A response sent while no peer is attached is dropped: `send_response`
//! returns `false` and the text is neither queued nor retried.

use espir_core::protocol::messages::TransportStatus;

pub mod memory;
pub mod stdio;

/// Trait abstracting the link to the connected peer.
pub trait TransportFacade: Send {
    /// Next complete request text received from the peer, if any.
    fn poll_command(&mut self) -> Option<String>;

    /// Delivers one response.  Returns `false` if no peer is attached.
    fn send_response(&mut self, text: &str) -> bool;

    fn status(&self) -> TransportStatus;

    /// Connection housekeeping, called once per control-loop tick.
    fn update(&mut self);
}
