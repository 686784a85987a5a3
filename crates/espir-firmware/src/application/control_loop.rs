//! ControlLoop: the single cooperative tick that drives the firmware.
//!
//! One call to [`ControlLoop::tick`] does, in order:
//!
//! 1. transport housekeeping,
//! 2. every pending inbound request, through the dispatcher,
//! 3. dispatcher housekeeping (hardware update, LEARN step, pending restart).
//!
//! Nothing here sleeps.  The caller decides how often to tick; the host
//! binary uses a `tokio` interval on a current-thread runtime.

use espir_core::protocol::messages::TransportStatus;
use tracing::trace;

use super::dispatcher::CommandDispatcher;
use crate::infrastructure::transport::TransportFacade;

pub struct ControlLoop {
    dispatcher: CommandDispatcher,
    transport: Box<dyn TransportFacade>,
}

impl ControlLoop {
    pub fn new(dispatcher: CommandDispatcher, transport: Box<dyn TransportFacade>) -> Self {
        Self {
            dispatcher,
            transport,
        }
    }

    /// Runs one pass and returns the number of requests handled.
    pub fn tick(&mut self) -> usize {
        self.transport.update();

        let mut handled = 0;
        while let Some(text) = self.transport.poll_command() {
            self.dispatcher.process(&text, self.transport.as_mut());
            handled += 1;
        }
        if handled > 0 {
            trace!("handled {handled} requests");
        }

        self.dispatcher.update(self.transport.as_mut());
        handled
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn transport_status(&self) -> TransportStatus {
        self.transport.status()
    }

    /// See [`CommandDispatcher::is_idle`].
    pub fn is_idle(&self) -> bool {
        self.dispatcher.is_idle()
    }
}
