//! In-memory transport for tests.
//!
//! Allows tests to push request text and read back responses without a
//! radio or a terminal.  Clones share one queue pair.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use espir_core::protocol::messages::TransportStatus;

use super::TransportFacade;

#[derive(Debug)]
struct Link {
    inbound: VecDeque<String>,
    outbound: Vec<String>,
    connected: bool,
    dropped: u32,
}

/// A [`TransportFacade`] backed by two in-memory queues.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    link: Arc<Mutex<Link>>,
}

impl MemoryTransport {
    /// Creates a transport with a peer attached.
    pub fn new() -> Self {
        Self {
            link: Arc::new(Mutex::new(Link {
                inbound: VecDeque::new(),
                outbound: Vec::new(),
                connected: true,
                dropped: 0,
            })),
        }
    }

    /// Queues request text as if the peer had sent it.
    pub fn push_command(&self, text: impl Into<String>) {
        self.lock().inbound.push_back(text.into());
    }

    /// Attaches or detaches the peer.
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Removes and returns every response delivered so far.
    pub fn take_responses(&self) -> Vec<String> {
        std::mem::take(&mut self.lock().outbound)
    }

    /// Number of responses dropped because no peer was attached.
    pub fn dropped(&self) -> u32 {
        self.lock().dropped
    }

    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFacade for MemoryTransport {
    fn poll_command(&mut self) -> Option<String> {
        self.lock().inbound.pop_front()
    }

    fn send_response(&mut self, text: &str) -> bool {
        let mut link = self.lock();
        if !link.connected {
            link.dropped += 1;
            return false;
        }
        link.outbound.push(text.to_string());
        true
    }

    fn status(&self) -> TransportStatus {
        let link = self.lock();
        TransportStatus {
            connected: link.connected,
            advertising: !link.connected,
            address: "memory".to_string(),
        }
    }

    fn update(&mut self) {}
}
