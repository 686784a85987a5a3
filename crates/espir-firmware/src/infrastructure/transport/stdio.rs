//! Line-oriented stdin/stdout transport for the host binary.
//!
//! Each line read from stdin is one request; each response is written to
//! stdout as one line.  Logs go to stderr so they never interleave with
//! responses.
//!
//! Reading happens on a Tokio task that forwards lines over an unbounded
//! `mpsc` channel; `poll_command` only does a non-blocking `try_recv`, so the
//! control loop never waits on the terminal.
//!
//! The peer is detached once stdin has reached end-of-file and every line it
//! sent has been handed out, or once stdout refuses a write.  After that
//! responses are dropped, so delivery always agrees with `status()`.

use std::io::Write;

use espir_core::protocol::messages::TransportStatus;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use super::TransportFacade;

/// A [`TransportFacade`] over the process's standard streams.
pub struct StdioTransport {
    inbound: mpsc::UnboundedReceiver<String>,
    connected: bool,
}

impl StdioTransport {
    /// Starts the stdin reader task.  Must be called inside a Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // The sender is dropped when the task ends, which closes the channel.
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim().to_string();
                        if line.is_empty() {
                            continue;
                        }
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("stdin closed, peer detached");
                        break;
                    }
                    Err(e) => {
                        warn!("stdin read failed, peer detached: {e}");
                        break;
                    }
                }
            }
        });

        Self::from_channel(rx)
    }

    fn from_channel(inbound: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            inbound,
            connected: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl TransportFacade for StdioTransport {
    fn poll_command(&mut self) -> Option<String> {
        match self.inbound.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            // Reader finished and every queued line is out.
            Err(TryRecvError::Disconnected) => {
                if self.connected {
                    debug!("stdin drained, marking peer detached");
                    self.connected = false;
                }
                None
            }
        }
    }

    fn send_response(&mut self, text: &str) -> bool {
        if !self.connected {
            return false;
        }
        let mut stdout = std::io::stdout().lock();
        match writeln!(stdout, "{text}").and_then(|()| stdout.flush()) {
            Ok(()) => true,
            Err(e) => {
                warn!("stdout write failed, peer detached: {e}");
                self.connected = false;
                false
            }
        }
    }

    fn status(&self) -> TransportStatus {
        let connected = self.is_connected();
        TransportStatus {
            connected,
            advertising: false,
            address: "stdio".to_string(),
        }
    }

    fn update(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queued_lines_are_served_before_detach() {
        // Arrange: one line queued, then the reader side closes
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(r#"{"command":"GET_STATUS"}"#.to_string()).unwrap();
        drop(tx);
        let mut transport = StdioTransport::from_channel(rx);

        // Act
        let first = transport.poll_command();
        let still_attached = transport.status().connected;
        let second = transport.poll_command();

        // Assert
        assert_eq!(first.as_deref(), Some(r#"{"command":"GET_STATUS"}"#));
        assert!(still_attached);
        assert_eq!(second, None);
        assert!(!transport.status().connected);
    }

    #[test]
    fn test_send_after_detach_reports_dropped() {
        let (tx, rx) = mpsc::unbounded_channel::<String>();
        drop(tx);
        let mut transport = StdioTransport::from_channel(rx);
        transport.poll_command();

        assert!(!transport.send_response(r#"{"status":"OK"}"#));
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_open_channel_without_lines_stays_attached() {
        let (_tx, rx) = mpsc::unbounded_channel::<String>();
        let mut transport = StdioTransport::from_channel(rx);

        assert_eq!(transport.poll_command(), None);
        assert!(transport.status().connected);
    }
}
