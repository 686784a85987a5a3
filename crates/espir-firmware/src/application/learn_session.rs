//! LearnSession: the state machine behind the LEARN command.
//!
//! ```text
//!            begin()                 code captured
//!   Idle ─────────────▶ Learning ─────────────────▶ Learned   ─┐
//!    ▲                     │                                    │
//!    │                     │ deadline reached or                │
//!    │                     │ hardware idle without a code       │
//!    │                     ▼                                    │
//!    └──────────────── TimedOut ◀───────────────────────────────┘
//!                    (terminal states report once, then Idle)
//! ```
//!
//! The session never blocks.  [`LearnSession::poll`] is called once per
//! control-loop tick and checks the hardware exactly once.  The deadline is
//! enforced here rather than trusted to the hardware, so a receiver that
//! never signals still produces a `TimedOut` outcome on time.

use espir_core::IrCode;
use tracing::{debug, info};

use crate::infrastructure::hardware::HardwareFacade;

/// Where a learned code should be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnTarget {
    pub device: String,
    pub command: String,
    pub description: String,
}

/// Terminal result of one learn window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnOutcome {
    Learned {
        code: IrCode,
        target: Option<LearnTarget>,
    },
    TimedOut {
        timeout_ms: u64,
        target: Option<LearnTarget>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LearnState {
    Idle,
    Learning {
        deadline_ms: u64,
        timeout_ms: u64,
        target: Option<LearnTarget>,
    },
}

/// One learn window at a time.
#[derive(Debug)]
pub struct LearnSession {
    state: LearnState,
}

impl LearnSession {
    pub fn new() -> Self {
        Self {
            state: LearnState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, LearnState::Learning { .. })
    }

    /// Opens a learn window ending `timeout_ms` after `now_ms`.
    ///
    /// The hardware must already be in learn mode.  Returns `false` (and
    /// changes nothing) if a window is already open.
    pub fn begin(&mut self, now_ms: u64, timeout_ms: u64, target: Option<LearnTarget>) -> bool {
        if self.is_active() {
            return false;
        }
        self.state = LearnState::Learning {
            deadline_ms: now_ms.saturating_add(timeout_ms),
            timeout_ms,
            target,
        };
        debug!("learn window open for {timeout_ms} ms");
        true
    }

    /// Advances the state machine by one step.
    ///
    /// Returns the outcome once, on the tick the window closes.
    pub fn poll(&mut self, now_ms: u64, hardware: &mut dyn HardwareFacade) -> Option<LearnOutcome> {
        let LearnState::Learning { deadline_ms, .. } = &self.state else {
            return None;
        };
        let deadline_ms = *deadline_ms;

        if hardware.has_learned_code() {
            if let Some(code) = hardware.learned_code() {
                let target = self.close();
                info!("learn window closed: {} code captured", code.protocol);
                return Some(LearnOutcome::Learned { code, target });
            }
        }

        if now_ms >= deadline_ms || !hardware.is_learning() {
            hardware.stop_learning();
            let timeout_ms = self.timeout_ms();
            let target = self.close();
            info!("learn window closed: no IR signal within {timeout_ms} ms");
            return Some(LearnOutcome::TimedOut { timeout_ms, target });
        }

        None
    }

    fn timeout_ms(&self) -> u64 {
        match &self.state {
            LearnState::Learning { timeout_ms, .. } => *timeout_ms,
            LearnState::Idle => 0,
        }
    }

    fn close(&mut self) -> Option<LearnTarget> {
        match std::mem::replace(&mut self.state, LearnState::Idle) {
            LearnState::Learning { target, .. } => target,
            LearnState::Idle => None,
        }
    }
}

impl Default for LearnSession {
    fn default() -> Self {
        Self::new()
    }
}
