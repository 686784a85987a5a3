//! Simulated IR front end.
//!
//! Stands in for the LED driver and receiver on a host machine and in tests.
//! Cloning a [`SimulatedHardware`] yields a second handle onto the same state,
//! so a test can hand one handle to the dispatcher and keep the other to
//! inject received signals or inspect what was transmitted.
//!
//! A received signal is modelled as a queue: [`SimulatedHardware::inject_signal`]
//! puts a code "in the air", and the next `update` while learning captures it.
//! Signals that arrive outside learn mode are dropped, as on the real
//! receiver.  An optional fixture code is captured automatically after a
//! configurable number of polls, which lets the host binary complete a LEARN
//! with no test harness attached.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use espir_core::protocol::messages::IrStatus;
use espir_core::IrCode;
use tracing::{debug, info};

use super::{HardwareError, HardwareFacade};
use crate::infrastructure::storage::config::{ConfigError, HardwareConfig};

#[derive(Debug, Default)]
struct SimState {
    ready: bool,
    learning: bool,
    learned: Option<IrCode>,
    in_flight: VecDeque<IrCode>,
    fixture: Option<IrCode>,
    capture_after_polls: u32,
    polls_while_learning: u32,
    transmitted: Vec<IrCode>,
    fail_transmit: bool,
}

/// Host-side [`HardwareFacade`].
#[derive(Debug, Clone)]
pub struct SimulatedHardware {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedHardware {
    /// A ready front end with no fixture.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                ready: true,
                ..SimState::default()
            })),
        }
    }

    /// Builds the front end described by the `[hardware]` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the fixture is not a valid IR code.
    pub fn from_config(config: &HardwareConfig) -> Result<Self, ConfigError> {
        let hardware = Self::new();
        hardware.set_ready(config.ready);
        if let Some(json) = &config.learn_fixture {
            let code = IrCode::from_transport(json)
                .map_err(|e| ConfigError::Invalid(format!("hardware.learn_fixture: {e}")))?;
            hardware.set_fixture(Some(code), config.learn_after_polls);
        }
        Ok(hardware)
    }

    /// Puts `code` in the air; captured by the next `update` in learn mode.
    pub fn inject_signal(&self, code: IrCode) {
        self.lock().in_flight.push_back(code);
    }

    /// Captures `code` automatically after `after_polls` learn-mode updates.
    pub fn set_fixture(&self, code: Option<IrCode>, after_polls: u32) {
        let mut state = self.lock();
        state.fixture = code;
        state.capture_after_polls = after_polls;
    }

    pub fn set_ready(&self, ready: bool) {
        self.lock().ready = ready;
    }

    /// Makes every subsequent transmit fail with a driver fault.
    pub fn set_transmit_fault(&self, fail: bool) {
        self.lock().fail_transmit = fail;
    }

    /// Every code transmitted so far, oldest first.
    pub fn transmitted(&self) -> Vec<IrCode> {
        self.lock().transmitted.clone()
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareFacade for SimulatedHardware {
    fn start_learning(&mut self) -> Result<(), HardwareError> {
        let mut state = self.lock();
        if !state.ready {
            return Err(HardwareError::NotReady);
        }
        state.learning = true;
        state.learned = None;
        state.polls_while_learning = 0;
        info!("IR learn mode started");
        Ok(())
    }

    fn stop_learning(&mut self) {
        let mut state = self.lock();
        if state.learning {
            info!("IR learn mode stopped");
        }
        state.learning = false;
    }

    fn is_learning(&self) -> bool {
        self.lock().learning
    }

    fn has_learned_code(&self) -> bool {
        let state = self.lock();
        !state.learning && state.learned.is_some()
    }

    fn learned_code(&self) -> Option<IrCode> {
        self.lock().learned.clone()
    }

    fn transmit(&mut self, code: &IrCode) -> Result<(), HardwareError> {
        let mut state = self.lock();
        if !state.ready {
            return Err(HardwareError::NotReady);
        }
        if state.fail_transmit {
            return Err(HardwareError::Driver("injected transmit fault".to_string()));
        }
        if code.raw_timing.is_empty() && !code.has_decoded_form() {
            return Err(HardwareError::UnsupportedProtocol(code.protocol));
        }
        debug!(
            "transmitting {} code ({} raw entries)",
            code.protocol,
            code.raw_timing.len()
        );
        state.transmitted.push(code.clone());
        Ok(())
    }

    fn status(&self) -> IrStatus {
        let state = self.lock();
        IrStatus {
            ready: state.ready,
            learning: state.learning,
            has_learned: !state.learning && state.learned.is_some(),
        }
    }

    fn update(&mut self) {
        let mut state = self.lock();
        if !state.learning {
            state.in_flight.clear();
            return;
        }

        let captured = match state.in_flight.pop_front() {
            Some(code) => Some(code),
            None if state.polls_while_learning >= state.capture_after_polls => {
                state.fixture.clone()
            }
            None => None,
        };
        state.polls_while_learning = state.polls_while_learning.saturating_add(1);

        if let Some(code) = captured {
            info!("IR code captured: {} {} bits", code.protocol, code.bits);
            state.learned = Some(code);
            state.learning = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use espir_core::IrProtocol;

    fn nec() -> IrCode {
        IrCode::decoded(IrProtocol::Nec, 0x20DF_10EF, 32)
    }

    #[test]
    fn test_injected_signal_is_captured_while_learning() {
        // Arrange
        let mut hw = SimulatedHardware::new();
        hw.start_learning().expect("start");

        // Act
        hw.inject_signal(nec());
        hw.update();

        // Assert
        assert!(!hw.is_learning());
        assert!(hw.has_learned_code());
        assert_eq!(hw.learned_code(), Some(nec()));
    }

    #[test]
    fn test_signal_outside_learn_mode_is_dropped() {
        let mut hw = SimulatedHardware::new();
        hw.inject_signal(nec());
        hw.update();

        hw.start_learning().expect("start");
        hw.update();

        assert!(hw.is_learning());
        assert!(!hw.has_learned_code());
    }

    #[test]
    fn test_start_learning_discards_previous_code() {
        let mut hw = SimulatedHardware::new();
        hw.start_learning().unwrap();
        hw.inject_signal(nec());
        hw.update();

        hw.start_learning().unwrap();

        assert!(hw.learned_code().is_none());
        assert!(!hw.status().has_learned);
    }

    #[test]
    fn test_fixture_is_captured_after_configured_polls() {
        // Arrange
        let mut hw = SimulatedHardware::new();
        hw.set_fixture(Some(nec()), 2);
        hw.start_learning().unwrap();

        // Act / Assert
        hw.update();
        hw.update();
        assert!(hw.is_learning());
        hw.update();
        assert_eq!(hw.learned_code(), Some(nec()));
    }

    #[test]
    fn test_no_signal_means_learning_never_ends_on_its_own() {
        let mut hw = SimulatedHardware::new();
        hw.start_learning().unwrap();
        for _ in 0..100 {
            hw.update();
        }
        assert!(hw.is_learning());
    }

    #[test]
    fn test_not_ready_refuses_learn_and_transmit() {
        let mut hw = SimulatedHardware::new();
        hw.set_ready(false);
        assert_eq!(hw.start_learning(), Err(HardwareError::NotReady));
        assert_eq!(hw.transmit(&nec()), Err(HardwareError::NotReady));
    }

    #[test]
    fn test_transmit_records_code_on_shared_handle() {
        let mut hw = SimulatedHardware::new();
        let observer = hw.clone();

        hw.transmit(&nec()).expect("transmit");

        assert_eq!(observer.transmitted(), vec![nec()]);
    }

    #[test]
    fn test_transmit_fault_is_reported() {
        let mut hw = SimulatedHardware::new();
        hw.set_transmit_fault(true);
        assert!(matches!(hw.transmit(&nec()), Err(HardwareError::Driver(_))));
        assert!(hw.transmitted().is_empty());
    }

    #[test]
    fn test_undecodable_code_without_raw_is_unsupported() {
        let mut hw = SimulatedHardware::new();
        let code = IrCode::decoded(IrProtocol::Unknown, 0, 0);
        assert_eq!(
            hw.transmit(&code),
            Err(HardwareError::UnsupportedProtocol(IrProtocol::Unknown))
        );
    }

    #[test]
    fn test_from_config_rejects_invalid_fixture() {
        let config = HardwareConfig {
            learn_fixture: Some(espir_core::IrCodeJson {
                protocol: "BOGUS".to_string(),
                value: String::new(),
                bits: 0,
                raw: Vec::new(),
                description: String::new(),
            }),
            ..HardwareConfig::default()
        };
        assert!(matches!(
            SimulatedHardware::from_config(&config),
            Err(ConfigError::Invalid(_))
        ));
    }
}
