//! Application layer for the firmware.
//!
//! Use cases orchestrate the catalog (from `espir_core`) and the
//! infrastructure facades.  None of them touch an OS API directly.
//!
//! - **`dispatcher`** – turns one request text into one response and owns
//!   every piece of cross-request state (learn session, pending restart).
//! - **`learn_session`** – the Idle → Learning → {Learned, TimedOut} state
//!   machine behind the LEARN command.
//! - **`control_loop`** – the single cooperative tick that drives everything.

pub mod control_loop;
pub mod dispatcher;
pub mod learn_session;
