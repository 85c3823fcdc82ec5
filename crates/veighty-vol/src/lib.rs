//! VOL crate: host integration for the Veighty machine
//!
//! Everything outside the machine proper: the interactive session that
//! receives a program and feeds it input, and the watchdog that bounds the
//! session's wall-clock time. The machine itself knows nothing of either.

pub mod session;
pub mod watchdog;

pub use session::{HarnessConfig, HarnessError, Session, SessionOutcome};
pub use watchdog::{Watchdog, TIMEOUT_EXIT_CODE};
