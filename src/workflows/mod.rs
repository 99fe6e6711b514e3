//! Trigger entrypoints
//!
//! Each function is one independent invocation over an
//! [`InvocationContext`](crate::context::InvocationContext) and returns a
//! terminal status.

pub mod health_check;
pub mod regulatory;
pub mod report_listener;
pub mod safeguard;

pub use health_check::{CoinOutcome, CycleGate, CycleStatus, CycleSummary, run_health_check};
pub use regulatory::{ACTION_REQUIRED, NO_ACTION, requires_action, run_regulatory_parser};
pub use report_listener::handle_report_event;
pub use safeguard::{SAFEGUARD_COMPLETE, run_safeguard};
