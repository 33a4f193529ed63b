//! Automated check execution.
//!
//! A "check" is one deterministic project command (tests, typecheck, lint,
//! build, e2e) whose exit status is captured as data. Nothing in this module
//! throws for a failing command: a non-zero exit, a garbage command, and a
//! timeout all fold into the same `success: false` result shape.

mod command;
mod scheduler;
mod types;

pub use command::run_check_command;
pub use scheduler::{CheckScheduler, E2E_GATED_OUTPUT};
pub use types::{
    AutomatedCheckResult, CheckDefinition, CheckOptions, CheckType, E2eMode, TestMode,
};
