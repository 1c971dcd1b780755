//! Headless console monitor for the `i8085` core.
//!
//! Wires port 0/1 to an in-memory terminal, installs a BIOS at 0x0000 and
//! runs the CPU in fixed-size slices.

pub mod config;
pub mod machine;

pub use config::MonitorConfig;
pub use machine::{Console, MonitorMachine, RunOutcome};
