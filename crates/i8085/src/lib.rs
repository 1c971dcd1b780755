//! Intel 8085 emulator core.
//!
//! The CPU owns eight 64 KiB memory banks (one active at a time, selected by
//! `OUT 254`) and talks to the outside world only through two optional port
//! callbacks. It is headless and driven by calling [`Cpu8085::step`].

pub mod cpu;
pub mod io;
pub mod memory;

pub use cpu::{CpuState, Cpu8085, Flags, Register, RegisterPair, Registers};
pub use io::IoGateway;
pub use memory::{hex_dump, BankedMemory, BANK_SIZE, NUM_BANKS};
