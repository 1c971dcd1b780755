use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::io::{IoGateway, BANK_SELECT_PORT};
use crate::memory::BankedMemory;

pub mod alu;
mod regs;

pub use regs::{Flags, Register, RegisterPair, Registers};

/// Execution state of the CPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CpuState {
    Running,
    /// Entered by `HLT`; only `reset` leaves it.
    Halted,
}

/// Intel 8085 CPU with its 8-bank memory and port gateway.
///
/// One call to [`Cpu8085::step`] executes exactly one instruction. There is no
/// cycle accounting; run loops and their stop conditions belong to the
/// driver.
pub struct Cpu8085 {
    pub regs: Registers,
    pub flags: Flags,
    memory: BankedMemory,
    io: IoGateway,
    halted: bool,
    interrupts_enabled: bool,
}

impl Cpu8085 {
    /// Create a CPU in reset state: registers zero, SP=0xFFFF, PC=0, bank 0,
    /// all memory zeroed.
    pub fn new() -> Self {
        Self {
            regs: Registers::default(),
            flags: Flags::default(),
            memory: BankedMemory::new(),
            io: IoGateway::new(),
            halted: false,
            interrupts_enabled: false,
        }
    }

    /// Return to power-on state. Memory is cleared; I/O handlers are kept.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.flags = Flags::default();
        self.memory.clear();
        self.halted = false;
        self.interrupts_enabled = false;
    }

    pub fn state(&self) -> CpuState {
        if self.halted {
            CpuState::Halted
        } else {
            CpuState::Running
        }
    }

    #[inline]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[inline]
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    /// Install both port handlers at once.
    pub fn set_io_callbacks(
        &mut self,
        read: impl FnMut(u8) -> u8 + 'static,
        write: impl FnMut(u8, u8) + 'static,
    ) {
        self.io.set_read(read);
        self.io.set_write(write);
    }

    pub fn io_mut(&mut self) -> &mut IoGateway {
        &mut self.io
    }

    pub fn memory(&self) -> &BankedMemory {
        &self.memory
    }

    #[inline]
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.memory.read_byte(addr)
    }

    #[inline]
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        self.memory.write_byte(addr, value);
    }

    pub fn read_bank(&self, bank: usize, addr: u16) -> u8 {
        self.memory.read_bank(bank, addr)
    }

    pub fn write_bank(&mut self, bank: usize, addr: u16, value: u8) {
        self.memory.write_bank(bank, addr, value);
    }

    pub fn switch_bank(&mut self, bank: usize) {
        self.memory.switch_bank(bank);
    }

    pub fn current_bank(&self) -> usize {
        self.memory.current_bank()
    }

    /// Copy `data` into the active bank at `start`. PC is not touched.
    pub fn load_bytes(&mut self, data: &[u8], start: u16) -> usize {
        self.memory.load_bytes(data, start)
    }

    /// Copy `data` into the active bank at `start` and point PC at it.
    pub fn load_program(&mut self, data: &[u8], start: u16) -> usize {
        let copied = self.memory.load_bytes(data, start);
        self.regs.pc = start;
        copied
    }

    /// Load a binary image from disk into the active bank at `start`.
    ///
    /// The file is read in full before anything is copied, so a failure
    /// leaves the CPU untouched. PC is not changed.
    pub fn load_binary(&mut self, path: impl AsRef<Path>, start: u16) -> Result<usize> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read binary '{}'", path.display()))?;
        if data.is_empty() {
            bail!("binary '{}' is empty", path.display());
        }

        let copied = self.memory.load_bytes(&data, start);
        if copied < data.len() {
            log::warn!(
                "'{}' truncated to {} of {} bytes at 0x{:04X}",
                path.display(),
                copied,
                data.len(),
                start
            );
        }
        log::info!(
            "loaded '{}' ({} bytes) into bank {} at 0x{:04X}",
            path.display(),
            copied,
            self.memory.current_bank(),
            start
        );
        Ok(copied)
    }

    /// Register snapshot, e.g. `A:00 B:00 C:00 D:00 E:00 H:00 L:00\nSP:FFFF PC:0000`.
    pub fn register_state(&self) -> String {
        self.regs.to_string()
    }

    /// Flag snapshot, e.g. `S:0 Z:1 AC:0 P:1 CY:0`.
    pub fn flags_state(&self) -> String {
        self.flags.to_string()
    }

    fn fetch_byte(&mut self) -> u8 {
        let b = self.memory.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        b
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte();
        let hi = self.fetch_byte();
        u16::from_le_bytes([lo, hi])
    }

    /// Read one of the eight addressable locations: B C D E H L M A.
    fn read_loc(&self, index: u8) -> u8 {
        match index & 0x07 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            6 => self.memory.read_byte(self.regs.hl()),
            _ => self.regs.a,
        }
    }

    fn write_loc(&mut self, index: u8, value: u8) {
        match index & 0x07 {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            6 => self.memory.write_byte(self.regs.hl(), value),
            _ => self.regs.a = value,
        }
    }

    /// Register pair selected by bits 4-5 of LXI/INX/DCX/DAD: BC DE HL SP.
    fn read_rp(&self, index: u8) -> u16 {
        match index & 0x03 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            _ => self.regs.sp,
        }
    }

    fn write_rp(&mut self, index: u8, value: u16) {
        match index & 0x03 {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            _ => self.regs.sp = value,
        }
    }

    /// Condition selected by bits 3-5 of Jcc/Ccc/Rcc: NZ Z NC C PO PE P M.
    fn condition(&self, index: u8) -> bool {
        match index & 0x07 {
            0 => !self.flags.z,
            1 => self.flags.z,
            2 => !self.flags.cy,
            3 => self.flags.cy,
            4 => !self.flags.p,
            5 => self.flags.p,
            6 => !self.flags.s,
            _ => self.flags.s,
        }
    }

    fn push(&mut self, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.memory.write_byte(self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.memory.write_byte(self.regs.sp, lo);
    }

    fn pop(&mut self) -> u16 {
        let lo = self.memory.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.memory.read_byte(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    /// Apply an accumulator ALU operation selected by bits 3-5:
    /// ADD ADC SUB SBB ANA XRA ORA CMP.
    fn alu_op(&mut self, op: u8, value: u8) {
        let a = self.regs.a;
        let flags = &mut self.flags;
        self.regs.a = match op & 0x07 {
            0 => alu::add(a, value, false, flags),
            1 => alu::add(a, value, true, flags),
            2 => alu::sub(a, value, false, flags),
            3 => alu::sub(a, value, true, flags),
            4 => alu::and(a, value, flags),
            5 => alu::xor(a, value, flags),
            6 => alu::or(a, value, flags),
            _ => {
                alu::cmp(a, value, flags);
                a
            }
        };
    }

    /// Execute a single instruction.
    ///
    /// Returns `false` without doing anything when the CPU is halted.
    pub fn step(&mut self) -> bool {
        if self.halted {
            return false;
        }

        let pc = self.regs.pc;
        let opcode = self.fetch_byte();
        log::trace!("{:04X}: {:02X}", pc, opcode);
        self.execute(opcode);
        true
    }

    fn execute(&mut self, opcode: u8) {
        match opcode {
            // NOP, plus the 8085's undocumented holes which all behave as NOP.
            0x00 | 0x08 | 0x10 | 0x18 | 0x28 | 0x38 | 0xcb | 0xd9 | 0xdd | 0xed | 0xfd => {}

            // RIM: simplified, reads back an empty mask.
            0x20 => self.regs.a = 0,
            // SIM: simplified, no effect.
            0x30 => {}

            // HLT
            0x76 => {
                log::debug!("HLT at {:04X}", self.regs.pc.wrapping_sub(1));
                self.halted = true;
            }

            // MOV dst,src (40-7F, excluding HLT 76)
            0x40..=0x7f => {
                let value = self.read_loc(opcode);
                self.write_loc(opcode >> 3, value);
            }

            // MVI r,byte / MVI M,byte
            0x06 | 0x0e | 0x16 | 0x1e | 0x26 | 0x2e | 0x36 | 0x3e => {
                let v = self.fetch_byte();
                self.write_loc(opcode >> 3, v);
            }

            // LXI rp,word
            0x01 | 0x11 | 0x21 | 0x31 => {
                let v = self.fetch_word();
                self.write_rp(opcode >> 4, v);
            }

            // STAX B / STAX D
            0x02 | 0x12 => {
                let addr = self.read_rp(opcode >> 4);
                self.memory.write_byte(addr, self.regs.a);
            }

            // LDAX B / LDAX D
            0x0a | 0x1a => {
                let addr = self.read_rp(opcode >> 4);
                self.regs.a = self.memory.read_byte(addr);
            }

            // SHLD addr: L at addr, H at addr+1
            0x22 => {
                let addr = self.fetch_word();
                self.memory.write_byte(addr, self.regs.l);
                self.memory.write_byte(addr.wrapping_add(1), self.regs.h);
            }

            // LHLD addr
            0x2a => {
                let addr = self.fetch_word();
                self.regs.l = self.memory.read_byte(addr);
                self.regs.h = self.memory.read_byte(addr.wrapping_add(1));
            }

            // STA addr
            0x32 => {
                let addr = self.fetch_word();
                self.memory.write_byte(addr, self.regs.a);
            }

            // LDA addr
            0x3a => {
                let addr = self.fetch_word();
                self.regs.a = self.memory.read_byte(addr);
            }

            // INX rp / DCX rp (no flags)
            0x03 | 0x13 | 0x23 | 0x33 => {
                let v = self.read_rp(opcode >> 4).wrapping_add(1);
                self.write_rp(opcode >> 4, v);
            }
            0x0b | 0x1b | 0x2b | 0x3b => {
                let v = self.read_rp(opcode >> 4).wrapping_sub(1);
                self.write_rp(opcode >> 4, v);
            }

            // INR r / INR M
            0x04 | 0x0c | 0x14 | 0x1c | 0x24 | 0x2c | 0x34 | 0x3c => {
                let v = self.read_loc(opcode >> 3);
                let r = alu::inr(v, &mut self.flags);
                self.write_loc(opcode >> 3, r);
            }

            // DCR r / DCR M
            0x05 | 0x0d | 0x15 | 0x1d | 0x25 | 0x2d | 0x35 | 0x3d => {
                let v = self.read_loc(opcode >> 3);
                let r = alu::dcr(v, &mut self.flags);
                self.write_loc(opcode >> 3, r);
            }

            // DAD rp
            0x09 | 0x19 | 0x29 | 0x39 => {
                let value = self.read_rp(opcode >> 4);
                let hl = alu::dad(self.regs.hl(), value, &mut self.flags);
                self.regs.set_hl(hl);
            }

            // RLC / RRC / RAL / RAR
            0x07 => self.regs.a = alu::rlc(self.regs.a, &mut self.flags),
            0x0f => self.regs.a = alu::rrc(self.regs.a, &mut self.flags),
            0x17 => self.regs.a = alu::ral(self.regs.a, &mut self.flags),
            0x1f => self.regs.a = alu::rar(self.regs.a, &mut self.flags),

            // DAA
            0x27 => self.regs.a = alu::daa(self.regs.a, &mut self.flags),

            // CMA
            0x2f => self.regs.a = !self.regs.a,

            // STC / CMC
            0x37 => self.flags.cy = true,
            0x3f => self.flags.cy = !self.flags.cy,

            // 80-BF: ADD ADC SUB SBB ANA XRA ORA CMP with register/memory source
            0x80..=0xbf => {
                let value = self.read_loc(opcode);
                self.alu_op(opcode >> 3, value);
            }

            // ADI ACI SUI SBI ANI XRI ORI CPI
            0xc6 | 0xce | 0xd6 | 0xde | 0xe6 | 0xee | 0xf6 | 0xfe => {
                let imm = self.fetch_byte();
                self.alu_op(opcode >> 3, imm);
            }

            // JMP / Jcc
            0xc3 => self.regs.pc = self.fetch_word(),
            0xc2 | 0xca | 0xd2 | 0xda | 0xe2 | 0xea | 0xf2 | 0xfa => {
                let addr = self.fetch_word();
                if self.condition(opcode >> 3) {
                    self.regs.pc = addr;
                }
            }

            // CALL / Ccc
            0xcd => {
                let addr = self.fetch_word();
                self.push(self.regs.pc);
                self.regs.pc = addr;
            }
            0xc4 | 0xcc | 0xd4 | 0xdc | 0xe4 | 0xec | 0xf4 | 0xfc => {
                let addr = self.fetch_word();
                if self.condition(opcode >> 3) {
                    self.push(self.regs.pc);
                    self.regs.pc = addr;
                }
            }

            // RET / Rcc
            0xc9 => self.regs.pc = self.pop(),
            0xc0 | 0xc8 | 0xd0 | 0xd8 | 0xe0 | 0xe8 | 0xf0 | 0xf8 => {
                if self.condition(opcode >> 3) {
                    self.regs.pc = self.pop();
                }
            }

            // RST n
            0xc7 | 0xcf | 0xd7 | 0xdf | 0xe7 | 0xef | 0xf7 | 0xff => {
                self.push(self.regs.pc);
                self.regs.pc = u16::from(opcode & 0x38);
            }

            // PCHL
            0xe9 => self.regs.pc = self.regs.hl(),

            // PUSH B / D / H
            0xc5 | 0xd5 | 0xe5 => {
                let value = self.read_rp(opcode >> 4);
                self.push(value);
            }

            // PUSH PSW: A in the high byte, packed flags in the low byte.
            0xf5 => {
                let value = u16::from_be_bytes([self.regs.a, self.flags.to_u8()]);
                self.push(value);
            }

            // POP B / D / H
            0xc1 | 0xd1 | 0xe1 => {
                let value = self.pop();
                self.write_rp(opcode >> 4, value);
            }

            // POP PSW
            0xf1 => {
                let [a, f] = self.pop().to_be_bytes();
                self.regs.a = a;
                self.flags = Flags::from_u8(f);
            }

            // XTHL: swap L with (SP) and H with (SP+1).
            0xe3 => {
                let sp = self.regs.sp;
                let lo = self.memory.read_byte(sp);
                let hi = self.memory.read_byte(sp.wrapping_add(1));
                self.memory.write_byte(sp, self.regs.l);
                self.memory.write_byte(sp.wrapping_add(1), self.regs.h);
                self.regs.l = lo;
                self.regs.h = hi;
            }

            // XCHG
            0xeb => {
                core::mem::swap(&mut self.regs.d, &mut self.regs.h);
                core::mem::swap(&mut self.regs.e, &mut self.regs.l);
            }

            // SPHL
            0xf9 => self.regs.sp = self.regs.hl(),

            // IN port
            0xdb => {
                let port = self.fetch_byte();
                self.regs.a = self.io.read(port);
            }

            // OUT port. The bank-select port is decoded here and never reaches
            // the gateway.
            0xd3 => {
                let port = self.fetch_byte();
                if port == BANK_SELECT_PORT {
                    self.memory.switch_bank(usize::from(self.regs.a & 0x07));
                } else {
                    self.io.write(port, self.regs.a);
                }
            }

            // EI / DI
            0xfb => self.interrupts_enabled = true,
            0xf3 => self.interrupts_enabled = false,
        }
    }
}

impl Default for Cpu8085 {
    fn default() -> Self {
        Self::new()
    }
}
