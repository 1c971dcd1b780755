//! Banked memory: eight independent 64 KiB banks, exactly one active.
//!
//! Switching banks swaps the whole visible address space. Every access made
//! by the CPU (instruction fetch, data, stack) goes to the active bank.

use std::fmt::Write as _;

/// Size of a single bank in bytes.
pub const BANK_SIZE: usize = 0x10000;
/// Number of banks (8 × 64 KiB = 512 KiB).
pub const NUM_BANKS: usize = 8;

/// Bytes shown per row by [`hex_dump`].
const HEX_DUMP_ROW: usize = 16;

pub struct BankedMemory {
    banks: Vec<[u8; BANK_SIZE]>,
    current: usize,
}

impl BankedMemory {
    /// Allocate all banks zeroed, with bank 0 active.
    pub fn new() -> Self {
        Self {
            banks: vec![[0; BANK_SIZE]; NUM_BANKS],
            current: 0,
        }
    }

    /// Zero every bank and select bank 0 again.
    pub fn clear(&mut self) {
        for bank in &mut self.banks {
            bank.fill(0);
        }
        self.current = 0;
    }

    #[inline]
    pub fn current_bank(&self) -> usize {
        self.current
    }

    /// Select the active bank. Out-of-range requests are ignored.
    pub fn switch_bank(&mut self, bank: usize) {
        if bank < NUM_BANKS {
            log::trace!("bank switch {} -> {}", self.current, bank);
            self.current = bank;
        } else {
            log::debug!("ignoring switch to nonexistent bank {}", bank);
        }
    }

    #[inline]
    pub fn read_byte(&self, addr: u16) -> u8 {
        self.banks[self.current][addr as usize]
    }

    #[inline]
    pub fn write_byte(&mut self, addr: u16, value: u8) {
        self.banks[self.current][addr as usize] = value;
    }

    /// Read from a named bank regardless of which one is active.
    ///
    /// Returns 0 for a bank index outside `0..NUM_BANKS`.
    pub fn read_bank(&self, bank: usize, addr: u16) -> u8 {
        match self.banks.get(bank) {
            Some(bank) => bank[addr as usize],
            None => {
                log::debug!("read from nonexistent bank {} at {:04X}", bank, addr);
                0
            }
        }
    }

    /// Write to a named bank regardless of which one is active.
    ///
    /// Writes to a bank index outside `0..NUM_BANKS` are dropped.
    pub fn write_bank(&mut self, bank: usize, addr: u16, value: u8) {
        match self.banks.get_mut(bank) {
            Some(bank) => bank[addr as usize] = value,
            None => log::debug!("write to nonexistent bank {} at {:04X}", bank, addr),
        }
    }

    /// Copy `data` into the active bank starting at `start`.
    ///
    /// Anything that would land past 0xFFFF is dropped. Returns the number of
    /// bytes actually copied.
    pub fn load_bytes(&mut self, data: &[u8], start: u16) -> usize {
        let start = start as usize;
        let len = data.len().min(BANK_SIZE - start);
        self.banks[self.current][start..start + len].copy_from_slice(&data[..len]);
        len
    }
}

impl Default for BankedMemory {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `rows` lines of 16 bytes from the active bank, starting at `start`.
///
/// Each line reads `AAAA: XX XX ... XX` in uppercase hex. Addresses wrap past
/// 0xFFFF back to 0x0000.
pub fn hex_dump(memory: &BankedMemory, start: u16, rows: usize) -> String {
    let mut out = String::with_capacity(rows * (6 + HEX_DUMP_ROW * 3));
    let mut addr = start;
    for row in 0..rows {
        if row > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{:04X}:", addr);
        for _ in 0..HEX_DUMP_ROW {
            let _ = write!(out, " {:02X}", memory.read_byte(addr));
            addr = addr.wrapping_add(1);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banks_are_isolated() {
        let mut mem = BankedMemory::new();
        mem.switch_bank(2);
        mem.write_byte(0x1234, 0xAA);

        mem.switch_bank(5);
        assert_eq!(mem.read_byte(0x1234), 0x00);
        mem.write_byte(0x1234, 0x55);

        mem.switch_bank(2);
        assert_eq!(mem.read_byte(0x1234), 0xAA);
        assert_eq!(mem.read_bank(5, 0x1234), 0x55);
    }

    #[test]
    fn out_of_range_switch_is_ignored() {
        let mut mem = BankedMemory::new();
        mem.switch_bank(3);
        mem.switch_bank(8);
        mem.switch_bank(usize::MAX);
        assert_eq!(mem.current_bank(), 3);
    }

    #[test]
    fn explicit_bank_access_ignores_active_bank() {
        let mut mem = BankedMemory::new();
        mem.write_bank(7, 0xFFFF, 0x42);
        assert_eq!(mem.current_bank(), 0);
        assert_eq!(mem.read_byte(0xFFFF), 0x00);
        assert_eq!(mem.read_bank(7, 0xFFFF), 0x42);

        mem.write_bank(8, 0x0000, 0x99);
        assert_eq!(mem.read_bank(8, 0x0000), 0);
    }

    #[test]
    fn load_truncates_at_top_of_bank() {
        let mut mem = BankedMemory::new();
        mem.switch_bank(1);
        let copied = mem.load_bytes(&[1, 2, 3, 4], 0xFFFE);
        assert_eq!(copied, 2);
        assert_eq!(mem.read_byte(0xFFFE), 1);
        assert_eq!(mem.read_byte(0xFFFF), 2);
        assert_eq!(mem.read_byte(0x0000), 0);
        assert_eq!(mem.read_bank(0, 0xFFFE), 0);
    }

    #[test]
    fn clear_zeroes_all_banks() {
        let mut mem = BankedMemory::new();
        for bank in 0..NUM_BANKS {
            mem.write_bank(bank, 0x0100, bank as u8 + 1);
        }
        mem.switch_bank(4);
        mem.clear();
        assert_eq!(mem.current_bank(), 0);
        for bank in 0..NUM_BANKS {
            assert_eq!(mem.read_bank(bank, 0x0100), 0);
        }
    }

    #[test]
    fn hex_dump_rows() {
        let mut mem = BankedMemory::new();
        mem.load_bytes(&[0xDE, 0xAD, 0xBE, 0xEF], 0x0010);
        let dump = hex_dump(&mem, 0x0010, 2);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0010: DE AD BE EF 00"));
        assert!(lines[1].starts_with("0020: 00"));
        assert_eq!(lines[0].len(), 5 + 16 * 3);
    }
}
