use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use i8085::io::{CONSOLE_IN_PORT, CONSOLE_OUT_PORT, UNCONNECTED_PORT};
use i8085::{hex_dump, Cpu8085};

use crate::config::MonitorConfig;

/// Byte the BIOS line editor treats as backspace.
const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7F;

/// Terminal attached to the console ports.
///
/// Port 0 hands out queued keystrokes one at a time (0 once the queue is
/// empty), port 1 collects whatever the program prints.
#[derive(Debug, Default)]
pub struct Console {
    input: VecDeque<u8>,
    output: Vec<u8>,
    echo: bool,
}

impl Console {
    pub fn new(echo: bool) -> Self {
        Self {
            echo,
            ..Self::default()
        }
    }

    /// Queue keystrokes. Line feeds become CR and DEL becomes backspace;
    /// a CR LF pair is queued as a single CR.
    pub fn push_input(&mut self, bytes: &[u8]) {
        let mut iter = bytes.iter().copied().peekable();
        while let Some(b) = iter.next() {
            match b {
                b'\r' if iter.peek() == Some(&b'\n') => {}
                b'\n' => self.input.push_back(b'\r'),
                DELETE => self.input.push_back(BACKSPACE),
                _ => self.input.push_back(b),
            }
        }
    }

    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.output.clear();
    }

    fn read_port(&mut self, port: u8) -> u8 {
        if port != CONSOLE_IN_PORT {
            return UNCONNECTED_PORT;
        }
        match self.input.pop_front() {
            Some(b) => {
                if self.echo {
                    self.output.push(b);
                }
                b
            }
            None => 0,
        }
    }

    fn write_port(&mut self, port: u8, value: u8) {
        if port == CONSOLE_OUT_PORT {
            self.output.push(value);
        } else {
            log::trace!("OUT {:02X} <- {:02X} dropped", port, value);
        }
    }
}

/// Result of [`MonitorMachine::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Instructions executed by this call.
    pub steps: u64,
    pub halted: bool,
}

/// The CPU wired to a console, with a BIOS image kept around for reset.
pub struct MonitorMachine {
    cpu: Cpu8085,
    console: Rc<RefCell<Console>>,
    config: MonitorConfig,
    bios: Option<Vec<u8>>,
    total_steps: u64,
}

impl MonitorMachine {
    /// Build the machine and load whatever images the configuration names.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let console = Rc::new(RefCell::new(Console::new(config.echo_input)));
        let mut cpu = Cpu8085::new();
        let reader = Rc::clone(&console);
        let writer = Rc::clone(&console);
        cpu.set_io_callbacks(
            move |port| reader.borrow_mut().read_port(port),
            move |port, value| writer.borrow_mut().write_port(port, value),
        );
        let io = cpu.io_mut();
        log::debug!(
            "console attached (read handler: {}, write handler: {})",
            io.has_read(),
            io.has_write()
        );

        let mut machine = Self {
            cpu,
            console,
            config,
            bios: None,
            total_steps: 0,
        };

        if let Some(path) = machine.config.bios.clone() {
            machine.load_bios(&path)?;
        }
        if let Some(path) = machine.config.program.clone() {
            machine.load_program(&path, machine.config.program_address)?;
        }
        Ok(machine)
    }

    pub fn cpu(&self) -> &Cpu8085 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu8085 {
        &mut self.cpu
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Read a BIOS image from disk and install it at 0x0000.
    pub fn load_bios(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let image =
            std::fs::read(path).with_context(|| format!("failed to read BIOS '{}'", path.display()))?;
        if image.is_empty() {
            bail!("BIOS '{}' is empty", path.display());
        }
        log::info!("BIOS '{}' ({} bytes)", path.display(), image.len());
        Ok(self.load_bios_bytes(image))
    }

    /// Install a BIOS image at 0x0000 in bank 0 and point PC at it. The image
    /// is kept so [`reset`](Self::reset) can reinstall it.
    ///
    /// Bank 0 is left active so the next fetch comes from the BIOS.
    pub fn load_bios_bytes(&mut self, image: Vec<u8>) -> usize {
        if self.cpu.current_bank() != 0 {
            log::debug!("switching from bank {} to bank 0 for BIOS", self.cpu.current_bank());
            self.cpu.switch_bank(0);
        }
        let copied = self.cpu.load_program(&image, 0x0000);
        self.bios = Some(image);
        copied
    }

    /// Load a user program into the active bank at `address`.
    ///
    /// Without a BIOS there is nothing to jump to the program, so PC is
    /// pointed at it directly.
    pub fn load_program(&mut self, path: impl AsRef<Path>, address: u16) -> Result<usize> {
        let copied = self.cpu.load_binary(path, address)?;
        if self.bios.is_none() {
            self.cpu.regs.pc = address;
        }
        Ok(copied)
    }

    /// Reset the CPU and console, then reinstall the BIOS.
    ///
    /// Memory is wiped by the CPU reset, so a previously loaded program is
    /// gone afterwards.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.console.borrow_mut().clear();
        self.total_steps = 0;
        if let Some(image) = self.bios.take() {
            self.load_bios_bytes(image);
        }
        log::info!("machine reset");
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.console.borrow_mut().push_input(bytes);
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        self.console.borrow_mut().take_output()
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Instructions executed since construction or the last reset.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    fn budget_left(&self) -> Option<u64> {
        self.config
            .max_steps
            .map(|max| max.saturating_sub(self.total_steps))
    }

    /// Execute up to `steps_per_slice` instructions, stopping early on HLT or
    /// when the step budget runs out. Returns the number executed.
    pub fn run_slice(&mut self) -> u32 {
        let mut limit = self.config.steps_per_slice;
        if let Some(left) = self.budget_left() {
            limit = limit.min(u32::try_from(left).unwrap_or(u32::MAX));
        }

        let mut executed = 0;
        while executed < limit && self.cpu.step() {
            executed += 1;
        }
        self.total_steps += u64::from(executed);
        executed
    }

    /// Run slices until the CPU halts or the step budget is spent.
    pub fn run(&mut self) -> RunOutcome {
        let mut steps = 0u64;
        while !self.cpu.is_halted() {
            let executed = self.run_slice();
            if executed == 0 {
                break;
            }
            steps += u64::from(executed);
        }

        let halted = self.cpu.is_halted();
        if halted {
            log::info!("halted at {:04X} after {} steps", self.cpu.regs.pc, steps);
        } else {
            log::info!("stopped after {} steps (budget exhausted)", steps);
        }
        RunOutcome { steps, halted }
    }

    /// `rows` lines of 16 bytes from the active bank.
    pub fn dump(&self, start: u16, rows: usize) -> String {
        hex_dump(self.cpu.memory(), start, rows)
    }

    /// Registers, flags and active bank as text.
    pub fn snapshot(&self) -> String {
        format!(
            "{}\n{}\nBANK:{}{}",
            self.cpu.register_state(),
            self.cpu.flags_state(),
            self.cpu.current_bank(),
            if self.cpu.is_halted() { " HALTED" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with_bios(bios: &[u8]) -> MonitorMachine {
        let mut machine = MonitorMachine::new(MonitorConfig::default()).unwrap();
        machine.load_bios_bytes(bios.to_vec());
        machine
    }

    // IN 0 ; ORA A ; JZ 000B ; OUT 1 ; JMP 0000 ; HLT
    const ECHO_BIOS: [u8; 12] = [
        0xDB, 0x00, 0xB7, 0xCA, 0x0B, 0x00, 0xD3, 0x01, 0xC3, 0x00, 0x00, 0x76,
    ];

    #[test]
    fn console_translates_line_endings_and_delete() {
        let mut console = Console::new(false);
        console.push_input(b"a\nb\r\nc\x7f");
        let queued: Vec<u8> = std::iter::from_fn(|| console.input.pop_front()).collect();
        assert_eq!(queued, b"a\rb\rc\x08");
    }

    #[test]
    fn console_ports() {
        let mut console = Console::new(false);
        assert_eq!(console.read_port(0), 0);
        console.push_input(b"x");
        assert_eq!(console.read_port(5), 0xFF);
        assert_eq!(console.pending_input(), 1);
        assert_eq!(console.read_port(0), b'x');
        assert_eq!(console.read_port(0), 0);

        console.write_port(1, b'o');
        console.write_port(2, b'?');
        assert_eq!(console.take_output(), b"o");
        assert!(console.take_output().is_empty());
    }

    #[test]
    fn echoes_console_input_to_output() {
        let mut machine = machine_with_bios(&ECHO_BIOS);
        machine.push_input(b"hi\n");
        let outcome = machine.run();
        assert!(outcome.halted);
        assert_eq!(machine.take_output(), b"hi\r");
    }

    #[test]
    fn echo_input_duplicates_consumed_bytes() {
        let config = MonitorConfig::builder().echo_input(true).build();
        let mut machine = MonitorMachine::new(config).unwrap();
        machine.load_bios_bytes(ECHO_BIOS.to_vec());
        machine.push_input(b"ok");
        machine.run();
        assert_eq!(machine.take_output(), b"ookk");
    }

    #[test]
    fn unconnected_port_reads_ff() {
        // IN 7 ; HLT
        let mut machine = machine_with_bios(&[0xDB, 0x07, 0x76]);
        machine.run();
        assert_eq!(machine.cpu().regs.a, 0xFF);
    }

    #[test]
    fn bank_switch_port_is_not_console_output() {
        // MVI A,1 ; OUT FE ; continues in bank 1 at 0004
        let mut machine = machine_with_bios(&[0x3E, 0x01, 0xD3, 0xFE]);
        // bank 1: MVI A,'B' ; OUT 1 ; HLT
        for (i, b) in [0x3E, b'B', 0xD3, 0x01, 0x76].iter().enumerate() {
            machine.cpu_mut().write_bank(1, 4 + i as u16, *b);
        }
        let outcome = machine.run();
        assert!(outcome.halted);
        assert_eq!(outcome.steps, 5);
        assert_eq!(machine.cpu().current_bank(), 1);
        assert_eq!(machine.take_output(), b"B");
    }

    #[test]
    fn slices_are_bounded() {
        let config = MonitorConfig::builder().steps_per_slice(10).build();
        let mut machine = MonitorMachine::new(config).unwrap();
        machine.load_bios_bytes(vec![0xC3, 0x00, 0x00]);
        assert_eq!(machine.run_slice(), 10);
        assert_eq!(machine.run_slice(), 10);
        assert_eq!(machine.total_steps(), 20);
    }

    #[test]
    fn budget_stops_endless_loop() {
        let config = MonitorConfig::builder()
            .steps_per_slice(7)
            .max_steps(100)
            .build();
        let mut machine = MonitorMachine::new(config).unwrap();
        machine.load_bios_bytes(vec![0xC3, 0x00, 0x00]);
        let outcome = machine.run();
        assert_eq!(
            outcome,
            RunOutcome {
                steps: 100,
                halted: false
            }
        );
        assert_eq!(machine.run(), RunOutcome { steps: 0, halted: false });
    }

    #[test]
    fn reset_reinstalls_bios() {
        let mut machine = machine_with_bios(&[0x3E, 0x2A, 0x76]);
        machine.cpu_mut().write_byte(0x3000, 0x55);
        machine.push_input(b"pending");
        machine.run();
        assert_eq!(machine.cpu().regs.a, 0x2A);

        machine.reset();
        assert!(!machine.is_halted());
        assert_eq!(machine.total_steps(), 0);
        assert_eq!(machine.cpu().regs.pc, 0x0000);
        assert_eq!(machine.cpu().regs.a, 0x00);
        assert_eq!(machine.cpu().read_byte(0x0001), 0x2A);
        assert_eq!(machine.cpu().read_byte(0x3000), 0x00);
        assert_eq!(machine.console.borrow().pending_input(), 0);

        assert!(machine.run().halted);
        assert_eq!(machine.cpu().regs.a, 0x2A);
    }

    #[test]
    fn bios_goes_to_bank_zero() {
        let mut machine = MonitorMachine::new(MonitorConfig::default()).unwrap();
        machine.cpu_mut().switch_bank(4);
        machine.load_bios_bytes(vec![0x76]);
        assert_eq!(machine.cpu().current_bank(), 0);
        assert_eq!(machine.cpu().read_bank(0, 0x0000), 0x76);
        assert_eq!(machine.cpu().read_bank(4, 0x0000), 0x00);
    }

    #[test]
    fn bios_runs_after_loading_from_another_bank() {
        let mut machine = MonitorMachine::new(MonitorConfig::default()).unwrap();
        machine.cpu_mut().switch_bank(3);
        // bank 3 at 0000: HLT, which would stop the CPU before the BIOS runs
        machine.cpu_mut().write_bank(3, 0x0000, 0x76);
        // MVI A,2A ; HLT
        machine.load_bios_bytes(vec![0x3E, 0x2A, 0x76]);
        let outcome = machine.run();
        assert_eq!(outcome, RunOutcome { steps: 2, halted: true });
        assert_eq!(machine.cpu().regs.a, 0x2A);
        assert_eq!(machine.cpu().current_bank(), 0);
    }

    #[test]
    fn console_stays_wired_across_reset() {
        let mut machine = machine_with_bios(&ECHO_BIOS);
        assert!(machine.cpu_mut().io_mut().has_read());
        assert!(machine.cpu_mut().io_mut().has_write());

        machine.reset();
        assert!(machine.cpu_mut().io_mut().has_read());
        assert!(machine.cpu_mut().io_mut().has_write());
        machine.push_input(b"z");
        assert!(machine.run().halted);
        assert_eq!(machine.take_output(), b"z");
    }

    #[test]
    fn dump_reads_active_bank() {
        let mut machine = machine_with_bios(&[0x76, 0x01, 0x02]);
        machine.cpu_mut().write_bank(1, 0x0000, 0xEE);
        assert!(machine.dump(0x0000, 1).starts_with("0000: 76 01 02 00"));
        machine.cpu_mut().switch_bank(1);
        assert!(machine.dump(0x0000, 1).starts_with("0000: EE 00"));
        assert_eq!(machine.dump(0xFFF0, 2).lines().nth(1), machine.dump(0x0000, 1).lines().next());
    }

    #[test]
    fn snapshot_summarises_state() {
        let mut machine = machine_with_bios(&[0x37, 0x76]);
        machine.run();
        assert_eq!(
            machine.snapshot(),
            "A:00 B:00 C:00 D:00 E:00 H:00 L:00\nSP:FFFF PC:0002\n\
             S:0 Z:0 AC:0 P:0 CY:1\nBANK:0 HALTED"
        );
    }
}
