use std::io::{IsTerminal, Read, Write};

use anyhow::{Context, Result};
use i8085_monitor::config::USAGE;
use i8085_monitor::{MonitorConfig, MonitorMachine};

const DUMP_ROWS: usize = 8;

fn main() {
    env_logger::init();

    let config = MonitorConfig::from_args(std::env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err:#}\n{USAGE}");
        std::process::exit(2);
    });

    if let Err(err) = run(config) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(config: MonitorConfig) -> Result<()> {
    let mut machine = MonitorMachine::new(config)?;

    // Piped stdin becomes console keystrokes; an interactive terminal is left alone.
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        let mut input = Vec::new();
        stdin
            .lock()
            .read_to_end(&mut input)
            .context("failed to read console input from stdin")?;
        log::info!("queued {} bytes of console input", input.len());
        machine.push_input(&input);
    }

    let outcome = machine.run();

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&machine.take_output())
        .context("failed to write console output")?;
    writeln!(stdout).context("failed to write console output")?;
    writeln!(stdout, "{}", machine.snapshot()).context("failed to write snapshot")?;
    if let Some(start) = machine.config().dump {
        writeln!(stdout, "{}", machine.dump(start, DUMP_ROWS)).context("failed to write dump")?;
    }

    if !outcome.halted {
        log::warn!("CPU still running after {} steps", outcome.steps);
    }
    Ok(())
}
