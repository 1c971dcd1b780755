use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use typed_builder::TypedBuilder;

/// Address user programs are loaded at unless told otherwise.
pub const DEFAULT_PROGRAM_ADDRESS: u16 = 0x2000;
/// Instructions executed per call to `MonitorMachine::run_slice`.
pub const DEFAULT_STEPS_PER_SLICE: u32 = 1000;

pub const USAGE: &str =
    "Usage: i8085_monitor <bios.bin> [program.bin [load_addr_hex]] [--max-steps N] [--echo] [--dump ADDR_HEX]";

#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct MonitorConfig {
    /// BIOS image, loaded at 0x0000 with PC pointing at it.
    #[builder(default, setter(strip_option, into))]
    pub bios: Option<PathBuf>,
    #[builder(default, setter(strip_option, into))]
    pub program: Option<PathBuf>,
    #[builder(default = DEFAULT_PROGRAM_ADDRESS)]
    pub program_address: u16,
    #[builder(default = DEFAULT_STEPS_PER_SLICE)]
    pub steps_per_slice: u32,
    /// Total instruction budget across all slices; `None` runs until HLT.
    #[builder(default, setter(strip_option))]
    pub max_steps: Option<u64>,
    /// Copy every console byte the program reads back into the output.
    #[builder(default = false)]
    pub echo_input: bool,
    /// Print a hex dump of the active bank from this address after the run.
    #[builder(default, setter(strip_option))]
    pub dump: Option<u16>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MonitorConfig {
    /// Parse command line arguments (program name already stripped).
    pub fn from_args(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut config = Self::default();
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--max-steps" => {
                    let value = args.next().context("--max-steps needs a value")?;
                    let steps = value
                        .parse()
                        .with_context(|| format!("invalid --max-steps '{}'", value))?;
                    config.max_steps = Some(steps);
                }
                "--echo" => config.echo_input = true,
                "--dump" => {
                    let value = args.next().context("--dump needs an address")?;
                    config.dump = Some(parse_hex_address(&value)?);
                }
                flag if flag.starts_with("--") => bail!("unknown option '{}'", flag),
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let Some(bios) = positional.next() else {
            bail!("missing BIOS path");
        };
        config.bios = Some(PathBuf::from(bios));
        config.program = positional.next().map(PathBuf::from);
        if let Some(addr) = positional.next() {
            config.program_address = parse_hex_address(&addr)?;
        }
        if let Some(extra) = positional.next() {
            bail!("unexpected argument '{}'", extra);
        }

        Ok(config)
    }
}

/// Parse `2000`, `0x2000` or `2000h` as a 16-bit address.
fn parse_hex_address(text: &str) -> Result<u16> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .or_else(|| text.strip_suffix('h'))
        .or_else(|| text.strip_suffix('H'))
        .unwrap_or(text);
    u16::from_str_radix(digits, 16).with_context(|| format!("invalid load address '{}'", text))
}
