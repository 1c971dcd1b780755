use anyhow::{Context, Result};

const USAGE: &str = "usage: i8085_asm <input.asm> <output.bin> [--symbols]";

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let symbols = args.iter().any(|a| a == "--symbols");
    let paths: Vec<&String> = args.iter().filter(|a| *a != "--symbols").collect();
    let [input, output] = paths.as_slice() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if let Err(err) = run(input, output, symbols) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(input: &str, output: &str, symbols: bool) -> Result<()> {
    let assembly = i8085_asm::assemble_file(input)?;
    std::fs::write(output, &assembly.bytes)
        .with_context(|| format!("Failed to write image {}", output))?;
    println!(
        "{}: {} bytes at {:#06X}",
        output,
        assembly.bytes.len(),
        assembly.origin
    );
    if symbols {
        for (name, value) in assembly.symbols.iter() {
            println!("{:<16} {:04X}", name, value);
        }
    }
    Ok(())
}
