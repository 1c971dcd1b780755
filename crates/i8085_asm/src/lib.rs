//! Two-pass assembler for 8085 source.
//!
//! Pass one parses every line, assigns addresses to labels and evaluates
//! `EQU`/`ORG`. Pass two encodes instructions and data into a flat image
//! that starts at the first emitted address. Assembly stops at `END`.

pub mod encoder;
pub mod parser;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::encoder::Kind;
use crate::parser::{DataItem, Line, Statement, Value};

/// Labels and `EQU` constants, keyed by upper-cased name.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, u32>,
}

impl SymbolTable {
    pub fn define(&mut self, name: &str, value: u32) -> Result<()> {
        if self.symbols.contains_key(name) {
            bail!("symbol '{}' is defined twice", name);
        }
        self.symbols.insert(name.to_string(), value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<u32> {
        self.symbols.get(&name.to_ascii_uppercase()).copied()
    }

    /// Resolve a value. An undefined name such as `FFH` is read as hex.
    pub fn resolve(&self, value: &Value) -> Result<u32> {
        match value {
            Value::Number(n) => Ok(*n),
            Value::Symbol(name) => {
                if let Some(v) = self.symbols.get(name) {
                    return Ok(*v);
                }
                name.strip_suffix('H')
                    .filter(|digits| {
                        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit())
                    })
                    .and_then(|digits| u32::from_str_radix(digits, 16).ok())
                    .with_context(|| format!("undefined symbol '{}'", name))
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Assembled image plus the symbols that produced it.
#[derive(Debug, Clone)]
pub struct Assembly {
    /// Address of `bytes[0]`.
    pub origin: u16,
    pub bytes: Vec<u8>,
    pub symbols: SymbolTable,
}

impl Assembly {
    /// Image padded with zeros from address 0, for loading as a BIOS.
    pub fn to_image_from_zero(&self) -> Vec<u8> {
        let mut image = vec![0; usize::from(self.origin)];
        image.extend_from_slice(&self.bytes);
        image
    }
}

fn address(symbols: &SymbolTable, value: &Value) -> Result<u32> {
    let addr = symbols.resolve(value)?;
    if addr > 0xFFFF {
        bail!("address {:#X} is outside the 64 KiB space", addr);
    }
    Ok(addr)
}

fn data_size(items: &[DataItem]) -> u32 {
    items
        .iter()
        .map(|item| match item {
            DataItem::Text(text) => text.len() as u32,
            DataItem::Value(_) => 1,
        })
        .sum()
}

fn instruction_kind(mnemonic: &str) -> Result<Kind> {
    encoder::kind(mnemonic).with_context(|| format!("unknown mnemonic '{}'", mnemonic))
}

/// Size in bytes a statement occupies.
fn statement_size(statement: &Statement) -> Result<u32> {
    Ok(match statement {
        Statement::Db(items) => data_size(items),
        Statement::Dw(values) => 2 * values.len() as u32,
        Statement::Instruction { mnemonic, .. } => u32::from(instruction_kind(mnemonic)?.size()),
        Statement::Org(_) | Statement::Equ(..) | Statement::End => 0,
    })
}

fn parse_source(source: &str) -> Result<Vec<Line>> {
    let mut lines = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let line = parser::parse_line(text, index + 1)
            .with_context(|| format!("line {}: {}", index + 1, text.trim()))?;
        let end = matches!(line.statement, Some(Statement::End));
        lines.push(line);
        if end {
            break;
        }
    }
    Ok(lines)
}

fn first_pass(lines: &[Line]) -> Result<SymbolTable> {
    let mut symbols = SymbolTable::default();
    let mut pc: u32 = 0;
    for line in lines {
        let context = || format!("line {}", line.number);
        if let Some(Statement::Org(value)) = &line.statement {
            pc = address(&symbols, value).with_context(context)?;
        }
        if let Some(label) = &line.label {
            symbols.define(label, pc).with_context(context)?;
        }
        match &line.statement {
            Some(Statement::Equ(name, value)) => {
                let value = symbols.resolve(value).with_context(context)?;
                symbols.define(name, value).with_context(context)?;
            }
            Some(statement) => {
                pc += statement_size(statement).with_context(context)?;
                if pc > 0x1_0000 {
                    bail!("line {}: code runs past 0xFFFF", line.number);
                }
            }
            None => {}
        }
    }
    Ok(symbols)
}

/// Output image being built by the second pass.
struct Image {
    origin: Option<u32>,
    bytes: Vec<u8>,
}

impl Image {
    fn end(&self) -> Option<u32> {
        self.origin.map(|o| o + self.bytes.len() as u32)
    }

    fn emit(&mut self, at: u32, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        match self.end() {
            None => self.origin = Some(at),
            Some(end) if at < end => {
                bail!("code at {:#06X} overlaps earlier output ending at {:#06X}", at, end)
            }
            Some(end) => self.bytes.resize(self.bytes.len() + (at - end) as usize, 0),
        }
        self.bytes.extend_from_slice(data);
        Ok(())
    }
}

fn encode_data(symbols: &SymbolTable, statement: &Statement) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match statement {
        Statement::Db(items) => {
            for item in items {
                match item {
                    DataItem::Text(text) => out.extend_from_slice(text),
                    DataItem::Value(value) => {
                        let v = symbols.resolve(value)?;
                        let byte = u8::try_from(v)
                            .map_err(|_| anyhow::anyhow!("DB value {:#X} does not fit in a byte", v))?;
                        out.push(byte);
                    }
                }
            }
        }
        Statement::Dw(values) => {
            for value in values {
                let v = symbols.resolve(value)?;
                let word = u16::try_from(v)
                    .map_err(|_| anyhow::anyhow!("DW value {:#X} does not fit in a word", v))?;
                out.extend_from_slice(&word.to_le_bytes());
            }
        }
        _ => {}
    }
    Ok(out)
}

fn second_pass(lines: &[Line], symbols: &SymbolTable) -> Result<Image> {
    let mut image = Image {
        origin: None,
        bytes: Vec::new(),
    };
    let mut pc: u32 = 0;
    for line in lines {
        let Some(statement) = &line.statement else {
            continue;
        };
        let context = || format!("line {}", line.number);
        let data = match statement {
            Statement::Org(value) => {
                pc = address(symbols, value).with_context(context)?;
                continue;
            }
            Statement::Equ(..) | Statement::End => continue,
            Statement::Db(_) | Statement::Dw(_) => {
                encode_data(symbols, statement).with_context(context)?
            }
            Statement::Instruction { mnemonic, operands } => {
                let kind = instruction_kind(mnemonic).with_context(context)?;
                encoder::encode(mnemonic, kind, operands, symbols)
                    .with_context(|| format!("line {}: {}", line.number, mnemonic))?
            }
        };
        image.emit(pc, &data).with_context(context)?;
        pc += data.len() as u32;
    }
    Ok(image)
}

pub fn assemble(source: &str) -> Result<Assembly> {
    let lines = parse_source(source)?;
    let symbols = first_pass(&lines)?;
    for (name, value) in symbols.iter() {
        debug!("symbol {} = {:#06X}", name, value);
    }
    let image = second_pass(&lines, &symbols)?;
    let origin = image.origin.unwrap_or(0) as u16;
    info!(
        "Assembled {} bytes at {:#06X} ({} symbols)",
        image.bytes.len(),
        origin,
        symbols.symbols.len()
    );
    Ok(Assembly {
        origin,
        bytes: image.bytes,
        symbols,
    })
}

pub fn assemble_file(path: impl AsRef<Path>) -> Result<Assembly> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source {}", path.display()))?;
    assemble(&source).with_context(|| format!("Failed to assemble {}", path.display()))
}
