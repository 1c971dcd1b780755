//! Mnemonic table and instruction encoding.
//!
//! Opcodes are built from the same bit fields the CPU decodes: a location
//! index B C D E H L M A (0-7), a register pair index BC DE HL SP (0-3), and
//! an ALU/condition index in bits 3-5.

use anyhow::{bail, Result};

use crate::parser::parse_value;
use crate::SymbolTable;

/// Operand shape of a mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Implied(u8),
    /// Single location operand, placed at `opcode | loc << shift`.
    Location { base: u8, shift: u8 },
    Move,
    MoveImmediate,
    /// LXI: pair (SP allowed) and a 16-bit immediate.
    PairImmediate,
    /// INX, DCX, DAD: pair with SP allowed.
    Pair(u8),
    /// PUSH, POP: pair with PSW in place of SP.
    Stack(u8),
    /// STAX, LDAX: BC or DE only.
    Indirect(u8),
    Immediate(u8),
    Address(u8),
    Restart,
}

impl Kind {
    pub fn size(self) -> u16 {
        match self {
            Kind::MoveImmediate | Kind::Immediate(_) => 2,
            Kind::PairImmediate | Kind::Address(_) => 3,
            _ => 1,
        }
    }
}

pub fn kind(mnemonic: &str) -> Option<Kind> {
    use Kind::*;
    let kind = match mnemonic {
        "NOP" => Implied(0x00),
        "RIM" => Implied(0x20),
        "SIM" => Implied(0x30),
        "HLT" => Implied(0x76),
        "RLC" => Implied(0x07),
        "RRC" => Implied(0x0F),
        "RAL" => Implied(0x17),
        "RAR" => Implied(0x1F),
        "DAA" => Implied(0x27),
        "CMA" => Implied(0x2F),
        "STC" => Implied(0x37),
        "CMC" => Implied(0x3F),
        "XCHG" => Implied(0xEB),
        "XTHL" => Implied(0xE3),
        "SPHL" => Implied(0xF9),
        "PCHL" => Implied(0xE9),
        "EI" => Implied(0xFB),
        "DI" => Implied(0xF3),
        "RET" => Implied(0xC9),
        "RNZ" => Implied(0xC0),
        "RZ" => Implied(0xC8),
        "RNC" => Implied(0xD0),
        "RC" => Implied(0xD8),
        "RPO" => Implied(0xE0),
        "RPE" => Implied(0xE8),
        "RP" => Implied(0xF0),
        "RM" => Implied(0xF8),

        "MOV" => Move,
        "MVI" => MoveImmediate,
        "INR" => Location { base: 0x04, shift: 3 },
        "DCR" => Location { base: 0x05, shift: 3 },
        "ADD" => Location { base: 0x80, shift: 0 },
        "ADC" => Location { base: 0x88, shift: 0 },
        "SUB" => Location { base: 0x90, shift: 0 },
        "SBB" => Location { base: 0x98, shift: 0 },
        "ANA" => Location { base: 0xA0, shift: 0 },
        "XRA" => Location { base: 0xA8, shift: 0 },
        "ORA" => Location { base: 0xB0, shift: 0 },
        "CMP" => Location { base: 0xB8, shift: 0 },

        "LXI" => PairImmediate,
        "INX" => Pair(0x03),
        "DCX" => Pair(0x0B),
        "DAD" => Pair(0x09),
        "PUSH" => Stack(0xC5),
        "POP" => Stack(0xC1),
        "STAX" => Indirect(0x02),
        "LDAX" => Indirect(0x0A),

        "ADI" => Immediate(0xC6),
        "ACI" => Immediate(0xCE),
        "SUI" => Immediate(0xD6),
        "SBI" => Immediate(0xDE),
        "ANI" => Immediate(0xE6),
        "XRI" => Immediate(0xEE),
        "ORI" => Immediate(0xF6),
        "CPI" => Immediate(0xFE),
        "IN" => Immediate(0xDB),
        "OUT" => Immediate(0xD3),

        "STA" => Address(0x32),
        "LDA" => Address(0x3A),
        "SHLD" => Address(0x22),
        "LHLD" => Address(0x2A),
        "JMP" => Address(0xC3),
        "JNZ" => Address(0xC2),
        "JZ" => Address(0xCA),
        "JNC" => Address(0xD2),
        "JC" => Address(0xDA),
        "JPO" => Address(0xE2),
        "JPE" => Address(0xEA),
        "JP" => Address(0xF2),
        "JM" => Address(0xFA),
        "CALL" => Address(0xCD),
        "CNZ" => Address(0xC4),
        "CZ" => Address(0xCC),
        "CNC" => Address(0xD4),
        "CC" => Address(0xDC),
        "CPO" => Address(0xE4),
        "CPE" => Address(0xEC),
        "CP" => Address(0xF4),
        "CM" => Address(0xFC),

        "RST" => Restart,
        _ => return None,
    };
    Some(kind)
}

fn location(name: &str) -> Result<u8> {
    Ok(match name.to_ascii_uppercase().as_str() {
        "B" => 0,
        "C" => 1,
        "D" => 2,
        "E" => 3,
        "H" => 4,
        "L" => 5,
        "M" => 6,
        "A" => 7,
        _ => bail!("expected register B C D E H L M or A, found '{}'", name),
    })
}

/// Pair index for `B`/`D`/`H` (or `BC`/`DE`/`HL`) and `last` (SP or PSW).
fn pair(name: &str, last: &str) -> Result<u8> {
    let upper = name.to_ascii_uppercase();
    Ok(match upper.as_str() {
        "B" | "BC" => 0,
        "D" | "DE" => 1,
        "H" | "HL" => 2,
        other if other == last => 3,
        _ => bail!("expected register pair B D H or {}, found '{}'", last, name),
    })
}

fn expect_operands<'a>(mnemonic: &str, operands: &'a [String], count: usize) -> Result<&'a [String]> {
    if operands.len() != count {
        bail!(
            "{} takes {} operand(s), found {}",
            mnemonic,
            count,
            operands.len()
        );
    }
    Ok(operands)
}

fn byte(symbols: &SymbolTable, text: &str) -> Result<u8> {
    let value = symbols.resolve(&parse_value(text)?)?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("value {:#X} does not fit in a byte", value))
}

fn word(symbols: &SymbolTable, text: &str) -> Result<[u8; 2]> {
    let value = symbols.resolve(&parse_value(text)?)?;
    let value =
        u16::try_from(value).map_err(|_| anyhow::anyhow!("value {:#X} does not fit in a word", value))?;
    Ok(value.to_le_bytes())
}

/// Encode one instruction. `operands` are raw operand strings.
pub fn encode(
    mnemonic: &str,
    kind: Kind,
    operands: &[String],
    symbols: &SymbolTable,
) -> Result<Vec<u8>> {
    let bytes = match kind {
        Kind::Implied(op) => {
            expect_operands(mnemonic, operands, 0)?;
            vec![op]
        }
        Kind::Location { base, shift } => {
            let ops = expect_operands(mnemonic, operands, 1)?;
            vec![base | location(&ops[0])? << shift]
        }
        Kind::Move => {
            let ops = expect_operands(mnemonic, operands, 2)?;
            let (dst, src) = (location(&ops[0])?, location(&ops[1])?);
            if dst == 6 && src == 6 {
                bail!("MOV M,M is not an instruction (that encoding is HLT)");
            }
            vec![0x40 | dst << 3 | src]
        }
        Kind::MoveImmediate => {
            let ops = expect_operands(mnemonic, operands, 2)?;
            vec![0x06 | location(&ops[0])? << 3, byte(symbols, &ops[1])?]
        }
        Kind::PairImmediate => {
            let ops = expect_operands(mnemonic, operands, 2)?;
            let [lo, hi] = word(symbols, &ops[1])?;
            vec![0x01 | pair(&ops[0], "SP")? << 4, lo, hi]
        }
        Kind::Pair(base) => {
            let ops = expect_operands(mnemonic, operands, 1)?;
            vec![base | pair(&ops[0], "SP")? << 4]
        }
        Kind::Stack(base) => {
            let ops = expect_operands(mnemonic, operands, 1)?;
            vec![base | pair(&ops[0], "PSW")? << 4]
        }
        Kind::Indirect(base) => {
            let ops = expect_operands(mnemonic, operands, 1)?;
            let index = pair(&ops[0], "SP")?;
            if index > 1 {
                bail!("{} only accepts B or D, found '{}'", mnemonic, ops[0]);
            }
            vec![base | index << 4]
        }
        Kind::Immediate(op) => {
            let ops = expect_operands(mnemonic, operands, 1)?;
            vec![op, byte(symbols, &ops[0])?]
        }
        Kind::Address(op) => {
            let ops = expect_operands(mnemonic, operands, 1)?;
            let [lo, hi] = word(symbols, &ops[0])?;
            vec![op, lo, hi]
        }
        Kind::Restart => {
            let ops = expect_operands(mnemonic, operands, 1)?;
            let vector = byte(symbols, &ops[0])?;
            if vector > 7 {
                bail!("RST vector must be 0-7, found {}", vector);
            }
            vec![0xC7 | vector << 3]
        }
    };
    debug_assert_eq!(bytes.len(), usize::from(kind.size()));
    Ok(bytes)
}
