//! Line-level parsing: comments, labels, directives and raw operands.

use anyhow::{bail, Context, Result};

/// An operand value before symbol resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Number(u32),
    /// Upper-cased symbol name.
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataItem {
    Text(Vec<u8>),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Org(Value),
    Equ(String, Value),
    Db(Vec<DataItem>),
    Dw(Vec<Value>),
    End,
    Instruction {
        mnemonic: String,
        operands: Vec<String>,
    },
}

/// One source line after parsing. `number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub number: usize,
    pub label: Option<String>,
    pub statement: Option<Statement>,
}

/// Byte offset of the first `needle` outside a quoted string.
fn find_unquoted(text: &str, needle: char) -> Option<usize> {
    let mut quote = None;
    for (i, ch) in text.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '\'' || ch == '"' => quote = Some(ch),
            None if ch == needle => return Some(i),
            None => {}
        }
    }
    None
}

fn strip_comment(text: &str) -> &str {
    match find_unquoted(text, ';') {
        Some(at) => &text[..at],
        None => text,
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Split an operand field on commas that are not inside quotes.
pub fn split_operands(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut rest = text.trim();
    if rest.is_empty() {
        return items;
    }
    while let Some(at) = find_unquoted(rest, ',') {
        items.push(rest[..at].trim().to_string());
        rest = &rest[at + 1..];
    }
    items.push(rest.trim().to_string());
    items
}

fn parse_radix(digits: &str, radix: u32, text: &str) -> Result<u32> {
    u32::from_str_radix(digits, radix).with_context(|| format!("invalid number '{}'", text))
}

/// Parse a numeric literal, a character literal or a symbol reference.
///
/// Numbers are decimal, `0x1F`, `1Fh` or `1010b`. A name like `FFh` parses
/// as a symbol and falls back to hex at resolution time.
pub fn parse_value(text: &str) -> Result<Value> {
    let text = text.trim();
    if text.is_empty() {
        bail!("missing value");
    }

    if let Some(quote) = text.chars().next().filter(|c| *c == '\'' || *c == '"') {
        let inner = text
            .strip_prefix(quote)
            .and_then(|t| t.strip_suffix(quote))
            .with_context(|| format!("unterminated character literal {}", text))?;
        let mut chars = inner.chars();
        return match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii() => Ok(Value::Number(c as u32)),
            _ => bail!("character literal {} must hold one ASCII character", text),
        };
    }

    if text.starts_with(|c: char| c.is_ascii_digit()) {
        let upper = text.to_ascii_uppercase();
        let number = if let Some(hex) = upper.strip_prefix("0X") {
            parse_radix(hex, 16, text)?
        } else if let Some(hex) = upper.strip_suffix('H') {
            parse_radix(hex, 16, text)?
        } else if let Some(bin) = upper.strip_suffix('B') {
            parse_radix(bin, 2, text)?
        } else {
            parse_radix(&upper, 10, text)?
        };
        return Ok(Value::Number(number));
    }

    if is_identifier(text) {
        return Ok(Value::Symbol(text.to_ascii_uppercase()));
    }
    bail!("invalid value '{}'", text)
}

fn parse_data_items(operands: &str) -> Result<Vec<DataItem>> {
    let mut items = Vec::new();
    for item in split_operands(operands) {
        if let Some(quote) = item.chars().next().filter(|c| *c == '\'' || *c == '"') {
            let inner = item
                .strip_prefix(quote)
                .and_then(|t| t.strip_suffix(quote))
                .with_context(|| format!("unterminated string {}", item))?;
            items.push(DataItem::Text(inner.as_bytes().to_vec()));
        } else {
            items.push(DataItem::Value(parse_value(&item)?));
        }
    }
    if items.is_empty() {
        bail!("DB needs at least one value");
    }
    Ok(items)
}

fn split_head(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(at) => (&text[..at], text[at..].trim()),
        None => (text, ""),
    }
}

pub fn parse_line(text: &str, number: usize) -> Result<Line> {
    let mut rest = strip_comment(text).trim();
    let mut label = None;

    if let Some(at) = find_unquoted(rest, ':') {
        let name = rest[..at].trim();
        if is_identifier(name) {
            label = Some(name.to_ascii_uppercase());
            rest = rest[at + 1..].trim();
        }
    }

    if rest.is_empty() {
        return Ok(Line {
            number,
            label,
            statement: None,
        });
    }

    let (head, tail) = split_head(rest);
    let (second, after_second) = split_head(tail);

    // NAME EQU value
    if second.eq_ignore_ascii_case("EQU") {
        if !is_identifier(head) {
            bail!("invalid EQU name '{}'", head);
        }
        let value = parse_value(after_second)?;
        return Ok(Line {
            number,
            label,
            statement: Some(Statement::Equ(head.to_ascii_uppercase(), value)),
        });
    }

    let mnemonic = head.to_ascii_uppercase();
    let statement = match mnemonic.as_str() {
        // NAME: EQU value
        "EQU" => {
            let name = label.take().context("EQU without a name")?;
            Some(Statement::Equ(name, parse_value(tail)?))
        }
        "ORG" => Some(Statement::Org(parse_value(tail)?)),
        "DB" => Some(Statement::Db(parse_data_items(tail)?)),
        "DW" => {
            let values = split_operands(tail)
                .iter()
                .map(|v| parse_value(v))
                .collect::<Result<Vec<_>>>()?;
            if values.is_empty() {
                bail!("DW needs at least one value");
            }
            Some(Statement::Dw(values))
        }
        "END" => Some(Statement::End),
        "CPU" => None,
        _ => Some(Statement::Instruction {
            mnemonic,
            operands: split_operands(tail),
        }),
    };

    Ok(Line {
        number,
        label,
        statement,
    })
}
