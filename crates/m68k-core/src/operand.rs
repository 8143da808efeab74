//! Operand parsing: text -> tagged addressing-mode record.
//!
//! One variant per M68K addressing mode this system supports (§4.C). A
//! numeric or label value that can't be resolved at parse time (a label used
//! before its definition is seen) is carried alongside the kind as `label`;
//! pass 2 resolves it against the symbol table and substitutes the real
//! value before the EA engine or encoder ever look at the placeholder.

use crate::error::AssemblyError;

/// Which addressing mode an operand names, and its mode-specific payload.
///
/// Register numbers are 0..=7. Displacements are signed 16-bit. Absolute and
/// immediate values are stored at their full width regardless of the
/// instruction's eventual operand size; size-specific truncation happens at
/// encode/execute time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    DataRegDirect(u8),
    AddrRegDirect(u8),
    AddrRegIndirect(u8),
    PostIncrement(u8),
    PreDecrement(u8),
    Displacement16(u8, i16),
    AbsoluteShort(u16),
    AbsoluteLong(u32),
    Immediate(u32),
    PCRelative(i16),
    /// Resolved form of a label used as a branch target: the label's
    /// absolute address, substituted by the encoder once pass 2 knows every
    /// symbol. Never produced by the parser itself.
    PCRelativeTarget(u32),
}

/// A parsed operand: its addressing-mode tag plus an optional deferred label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operand {
    pub kind: OperandKind,
    pub label: Option<String>,
}

impl Operand {
    fn resolved(kind: OperandKind) -> Self {
        Self { kind, label: None }
    }
}

/// Parse one already-trimmed operand's textual form.
///
/// # Errors
/// Returns `AssemblyError::UnrecognizedOperand` if `text` doesn't match any
/// recognized syntax from §4.C.
pub fn parse_operand(line: usize, text: &str) -> Result<Operand, AssemblyError> {
    let trimmed = text.trim();
    let upper = trimmed.to_ascii_uppercase();

    if let Some(n) = data_register(&upper) {
        return Ok(Operand::resolved(OperandKind::DataRegDirect(n)));
    }
    if let Some(n) = address_register(&upper) {
        return Ok(Operand::resolved(OperandKind::AddrRegDirect(n)));
    }
    if let Some(rest) = trimmed.strip_prefix('#') {
        let value = parse_number(rest)
            .ok_or_else(|| unrecognized(line, text))?;
        return Ok(Operand::resolved(OperandKind::Immediate(value)));
    }
    if let Some(inner) = trimmed.strip_prefix("-(").and_then(|s| s.strip_suffix(')')) {
        let n = address_register(&inner.to_ascii_uppercase()).ok_or_else(|| unrecognized(line, text))?;
        return Ok(Operand::resolved(OperandKind::PreDecrement(n)));
    }
    if let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(")+")) {
        let n = address_register(&inner.to_ascii_uppercase()).ok_or_else(|| unrecognized(line, text))?;
        return Ok(Operand::resolved(OperandKind::PostIncrement(n)));
    }
    if let Some(label) = trimmed
        .strip_suffix("(PC)")
        .or_else(|| trimmed.strip_suffix("(pc)"))
    {
        return Ok(Operand {
            kind: OperandKind::PCRelative(0),
            label: Some(label.trim().to_string()),
        });
    }
    if let Some(inner) = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        let n = address_register(&inner.to_ascii_uppercase()).ok_or_else(|| unrecognized(line, text))?;
        return Ok(Operand::resolved(OperandKind::AddrRegIndirect(n)));
    }
    if let Some(open) = trimmed.find('(') {
        if trimmed.ends_with(')') {
            let (disp_text, rest) = trimmed.split_at(open);
            let reg_text = &rest[1..rest.len() - 1];
            let n = address_register(&reg_text.to_ascii_uppercase()).ok_or_else(|| unrecognized(line, text))?;
            let disp = parse_signed_16(disp_text).ok_or_else(|| unrecognized(line, text))?;
            return Ok(Operand::resolved(OperandKind::Displacement16(n, disp)));
        }
    }
    if let Some(value) = parse_number(trimmed) {
        return Ok(Operand::resolved(if value <= u32::from(u16::MAX) {
            OperandKind::AbsoluteShort(value as u16)
        } else {
            OperandKind::AbsoluteLong(value)
        }));
    }
    if is_label(trimmed) {
        // A bare label's address is unknown until pass 2; default to
        // absolute long so an eventual large address is never truncated.
        return Ok(Operand {
            kind: OperandKind::AbsoluteLong(0),
            label: Some(trimmed.to_string()),
        });
    }

    Err(unrecognized(line, text))
}

fn unrecognized(line: usize, text: &str) -> AssemblyError {
    AssemblyError::UnrecognizedOperand {
        line,
        text: text.to_string(),
    }
}

fn data_register(upper: &str) -> Option<u8> {
    single_register(upper, 'D')
}

fn address_register(upper: &str) -> Option<u8> {
    single_register(upper, 'A')
}

fn single_register(upper: &str, letter: char) -> Option<u8> {
    let mut chars = upper.chars();
    if chars.next()? != letter {
        return None;
    }
    let rest: String = chars.collect();
    if rest.len() != 1 {
        return None;
    }
    let n: u8 = rest.parse().ok()?;
    (n <= 7).then_some(n)
}

fn parse_signed_16(text: &str) -> Option<i16> {
    let trimmed = text.trim();
    if let Some(hex) = trimmed.strip_prefix('$') {
        i64::from_str_radix(hex, 16).ok().map(|v| v as i16)
    } else {
        trimmed.parse::<i16>().ok()
    }
}

fn parse_number(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if let Some(hex) = trimmed.strip_prefix('$') {
        u32::from_str_radix(hex, 16).ok()
    } else {
        trimmed.parse::<u32>().ok()
    }
}

fn is_label(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
