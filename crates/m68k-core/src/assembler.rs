//! Two-pass assembler driver (§4.E, §6 source-file grammar).
//!
//! Pass 1 walks the source once, stripping comments/labels and asking the
//! sizer how many bytes each line will occupy, to populate the symbol table
//! with every label's final address. Pass 2 walks it again, this time
//! parsing operands for real and asking the encoder to write bytes — by
//! then every label pass 2 might reference has already been recorded.

use log::warn;

use crate::ea::Size;
use crate::encoder;
use crate::error::AssemblyError;
use crate::memory::Memory;
use crate::operand::{parse_operand, Operand};
use crate::sizer::instruction_size;
use crate::source_map::SourceMap;
use crate::symbol::SymbolTable;

const DEFAULT_SIZE: Size = Size::Word;

/// Result of assembling a source program: where execution should start, and
/// any errors accumulated along the way (assembly does not stop at the
/// first one — §7).
pub struct AssembledProgram {
    pub start_address: u32,
    pub symbols: SymbolTable,
    pub source_map: SourceMap,
    pub errors: Vec<AssemblyError>,
}

struct Line<'a> {
    number: usize,
    label: Option<&'a str>,
    mnemonic: Option<&'a str>,
    size: Size,
    operand_text: Vec<&'a str>,
}

/// Strip a trailing `;` comment and a leading `*` full-line comment, split
/// off an optional `label:` prefix, then split the remaining mnemonic and
/// comma-separated operand text.
fn parse_line(number: usize, raw: &str) -> Option<Line<'_>> {
    let without_star_comment = if raw.trim_start().starts_with('*') {
        return None;
    } else {
        raw
    };

    let code = match without_star_comment.find(';') {
        Some(idx) => &without_star_comment[..idx],
        None => without_star_comment,
    };
    let code = code.trim();
    if code.is_empty() {
        return None;
    }

    let (label, rest) = match code.find(':') {
        Some(idx) => (Some(code[..idx].trim()), code[idx + 1..].trim()),
        None => (None, code),
    };
    if rest.is_empty() {
        return Some(Line {
            number,
            label,
            mnemonic: None,
            size: DEFAULT_SIZE,
            operand_text: Vec::new(),
        });
    }

    let (mnem_token, operand_str) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };
    let (base, size) = split_size_suffix(mnem_token);
    let operand_text = if operand_str.is_empty() {
        Vec::new()
    } else {
        operand_str.split(',').map(str::trim).collect()
    };

    Some(Line {
        number,
        label,
        mnemonic: Some(base),
        size,
        operand_text,
    })
}

fn split_size_suffix(token: &str) -> (&str, Size) {
    if token.len() > 2 {
        if let Some(prefix) = token.strip_suffix(".B").or_else(|| token.strip_suffix(".b")) {
            return (prefix, Size::Byte);
        }
        if let Some(prefix) = token.strip_suffix(".W").or_else(|| token.strip_suffix(".w")) {
            return (prefix, Size::Word);
        }
        if let Some(prefix) = token.strip_suffix(".L").or_else(|| token.strip_suffix(".l")) {
            return (prefix, Size::Long);
        }
    }
    (token, DEFAULT_SIZE)
}

fn parse_operands(line_no: usize, text: &[&str]) -> Result<Vec<Operand>, AssemblyError> {
    text.iter().map(|t| parse_operand(line_no, t)).collect()
}

/// Assemble `source` into `mem` starting at `load_address`, unless the
/// source's first `ORG` overrides it (§4.E).
#[must_use]
pub fn assemble(source: &str, load_address: u32, mem: &mut Memory) -> AssembledProgram {
    let lines: Vec<Line<'_>> = source
        .lines()
        .enumerate()
        .filter_map(|(i, raw)| parse_line(i + 1, raw))
        .collect();

    let mut symbols = SymbolTable::new();
    let mut errors = Vec::new();

    // Pass 1: sizes and label addresses.
    let mut address = load_address;
    let mut org_seen = false;
    for line in &lines {
        if let Some(label) = line.label {
            symbols.insert(label, address);
        }
        match line.mnemonic {
            Some("ORG") => {
                if let Some(text) = line.operand_text.first() {
                    if let Some(v) = parse_org(text) {
                        if !org_seen {
                            address = v;
                            org_seen = true;
                        } else {
                            address = v;
                        }
                    }
                }
            }
            Some(mnemonic) => match parse_operands(line.number, &line.operand_text) {
                Ok(operands) => {
                    match instruction_size(line.number, mnemonic, matches!(line.size, Size::Long), &operands) {
                        Ok(len) => address += len,
                        Err(e) => errors.push(e),
                    }
                }
                Err(e) => errors.push(e),
            },
            None => {}
        }
    }

    // Pass 2: emit bytes, now that every label address is known.
    let mut source_map = SourceMap::new();
    let start_address = if org_seen { first_org(&lines).unwrap_or(load_address) } else { load_address };
    let mut address = start_address;
    for line in &lines {
        match line.mnemonic {
            Some("ORG") => {
                if let Some(text) = line.operand_text.first() {
                    if let Some(v) = parse_org(text) {
                        address = v;
                    }
                }
            }
            Some(mnemonic) => match parse_operands(line.number, &line.operand_text) {
                Ok(operands) => {
                    let original_text = reconstruct(line);
                    source_map.insert(address, line.number, &original_text);
                    match encoder::encode(line.number, mnemonic, line.size, &operands, address, &symbols, mem) {
                        Ok(len) => address += len,
                        Err(mut e) => {
                            // Still advance by the pass-1 predicted size so
                            // later labels stay consistent even when this
                            // line reported an error.
                            if let Ok(len) =
                                instruction_size(line.number, mnemonic, matches!(line.size, Size::Long), &operands)
                            {
                                address += len;
                            }
                            errors.append(&mut e);
                        }
                    }
                }
                Err(e) => errors.push(e),
            },
            None => {}
        }
    }

    AssembledProgram {
        start_address,
        symbols,
        source_map,
        errors,
    }
}

fn first_org(lines: &[Line<'_>]) -> Option<u32> {
    lines
        .iter()
        .find(|l| l.mnemonic == Some("ORG"))
        .and_then(|l| l.operand_text.first())
        .and_then(|t| parse_org(t))
}

fn parse_org(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    let hex = trimmed.strip_prefix('$').unwrap_or(trimmed);
    u32::from_str_radix(hex, 16).ok().or_else(|| {
        warn!("ORG: unrecognized address '{text}'");
        None
    })
}

fn reconstruct(line: &Line<'_>) -> String {
    let mnemonic = line.mnemonic.unwrap_or("");
    if line.operand_text.is_empty() {
        mnemonic.to_string()
    } else {
        format!("{} {}", mnemonic, line.operand_text.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn org_sets_load_address_and_emits_in_order() {
        let mut mem = Memory::new();
        let src = "ORG $10000\nMOVE.W #3,D0\nLOOP: SUBQ.W #1,D0\nBNE LOOP\nRTS\n";
        let program = assemble(src, 0, &mut mem);
        assert!(program.errors.is_empty(), "unexpected errors: {:?}", program.errors);
        assert_eq!(program.start_address, 0x10000);
        assert_eq!(mem.read_word(0x10000), 0x303C); // MOVE.W #imm,D0
        assert_eq!(program.symbols.lookup("LOOP"), Some(0x10004));
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let mut mem = Memory::new();
        let src = "* full line comment\n\n   ; only a comment\nNOP ; trailing\n";
        let program = assemble(src, 0x1000, &mut mem);
        assert!(program.errors.is_empty());
        assert_eq!(mem.read_word(0x1000), 0x4E71);
    }

    #[test]
    fn undefined_symbol_is_reported_but_assembly_continues() {
        let mut mem = Memory::new();
        let src = "BEQ MISSING\nNOP\n";
        let program = assemble(src, 0x1000, &mut mem);
        assert_eq!(program.errors.len(), 1);
        assert_eq!(mem.read_word(0x1002), 0x4E71);
    }

    #[test]
    fn forward_and_backward_branches_resolve_to_correct_displacements() {
        let mut mem = Memory::new();
        let src = "BACK: NOP\nBRA FWD\nNOP\nFWD: BRA BACK\n";
        let program = assemble(src, 0x1000, &mut mem);
        assert!(program.errors.is_empty(), "unexpected errors: {:?}", program.errors);
        // BRA FWD at 0x1002, target 0x1006, disp = 0x1006-(0x1002+2) = 2
        assert_eq!(mem.read_word(0x1002) & 0xFF, 2);
        // BRA BACK at 0x1006, target 0x1000, disp = 0x1000-(0x1006+2) = -8
        assert_eq!(mem.read_word(0x1006) & 0xFF, 0xF8);
    }
}
