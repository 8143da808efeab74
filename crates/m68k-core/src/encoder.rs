//! Assembler pass 2: mnemonic + operands + current address -> machine code
//! written into the memory image (§4.E).
//!
//! Mirrors `sizer.rs`'s notion of "extra bytes per addressing mode" exactly
//! — the two must never disagree on how many bytes an encoding occupies, or
//! pass 1's label addresses go stale (§8 two-pass consistency, §9 "extract a
//! shared helper").

use crate::ea::{EaField, Size};
use crate::error::AssemblyError;
use crate::memory::Memory;
use crate::operand::{Operand, OperandKind};
use crate::symbol::SymbolTable;

/// Resolve a parsed operand's label (if any) against the symbol table,
/// producing the concrete numeric kind the encoder emits from.
///
/// An undefined label is reported and treated as address zero (§7), letting
/// assembly continue so later lines can still be checked.
fn resolve(
    line: usize,
    operand: &Operand,
    symbols: &SymbolTable,
    errors: &mut Vec<AssemblyError>,
) -> OperandKind {
    let Some(name) = &operand.label else {
        return operand.kind;
    };
    match symbols.lookup(name) {
        Some(addr) => match operand.kind {
            // A resolved PC-relative operand carries its absolute target;
            // the actual displacement is computed at emission time once the
            // instruction's own address is known.
            OperandKind::PCRelative(_) => OperandKind::PCRelativeTarget(addr),
            _ => OperandKind::AbsoluteLong(addr),
        },
        None => {
            errors.push(AssemblyError::UndefinedSymbol {
                line,
                name: name.clone(),
            });
            match operand.kind {
                OperandKind::PCRelative(_) => OperandKind::PCRelative(0),
                _ => OperandKind::AbsoluteLong(0),
            }
        }
    }
}

fn ea_field_and_extra(kind: OperandKind) -> (EaField, Option<Extra>) {
    match kind {
        OperandKind::DataRegDirect(n) => (EaField::data_reg(n), None),
        OperandKind::AddrRegDirect(n) => (EaField::addr_reg(n), None),
        OperandKind::AddrRegIndirect(n) => (EaField::addr_indirect(n), None),
        OperandKind::PostIncrement(n) => (EaField::post_increment(n), None),
        OperandKind::PreDecrement(n) => (EaField::pre_decrement(n), None),
        OperandKind::Displacement16(n, d) => (EaField::displacement(n), Some(Extra::Word(d as u16))),
        OperandKind::AbsoluteShort(v) => (EaField::absolute_short(), Some(Extra::Word(v))),
        OperandKind::AbsoluteLong(v) => (EaField::absolute_long(), Some(Extra::Long(v))),
        OperandKind::Immediate(v) => (EaField::immediate(), Some(Extra::Immediate(v))),
        OperandKind::PCRelative(d) => (EaField::pc_relative(), Some(Extra::Word(d as u16))),
        OperandKind::PCRelativeTarget(addr) => (EaField::pc_relative(), Some(Extra::PcRelativeTarget(addr))),
    }
}

enum Extra {
    Word(u16),
    Long(u32),
    Immediate(u32),
    /// A resolved `label(PC)` operand: the displacement is computed against
    /// the address of this very extension word, matching the executor's
    /// `resolve_ea` (§4.G), not against the instruction's opcode word.
    PcRelativeTarget(u32),
}

fn emit_extra(mem: &mut Memory, addr: &mut u32, size: Size, extra: Extra) {
    match extra {
        Extra::Word(w) => {
            mem.write_word(*addr, w);
            *addr += 2;
        }
        Extra::Long(l) => {
            mem.write_long(*addr, l);
            *addr += 4;
        }
        Extra::Immediate(v) => {
            if matches!(size, Size::Long) {
                mem.write_long(*addr, v);
                *addr += 4;
            } else {
                mem.write_word(*addr, v as u16);
                *addr += 2;
            }
        }
        Extra::PcRelativeTarget(target) => {
            let disp = i64::from(target) - i64::from(*addr);
            mem.write_word(*addr, disp as i16 as u16);
            *addr += 2;
        }
    }
}

fn move_size_bits(size: Size) -> u16 {
    match size {
        Size::Byte => 0b01,
        Size::Long => 0b10,
        Size::Word => 0b11,
    }
}

fn quick_size_bits(size: Size) -> u16 {
    match size {
        Size::Byte => 0b00,
        Size::Word => 0b01,
        Size::Long => 0b10,
    }
}

/// Encode one instruction, writing its opcode word and extension words at
/// `address`. Returns the number of bytes written, which must equal what
/// `sizer::instruction_size` predicted for the same line.
///
/// # Errors
/// Reports unsupported encodings and out-of-range branch targets;
/// undefined-symbol errors are reported but do not stop emission.
pub fn encode(
    line: usize,
    mnemonic: &str,
    size: Size,
    operands: &[Operand],
    address: u32,
    symbols: &SymbolTable,
    mem: &mut Memory,
) -> Result<u32, Vec<AssemblyError>> {
    let mut errors = Vec::new();
    let mut cursor = address;

    match mnemonic {
        "NOP" => {
            mem.write_word(cursor, 0x4E71);
            cursor += 2;
        }
        "RTS" => {
            mem.write_word(cursor, 0x4E75);
            cursor += 2;
        }
        "MOVE" | "MOVEA" => {
            let Some(src) = operands.first() else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let Some(dst) = operands.get(1) else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let src_kind = resolve(line, src, symbols, &mut errors);
            let dst_kind = resolve(line, dst, symbols, &mut errors);
            let (src_ea, src_extra) = ea_field_and_extra(src_kind);
            let (dst_ea, dst_extra) = ea_field_and_extra(dst_kind);
            if mnemonic == "MOVEA" && dst_ea.mode != 0b001 {
                errors.push(unsupported(line, mnemonic));
            }
            let opcode = (move_size_bits(size) << 12)
                | ((u16::from(dst_ea.reg)) << 9)
                | ((u16::from(dst_ea.mode)) << 6)
                | src_ea.bits();
            mem.write_word(cursor, opcode);
            cursor += 2;
            if let Some(extra) = src_extra {
                emit_extra(mem, &mut cursor, size, extra);
            }
            if let Some(extra) = dst_extra {
                emit_extra(mem, &mut cursor, size, extra);
            }
        }
        "ADDQ" | "SUBQ" => {
            let Some(Operand { kind: OperandKind::Immediate(k), .. }) = operands.first() else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let Some(dst) = operands.get(1) else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let dst_kind = resolve(line, dst, symbols, &mut errors);
            let OperandKind::DataRegDirect(reg) = dst_kind else {
                errors.push(unsupported(line, mnemonic));
                return Err(errors);
            };
            let ddd = if *k == 8 { 0 } else { *k & 0x7 };
            let d = u16::from(mnemonic == "SUBQ");
            let opcode = 0x5000 | (ddd as u16) << 9 | d << 8 | quick_size_bits(size) << 6 | u16::from(reg);
            mem.write_word(cursor, opcode);
            cursor += 2;
        }
        "ADDI" | "SUBI" | "ANDI" => {
            let Some(Operand { kind: OperandKind::Immediate(imm), .. }) = operands.first() else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let Some(dst) = operands.get(1) else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let dst_kind = resolve(line, dst, symbols, &mut errors);
            let OperandKind::DataRegDirect(reg) = dst_kind else {
                errors.push(unsupported(line, mnemonic));
                return Err(errors);
            };
            let base: u16 = match mnemonic {
                "ANDI" => 0x0200,
                "SUBI" => 0x0400,
                _ => 0x0600,
            };
            let opcode = base | quick_size_bits(size) << 6 | u16::from(reg);
            mem.write_word(cursor, opcode);
            cursor += 2;
            emit_extra(mem, &mut cursor, size, Extra::Immediate(*imm));
        }
        "ADD" | "SUB" => {
            let Some(src) = operands.first() else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let Some(dst) = operands.get(1) else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let (OperandKind::DataRegDirect(src_reg), OperandKind::DataRegDirect(dst_reg)) =
                (src.kind, resolve(line, dst, symbols, &mut errors))
            else {
                errors.push(unsupported(line, mnemonic));
                return Err(errors);
            };
            let base: u16 = if mnemonic == "ADD" { 0xD000 } else { 0x9000 };
            let opcode = base | (u16::from(dst_reg)) << 9 | quick_size_bits(size) << 6 | u16::from(src_reg);
            mem.write_word(cursor, opcode);
            cursor += 2;
        }
        "BTST" | "BCHG" | "BCLR" | "BSET" => {
            let op_bits: u16 = match mnemonic {
                "BCHG" => 0x40,
                "BCLR" => 0x80,
                "BSET" => 0xC0,
                _ => 0x00,
            };
            let Some(src) = operands.first() else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let Some(dst) = operands.get(1) else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let OperandKind::DataRegDirect(dst_reg) = resolve(line, dst, symbols, &mut errors) else {
                errors.push(unsupported(line, mnemonic));
                return Err(errors);
            };
            match src.kind {
                OperandKind::Immediate(bit) => {
                    let opcode = 0x0800 | op_bits | u16::from(dst_reg);
                    mem.write_word(cursor, opcode);
                    cursor += 2;
                    mem.write_word(cursor, bit as u16);
                    cursor += 2;
                }
                OperandKind::DataRegDirect(src_reg) => {
                    let opcode = 0x0100 | op_bits | (u16::from(src_reg)) << 9 | u16::from(dst_reg);
                    mem.write_word(cursor, opcode);
                    cursor += 2;
                }
                _ => {
                    errors.push(unsupported(line, mnemonic));
                    return Err(errors);
                }
            }
        }
        mnemonic if mnemonic.starts_with('B') && condition_code(mnemonic).is_some() => {
            let cc = condition_code(mnemonic).expect("checked above");
            let Some(target) = operands.first() else {
                return Err(vec![unsupported(line, mnemonic)]);
            };
            let resolved = resolve(line, target, symbols, &mut errors);
            let target_addr = match resolved {
                OperandKind::AbsoluteLong(v) | OperandKind::PCRelativeTarget(v) => v,
                _ => {
                    errors.push(unsupported(line, mnemonic));
                    return Err(errors);
                }
            };
            let disp = (target_addr as i64) - (address as i64 + 2);
            if !(-128..=127).contains(&disp) {
                errors.push(AssemblyError::BranchOutOfRange {
                    line,
                    target: target_addr,
                    displacement: disp as i32,
                });
                return Err(errors);
            }
            let opcode = 0x6000 | u16::from(cc) << 8 | (disp as i8 as u8 as u16);
            mem.write_word(cursor, opcode);
            cursor += 2;
        }
        _ => return Err(vec![unsupported(line, mnemonic)]),
    }

    if errors.is_empty() {
        Ok(cursor - address)
    } else {
        Err(errors)
    }
}

fn unsupported(line: usize, mnemonic: &str) -> AssemblyError {
    AssemblyError::UnsupportedEncoding {
        line,
        mnemonic: mnemonic.to_string(),
    }
}

/// Map a branch mnemonic to its 4-bit condition code (§4.H table).
#[must_use]
pub fn condition_code(mnemonic: &str) -> Option<u8> {
    Some(match mnemonic {
        "BRA" => 0x0,
        "BHI" => 0x2,
        "BLS" => 0x3,
        "BCC" => 0x4,
        "BCS" => 0x5,
        "BNE" => 0x6,
        "BEQ" => 0x7,
        "BVC" => 0x8,
        "BVS" => 0x9,
        "BPL" => 0xA,
        "BMI" => 0xB,
        "BGE" => 0xC,
        "BLT" => 0xD,
        "BGT" => 0xE,
        "BLE" => 0xF,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::parse_operand;

    #[test]
    fn encodes_move_immediate_to_data_register() {
        let symbols = SymbolTable::new();
        let mut mem = Memory::new();
        let src = parse_operand(1, "#$DEADBEEF").unwrap();
        let dst = parse_operand(1, "D1").unwrap();
        let len = encode(1, "MOVE", Size::Long, &[src, dst], 0x10000, &symbols, &mut mem).unwrap();
        assert_eq!(len, 6);
        assert_eq!(mem.read_word(0x10000), 0x203C);
        assert_eq!(mem.read_long(0x10002), 0xDEAD_BEEF);
    }

    #[test]
    fn encodes_movea_with_destination_mode_one() {
        let symbols = SymbolTable::new();
        let mut mem = Memory::new();
        let src = parse_operand(1, "#$8000").unwrap();
        let dst = parse_operand(1, "A0").unwrap();
        encode(1, "MOVEA", Size::Word, &[src, dst], 0x1000, &symbols, &mut mem).unwrap();
        assert_eq!(mem.read_word(0x1000), 0x307C);
    }

    #[test]
    fn encodes_addq_quick_value_eight_as_zero_field() {
        let symbols = SymbolTable::new();
        let mut mem = Memory::new();
        let k = parse_operand(1, "#8").unwrap();
        let dst = parse_operand(1, "D0").unwrap();
        encode(1, "ADDQ", Size::Word, &[k, dst], 0x1000, &symbols, &mut mem).unwrap();
        assert_eq!(mem.read_word(0x1000), 0x5040);
    }

    #[test]
    fn undefined_label_reports_and_encodes_zero() {
        let symbols = SymbolTable::new();
        let mut mem = Memory::new();
        let target = parse_operand(1, "MISSING").unwrap();
        let err = encode(1, "BEQ", Size::Word, &[target], 0x1000, &symbols, &mut mem).unwrap_err();
        assert!(matches!(err[0], AssemblyError::UndefinedSymbol { .. }));
    }

    #[test]
    fn branch_out_of_range_is_reported() {
        let mut symbols = SymbolTable::new();
        symbols.insert("FAR", 0x1000 + 2 + 200);
        let mut mem = Memory::new();
        let target = parse_operand(1, "FAR").unwrap();
        let err = encode(1, "BRA", Size::Word, &[target], 0x1000, &symbols, &mut mem).unwrap_err();
        assert!(matches!(err[0], AssemblyError::BranchOutOfRange { .. }));
    }

    #[test]
    fn move_from_pc_relative_label_computes_real_displacement() {
        let mut symbols = SymbolTable::new();
        symbols.insert("TABLE", 0x1010);
        let mut mem = Memory::new();
        let src = parse_operand(1, "TABLE(PC)").unwrap();
        let dst = parse_operand(1, "D0").unwrap();
        // Opcode word at 0x1000, extension word at 0x1002; disp = 0x1010-0x1002.
        encode(1, "MOVE", Size::Word, &[src, dst], 0x1000, &symbols, &mut mem).unwrap();
        assert_eq!(mem.read_word(0x1002), 0x1010 - 0x1002);
    }

    #[test]
    fn bit_test_register_form_has_no_extension_word() {
        let symbols = SymbolTable::new();
        let mut mem = Memory::new();
        let src = parse_operand(1, "D1").unwrap();
        let dst = parse_operand(1, "D2").unwrap();
        let len = encode(1, "BTST", Size::Long, &[src, dst], 0x1000, &symbols, &mut mem).unwrap();
        assert_eq!(len, 2);
        assert_eq!(mem.read_word(0x1000), 0x0100 | (1 << 9) | 2);
    }
}
