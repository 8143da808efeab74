//! Instruction sizing for assembler pass 1 (§4.D).
//!
//! Pass 1 needs to know how many bytes each line will occupy without
//! actually encoding it, so label addresses are known before pass 2 resolves
//! forward references. This mirrors the encoder's addressing-mode handling
//! exactly (same operand parse, same extension-word rules) but only ever
//! returns a byte count.

use crate::error::AssemblyError;
use crate::operand::{Operand, OperandKind};

/// Extra bytes an operand's addressing mode appends to the base instruction
/// word (§4.C/§4.D): displacement, absolute, and immediate forms all consume
/// one or more 16-bit extension words; register-direct and indirect forms
/// add nothing.
#[must_use]
pub fn extension_bytes(operand: &Operand, long_immediate: bool) -> u32 {
    match operand.kind {
        OperandKind::DataRegDirect(_)
        | OperandKind::AddrRegDirect(_)
        | OperandKind::AddrRegIndirect(_)
        | OperandKind::PostIncrement(_)
        | OperandKind::PreDecrement(_) => 0,
        OperandKind::Displacement16(..) | OperandKind::AbsoluteShort(_) | OperandKind::PCRelative(_) => 2,
        OperandKind::PCRelativeTarget(_) => 2,
        OperandKind::AbsoluteLong(_) => 4,
        OperandKind::Immediate(_) => {
            if long_immediate {
                4
            } else {
                2
            }
        }
    }
}

/// Byte length of an encoded instruction, given its upper-cased mnemonic
/// (already split from any `.B`/`.W`/`.L` suffix), operand size, and already
/// parsed operands.
///
/// # Errors
/// Returns `AssemblyError::UnsupportedEncoding` for a mnemonic this
/// simulator doesn't implement.
pub fn instruction_size(
    line: usize,
    mnemonic: &str,
    is_long: bool,
    operands: &[Operand],
) -> Result<u32, AssemblyError> {
    let base = 2u32;
    let size = match mnemonic {
        "NOP" | "RTS" => base,
        "BTST" | "BCHG" | "BCLR" | "BSET" => {
            // Register-to-register form has no extension word; the
            // immediate-bit-number form always consumes one word regardless
            // of the (irrelevant, long-only) operand size.
            if operands.first().is_some_and(|o| matches!(o.kind, OperandKind::Immediate(_))) {
                base + 2
            } else {
                base
            }
        }
        "ADDQ" | "SUBQ" => base,
        "ADDI" | "SUBI" | "ANDI" => base + if is_long { 4 } else { 2 },
        "ADD" | "SUB" => base,
        "BEQ" | "BNE" | "BCC" | "BCS" | "BHI" | "BLS" | "BGE" | "BLT" | "BGT" | "BLE" | "BPL"
        | "BMI" | "BVC" | "BVS" | "BRA" => base,
        "MOVE" | "MOVEA" => {
            let src = operands.first().ok_or_else(|| unsupported(line, mnemonic))?;
            let dst = operands.get(1).ok_or_else(|| unsupported(line, mnemonic))?;
            base + extension_bytes(src, is_long) + extension_bytes(dst, is_long)
        }
        _ => return Err(unsupported(line, mnemonic)),
    };
    Ok(size)
}

fn unsupported(line: usize, mnemonic: &str) -> AssemblyError {
    AssemblyError::UnsupportedEncoding {
        line,
        mnemonic: mnemonic.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::parse_operand;

    #[test]
    fn fixed_width_instructions_are_two_bytes() {
        assert_eq!(instruction_size(1, "NOP", false, &[]).unwrap(), 2);
        assert_eq!(instruction_size(1, "RTS", false, &[]).unwrap(), 2);
        assert_eq!(instruction_size(1, "BEQ", false, &[]).unwrap(), 2);
    }

    #[test]
    fn move_immediate_to_absolute_adds_both_extension_words() {
        let src = parse_operand(1, "#$1234").unwrap();
        let dst = parse_operand(1, "$2000").unwrap();
        assert_eq!(instruction_size(1, "MOVE", false, &[src, dst]).unwrap(), 6);
    }

    #[test]
    fn move_long_immediate_uses_four_byte_extension() {
        let src = parse_operand(1, "#$12345678").unwrap();
        let dst = parse_operand(1, "D0").unwrap();
        assert_eq!(instruction_size(1, "MOVE", true, &[src, dst]).unwrap(), 6);
    }

    #[test]
    fn bit_op_immediate_form_adds_one_word_register_form_does_not() {
        let imm = parse_operand(1, "#3").unwrap();
        let dn = parse_operand(1, "D2").unwrap();
        let d1 = parse_operand(1, "D1").unwrap();
        assert_eq!(instruction_size(1, "BTST", false, &[imm, dn.clone()]).unwrap(), 4);
        assert_eq!(instruction_size(1, "BTST", false, &[d1, dn]).unwrap(), 2);
    }

    #[test]
    fn unknown_mnemonic_is_unsupported() {
        assert!(instruction_size(1, "DIVU", false, &[]).is_err());
    }
}
