//! Textual trace formatting (§6) — explicitly out of the core's scope; this
//! is the "thin glue layer" that renders the core's structured `StepTrace`
//! values as the banner/initial-state/per-instruction lines a user reads.

use m68k_core::execute::StepTrace;
use m68k_core::Registers;

#[must_use]
pub fn banner(start_address: u32) -> String {
    format!("M68K assembler/simulator — loading at {start_address:#010X}")
}

#[must_use]
pub fn register_dump(regs: &Registers) -> String {
    let mut out = format!("PC={:08X}", regs.pc);
    for (n, d) in regs.d.iter().enumerate() {
        out.push_str(&format!(" D{n}={d:08X}"));
    }
    out.push_str(&format!(" SR={:04X}", regs.sr));
    for (n, a) in regs.a.iter().enumerate() {
        out.push_str(&format!(" A{n}={a:08X}"));
    }
    out
}

#[must_use]
pub fn initial_state(regs: &Registers) -> String {
    format!("Initial State: {}", register_dump(regs))
}

#[must_use]
pub fn step_line(step: &StepTrace) -> String {
    let prefix = match (step.source_line, &step.source_text) {
        (Some(line), Some(text)) => format!("L{line:<3}: {text:<20} | "),
        _ => "??: (no source)          | ".to_string(),
    };
    format!("{prefix}{}", register_dump(&step.registers))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_line_falls_back_when_source_is_unmapped() {
        let step = StepTrace {
            pc_before: 0x1000,
            source_line: None,
            source_text: None,
            registers: Registers::new(),
        };
        assert!(step_line(&step).starts_with("??: (no source)"));
    }

    #[test]
    fn step_line_includes_line_and_text_when_mapped() {
        let step = StepTrace {
            pc_before: 0x1000,
            source_line: Some(3),
            source_text: Some("MOVE.W #3,D0".to_string()),
            registers: Registers::new(),
        };
        let line = step_line(&step);
        assert!(line.starts_with("L3  : MOVE.W #3,D0"));
    }
}
