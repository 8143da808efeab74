//! Typed error hierarchy for the assembler and executor.
//!
//! Assembly errors (`AssemblyError`) are collected, not propagated with `?`:
//! per the error-handling policy, lexical and semantic mistakes in a source
//! file are non-fatal and assembly continues so multiple errors surface in
//! one run. `ExecutionFault` is the propagating, run-ending kind. The CLI's
//! own `CliError` (file I/O, wrapping a batch of `AssemblyError`s) lives in
//! the `m68k-sim` binary crate, since this crate has no I/O of its own.

use thiserror::Error;

/// One problem encountered while assembling a single source line.
///
/// Carries the 1-based source line number so the caller can render the
/// `L{n}: Error: ...` diagnostic prefix required by the trace format.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    #[error("L{line}: Error: undefined symbol '{name}'")]
    UndefinedSymbol { line: usize, name: String },

    #[error("L{line}: Error: duplicate symbol '{name}', ignoring")]
    DuplicateSymbol { line: usize, name: String },

    #[error("L{line}: Error: unrecognized operand '{text}'")]
    UnrecognizedOperand { line: usize, text: String },

    #[error("L{line}: Error: unsupported encoding for '{mnemonic}'")]
    UnsupportedEncoding { line: usize, mnemonic: String },

    #[error("L{line}: Error: branch target out of range (displacement {displacement}, target {target:#010x})")]
    BranchOutOfRange {
        line: usize,
        target: u32,
        displacement: i32,
    },
}

/// A fault that halts the executor immediately.
///
/// Unlike `AssemblyError`, these are fatal to the run in progress: the trace
/// accumulated so far is preserved but no further instructions execute.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutionFault {
    #[error("unknown opcode {opcode:#06x} at PC {pc:#010x}")]
    UnknownOpcode { pc: u32, opcode: u16 },

    #[error("safety cap of {count} instructions reached")]
    SafetyCapReached { count: u64 },
}
