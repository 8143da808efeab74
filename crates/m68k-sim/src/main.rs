//! CLI entry point (§6, §11): assembles a source file, runs it from a
//! configurable load address, and prints a trace; on exit writes whatever
//! memory changes occurred to the change-dump file.

mod dump;
mod error;
mod trace;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use m68k_core::assembler::assemble;
use m68k_core::execute::run;
use m68k_core::memory::Memory;
use m68k_core::registers::Registers;

use crate::error::CliError;

const DEFAULT_LOAD_ADDRESS: u32 = 0x1_0000;
const DEFAULT_DUMP_PATH: &str = "memory_dump.txt";
const SAFETY_CAP: u64 = 5_000;

/// Two-pass M68K assembler and instruction-level simulator.
#[derive(Debug, Parser)]
#[command(name = "m68k-sim", version, about)]
struct Cli {
    /// Assembly source file to assemble and run.
    source: PathBuf,

    /// Load address override, in hexadecimal (e.g. `10000`).
    #[arg(short = 'a', long = "address")]
    address: Option<String>,

    /// Path to write the memory-change dump to.
    #[arg(short = 'o', long = "dump-path", default_value = DEFAULT_DUMP_PATH)]
    dump_path: PathBuf,

    /// Enable verbose (debug-level) logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run_cli(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run_cli(cli: &Cli) -> Result<(), CliError> {
    let source = std::fs::read_to_string(&cli.source).map_err(|source_err| CliError::SourceOpen {
        path: cli.source.clone(),
        source: source_err,
    })?;

    let load_address = match &cli.address {
        Some(text) => parse_hex_address(text).unwrap_or(DEFAULT_LOAD_ADDRESS),
        None => DEFAULT_LOAD_ADDRESS,
    };

    let mut mem = Memory::new();
    let program = assemble(&source, load_address, &mut mem);
    if !program.errors.is_empty() {
        for err in &program.errors {
            error!("{err}");
        }
        return Err(CliError::Assembly(program.errors));
    }

    println!("{}", trace::banner(program.start_address));

    let mut regs = Registers::new();
    regs.pc = program.start_address;
    println!("{}", trace::initial_state(&regs));

    let outcome = run(&mut regs, &mut mem, &program.source_map, SAFETY_CAP);
    for step in &outcome.steps {
        println!("{}", trace::step_line(step));
    }

    dump::write_change_dump(&cli.dump_path, mem.changes())?;

    Ok(())
}

fn parse_hex_address(text: &str) -> Option<u32> {
    let trimmed = text.trim().trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(trimmed, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_address_with_or_without_prefix() {
        assert_eq!(parse_hex_address("10000"), Some(0x10000));
        assert_eq!(parse_hex_address("0x2000"), Some(0x2000));
        assert_eq!(parse_hex_address("zz"), None);
    }
}
