//! Change-dump file writer (§6): one line per journaled byte write, written
//! once at shutdown. An empty journal means nothing is written at all.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use m68k_core::memory::MemoryChange;

use crate::error::CliError;

/// # Errors
/// Returns `CliError::DumpWrite` if the file can't be created or written.
pub fn write_change_dump(path: &Path, changes: &[MemoryChange]) -> Result<(), CliError> {
    if changes.is_empty() {
        return Ok(());
    }

    let file = File::create(path).map_err(|source| CliError::DumpWrite {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    for change in changes {
        writeln!(
            writer,
            "0x{:08X}: 0x{:02X} -> 0x{:02X}",
            change.address, change.old_value, change.new_value
        )
        .map_err(|source| CliError::DumpWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}
