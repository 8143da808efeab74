//! CLI-level error type (§12): wraps file I/O failures and a batch of
//! assembly diagnostics so `main` has one `Result` to match on for an exit
//! code, per §6's "non-zero on file-open or assembly failure".

use std::path::PathBuf;

use m68k_core::AssemblyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("could not read source file '{path}': {source}")]
    SourceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write change dump '{path}': {source}")]
    DumpWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("assembly failed with {} error(s)", .0.len())]
    Assembly(Vec<AssemblyError>),
}
